//! Reset and low-battery latches, and radio failures, as seen by the
//! full duty cycle.

use super::mock_hw::{MockBattery, MockDurable, MockRadio, RadioCall, RecordingSink, ScriptedPower};

use dispense_counter::adapters::interrupts::SimulatedLines;
use dispense_counter::adapters::time::RtcClock;
use dispense_counter::app::context::AppContext;
use dispense_counter::app::events::AppEvent;
use dispense_counter::app::ports::{BootKind, RadioError};
use dispense_counter::app::service::{DutyCycleLoop, Ports};
use dispense_counter::config::DeviceConfig;
use dispense_counter::error::Error;
use dispense_counter::fsm::StateId;
use dispense_counter::store::BatteryAlertState;
use dispense_counter::telemetry::BatteryReport;

type Io = Ports<MockRadio, ScriptedPower<'static>, RtcClock, MockBattery, MockDurable>;

fn make_io() -> Io {
    let clock = RtcClock::simulated(1_000);
    Ports {
        radio: MockRadio::new(),
        power: ScriptedPower::new(clock.clone(), BootKind::Cold, None),
        clock,
        battery: MockBattery::default(),
        durable: MockDurable::new(),
    }
}

/// Run one full cycle plus its sleep.
fn full_cycle(app: &mut DutyCycleLoop<'_>, io: &mut Io, sink: &mut RecordingSink) {
    assert_eq!(app.step(io, sink), StateId::FullSleep);
    assert_eq!(app.step(io, sink), StateId::RunningDutyCycle);
}

// ── Reset ─────────────────────────────────────────────────────

#[test]
fn user_reset_restores_full_count_and_is_acknowledged() {
    let config = DeviceConfig::default();
    let ctx = AppContext::new(&config);
    let lines = SimulatedLines::bind(&ctx);
    let mut io = make_io();
    let mut sink = RecordingSink::new();
    let mut app = DutyCycleLoop::new(&ctx, config);
    app.boot(&mut io, &mut sink);
    full_cycle(&mut app, &mut io, &mut sink);

    for _ in 0..3 {
        lines.dispense_edge();
    }
    assert_eq!(ctx.store.dispenses_remaining(), 997);
    lines.reset_edge();
    assert_eq!(ctx.store.dispenses_remaining(), 1_000);

    full_cycle(&mut app, &mut io, &mut sink);
    assert_eq!(io.radio.sent().last(), Some(&vec![0x03, 0xE8]));
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::CounterReset { full_count: 1_000 })),
        1
    );
    assert!(!ctx.latches.reset.is_set());
}

#[test]
fn dispenses_after_reset_count_down_from_full() {
    let config = DeviceConfig {
        full_dispense_count: 50,
        ..DeviceConfig::default()
    };
    let ctx = AppContext::new(&config);
    let lines = SimulatedLines::bind(&ctx);
    let mut io = make_io();
    let mut sink = RecordingSink::new();
    let mut app = DutyCycleLoop::new(&ctx, config);
    app.boot(&mut io, &mut sink);

    lines.reset_edge();
    lines.dispense_edge();
    full_cycle(&mut app, &mut io, &mut sink);
    assert_eq!(io.radio.sent(), vec![vec![0x00, 49]]);
}

// ── Battery ───────────────────────────────────────────────────

#[test]
fn low_battery_is_reported_until_recovery_is_confirmed() {
    let config = DeviceConfig::default();
    let ctx = AppContext::new(&config);
    let mut io = make_io();
    let low = io.battery.low.clone();
    let mut sink = RecordingSink::new();
    let mut app = DutyCycleLoop::new(&ctx, config);
    app.boot(&mut io, &mut sink);

    low.set(true);
    full_cycle(&mut app, &mut io, &mut sink);
    full_cycle(&mut app, &mut io, &mut sink);
    low.set(false);
    full_cycle(&mut app, &mut io, &mut sink);
    full_cycle(&mut app, &mut io, &mut sink);

    assert_eq!(
        io.radio.sent(),
        vec![
            vec![0x03, 0xE8, 0x01],
            vec![0x03, 0xE8, 0x01],
            vec![0x03, 0xE8, 0x00],
            vec![0x03, 0xE8],
        ]
    );
    assert_eq!(ctx.store.battery_state(), BatteryAlertState::Stable);
}

#[test]
fn battery_interrupt_alone_is_contradicted_by_a_high_sample() {
    let config = DeviceConfig::default();
    let ctx = AppContext::new(&config);
    let lines = SimulatedLines::bind(&ctx);
    let mut io = make_io();
    let mut sink = RecordingSink::new();
    let mut app = DutyCycleLoop::new(&ctx, config);
    app.boot(&mut io, &mut sink);

    lines.low_battery_edge();
    assert_eq!(ctx.store.battery_state(), BatteryAlertState::Low);

    full_cycle(&mut app, &mut io, &mut sink);
    assert_eq!(io.radio.sent(), vec![vec![0x03, 0xE8, 0x00]]);
    assert!(sink.events.contains(&AppEvent::TelemetrySent {
        dispenses: 1_000,
        battery: BatteryReport::StableConfirmed,
    }));
    assert!(!ctx.latches.low_battery.is_set());
}

// ── Radio failures ────────────────────────────────────────────

#[test]
fn join_failure_skips_uplink_and_retries_next_cycle() {
    let config = DeviceConfig::default();
    let ctx = AppContext::new(&config);
    let mut io = make_io();
    io.radio.join_failures = 1;
    let mut sink = RecordingSink::new();
    let mut app = DutyCycleLoop::new(&ctx, config);
    app.boot(&mut io, &mut sink);

    full_cycle(&mut app, &mut io, &mut sink);
    assert!(io.radio.sent().is_empty());
    assert_eq!(
        app.last_error(),
        Some(Error::TransientRadio(RadioError::JoinFailed))
    );
    assert_eq!(io.power.durations(), vec![30]);

    full_cycle(&mut app, &mut io, &mut sink);
    assert_eq!(io.radio.count(&RadioCall::Join), 2);
    assert_eq!(io.radio.sent(), vec![vec![0x03, 0xE8]]);
    assert_eq!(io.radio.count(&RadioCall::DutyCycle(true)), 1);
}

#[test]
fn send_failure_drops_the_cycle_without_touching_the_count() {
    let config = DeviceConfig::default();
    let ctx = AppContext::new(&config);
    let lines = SimulatedLines::bind(&ctx);
    let mut io = make_io();
    io.radio.fail_sends = true;
    let mut sink = RecordingSink::new();
    let mut app = DutyCycleLoop::new(&ctx, config);
    app.boot(&mut io, &mut sink);

    lines.dispense_edge();
    full_cycle(&mut app, &mut io, &mut sink);
    assert_eq!(
        app.last_error(),
        Some(Error::TransientRadio(RadioError::SendFailed))
    );
    assert_eq!(ctx.store.dispenses_remaining(), 999);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::TelemetrySent { .. })), 0);

    io.radio.fail_sends = false;
    full_cycle(&mut app, &mut io, &mut sink);
    assert_eq!(io.radio.sent().last(), Some(&vec![0x03, 0xE7]));
}
