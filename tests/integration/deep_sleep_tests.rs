//! Non-retaining sleep: RAM is lost, so every wake is a warm boot that
//! rebuilds the loop from the durable store.

use super::mock_hw::{MockBattery, MockDurable, MockRadio, RadioCall, RecordingSink, ScriptedPower};

use dispense_counter::adapters::time::RtcClock;
use dispense_counter::app::context::AppContext;
use dispense_counter::app::events::AppEvent;
use dispense_counter::app::ports::{BootKind, ClockPort, PowerPort};
use dispense_counter::app::service::{DutyCycleLoop, Ports};
use dispense_counter::config::{DeviceConfig, RetentionMode};
use dispense_counter::error::Error;
use dispense_counter::fsm::StateId;
use dispense_counter::scheduler::WakeReason;

type Io = Ports<MockRadio, ScriptedPower<'static>, RtcClock, MockBattery, MockDurable>;

fn deep_sleep_config() -> DeviceConfig {
    DeviceConfig {
        retention: RetentionMode::NonRetaining,
        ..DeviceConfig::default()
    }
}

fn make_io(clock: &RtcClock) -> Io {
    Ports {
        radio: MockRadio::new(),
        power: ScriptedPower::new(clock.clone(), BootKind::Cold, None),
        clock: clock.clone(),
        battery: MockBattery::default(),
        durable: MockDurable::new(),
    }
}

#[test]
fn dispense_wake_counts_once_and_keeps_the_deadline() {
    let config = deep_sleep_config();
    let clock = RtcClock::simulated(1_000);
    let mut io = make_io(&clock);
    io.power.dispense_at(1_010);
    let mut sink = RecordingSink::new();

    // ── Power-on ──
    {
        let ctx = AppContext::new(&config);
        let mut app = DutyCycleLoop::new(&ctx, config.clone());
        assert_eq!(app.boot(&mut io, &mut sink), BootKind::Cold);
        app.step(&mut io, &mut sink);
        app.step(&mut io, &mut sink);
    }
    assert!(io.radio.calls.contains(&RadioCall::SaveSession));
    let saved = io.durable.current().expect("flushed before deep sleep");
    assert_eq!(saved.sleep_until_secs, 1_030);
    assert_eq!(saved.dispenses_left, 1_000);
    assert_eq!(
        io.power.boot_kind(),
        BootKind::Warm(WakeReason::ExternalSignal)
    );

    // ── Warm boot on the dispense line ──
    {
        let ctx = AppContext::new(&config);
        let mut app = DutyCycleLoop::new(&ctx, config.clone());
        io.radio.clear();
        app.boot(&mut io, &mut sink);
        assert_eq!(io.radio.calls, vec![RadioCall::RestoreSession]);
        assert_eq!(ctx.store.dispenses_remaining(), 999);

        assert_eq!(app.step(&mut io, &mut sink), StateId::QuickResumeSleep);
        assert_eq!(app.step(&mut io, &mut sink), StateId::RunningDutyCycle);
        assert!(io.radio.sent().is_empty());
    }
    assert_eq!(io.power.durations(), vec![30, 20]);
    assert_eq!(clock.now_secs(), 1_030);
    let saved = io.durable.current().expect("dirty store flushed");
    assert_eq!(saved.dispenses_left, 999);
    assert_eq!(saved.sleep_until_secs, 1_030);

    // ── Warm boot on the deadline ──
    {
        let ctx = AppContext::new(&config);
        let mut app = DutyCycleLoop::new(&ctx, config.clone());
        assert_eq!(
            app.boot(&mut io, &mut sink),
            BootKind::Warm(WakeReason::ClockDeadline)
        );
        assert_eq!(app.step(&mut io, &mut sink), StateId::FullSleep);
    }
    assert_eq!(io.radio.sent(), vec![vec![0x03, 0xE7]]);
}

#[test]
fn failed_flush_is_recorded_and_retried() {
    let config = deep_sleep_config();
    let clock = RtcClock::simulated(1_000);
    let mut io = make_io(&clock);
    io.durable.fail_saves.set(true);
    let mut sink = RecordingSink::new();

    let ctx = AppContext::new(&config);
    let mut app = DutyCycleLoop::new(&ctx, config);
    app.boot(&mut io, &mut sink);
    app.step(&mut io, &mut sink);
    app.step(&mut io, &mut sink);

    assert!(matches!(app.last_error(), Some(Error::ConfigurationSave(_))));
    assert!(sink.count(|e| matches!(e, AppEvent::Fault(_))) >= 1);
    assert!(io.durable.current().is_none());

    io.durable.fail_saves.set(false);
    app.step(&mut io, &mut sink);
    assert!(io.durable.current().is_some());
}
