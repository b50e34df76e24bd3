//! Dispense signals inside a sleep window: the loop goes back to sleep
//! for the remaining time instead of running a radio cycle.

use super::mock_hw::{MockBattery, MockDurable, MockRadio, RecordingSink, ScriptedPower};

use dispense_counter::adapters::interrupts::SimulatedLines;
use dispense_counter::adapters::time::RtcClock;
use dispense_counter::app::context::AppContext;
use dispense_counter::app::ports::{BootKind, ClockPort};
use dispense_counter::app::service::{DutyCycleLoop, Ports};
use dispense_counter::config::DeviceConfig;
use dispense_counter::fsm::StateId;

type Io<'a> = Ports<MockRadio, ScriptedPower<'a>, RtcClock, MockBattery, MockDurable>;

fn make_io<'a>(ctx: &'a AppContext, clock: &RtcClock) -> Io<'a> {
    Ports {
        radio: MockRadio::new(),
        power: ScriptedPower::new(clock.clone(), BootKind::Cold, Some(SimulatedLines::bind(ctx))),
        clock: clock.clone(),
        battery: MockBattery::default(),
        durable: MockDurable::new(),
    }
}

#[test]
fn dispense_mid_sleep_resumes_for_remaining_time() {
    let config = DeviceConfig::default();
    let ctx = AppContext::new(&config);
    let clock = RtcClock::simulated(1_000);
    let mut io = make_io(&ctx, &clock);
    io.power.dispense_at(1_010);
    let mut sink = RecordingSink::new();
    let mut app = DutyCycleLoop::new(&ctx, config);
    app.boot(&mut io, &mut sink);

    assert_eq!(app.step(&mut io, &mut sink), StateId::FullSleep);
    assert_eq!(io.radio.sent(), vec![vec![0x03, 0xE8]]);

    // Woken by the dispense at t+10.
    assert_eq!(app.step(&mut io, &mut sink), StateId::RunningDutyCycle);
    assert_eq!(clock.now_secs(), 1_010);
    assert_eq!(ctx.store.dispenses_remaining(), 999);

    // Deadline not reached: straight back to sleep, no uplink.
    assert_eq!(app.step(&mut io, &mut sink), StateId::QuickResumeSleep);
    assert_eq!(io.radio.sent().len(), 1);

    assert_eq!(app.step(&mut io, &mut sink), StateId::RunningDutyCycle);
    assert_eq!(clock.now_secs(), 1_030);
    assert_eq!(io.power.durations(), vec![30, 20]);

    assert_eq!(app.step(&mut io, &mut sink), StateId::FullSleep);
    assert_eq!(io.radio.sent(), vec![vec![0x03, 0xE8], vec![0x03, 0xE7]]);
}

#[test]
fn repeated_dispenses_shrink_the_remaining_sleep() {
    let config = DeviceConfig::default();
    let ctx = AppContext::new(&config);
    let clock = RtcClock::simulated(1_000);
    let mut io = make_io(&ctx, &clock);
    for at in [1_005, 1_012, 1_020] {
        io.power.dispense_at(at);
    }
    let mut sink = RecordingSink::new();
    let mut app = DutyCycleLoop::new(&ctx, config);
    app.boot(&mut io, &mut sink);

    for _ in 0..20 {
        app.step(&mut io, &mut sink);
        if io.radio.sent().len() == 2 {
            break;
        }
    }

    assert_eq!(io.power.durations(), vec![30, 25, 18, 10]);
    assert_eq!(clock.now_secs(), 1_030);
    assert_eq!(io.radio.sent(), vec![vec![0x03, 0xE8], vec![0x03, 0xE5]]);
    assert_eq!(app.cycles(), 2);
}

#[test]
fn dispense_without_armed_deadline_runs_full_cycle() {
    let config = DeviceConfig::default();
    let ctx = AppContext::new(&config);
    let clock = RtcClock::simulated(1_000);
    let mut io = make_io(&ctx, &clock);
    let mut sink = RecordingSink::new();
    let mut app = DutyCycleLoop::new(&ctx, config);
    app.boot(&mut io, &mut sink);

    SimulatedLines::bind(&ctx).dispense_edge();

    assert_eq!(app.step(&mut io, &mut sink), StateId::FullSleep);
    assert_eq!(io.radio.sent(), vec![vec![0x03, 0xE7]]);
    assert!(!ctx.latches.dispense.is_set());
}

#[test]
fn dispense_while_awake_is_counted_on_next_clock_wake() {
    let config = DeviceConfig::default();
    let ctx = AppContext::new(&config);
    let clock = RtcClock::simulated(1_000);
    let mut io = make_io(&ctx, &clock);
    let mut sink = RecordingSink::new();
    let mut app = DutyCycleLoop::new(&ctx, config);
    app.boot(&mut io, &mut sink);

    app.step(&mut io, &mut sink);
    // Edge lands after the send but before the sleep starts.
    SimulatedLines::bind(&ctx).dispense_edge();
    app.step(&mut io, &mut sink);

    // Clock wake: the leftover latch must not divert the cycle.
    assert_eq!(app.step(&mut io, &mut sink), StateId::FullSleep);
    assert_eq!(io.radio.sent().last(), Some(&vec![0x03, 0xE7]));
}
