//! Main loop: the duty-cycle state machine.
//!
//! [`DutyCycleLoop`] owns the state tracker and the sleep scheduler, and
//! borrows the shared [`AppContext`].  All I/O flows through port traits
//! bundled in [`Ports`], so the whole loop runs against mock adapters on
//! the host.
//!
//! ```text
//!  RadioTransport ◀──┐                          ┌──▶ EventSink
//!  DurableStore   ◀──┤  ┌────────────────────┐  │
//!  ClockPort      ───┼─▶│   DutyCycleLoop    │──┘
//!  PowerPort      ◀──┤  │ FSM · Scheduler    │
//!  BatterySense   ───┘  └─────────┬──────────┘
//!                                 │ borrows
//!                       ┌─────────▼──────────┐
//!  GPIO ISRs ──────────▶│ AppContext (store, │
//!                       │ latches)           │
//!                       └────────────────────┘
//! ```
//!
//! One [`step`](DutyCycleLoop::step) runs the body of the current state
//! and moves to the next one.  The only blocking call is the low-power
//! entry inside the two sleep states.

use log::{error, info, warn};

use crate::config::{DeviceConfig, MAX_COLD_BOOT_TX_INTERVAL_SECS, RetentionMode};
use crate::error::Error;
use crate::fsm::{LoopFsm, StateId};
use crate::scheduler::{SleepScheduler, WakeReason};
use crate::store::PersistedConfig;
use crate::telemetry::{BatteryReport, TelemetryPayload, evaluate_battery};

use super::context::AppContext;
use super::events::AppEvent;
use super::ports::{
    BatterySensePort, BootKind, ClockPort, DurableStore, EventSink, PowerPort, RadioError,
    RadioTransport,
};

// ───────────────────────────────────────────────────────────────
// Port bundle
// ───────────────────────────────────────────────────────────────

/// The driven adapters the loop needs, owned in one place.
pub struct Ports<R, P, C, B, D> {
    pub radio: R,
    pub power: P,
    pub clock: C,
    pub battery: B,
    pub durable: D,
}

// ───────────────────────────────────────────────────────────────
// DutyCycleLoop
// ───────────────────────────────────────────────────────────────

pub struct DutyCycleLoop<'a> {
    ctx: &'a AppContext,
    config: DeviceConfig,
    fsm: LoopFsm,
    scheduler: SleepScheduler,
    /// Reason the most recent low-power entry ended (or the warm-boot
    /// wake reason).  `None` after a cold boot.
    last_wake: Option<WakeReason>,
    last_error: Option<Error>,
    /// Completed full duty cycles since boot.
    cycles: u32,
}

impl<'a> DutyCycleLoop<'a> {
    pub fn new(ctx: &'a AppContext, config: DeviceConfig) -> Self {
        let scheduler = SleepScheduler::new(config.retention, config.wake_strategy);
        Self {
            ctx,
            config,
            fsm: LoopFsm::new(StateId::RunningDutyCycle),
            scheduler,
            last_wake: None,
            last_error: None,
            cycles: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Restore persisted state and run the cold-boot setup or warm resume.
    ///
    /// Both paths end in `RunningDutyCycle`.
    pub fn boot<R, P, C, B, D>(
        &mut self,
        io: &mut Ports<R, P, C, B, D>,
        sink: &mut impl EventSink,
    ) -> BootKind
    where
        R: RadioTransport,
        P: PowerPort,
        D: DurableStore,
    {
        let boot = io.power.boot_kind();
        let persisted = self.load_persisted(&io.durable, sink);
        self.ctx.store.restore(&persisted);

        match boot {
            BootKind::Cold => {
                info!("Boot: cold start");
                // The saved interval only carries across sleeps; a cold
                // start takes the configured one.
                self.ctx
                    .store
                    .set_tx_interval_secs(self.config.tx_interval_secs);
                self.clamp_cold_interval();
                self.scheduler.restore_deadline(0);
                info!(
                    "configuration: dispenses_left={}, tx_interval={}s",
                    self.ctx.store.dispenses_remaining(),
                    self.ctx.store.tx_interval_secs()
                );
                self.setup_radio(&mut io.radio, sink);
            }
            BootKind::Warm(reason) => {
                info!("Boot: warm resume ({:?})", reason);
                info!("Restoring network session");
                if let Err(e) = io.radio.restore_session() {
                    self.radio_failed("restore network session", e, sink);
                }
                self.scheduler.restore_deadline(persisted.sleep_until_secs);
                self.last_wake = Some(reason);
                // RAM was lost, so no handler ran for the edge that woke us.
                if reason == WakeReason::ExternalSignal {
                    self.ctx.dispense_handler().on_rising_edge();
                }
            }
        }

        self.fsm = LoopFsm::new(StateId::RunningDutyCycle);
        sink.emit(&AppEvent::Started {
            boot,
            state: StateId::RunningDutyCycle,
        });
        boot
    }

    /// Run forever.
    pub fn run<R, P, C, B, D>(
        &mut self,
        io: &mut Ports<R, P, C, B, D>,
        sink: &mut impl EventSink,
    ) -> !
    where
        R: RadioTransport,
        P: PowerPort,
        C: ClockPort,
        B: BatterySensePort,
        D: DurableStore,
    {
        loop {
            self.step(io, sink);
        }
    }

    // ── Per-state orchestration ───────────────────────────────

    /// Execute the current state's body once and transition.
    pub fn step<R, P, C, B, D>(
        &mut self,
        io: &mut Ports<R, P, C, B, D>,
        sink: &mut impl EventSink,
    ) -> StateId
    where
        R: RadioTransport,
        P: PowerPort,
        C: ClockPort,
        B: BatterySensePort,
        D: DurableStore,
    {
        let prev = self.fsm.current_state();
        let next = match prev {
            StateId::RunningDutyCycle => self.run_duty_cycle(io, sink),
            StateId::QuickResumeSleep => self.quick_resume_sleep(io, sink),
            StateId::FullSleep => self.full_sleep(io, sink),
        };
        self.fsm.transition(next);
        if next != prev {
            sink.emit(&AppEvent::StateChanged {
                from: prev,
                to: next,
            });
        }
        next
    }

    /// RUNNING_DUTY_CYCLE: drain latches, then either divert back to sleep
    /// or join, report and schedule a full sleep.
    pub fn run_duty_cycle<R, P, C, B, D>(
        &mut self,
        io: &mut Ports<R, P, C, B, D>,
        sink: &mut impl EventSink,
    ) -> StateId
    where
        R: RadioTransport,
        C: ClockPort,
        B: BatterySensePort,
        D: DurableStore,
    {
        let now = io.clock.now_secs();
        let dispensed = self.ctx.latches.dispense.take();
        let signal_wake = self.last_wake == Some(WakeReason::ExternalSignal);

        if (dispensed || signal_wake) && self.woke_before_deadline(now) {
            // The dispense was already counted in interrupt context; only
            // the clock deadline is worth a radio cycle.
            return StateId::QuickResumeSleep;
        }

        if self.ctx.latches.reset.take() {
            info!(
                "USER reset dispenses to {} (full)",
                self.ctx.store.full_count()
            );
            sink.emit(&AppEvent::CounterReset {
                full_count: self.ctx.store.full_count(),
            });
        }
        // Already applied to the store by the handler; the sampled level
        // below decides what gets reported.
        self.ctx.latches.low_battery.take();

        if self.ensure_joined(&mut io.radio, sink) {
            self.report(io, sink);
            if self.scheduler.retention() == RetentionMode::NonRetaining {
                info!("Saving network session");
                if let Err(e) = io.radio.save_session() {
                    self.radio_failed("save network session", e, sink);
                }
            }
        }

        self.persist_if_dirty(&io.durable, sink);
        self.cycles = self.cycles.wrapping_add(1);
        StateId::FullSleep
    }

    /// QUICK_RESUME_SLEEP: sleep out whatever is left of the deadline.
    pub fn quick_resume_sleep<R, P, C, B, D>(
        &mut self,
        io: &mut Ports<R, P, C, B, D>,
        sink: &mut impl EventSink,
    ) -> StateId
    where
        P: PowerPort,
        C: ClockPort,
        D: DurableStore,
    {
        let remaining = self.scheduler.remaining_secs(io.clock.now_secs());
        if remaining == 0 {
            self.last_wake = Some(WakeReason::ClockDeadline);
            return StateId::RunningDutyCycle;
        }

        info!("Woke from interrupt, going back to sleep for {} seconds", remaining);
        self.flush_before_sleep(&io.durable, sink, false);
        match self.sleep(&mut io.power, remaining, sink) {
            WakeReason::ClockDeadline => StateId::RunningDutyCycle,
            WakeReason::ExternalSignal => {
                self.ctx.latches.dispense.take();
                StateId::QuickResumeSleep
            }
        }
    }

    /// FULL_SLEEP: arm a fresh deadline and sleep the whole interval.
    pub fn full_sleep<R, P, C, B, D>(
        &mut self,
        io: &mut Ports<R, P, C, B, D>,
        sink: &mut impl EventSink,
    ) -> StateId
    where
        P: PowerPort,
        C: ClockPort,
        D: DurableStore,
    {
        let now = io.clock.now_secs();
        let deadline = self.scheduler.arm(now, self.ctx.store.tx_interval_secs());
        let duration = deadline.remaining_secs(now);
        self.flush_before_sleep(&io.durable, sink, true);
        self.sleep(&mut io.power, duration, sink);
        StateId::RunningDutyCycle
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// Most recent non-fatal error, for diagnostics.
    pub fn last_error(&self) -> Option<Error> {
        self.last_error
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    // ── Boot helpers ──────────────────────────────────────────

    fn load_persisted(&mut self, durable: &impl DurableStore, sink: &mut impl EventSink) -> PersistedConfig {
        let factory = || {
            PersistedConfig::factory(self.config.full_dispense_count, self.config.tx_interval_secs)
        };
        match durable.load() {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!("Store: no saved counters, starting full");
                factory()
            }
            Err(e) => {
                warn!("Store: load failed ({}), starting full", e);
                let record = factory();
                self.record_error(Error::StoreLoad(e), sink);
                record
            }
        }
    }

    fn clamp_cold_interval(&self) {
        let interval = self.ctx.store.tx_interval_secs();
        if interval > MAX_COLD_BOOT_TX_INTERVAL_SECS {
            info!(
                "Clamping tx interval {}s -> {}s for cold start",
                interval, MAX_COLD_BOOT_TX_INTERVAL_SECS
            );
            self.ctx
                .store
                .set_tx_interval_secs(MAX_COLD_BOOT_TX_INTERVAL_SECS);
        }
    }

    /// One-time radio setup.  Each failed step is logged and skipped.
    fn setup_radio(&mut self, radio: &mut impl RadioTransport, sink: &mut impl EventSink) {
        let net = self.config.network.clone();

        info!("Defaulting radio configuration");
        if let Err(e) = radio.reset_config() {
            self.radio_failed("reset configuration", e, sink);
        }
        if let Err(e) = radio.reset_session() {
            self.radio_failed("reset network session", e, sink);
        }
        info!("Setting network join mode to OTA");
        if let Err(e) = radio.set_join_mode_otaa() {
            self.radio_failed("set network join mode to OTA", e, sink);
        }
        if let Err(e) = radio.set_credentials(&net) {
            self.radio_failed("set join credentials", e, sink);
        }
        if let Err(e) = radio.set_duty_cycle_enabled(net.duty_cycle_during_setup) {
            self.radio_failed("set duty cycle", e, sink);
        }
        info!("Setting ADR {}", if net.adr { "on" } else { "off" });
        if let Err(e) = radio.set_adr(net.adr) {
            self.radio_failed("set ADR", e, sink);
        }
        info!("Setting TX datarate to {:?}", net.tx_data_rate);
        if let Err(e) = radio.set_tx_data_rate(net.tx_data_rate) {
            self.radio_failed("set TX datarate", e, sink);
        }
        info!("Saving radio configuration");
        if let Err(e) = radio.save_config() {
            self.radio_failed("save configuration", e, sink);
        }
    }

    // ── Duty-cycle helpers ────────────────────────────────────

    /// An armed deadline that has not passed yet.  A clock wake always
    /// counts as reached, even if the RTC reads a second early.
    fn woke_before_deadline(&self, now: u64) -> bool {
        if self.last_wake == Some(WakeReason::ClockDeadline) {
            return false;
        }
        self.scheduler
            .deadline()
            .is_some_and(|d| !d.is_reached(now))
    }

    fn ensure_joined(&mut self, radio: &mut impl RadioTransport, sink: &mut impl EventSink) -> bool {
        if radio.is_joined() {
            return true;
        }
        info!("Joining network");
        match radio.join() {
            Ok(()) => {
                info!("Network joined");
                sink.emit(&AppEvent::Joined);
                if let Err(e) = radio.set_duty_cycle_enabled(true) {
                    self.radio_failed("enable duty cycle", e, sink);
                }
                true
            }
            Err(e) => {
                warn!("Join failed ({}), retrying next cycle", e);
                self.record_error(Error::TransientRadio(e), sink);
                false
            }
        }
    }

    fn report<R, P, C, B, D>(&mut self, io: &mut Ports<R, P, C, B, D>, sink: &mut impl EventSink)
    where
        R: RadioTransport,
        B: BatterySensePort,
    {
        let dispenses = self.ctx.store.dispenses_remaining();
        let battery = evaluate_battery(io.battery.battery_low(), &self.ctx.store);
        match battery {
            BatteryReport::StableConfirmed => info!("Battery voltage healthy"),
            BatteryReport::Low => warn!("ALERT! Low battery"),
            BatteryReport::None => {}
        }
        let payload = TelemetryPayload::encode(dispenses, battery);

        if let Err(e) = io.radio.set_tx_data_rate(self.config.network.tx_data_rate) {
            self.radio_failed("set TX datarate", e, sink);
        }
        info!("Sending dispenses left {}", dispenses);
        match io.radio.send(payload.as_bytes()) {
            Ok(()) => sink.emit(&AppEvent::TelemetrySent {
                dispenses: payload.dispenses(),
                battery,
            }),
            Err(e) => {
                warn!("Send failed ({}), data for this cycle dropped", e);
                self.record_error(Error::TransientRadio(e), sink);
            }
        }
    }

    fn sleep(&mut self, power: &mut impl PowerPort, duration_secs: u32, sink: &mut impl EventSink) -> WakeReason {
        sink.emit(&AppEvent::Sleeping {
            duration_secs,
            retention: self.scheduler.retention(),
        });
        let reason = self.scheduler.enter_low_power(power, duration_secs);
        self.last_wake = Some(reason);
        sink.emit(&AppEvent::Woke(reason));
        reason
    }

    // ── Persistence ───────────────────────────────────────────

    /// Save the counter store if anything changed since the last save.
    fn persist_if_dirty(&mut self, durable: &impl DurableStore, sink: &mut impl EventSink) {
        if self.ctx.store.take_dirty() {
            self.save_store(durable, sink);
        }
    }

    /// Before non-retaining sleep the store is written so RAM loss does
    /// not lose counts.  `force` also writes a clean store, which is how a
    /// freshly armed deadline reaches flash.
    fn flush_before_sleep(&mut self, durable: &impl DurableStore, sink: &mut impl EventSink, force: bool) {
        if self.scheduler.retention() == RetentionMode::Retaining {
            return;
        }
        let dirty = self.ctx.store.take_dirty();
        if dirty || force {
            self.save_store(durable, sink);
        }
    }

    fn save_store(&mut self, durable: &impl DurableStore, sink: &mut impl EventSink) {
        let deadline = self.scheduler.deadline().map_or(0, |d| d.at_secs());
        let record = self.ctx.store.snapshot(deadline);
        match durable.save(&record) {
            Ok(()) => {
                info!("Store: saved dispenses_left={}", record.dispenses_left);
                sink.emit(&AppEvent::StoreFlushed {
                    dispenses: record.dispenses_left,
                });
            }
            Err(e) => {
                warn!("Store: save failed ({}), will retry", e);
                self.ctx.store.mark_dirty();
                self.record_error(Error::ConfigurationSave(e), sink);
            }
        }
    }

    // ── Error bookkeeping ─────────────────────────────────────

    fn radio_failed(&mut self, what: &str, e: RadioError, sink: &mut impl EventSink) {
        error!("failed to {}: {}", what, e);
        self.record_error(Error::TransientRadio(e), sink);
    }

    fn record_error(&mut self, e: Error, sink: &mut impl EventSink) {
        self.last_error = Some(e);
        sink.emit(&AppEvent::Fault(e));
    }
}
