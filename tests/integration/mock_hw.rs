//! Mock hardware adapters for integration tests.
//!
//! Records every radio call and persisted record so tests can assert on
//! the full history without a modem or flash.  Time and sleep use the
//! crate's own simulated `RtcClock`, extended here with scripted
//! dispense edges that interrupt a sleep.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use dispense_counter::adapters::interrupts::SimulatedLines;
use dispense_counter::adapters::time::RtcClock;
use dispense_counter::app::events::AppEvent;
use dispense_counter::app::ports::{
    BatterySensePort, BootKind, ClockPort, DurableStore, EventSink, PowerPort, RadioError,
    RadioTransport, StoreError,
};
use dispense_counter::config::{DataRate, NetworkConfig, RetentionMode};
use dispense_counter::scheduler::{WakeReason, WakeSources};
use dispense_counter::store::PersistedConfig;

// ── Radio call record ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum RadioCall {
    ResetConfig,
    ResetSession,
    JoinModeOtaa,
    Credentials,
    DutyCycle(bool),
    Adr(bool),
    DataRate(DataRate),
    SaveConfig,
    Join,
    Send(Vec<u8>),
    SaveSession,
    RestoreSession,
}

// ── MockRadio ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockRadio {
    pub calls: Vec<RadioCall>,
    pub joined: bool,
    /// Number of upcoming join attempts that fail.
    pub join_failures: u32,
    pub fail_sends: bool,
}

#[allow(dead_code)]
impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                RadioCall::Send(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &RadioCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl RadioTransport for MockRadio {
    fn reset_config(&mut self) -> Result<(), RadioError> {
        self.calls.push(RadioCall::ResetConfig);
        Ok(())
    }

    fn reset_session(&mut self) -> Result<(), RadioError> {
        self.calls.push(RadioCall::ResetSession);
        self.joined = false;
        Ok(())
    }

    fn set_join_mode_otaa(&mut self) -> Result<(), RadioError> {
        self.calls.push(RadioCall::JoinModeOtaa);
        Ok(())
    }

    fn set_credentials(&mut self, _network: &NetworkConfig) -> Result<(), RadioError> {
        self.calls.push(RadioCall::Credentials);
        Ok(())
    }

    fn set_duty_cycle_enabled(&mut self, enabled: bool) -> Result<(), RadioError> {
        self.calls.push(RadioCall::DutyCycle(enabled));
        Ok(())
    }

    fn set_adr(&mut self, enabled: bool) -> Result<(), RadioError> {
        self.calls.push(RadioCall::Adr(enabled));
        Ok(())
    }

    fn set_tx_data_rate(&mut self, rate: DataRate) -> Result<(), RadioError> {
        self.calls.push(RadioCall::DataRate(rate));
        Ok(())
    }

    fn save_config(&mut self) -> Result<(), RadioError> {
        self.calls.push(RadioCall::SaveConfig);
        Ok(())
    }

    fn join(&mut self) -> Result<(), RadioError> {
        self.calls.push(RadioCall::Join);
        if self.join_failures > 0 {
            self.join_failures -= 1;
            return Err(RadioError::JoinFailed);
        }
        self.joined = true;
        Ok(())
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        self.calls.push(RadioCall::Send(payload.to_vec()));
        if !self.joined {
            return Err(RadioError::NotJoined);
        }
        if self.fail_sends {
            return Err(RadioError::SendFailed);
        }
        Ok(())
    }

    fn is_joined(&mut self) -> bool {
        self.joined
    }

    fn save_session(&mut self) -> Result<(), RadioError> {
        self.calls.push(RadioCall::SaveSession);
        Ok(())
    }

    fn restore_session(&mut self) -> Result<(), RadioError> {
        self.calls.push(RadioCall::RestoreSession);
        Ok(())
    }
}

// ── ScriptedPower ─────────────────────────────────────────────

/// One low-power entry as requested by the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepCall {
    pub started_at: u64,
    pub duration_secs: u32,
    pub retention: RetentionMode,
}

/// Power controller whose sleeps can be cut short by dispense edges
/// scheduled at absolute simulated times.
pub struct ScriptedPower<'a> {
    clock: RtcClock,
    boot: BootKind,
    /// Absolute times at which the dispense line rises.
    edges: VecDeque<u64>,
    /// Handlers fired for edges during retaining sleep.  Non-retaining
    /// sleep loses RAM, so no handler runs.
    lines: Option<SimulatedLines<'a>>,
    pub sleeps: Vec<SleepCall>,
}

#[allow(dead_code)]
impl<'a> ScriptedPower<'a> {
    pub fn new(clock: RtcClock, boot: BootKind, lines: Option<SimulatedLines<'a>>) -> Self {
        Self {
            clock,
            boot,
            edges: VecDeque::new(),
            lines,
            sleeps: Vec::new(),
        }
    }

    pub fn dispense_at(&mut self, at_secs: u64) {
        self.edges.push_back(at_secs);
    }

    pub fn durations(&self) -> Vec<u32> {
        self.sleeps.iter().map(|s| s.duration_secs).collect()
    }
}

impl PowerPort for ScriptedPower<'_> {
    fn boot_kind(&mut self) -> BootKind {
        self.boot
    }

    fn enter_low_power(
        &mut self,
        duration_secs: u32,
        retention: RetentionMode,
        sources: WakeSources,
    ) -> WakeReason {
        let now = self.clock.now_secs();
        self.sleeps.push(SleepCall {
            started_at: now,
            duration_secs,
            retention,
        });
        let deadline = now + u64::from(duration_secs);

        let next_edge = self.edges.front().copied();
        let reason = match next_edge {
            Some(at) if sources.signal && (!sources.clock || at < deadline) => {
                self.edges.pop_front();
                self.clock.set(at.max(now));
                if retention == RetentionMode::Retaining {
                    if let Some(lines) = &self.lines {
                        lines.dispense_edge();
                    }
                }
                WakeReason::ExternalSignal
            }
            _ => {
                self.clock.set(deadline);
                WakeReason::ClockDeadline
            }
        };
        if retention == RetentionMode::NonRetaining {
            self.boot = BootKind::Warm(reason);
        }
        reason
    }
}

// ── MockBattery ───────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockBattery {
    pub low: Rc<Cell<bool>>,
}

impl BatterySensePort for MockBattery {
    fn battery_low(&mut self) -> bool {
        self.low.get()
    }
}

// ── MockDurable ───────────────────────────────────────────────

/// Flash stand-in.  Clones share the same record so a test can inspect
/// it after a simulated reboot.
#[derive(Clone, Default)]
pub struct MockDurable {
    pub record: Rc<RefCell<Option<PersistedConfig>>>,
    pub saves: Rc<Cell<u32>>,
    pub fail_saves: Rc<Cell<bool>>,
}

#[allow(dead_code)]
impl MockDurable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: PersistedConfig) -> Self {
        let d = Self::default();
        *d.record.borrow_mut() = Some(record);
        d
    }

    pub fn current(&self) -> Option<PersistedConfig> {
        *self.record.borrow()
    }
}

impl DurableStore for MockDurable {
    fn load(&self) -> Result<Option<PersistedConfig>, StoreError> {
        Ok(*self.record.borrow())
    }

    fn save(&self, record: &PersistedConfig) -> Result<(), StoreError> {
        if self.fail_saves.get() {
            return Err(StoreError::Io);
        }
        *self.record.borrow_mut() = Some(*record);
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(*event);
    }
}
