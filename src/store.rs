//! Persistent counter store.
//!
//! Single owner of the three values that both interrupt handlers and the
//! main loop touch:
//!
//! | Value                 | Writers                         |
//! |-----------------------|---------------------------------|
//! | dispenses remaining   | dispense ISR, reset ISR         |
//! | transmit interval     | configuration logic only        |
//! | battery alert state   | low-battery ISR, main-loop poll |
//!
//! Every field is an atomic, so each mutator is a single lock-free
//! operation that is safe to call from interrupt context: no allocation,
//! no blocking, no failure.  Multi-field reads and writes (snapshotting
//! for the durable store, restoring after deep sleep) run inside a
//! `critical_section` so an ISR cannot interleave half-way through.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Tri-state battery alert, edge-triggered from the low-battery line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum BatteryAlertState {
    /// No transition observed since power-on.
    Unknown = 0,
    /// The low-battery line has been reported low.
    Low = 1,
    /// A low report was later contradicted by a high sample.
    Stable = 2,
}

impl BatteryAlertState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Low,
            2 => Self::Stable,
            _ => Self::Unknown,
        }
    }
}

/// The record written to the durable store.
///
/// `sleep_until_secs` carries the wake deadline through non-retaining
/// sleep (0 = no deadline armed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedConfig {
    pub dispenses_left: u32,
    pub tx_interval_secs: u32,
    pub battery: BatteryAlertState,
    pub sleep_until_secs: u64,
}

impl PersistedConfig {
    /// Factory state: a full counter and the configured interval.
    pub fn factory(full_dispense_count: u32, tx_interval_secs: u32) -> Self {
        Self {
            dispenses_left: full_dispense_count,
            tx_interval_secs,
            battery: BatteryAlertState::Unknown,
            sleep_until_secs: 0,
        }
    }
}

/// Interrupt-safe holder of the counter, interval and battery state.
pub struct PersistentCounterStore {
    full_count: u32,
    dispenses: AtomicU32,
    tx_interval_secs: AtomicU32,
    battery: AtomicU8,
    dirty: AtomicBool,
}

impl PersistentCounterStore {
    pub const fn new(full_count: u32, tx_interval_secs: u32) -> Self {
        Self {
            full_count,
            dispenses: AtomicU32::new(full_count),
            tx_interval_secs: AtomicU32::new(tx_interval_secs),
            battery: AtomicU8::new(BatteryAlertState::Unknown as u8),
            dirty: AtomicBool::new(false),
        }
    }

    // ── ISR-safe mutators ─────────────────────────────────────

    /// Count one dispense.  Floors at zero.  Returns the new count.
    pub fn decrement_dispenses(&self) -> u32 {
        let prev = self
            .dispenses
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or_else(|n| n);
        self.mark_dirty();
        prev.saturating_sub(1)
    }

    /// Refill the counter.  Returns the full count.
    pub fn reset_dispenses(&self) -> u32 {
        self.dispenses.store(self.full_count, Ordering::Release);
        self.mark_dirty();
        self.full_count
    }

    /// Marks the store dirty only when the state changes, so a battery
    /// that stays low does not rewrite flash every cycle.
    pub fn set_battery_low(&self) {
        self.set_battery(BatteryAlertState::Low);
    }

    pub fn set_battery_stable(&self) {
        self.set_battery(BatteryAlertState::Stable);
    }

    fn set_battery(&self, state: BatteryAlertState) {
        if self.battery.swap(state as u8, Ordering::AcqRel) != state as u8 {
            self.mark_dirty();
        }
    }

    // ── Configuration ─────────────────────────────────────────

    pub fn set_tx_interval_secs(&self, secs: u32) {
        if self.tx_interval_secs.swap(secs, Ordering::AcqRel) != secs {
            self.mark_dirty();
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn dispenses_remaining(&self) -> u32 {
        self.dispenses.load(Ordering::Acquire)
    }

    pub fn tx_interval_secs(&self) -> u32 {
        self.tx_interval_secs.load(Ordering::Acquire)
    }

    pub fn battery_state(&self) -> BatteryAlertState {
        BatteryAlertState::from_u8(self.battery.load(Ordering::Acquire))
    }

    pub fn full_count(&self) -> u32 {
        self.full_count
    }

    // ── Dirty tracking ────────────────────────────────────────

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Clear the dirty flag and report whether it was set.
    ///
    /// Call before taking the snapshot that gets saved: an ISR that fires
    /// after this point re-marks the store, so its change is never lost.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Re-mark after a failed save.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    // ── Durable store bridge ──────────────────────────────────

    /// Consistent copy of every field, for the durable store.
    pub fn snapshot(&self, sleep_until_secs: u64) -> PersistedConfig {
        critical_section::with(|_| PersistedConfig {
            dispenses_left: self.dispenses_remaining(),
            tx_interval_secs: self.tx_interval_secs(),
            battery: self.battery_state(),
            sleep_until_secs,
        })
    }

    /// Load a persisted record.  Counts above the full value are treated
    /// as corrupt and pulled down to it.  Leaves the store clean.
    pub fn restore(&self, persisted: &PersistedConfig) {
        critical_section::with(|_| {
            self.dispenses.store(
                persisted.dispenses_left.min(self.full_count),
                Ordering::Release,
            );
            self.tx_interval_secs
                .store(persisted.tx_interval_secs, Ordering::Release);
            self.battery
                .store(persisted.battery as u8, Ordering::Release);
            self.dirty.store(false, Ordering::Release);
        });
    }
}
