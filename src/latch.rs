//! Interrupt-to-main-loop signal latches.
//!
//! Each hardware line gets one [`SignalLatch`]: a single atomic flag the
//! ISR sets and the main loop clears once it has observed it.
//!
//! ```text
//! ┌──────────────┐  mutate   ┌──────────────────────────┐
//! │ GPIO ISR     │──────────▶│ PersistentCounterStore   │
//! │ (handler)    │           └──────────────────────────┘
//! │              │  set()    ┌──────────────┐  take()  ┌───────────┐
//! │              │──────────▶│ SignalLatch  │─────────▶│ Main loop │
//! └──────────────┘           └──────────────┘          └───────────┘
//! ```
//!
//! Handlers are bound at setup time to a capability-limited view: their own
//! latch plus the one store operation they are allowed to perform.  They
//! never log, allocate or block.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::store::PersistentCounterStore;

/// A boolean handshake between one ISR and the main loop.
pub struct SignalLatch {
    flag: AtomicBool,
}

impl SignalLatch {
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    /// Raise the flag.  Safe from interrupt context.
    pub fn set(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Observe and clear in one step.  Returns whether the flag was set.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }
}

impl Default for SignalLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// The three latches the firmware wires up.
#[derive(Default)]
pub struct SignalLatches {
    pub dispense: SignalLatch,
    pub low_battery: SignalLatch,
    pub reset: SignalLatch,
}

impl SignalLatches {
    pub const fn new() -> Self {
        Self {
            dispense: SignalLatch::new(),
            low_battery: SignalLatch::new(),
            reset: SignalLatch::new(),
        }
    }
}

// ── ISR handlers ──────────────────────────────────────────────
//
// The store mutation happens before the flag is raised, so a main loop
// that sees the flag also sees the mutation.

/// Dispense line, rising edge: count one dispense.
#[derive(Clone, Copy)]
pub struct DispenseHandler<'a> {
    latch: &'a SignalLatch,
    store: &'a PersistentCounterStore,
}

impl<'a> DispenseHandler<'a> {
    pub fn new(latch: &'a SignalLatch, store: &'a PersistentCounterStore) -> Self {
        Self { latch, store }
    }

    pub fn on_rising_edge(&self) {
        self.store.decrement_dispenses();
        self.latch.set();
    }
}

/// Reset button, falling edge: refill the counter.
#[derive(Clone, Copy)]
pub struct ResetHandler<'a> {
    latch: &'a SignalLatch,
    store: &'a PersistentCounterStore,
}

impl<'a> ResetHandler<'a> {
    pub fn new(latch: &'a SignalLatch, store: &'a PersistentCounterStore) -> Self {
        Self { latch, store }
    }

    pub fn on_falling_edge(&self) {
        self.store.reset_dispenses();
        self.latch.set();
    }
}

/// Low-battery comparator, falling edge: raise the battery alert.
#[derive(Clone, Copy)]
pub struct LowBatteryHandler<'a> {
    latch: &'a SignalLatch,
    store: &'a PersistentCounterStore,
}

impl<'a> LowBatteryHandler<'a> {
    pub fn new(latch: &'a SignalLatch, store: &'a PersistentCounterStore) -> Self {
        Self { latch, store }
    }

    pub fn on_falling_edge(&self) {
        self.store.set_battery_low();
        self.latch.set();
    }
}
