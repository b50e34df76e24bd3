//! Shared application context.
//!
//! Everything that both interrupt handlers and the main loop touch lives
//! here: the counter store and the three signal latches.  It is built
//! once at startup and borrowed by every consumer.  On the device it is
//! leaked to `'static` so GPIO ISRs can hold references to it.

use crate::config::DeviceConfig;
use crate::latch::{DispenseHandler, LowBatteryHandler, ResetHandler, SignalLatches};
use crate::store::PersistentCounterStore;

pub struct AppContext {
    pub store: PersistentCounterStore,
    pub latches: SignalLatches,
}

impl AppContext {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            store: PersistentCounterStore::new(
                config.full_dispense_count,
                config.tx_interval_secs,
            ),
            latches: SignalLatches::new(),
        }
    }

    // ── Handler views ─────────────────────────────────────────
    //
    // Each handler sees its own latch and the store, nothing else.

    pub fn dispense_handler(&self) -> DispenseHandler<'_> {
        DispenseHandler::new(&self.latches.dispense, &self.store)
    }

    pub fn reset_handler(&self) -> ResetHandler<'_> {
        ResetHandler::new(&self.latches.reset, &self.store)
    }

    pub fn low_battery_handler(&self) -> LowBatteryHandler<'_> {
        LowBatteryHandler::new(&self.latches.low_battery, &self.store)
    }
}
