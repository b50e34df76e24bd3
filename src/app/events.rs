//! Outbound application events.
//!
//! The [`DutyCycleLoop`](super::service::DutyCycleLoop) emits these through
//! the [`EventSink`](super::ports::EventSink) port.

use crate::config::RetentionMode;
use crate::error::Error;
use crate::fsm::StateId;
use crate::scheduler::WakeReason;
use crate::telemetry::BatteryReport;

use super::ports::BootKind;

/// Structured events emitted by the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// Boot finished; the loop starts in `state`.
    Started { boot: BootKind, state: StateId },

    /// The main loop moved between states.
    StateChanged { from: StateId, to: StateId },

    /// The radio joined the network.
    Joined,

    /// An uplink was accepted by the radio.
    TelemetrySent {
        dispenses: u16,
        battery: BatteryReport,
    },

    /// A user reset refilled the counter.
    CounterReset { full_count: u32 },

    /// The counter store was flushed to durable storage.
    StoreFlushed { dispenses: u32 },

    /// About to enter low power.
    Sleeping {
        duration_secs: u32,
        retention: RetentionMode,
    },

    /// Low power ended.
    Woke(WakeReason),

    /// A non-fatal error was recorded.
    Fault(Error),
}
