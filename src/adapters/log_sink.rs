//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{BootKind, EventSink};
use crate::telemetry::BatteryReport;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { boot, state } => {
                let boot = match boot {
                    BootKind::Cold => "cold",
                    BootKind::Warm(_) => "warm",
                };
                info!("START | boot={} | initial_state={:?}", boot, state);
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::Joined => {
                info!("RADIO | joined");
            }
            AppEvent::TelemetrySent { dispenses, battery } => {
                let battery = match battery {
                    BatteryReport::None => "-",
                    BatteryReport::StableConfirmed => "stable",
                    BatteryReport::Low => "LOW",
                };
                info!("TELEM | dispenses={} | battery={}", dispenses, battery);
            }
            AppEvent::CounterReset { full_count } => {
                info!("STORE | reset to {}", full_count);
            }
            AppEvent::StoreFlushed { dispenses } => {
                info!("STORE | flushed dispenses={}", dispenses);
            }
            AppEvent::Sleeping {
                duration_secs,
                retention,
            } => {
                info!("SLEEP | {}s ({:?})", duration_secs, retention);
            }
            AppEvent::Woke(reason) => {
                info!("SLEEP | woke: {:?}", reason);
            }
            AppEvent::Fault(e) => {
                warn!("FAULT | {}", e);
            }
        }
    }
}
