//! Port traits: the hexagonal boundary between the main loop and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ DutyCycleLoop (domain)
//! ```
//!
//! Driven adapters (radio modem, durable store, RTC, sleep controller,
//! battery line, event sinks) implement these traits.  The
//! [`DutyCycleLoop`](super::service::DutyCycleLoop) consumes them via
//! generics, so the domain core never touches hardware directly.
//!
//! Interrupt handlers are not behind a port: they are bound directly to
//! the [`AppContext`](super::context::AppContext) at setup time.

use crate::config::{DataRate, DeviceConfig, NetworkConfig, RetentionMode};
use crate::scheduler::{WakeReason, WakeSources};
use crate::store::PersistedConfig;

// ───────────────────────────────────────────────────────────────
// Radio transport (driven adapter: domain → LoRaWAN modem)
// ───────────────────────────────────────────────────────────────

/// Join / session / send primitives of the LoRaWAN stack.
///
/// The setup methods mirror the one-time cold-boot sequence; `join`,
/// `send` and `is_joined` are used every full duty cycle.
pub trait RadioTransport {
    /// Restore the modem's configuration to factory defaults.
    fn reset_config(&mut self) -> Result<(), RadioError>;

    /// Forget any joined network session.
    fn reset_session(&mut self) -> Result<(), RadioError>;

    /// Select over-the-air activation.
    fn set_join_mode_otaa(&mut self) -> Result<(), RadioError>;

    /// Program join EUI, key, sub-band, network type and ack retries.
    fn set_credentials(&mut self, network: &NetworkConfig) -> Result<(), RadioError>;

    /// Enable or disable regional duty-cycle enforcement.
    fn set_duty_cycle_enabled(&mut self, enabled: bool) -> Result<(), RadioError>;

    fn set_adr(&mut self, enabled: bool) -> Result<(), RadioError>;

    fn set_tx_data_rate(&mut self, rate: DataRate) -> Result<(), RadioError>;

    /// Commit radio configuration to the modem's own storage.
    fn save_config(&mut self) -> Result<(), RadioError>;

    fn join(&mut self) -> Result<(), RadioError>;

    /// Transmit one uplink on the telemetry port.
    fn send(&mut self, payload: &[u8]) -> Result<(), RadioError>;

    fn is_joined(&mut self) -> bool;

    /// Persist session keys and counters across non-retaining sleep.
    fn save_session(&mut self) -> Result<(), RadioError>;

    /// Reload the session saved by [`save_session`](Self::save_session).
    fn restore_session(&mut self) -> Result<(), RadioError>;
}

// ───────────────────────────────────────────────────────────────
// Durable store (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Saves and restores the counter store across power loss.
///
/// Writes MUST be atomic: a power cut mid-save leaves the previous record.
pub trait DurableStore {
    /// Returns `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<PersistedConfig>, StoreError>;

    fn save(&self, record: &PersistedConfig) -> Result<(), StoreError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists device configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Returns [`DeviceConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<DeviceConfig, ConfigError>;

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Platform ports
// ───────────────────────────────────────────────────────────────

/// How this boot started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootKind {
    /// Power-on or hard reset: run the one-time setup path.
    Cold,
    /// Resumed from non-retaining sleep.
    Warm(WakeReason),
}

/// The sleep controller.
pub trait PowerPort {
    fn boot_kind(&mut self) -> BootKind;

    /// Suspend until `duration_secs` elapse (if the clock source is armed)
    /// or an armed external line fires.
    ///
    /// In [`RetentionMode::NonRetaining`] a real device does not return:
    /// it reboots and reports the wake through [`boot_kind`](Self::boot_kind).
    fn enter_low_power(
        &mut self,
        duration_secs: u32,
        retention: RetentionMode,
        sources: WakeSources,
    ) -> WakeReason;
}

/// Wall-clock seconds that keep counting through sleep.
pub trait ClockPort {
    fn now_secs(&self) -> u64;
}

/// Level of the low-battery comparator line.
pub trait BatterySensePort {
    /// `true` while the battery reads low.
    fn battery_low(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`RadioTransport`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// The network did not accept the join request.
    JoinFailed,
    /// The uplink was rejected or not acknowledged.
    SendFailed,
    /// Send attempted without a joined session.
    NotJoined,
    /// The modem did not answer in time.
    Timeout,
    /// The modem answered with an error code or unparseable line.
    Modem,
    /// The serial link to the modem failed.
    Link,
}

/// Errors from [`DurableStore`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Stored record failed deserialization.
    Corrupted,
    /// Storage partition is full.
    Full,
    /// Generic I/O error from the storage backend.
    Io,
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for RadioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::JoinFailed => write!(f, "join failed"),
            Self::SendFailed => write!(f, "send failed"),
            Self::NotJoined => write!(f, "not joined"),
            Self::Timeout => write!(f, "modem timeout"),
            Self::Modem => write!(f, "modem error"),
            Self::Link => write!(f, "serial link error"),
        }
    }
}

impl core::fmt::Display for StoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "record corrupted"),
            Self::Full => write!(f, "storage full"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
