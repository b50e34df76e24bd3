//! Device configuration parameters
//!
//! All tunable parameters for the dispense counter.
//! Values can be overridden via the durable store (NVS).

use serde::{Deserialize, Serialize};

/// On a cold boot the transmit interval is clamped to this ceiling so a
/// freshly powered device reports quickly.
pub const MAX_COLD_BOOT_TX_INTERVAL_SECS: u32 = 60;

/// LoRaWAN application port used for telemetry uplinks.
pub const TELEMETRY_PORT: u8 = 1;

/// Whether RAM and peripheral state survive the low-power mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetentionMode {
    /// Light sleep: RAM retained, execution resumes after the sleep call.
    Retaining,
    /// Deep sleep: RAM lost, the firmware restarts from `main` on wake.
    NonRetaining,
}

/// Which wake sources are armed when the device sleeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WakeStrategy {
    /// Wake only when the RTC deadline elapses.
    ClockOnly,
    /// Wake only on the external dispense line.
    SignalOnly,
    /// Wake on whichever comes first.
    ClockOrSignal,
}

/// LoRaWAN spreading factor used for uplinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataRate {
    Sf12,
    Sf11,
    Sf10,
    Sf9,
    Sf8,
    Sf7,
}

impl DataRate {
    /// Regional data-rate index (EU868 / AS923 table).
    pub const fn index(self) -> u8 {
        match self {
            Self::Sf12 => 0,
            Self::Sf11 => 1,
            Self::Sf10 => 2,
            Self::Sf9 => 3,
            Self::Sf8 => 4,
            Self::Sf7 => 5,
        }
    }
}

/// Network join parameters (OTAA).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Join EUI (application / network id).
    pub network_id: [u8; 8],
    /// Application root key.
    pub network_key: [u8; 16],
    /// Frequency sub-band (0 = all channels, 1–8 = fixed 8-channel block).
    pub frequency_sub_band: u8,
    /// Public (true) or private (false) network sync word.
    pub public_network: bool,
    /// Confirmed-uplink retries (0 = unconfirmed uplinks).
    pub ack_retries: u8,
    /// Adaptive data rate.
    pub adr: bool,
    /// Data rate used for every uplink.
    pub tx_data_rate: DataRate,
    /// Duty-cycle enforcement while the device is still unjoined.
    pub duty_cycle_during_setup: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network_id: [0x70, 0xB3, 0xD5, 0x7E, 0xF0, 0x00, 0x3D, 0xAA],
            network_key: [
                0xF7, 0x7D, 0xDC, 0x41, 0xD3, 0x4D, 0xE5, 0xE5, 0x44, 0x3A, 0x83, 0x98, 0x2B,
                0xE6, 0xB2, 0xEA,
            ],
            frequency_sub_band: 0,
            public_network: true,
            ack_retries: 0,
            adr: false,
            tx_data_rate: DataRate::Sf7,
            duty_cycle_during_setup: false,
        }
    }
}

/// Core device configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    // --- Reporting ---
    /// Seconds between telemetry uplinks
    pub tx_interval_secs: u32,

    // --- Counter ---
    /// Value the dispense counter returns to on a user reset
    pub full_dispense_count: u32,

    // --- Power ---
    /// Light (retaining) or deep (non-retaining) sleep
    pub retention: RetentionMode,
    /// Wake sources armed before sleeping
    pub wake_strategy: WakeStrategy,

    // --- Radio ---
    pub network: NetworkConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            tx_interval_secs: 30,
            full_dispense_count: 1000,
            retention: RetentionMode::Retaining,
            wake_strategy: WakeStrategy::ClockOrSignal,
            network: NetworkConfig::default(),
        }
    }
}
