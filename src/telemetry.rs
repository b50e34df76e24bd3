//! Uplink payload encoding and battery-report policy.
//!
//! Wire format (bit-exact, consumed by the network server decoder):
//!
//! | Byte | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | dispenses remaining, high byte                            |
//! | 1    | dispenses remaining, low byte                             |
//! | 2    | optional: `0x00` battery stable (just confirmed), `0x01` low |

use crate::store::{BatteryAlertState, PersistentCounterStore};

pub const MAX_PAYLOAD_LEN: usize = 3;

const BATTERY_STABLE_BYTE: u8 = 0x00;
const BATTERY_LOW_BYTE: u8 = 0x01;

/// Battery information carried by one uplink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryReport {
    /// Nothing to report this cycle; byte 2 is omitted.
    None,
    /// A previous low alert was contradicted by a high sample.
    StableConfirmed,
    /// The sampled line currently reads low.
    Low,
}

impl BatteryReport {
    pub const fn status_byte(self) -> Option<u8> {
        match self {
            Self::None => None,
            Self::StableConfirmed => Some(BATTERY_STABLE_BYTE),
            Self::Low => Some(BATTERY_LOW_BYTE),
        }
    }
}

/// A fully-encoded uplink payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryPayload {
    bytes: [u8; MAX_PAYLOAD_LEN],
    len: usize,
}

impl TelemetryPayload {
    pub fn encode(dispenses_remaining: u32, battery: BatteryReport) -> Self {
        let [hi, lo] = normalize_count(dispenses_remaining).to_be_bytes();
        match battery.status_byte() {
            Some(status) => Self {
                bytes: [hi, lo, status],
                len: 3,
            },
            None => Self {
                bytes: [hi, lo, 0],
                len: 2,
            },
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn dispenses(&self) -> u16 {
        u16::from_be_bytes([self.bytes[0], self.bytes[1]])
    }
}

/// Fit the counter into the 16-bit wire field.
pub fn normalize_count(count: u32) -> u16 {
    count.min(u32::from(u16::MAX)) as u16
}

/// Decide what the battery byte says this cycle, updating the store.
///
/// `sampled_low` is the level read from the low-battery line right now.
/// The interrupt latch may already have marked the store low; a high
/// sample after that confirms recovery.  A low sample always reports low,
/// whatever the latch said.
pub fn evaluate_battery(sampled_low: bool, store: &PersistentCounterStore) -> BatteryReport {
    if !sampled_low && store.battery_state() == BatteryAlertState::Low {
        store.set_battery_stable();
        return BatteryReport::StableConfirmed;
    }
    if sampled_low {
        store.set_battery_low();
        return BatteryReport::Low;
    }
    BatteryReport::None
}
