//! Low-battery comparator line.
//!
//! The comparator output is active-low: the line reads LOW while the
//! supply is below threshold.  Any `embedded-hal` input works; on the
//! device it is an ESP-IDF `PinDriver`.

use embedded_hal::digital::InputPin;
use log::warn;

use crate::app::ports::BatterySensePort;

pub struct BatterySense<P: InputPin> {
    pin: P,
}

impl<P: InputPin> BatterySense<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }
}

impl<P: InputPin> BatterySensePort for BatterySense<P> {
    /// A failed read counts as "not low" so a flaky line cannot flood
    /// uplinks with false alerts.
    fn battery_low(&mut self) -> bool {
        match self.pin.is_low() {
            Ok(low) => low,
            Err(e) => {
                warn!("BatterySense: pin read failed ({:?})", e);
                false
            }
        }
    }
}
