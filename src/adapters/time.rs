//! RTC clock adapter.
//!
//! Provides wall-clock seconds that keep counting through light and deep
//! sleep, which is what the wake-deadline arithmetic needs.
//!
//! - **`target_os = "espidf"`**: reads `gettimeofday()`, which ESP-IDF
//!   keeps running from the RTC timer across sleep.
//! - **`not(target_os = "espidf")`**: a simulated clock shared between
//!   clones, so the host power backend can advance it while sleeping.

use crate::app::ports::ClockPort;

#[derive(Clone)]
pub struct RtcClock {
    #[cfg(not(target_os = "espidf"))]
    now: std::rc::Rc<core::cell::Cell<u64>>,
}

#[cfg(target_os = "espidf")]
impl RtcClock {
    pub fn new() -> Self {
        Self {}
    }
}

#[cfg(target_os = "espidf")]
impl Default for RtcClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
impl ClockPort for RtcClock {
    fn now_secs(&self) -> u64 {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        // SAFETY: gettimeofday only writes into the provided struct.
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return 0;
        }
        tv.tv_sec.max(0) as u64
    }
}

#[cfg(not(target_os = "espidf"))]
impl RtcClock {
    /// Simulated clock starting at `start_secs`.
    pub fn simulated(start_secs: u64) -> Self {
        Self {
            now: std::rc::Rc::new(core::cell::Cell::new(start_secs)),
        }
    }

    pub fn advance(&self, secs: u64) {
        self.now.set(self.now.get().saturating_add(secs));
    }

    pub fn set(&self, secs: u64) {
        self.now.set(secs);
    }
}

#[cfg(not(target_os = "espidf"))]
impl ClockPort for RtcClock {
    fn now_secs(&self) -> u64 {
        self.now.get()
    }
}
