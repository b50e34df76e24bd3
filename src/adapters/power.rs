//! Sleep controller adapter.
//!
//! | Retention       | ESP32 mode  | Returns?                      |
//! |-----------------|-------------|-------------------------------|
//! | `Retaining`     | light sleep | yes, with the wake cause      |
//! | `NonRetaining`  | deep sleep  | no: reboots, see `boot_kind`  |
//!
//! Wake sources map to the RTC timer (clock) and the dispense line
//! (signal).  The dispense line is the only wake pin.  It is only armed
//! while it reads low: a high-level wake on a line that is already high
//! would return at once and count the same pulse twice.
//!
//! Light sleep switches the dispense pin to a level interrupt for the
//! wake.  The pin's edge handler is masked for the whole sleep, its
//! rising-edge type is restored on wake, and the waking pulse is counted
//! here through the dispense handler.
//!
//! The host backend advances a simulated [`RtcClock`] instead of
//! sleeping, and records every request for inspection.

use log::{debug, info};

use crate::app::ports::{BootKind, PowerPort};
use crate::config::RetentionMode;
use crate::scheduler::{WakeReason, WakeSources};

#[cfg(not(target_os = "espidf"))]
use super::time::RtcClock;

#[cfg(target_os = "espidf")]
use crate::latch::DispenseHandler;
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Hardware wake sources actually armed for one sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WakePlan {
    timer: bool,
    pin: bool,
}

impl WakePlan {
    /// The pin is skipped while `line_high`.  If that leaves nothing armed
    /// the timer is used, so the sleep still ends on the deadline.
    fn new(sources: WakeSources, line_high: bool) -> Self {
        let pin = sources.signal && !line_high;
        Self {
            timer: sources.clock || !pin,
            pin,
        }
    }
}

/// One simulated low-power entry.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepRecord {
    pub duration_secs: u32,
    pub retention: RetentionMode,
    pub sources: WakeSources,
}

pub struct PowerManager {
    #[cfg(target_os = "espidf")]
    wake_pin: i32,
    #[cfg(target_os = "espidf")]
    on_wake: DispenseHandler<'static>,
    #[cfg(not(target_os = "espidf"))]
    clock: RtcClock,
    #[cfg(not(target_os = "espidf"))]
    boot: BootKind,
    #[cfg(not(target_os = "espidf"))]
    wake_line_high: bool,
    #[cfg(not(target_os = "espidf"))]
    sleeps: Vec<SleepRecord>,
}

// ── ESP-IDF backend ───────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl PowerManager {
    /// `wake_pin` must be an RTC-capable GPIO carrying the dispense line.
    /// `on_wake` counts the pulse that ends a light sleep.
    pub fn new(wake_pin: i32, on_wake: DispenseHandler<'static>) -> Self {
        info!("PowerManager: wake pin GPIO{}", wake_pin);
        Self { wake_pin, on_wake }
    }

    fn wake_cause() -> WakeReason {
        // SAFETY: read-only query of the sleep controller.
        let cause = unsafe { esp_sleep_get_wakeup_cause() };
        if cause == esp_sleep_source_t_ESP_SLEEP_WAKEUP_TIMER {
            WakeReason::ClockDeadline
        } else {
            WakeReason::ExternalSignal
        }
    }

    fn plan(&self, sources: WakeSources) -> WakePlan {
        // SAFETY: read-only level query of a configured input.
        let line_high = unsafe { gpio_get_level(self.wake_pin) } != 0;
        let plan = WakePlan::new(sources, line_high);
        if sources.signal && !plan.pin {
            debug!("PowerManager: dispense line high, not arming pin wake");
        }
        plan
    }

    fn arm(&self, duration_secs: u32, retention: RetentionMode, plan: WakePlan) {
        // SAFETY: sleep-controller configuration from the single main task.
        unsafe {
            esp_sleep_disable_wakeup_source(esp_sleep_source_t_ESP_SLEEP_WAKEUP_ALL);
            if plan.timer {
                esp_sleep_enable_timer_wakeup(u64::from(duration_secs) * 1_000_000);
            }
            if plan.pin {
                match retention {
                    RetentionMode::Retaining => {
                        gpio_intr_disable(self.wake_pin);
                        gpio_wakeup_enable(self.wake_pin, gpio_int_type_t_GPIO_INTR_HIGH_LEVEL);
                        esp_sleep_enable_gpio_wakeup();
                    }
                    RetentionMode::NonRetaining => {
                        esp_sleep_enable_ext0_wakeup(self.wake_pin, 1);
                    }
                }
            }
        }
    }

    /// Undo the light-sleep pin setup so the ISR is edge-triggered again.
    fn disarm_pin(&self) {
        // SAFETY: same pin and task as `arm`.
        unsafe {
            gpio_wakeup_disable(self.wake_pin);
            gpio_set_intr_type(self.wake_pin, gpio_int_type_t_GPIO_INTR_POSEDGE);
            gpio_intr_enable(self.wake_pin);
        }
    }
}

#[cfg(target_os = "espidf")]
impl PowerPort for PowerManager {
    fn boot_kind(&mut self) -> BootKind {
        // SAFETY: read-only query of the reset reason register.
        let reset = unsafe { esp_reset_reason() };
        if reset == esp_reset_reason_t_ESP_RST_DEEPSLEEP {
            BootKind::Warm(Self::wake_cause())
        } else {
            BootKind::Cold
        }
    }

    fn enter_low_power(
        &mut self,
        duration_secs: u32,
        retention: RetentionMode,
        sources: WakeSources,
    ) -> WakeReason {
        let plan = self.plan(sources);
        self.arm(duration_secs, retention, plan);
        match retention {
            RetentionMode::Retaining => {
                debug!("PowerManager: light sleep {}s", duration_secs);
                // SAFETY: wake sources armed above; returns on wake.
                unsafe {
                    esp_light_sleep_start();
                }
                let reason = Self::wake_cause();
                if plan.pin {
                    self.disarm_pin();
                    if reason == WakeReason::ExternalSignal {
                        // The edge handler was masked, so the pulse is
                        // counted here.
                        self.on_wake.on_rising_edge();
                    }
                }
                reason
            }
            RetentionMode::NonRetaining => {
                info!("PowerManager: deep sleep {}s", duration_secs);
                // SAFETY: does not return; the chip reboots on wake.
                unsafe { esp_deep_sleep_start() }
            }
        }
    }
}

// ── Host simulation backend ───────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl PowerManager {
    pub fn simulated(clock: RtcClock, boot: BootKind) -> Self {
        info!("PowerManager: simulation backend ({:?})", boot);
        Self {
            clock,
            boot,
            wake_line_high: false,
            sleeps: Vec::new(),
        }
    }

    /// Level of the simulated dispense line at the next sleep entry.
    pub fn set_wake_line_high(&mut self, high: bool) {
        self.wake_line_high = high;
    }

    pub fn sleeps(&self) -> &[SleepRecord] {
        &self.sleeps
    }
}

#[cfg(not(target_os = "espidf"))]
impl PowerPort for PowerManager {
    fn boot_kind(&mut self) -> BootKind {
        self.boot
    }

    /// Nothing can interrupt a simulated sleep, so an armed timer always
    /// wins.  Without one the sleep ends immediately as if signalled.
    fn enter_low_power(
        &mut self,
        duration_secs: u32,
        retention: RetentionMode,
        sources: WakeSources,
    ) -> WakeReason {
        self.sleeps.push(SleepRecord {
            duration_secs,
            retention,
            sources,
        });
        let reason = if WakePlan::new(sources, self.wake_line_high).timer {
            self.clock.advance(u64::from(duration_secs));
            WakeReason::ClockDeadline
        } else {
            WakeReason::ExternalSignal
        };
        debug!("PowerManager(sim): slept {}s -> {:?}", duration_secs, reason);
        if retention == RetentionMode::NonRetaining {
            self.boot = BootKind::Warm(reason);
        }
        reason
    }
}
