//! GPIO interrupt registration.
//!
//! Binds each latch handler to its line:
//!
//! | Line         | Edge    | Handler              |
//! |--------------|---------|----------------------|
//! | dispense     | rising  | [`DispenseHandler`]  |
//! | low battery  | falling | [`LowBatteryHandler`]|
//! | reset button | falling | [`ResetHandler`]     |
//!
//! On the device each handler is leaked to `'static` and handed to the
//! ESP-IDF per-pin ISR service as the callback argument, so the ISR can
//! reach its own latch and the store but nothing else.  The host backend
//! exposes the same handlers as methods so tests can fire edges.

use crate::app::context::AppContext;
use crate::latch::{DispenseHandler, LowBatteryHandler, ResetHandler};

#[cfg(target_os = "espidf")]
use crate::error::Error;
#[cfg(target_os = "espidf")]
use crate::pins;
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::info;

// ── ESP-IDF backend ───────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn dispense_isr(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the leaked handler registered in `install`.
    let handler = unsafe { &*(arg as *const DispenseHandler<'static>) };
    handler.on_rising_edge();
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn low_battery_isr(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the leaked handler registered in `install`.
    let handler = unsafe { &*(arg as *const LowBatteryHandler<'static>) };
    handler.on_falling_edge();
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn reset_isr(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the leaked handler registered in `install`.
    let handler = unsafe { &*(arg as *const ResetHandler<'static>) };
    handler.on_falling_edge();
}

#[cfg(target_os = "espidf")]
unsafe fn configure_input(pin: i32, pull_up: bool, intr: gpio_int_type_t) -> Result<(), Error> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pin,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: if pull_up {
            gpio_pullup_t_GPIO_PULLUP_ENABLE
        } else {
            gpio_pullup_t_GPIO_PULLUP_DISABLE
        },
        pull_down_en: if pull_up {
            gpio_pulldown_t_GPIO_PULLDOWN_DISABLE
        } else {
            gpio_pulldown_t_GPIO_PULLDOWN_ENABLE
        },
        intr_type: intr,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as esp_err_t {
        return Err(Error::Init("GPIO config failed"));
    }
    Ok(())
}

/// Configure the three input lines and register their handlers.
/// Call once, before the main loop starts.
#[cfg(target_os = "espidf")]
pub fn install(ctx: &'static AppContext) -> Result<(), Error> {
    let dispense: &'static DispenseHandler<'static> = Box::leak(Box::new(ctx.dispense_handler()));
    let low_battery: &'static LowBatteryHandler<'static> =
        Box::leak(Box::new(ctx.low_battery_handler()));
    let reset: &'static ResetHandler<'static> = Box::leak(Box::new(ctx.reset_handler()));

    // SAFETY: called once from the main task before the loop starts.  The
    // handler arguments are leaked, so they outlive every interrupt.
    unsafe {
        configure_input(pins::DISPENSE_GPIO, false, gpio_int_type_t_GPIO_INTR_POSEDGE)?;
        configure_input(pins::LOW_BATTERY_GPIO, true, gpio_int_type_t_GPIO_INTR_NEGEDGE)?;
        configure_input(pins::RESET_GPIO, true, gpio_int_type_t_GPIO_INTR_NEGEDGE)?;

        // ESP_ERR_INVALID_STATE means the service is already installed.
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK as esp_err_t && ret != ESP_ERR_INVALID_STATE as esp_err_t {
            return Err(Error::Init("GPIO ISR service install failed"));
        }

        gpio_isr_handler_add(
            pins::DISPENSE_GPIO,
            Some(dispense_isr),
            dispense as *const _ as *mut core::ffi::c_void,
        );
        gpio_isr_handler_add(
            pins::LOW_BATTERY_GPIO,
            Some(low_battery_isr),
            low_battery as *const _ as *mut core::ffi::c_void,
        );
        gpio_isr_handler_add(
            pins::RESET_GPIO,
            Some(reset_isr),
            reset as *const _ as *mut core::ffi::c_void,
        );
    }

    info!("interrupts: dispense, low battery and reset handlers installed");
    Ok(())
}

// ── Host simulation backend ───────────────────────────────────

/// Host stand-in for the three GPIO lines.
#[cfg(not(target_os = "espidf"))]
pub struct SimulatedLines<'a> {
    dispense: DispenseHandler<'a>,
    low_battery: LowBatteryHandler<'a>,
    reset: ResetHandler<'a>,
}

#[cfg(not(target_os = "espidf"))]
impl<'a> SimulatedLines<'a> {
    pub fn bind(ctx: &'a AppContext) -> Self {
        Self {
            dispense: ctx.dispense_handler(),
            low_battery: ctx.low_battery_handler(),
            reset: ctx.reset_handler(),
        }
    }

    pub fn dispense_edge(&self) {
        self.dispense.on_rising_edge();
    }

    pub fn low_battery_edge(&self) {
        self.low_battery.on_falling_edge();
    }

    pub fn reset_edge(&self) {
        self.reset.on_falling_edge();
    }
}
