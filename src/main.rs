//! Dispense Counter Firmware: main entry point
//!
//! Hexagonal architecture: a duty-cycle state machine behind port traits,
//! with GPIO interrupts feeding latches and the counter store.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  LoraModem        PowerManager    NvsAdapter     RtcClock      │
//! │  (Radio)          (Power)         (Config+Store) (Clock)       │
//! │  BatterySense     LogEventSink    interrupts (GPIO ISRs)       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            DutyCycleLoop (pure logic)                  │    │
//! │  │  FSM · SleepScheduler · Telemetry                      │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  AppContext (counter store + signal latches, 'static)          │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::{Result, anyhow};
use esp_idf_hal::gpio::{AnyIOPin, PinDriver, Pull};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::uart::{UartDriver, config::Config as UartConfig};
use esp_idf_hal::units::Hertz;
use log::{info, warn};

use dispense_counter::adapters::battery::BatterySense;
use dispense_counter::adapters::interrupts;
use dispense_counter::adapters::log_sink::LogEventSink;
use dispense_counter::adapters::lora_modem::{LoraModem, UartLink};
use dispense_counter::adapters::nvs::NvsAdapter;
use dispense_counter::adapters::power::PowerManager;
use dispense_counter::adapters::time::RtcClock;
use dispense_counter::app::context::AppContext;
use dispense_counter::app::ports::ConfigPort;
use dispense_counter::app::service::{DutyCycleLoop, Ports};
use dispense_counter::config::DeviceConfig;
use dispense_counter::pins;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Dispense Counter v{}                ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow!("NVS init failed: {}", e))?;
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            DeviceConfig::default()
        }
    };

    // ── 3. Shared context (outlives every ISR) ────────────────
    let ctx: &'static AppContext = Box::leak(Box::new(AppContext::new(&config)));

    // ── 4. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take()?;

    // The battery line is claimed before the ISRs are installed, since
    // building a PinDriver resets the pin's interrupt configuration.
    // SAFETY: each GPIO number in `pins` is claimed exactly once.
    let mut battery_pin = PinDriver::input(unsafe { AnyIOPin::new(pins::LOW_BATTERY_GPIO) })?;
    battery_pin.set_pull(Pull::Up)?;
    let battery = BatterySense::new(battery_pin);

    interrupts::install(ctx)?;

    let uart = UartDriver::new(
        peripherals.uart1,
        unsafe { AnyIOPin::new(pins::MODEM_UART_TX_GPIO) },
        unsafe { AnyIOPin::new(pins::MODEM_UART_RX_GPIO) },
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &UartConfig::default().baudrate(Hertz(pins::MODEM_BAUD)),
    )?;
    info!("Modem UART up at {} baud", pins::MODEM_BAUD);

    // ── 5. Ports + main loop ──────────────────────────────────
    let mut io = Ports {
        radio: LoraModem::new(UartLink::new(uart)),
        power: PowerManager::new(pins::DISPENSE_GPIO, ctx.dispense_handler()),
        clock: RtcClock::new(),
        battery,
        durable: nvs,
    };
    let mut sink = LogEventSink::new();

    let mut app = DutyCycleLoop::new(ctx, config);
    let boot = app.boot(&mut io, &mut sink);
    info!("Entering main loop ({:?} boot)", boot);

    app.run(&mut io, &mut sink)
}
