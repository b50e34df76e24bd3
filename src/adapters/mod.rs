//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements         | Connects to                   |
//! |--------------|--------------------|-------------------------------|
//! | `battery`    | BatterySensePort   | Low-battery comparator GPIO   |
//! | `interrupts` | (ISR wiring)       | Dispense / battery / reset    |
//! | `log_sink`   | EventSink          | Serial log output             |
//! | `lora_modem` | RadioTransport     | AT-command LoRaWAN modem UART |
//! | `nvs`        | ConfigPort         | NVS / in-memory store         |
//! |              | DurableStore       |                               |
//! | `power`      | PowerPort          | ESP32 light / deep sleep      |
//! | `time`       | ClockPort          | RTC-backed wall clock         |

pub mod battery;
pub mod interrupts;
pub mod log_sink;
pub mod lora_modem;
pub mod nvs;
pub mod power;
pub mod time;
