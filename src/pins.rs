//! GPIO / peripheral pin assignments for the dispense counter board.
//!
//! Single source of truth: every adapter references this module rather
//! than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Signal lines
// ---------------------------------------------------------------------------

/// Dispense sensor output, rising edge per dispense.  Also the wake pin,
/// so it must be RTC-capable.
pub const DISPENSE_GPIO: i32 = 4;
/// Low-battery comparator, active LOW.
pub const LOW_BATTERY_GPIO: i32 = 5;
/// User reset button (active-low with pull-up).
pub const RESET_GPIO: i32 = 6;

// ---------------------------------------------------------------------------
// LoRaWAN modem (UART1)
// ---------------------------------------------------------------------------

pub const MODEM_UART_TX_GPIO: i32 = 17;
pub const MODEM_UART_RX_GPIO: i32 = 18;
/// RUI3 factory default.
pub const MODEM_BAUD: u32 = 115_200;
