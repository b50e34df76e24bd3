//! LoRaWAN AT-command modem adapter.
//!
//! Implements [`RadioTransport`] over a line-oriented serial modem using
//! the RUI3 command set (RAK3172 and friends).
//!
//! ```text
//!   DutyCycleLoop ──▶ LoraModem ──"AT+DR=5\r\n"──▶ ModemLink ──▶ UART
//!                         ▲                                       │
//!                         └──────── "OK" / "+EVT:JOINED" ◀────────┘
//! ```
//!
//! Each command is answered by zero or more value lines and then `OK` or
//! an `AT_*_ERROR` code.  `AT+JOIN` and `AT+SEND` additionally report
//! their outcome later as an asynchronous `+EVT:` line.
//!
//! RUI3 commits every setting and the join session to its own flash as
//! they change, so `save_config` and `save_session` only check that the
//! modem is still answering, and `restore_session` re-reads the join
//! state.

use core::fmt::{self, Write as _};

use log::{debug, info, warn};

use crate::app::ports::{RadioError, RadioTransport};
use crate::config::{DataRate, NetworkConfig, TELEMETRY_PORT};

/// Longest line exchanged with the modem (a 3-byte payload send is ~20).
pub const MAX_LINE_LEN: usize = 128;

pub type Line = heapless::String<MAX_LINE_LEN>;

const CMD_TIMEOUT_MS: u32 = 1_000;
const JOIN_TIMEOUT_MS: u32 = 30_000;
const SEND_TIMEOUT_MS: u32 = 10_000;

/// Lines read while waiting for one response before giving up.
const MAX_RESPONSE_LINES: usize = 16;

/// Join attempts the modem makes per `AT+JOIN` (RUI3: `join:auto:interval:attempts`).
const JOIN_COMMAND: &str = "AT+JOIN=1:0:10:3";

/// Serial transport to the modem.
pub trait ModemLink {
    /// Write one command; the link appends the line terminator.
    fn write_line(&mut self, line: &str) -> Result<(), RadioError>;

    /// Next non-terminated line.  [`RadioError::Timeout`] if nothing
    /// arrives within `timeout_ms`.
    fn read_line(&mut self, timeout_ms: u32) -> Result<Line, RadioError>;
}

/// Uppercase hex rendering for keys, EUIs and payloads.
struct Hex<'a>(&'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

/// Channel mask for a sub-band.  0 enables all eight blocks.
fn sub_band_mask(sub_band: u8) -> u16 {
    match sub_band {
        0 => 0x00FF,
        n => 1 << (n.min(8) - 1),
    }
}

pub struct LoraModem<L: ModemLink> {
    link: L,
    joined: bool,
}

impl<L: ModemLink> LoraModem<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            joined: false,
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Send one command and collect its value line (if any) up to `OK`.
    fn command(&mut self, cmd: &str) -> Result<Option<Line>, RadioError> {
        debug!("modem <- {}", cmd);
        self.link.write_line(cmd)?;

        let mut value = None;
        for _ in 0..MAX_RESPONSE_LINES {
            let line = self.link.read_line(CMD_TIMEOUT_MS)?;
            let text = line.trim();
            debug!("modem -> {}", text);
            if text == "OK" {
                return Ok(value);
            }
            if text == "AT_NO_NETWORK_JOINED" {
                self.joined = false;
                return Err(RadioError::NotJoined);
            }
            if text.starts_with("AT_") && text.ends_with("ERROR") {
                warn!("modem rejected '{}': {}", cmd, text);
                return Err(RadioError::Modem);
            }
            if text.is_empty() || text.starts_with("+EVT:") {
                continue;
            }
            value = Some(line);
        }
        Err(RadioError::Modem)
    }

    fn set(&mut self, args: fmt::Arguments<'_>) -> Result<(), RadioError> {
        let mut cmd = Line::new();
        cmd.write_fmt(args).map_err(|_| RadioError::Modem)?;
        self.command(&cmd).map(|_| ())
    }

    /// Wait for an asynchronous `+EVT:` outcome.
    fn await_event(
        &mut self,
        timeout_ms: u32,
        success: &[&str],
        failure: &[&str],
        on_failure: RadioError,
    ) -> Result<(), RadioError> {
        for _ in 0..MAX_RESPONSE_LINES {
            let line = self.link.read_line(timeout_ms)?;
            let text = line.trim();
            debug!("modem -> {}", text);
            if success.iter().any(|s| text.starts_with(s)) {
                return Ok(());
            }
            if failure.iter().any(|s| text.starts_with(s)) {
                warn!("modem event: {}", text);
                return Err(on_failure);
            }
        }
        Err(RadioError::Modem)
    }

    /// Query `AT+NJS=?`.  Answers look like `AT+NJS=1` or a bare `1`.
    fn query_join_status(&mut self) -> Result<bool, RadioError> {
        let value = self.command("AT+NJS=?")?.ok_or(RadioError::Modem)?;
        let flag = value.rsplit('=').next().map(str::trim);
        match flag {
            Some("1") => Ok(true),
            Some("0") => Ok(false),
            _ => Err(RadioError::Modem),
        }
    }
}

impl<L: ModemLink> RadioTransport for LoraModem<L> {
    fn reset_config(&mut self) -> Result<(), RadioError> {
        self.joined = false;
        self.command("ATR").map(|_| ())
    }

    fn reset_session(&mut self) -> Result<(), RadioError> {
        // The session only lives as long as the join flag we trust.
        self.joined = false;
        Ok(())
    }

    fn set_join_mode_otaa(&mut self) -> Result<(), RadioError> {
        self.command("AT+NJM=1").map(|_| ())
    }

    fn set_credentials(&mut self, network: &NetworkConfig) -> Result<(), RadioError> {
        self.set(format_args!("AT+APPEUI={}", Hex(&network.network_id)))?;
        self.set(format_args!("AT+APPKEY={}", Hex(&network.network_key)))?;
        self.set(format_args!(
            "AT+MASK={:04X}",
            sub_band_mask(network.frequency_sub_band)
        ))?;
        self.set(format_args!("AT+PNM={}", u8::from(network.public_network)))?;
        self.set(format_args!("AT+RETY={}", network.ack_retries))
    }

    fn set_duty_cycle_enabled(&mut self, enabled: bool) -> Result<(), RadioError> {
        self.set(format_args!("AT+DCS={}", u8::from(enabled)))
    }

    fn set_adr(&mut self, enabled: bool) -> Result<(), RadioError> {
        self.set(format_args!("AT+ADR={}", u8::from(enabled)))
    }

    fn set_tx_data_rate(&mut self, rate: DataRate) -> Result<(), RadioError> {
        self.set(format_args!("AT+DR={}", rate.index()))
    }

    fn save_config(&mut self) -> Result<(), RadioError> {
        self.command("AT").map(|_| ())
    }

    fn join(&mut self) -> Result<(), RadioError> {
        self.command(JOIN_COMMAND)?;
        self.await_event(
            JOIN_TIMEOUT_MS,
            &["+EVT:JOINED"],
            &["+EVT:JOIN_FAILED"],
            RadioError::JoinFailed,
        )?;
        self.joined = true;
        info!("modem: joined");
        Ok(())
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        self.set(format_args!("AT+SEND={}:{}", TELEMETRY_PORT, Hex(payload)))?;
        self.await_event(
            SEND_TIMEOUT_MS,
            &["+EVT:TX_DONE", "+EVT:SEND_CONFIRMED_OK"],
            &["+EVT:SEND_CONFIRMED_FAILED"],
            RadioError::SendFailed,
        )
    }

    fn is_joined(&mut self) -> bool {
        match self.query_join_status() {
            Ok(joined) => {
                self.joined = joined;
                joined
            }
            Err(e) => {
                warn!("modem: join status query failed ({}), assuming {}", e, self.joined);
                self.joined
            }
        }
    }

    fn save_session(&mut self) -> Result<(), RadioError> {
        self.command("AT").map(|_| ())
    }

    fn restore_session(&mut self) -> Result<(), RadioError> {
        self.joined = self.query_join_status()?;
        info!("modem: session restored (joined={})", self.joined);
        Ok(())
    }
}

// ── ESP-IDF UART link ─────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct UartLink {
    uart: esp_idf_hal::uart::UartDriver<'static>,
}

#[cfg(target_os = "espidf")]
impl UartLink {
    pub fn new(uart: esp_idf_hal::uart::UartDriver<'static>) -> Self {
        Self { uart }
    }
}

#[cfg(target_os = "espidf")]
impl ModemLink for UartLink {
    fn write_line(&mut self, line: &str) -> Result<(), RadioError> {
        self.uart
            .write(line.as_bytes())
            .map_err(|_| RadioError::Link)?;
        self.uart.write(b"\r\n").map_err(|_| RadioError::Link)?;
        Ok(())
    }

    /// `timeout_ms` bounds the gap between bytes, not the whole line.
    fn read_line(&mut self, timeout_ms: u32) -> Result<Line, RadioError> {
        let ticks = esp_idf_hal::delay::TickType::new_millis(u64::from(timeout_ms)).ticks();
        let mut line = Line::new();
        let mut byte = [0u8; 1];
        loop {
            match self.uart.read(&mut byte, ticks) {
                Ok(0) => return Err(RadioError::Timeout),
                Ok(_) => match byte[0] {
                    b'\n' => return Ok(line),
                    b'\r' => {}
                    b => line.push(char::from(b)).map_err(|_| RadioError::Modem)?,
                },
                Err(_) => return Err(RadioError::Link),
            }
        }
    }
}
