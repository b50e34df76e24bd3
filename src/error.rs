//! Unified error types for the dispense counter firmware.
//!
//! Every failure the main loop can observe funnels into [`Error`].  All
//! variants are `Copy` so the loop can keep the most recent one for
//! diagnostics and hand it to the event sink without allocating.
//!
//! None of these ever stop the loop: the device is unattended, so each
//! error is logged, recorded and the next cycle tries again.

use core::fmt;

use crate::app::ports::{ConfigError, RadioError, StoreError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Join or send failed.  Retried on the next full cycle.
    TransientRadio(RadioError),
    /// The durable store rejected a save.  Volatile state stays correct
    /// until the next attempt.
    ConfigurationSave(StoreError),
    /// The saved counters could not be read at boot.  The loop starts
    /// from the factory record instead.
    StoreLoad(StoreError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransientRadio(e) => write!(f, "radio: {e}"),
            Self::ConfigurationSave(e) => write!(f, "store save: {e}"),
            Self::StoreLoad(e) => write!(f, "store load: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl From<RadioError> for Error {
    fn from(e: RadioError) -> Self {
        Self::TransientRadio(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::ConfigurationSave(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
