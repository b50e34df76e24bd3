//! Dispense counter firmware library.
//!
//! Exposes the pure-logic modules for integration testing. All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod latch;
pub mod scheduler;
pub mod store;
pub mod telemetry;

pub mod adapters;
pub mod pins;
