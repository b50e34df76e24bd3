//! Application core: pure domain logic, zero I/O.
//!
//! This module holds the business rules of the dispense counter: the
//! duty-cycle main loop, its shared context and the events it emits.
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod context;
pub mod events;
pub mod ports;
pub mod service;
