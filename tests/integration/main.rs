//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one behaviour of the
//! duty-cycle loop against mock adapters.  All tests run on the host
//! (x86_64) with no real hardware required.

mod deep_sleep_tests;
mod latch_tests;
mod mock_hw;
mod quick_resume_tests;
