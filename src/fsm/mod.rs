//! Main-loop state tracker.
//!
//! ```text
//!              ┌──────────────────────────────────────────────┐
//!              │                                              │
//!   boot ──▶ RUNNING_DUTY_CYCLE ──[report sent]──▶ FULL_SLEEP ─┤
//!              │        ▲                                     │
//!   [signal before      │[deadline reached]                   │[any wake]
//!    deadline]          │                                     │
//!              ▼        │                                     │
//!         QUICK_RESUME_SLEEP ◀──[signal]──┐                   │
//!              │                          │                   │
//!              └──────────────────────────┘                   │
//!              ▲                                              │
//!              └──────────────────────────────────────────────┘
//! ```
//!
//! The behaviour of each state lives in
//! [`DutyCycleLoop`](crate::app::service::DutyCycleLoop); this module only
//! owns the state identity and transition logging.

use log::info;

/// Enumeration of all main-loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateId {
    RunningDutyCycle,
    QuickResumeSleep,
    FullSleep,
}

impl StateId {
    pub const fn name(self) -> &'static str {
        match self {
            Self::RunningDutyCycle => "RunningDutyCycle",
            Self::QuickResumeSleep => "QuickResumeSleep",
            Self::FullSleep => "FullSleep",
        }
    }
}

/// Current main-loop state.
pub struct LoopFsm {
    current: StateId,
}

impl LoopFsm {
    pub fn new(initial: StateId) -> Self {
        Self { current: initial }
    }

    pub fn current_state(&self) -> StateId {
        self.current
    }

    /// Move to `next`, logging real transitions.  Quick-resume sleeps
    /// re-enter their own state without a log line.
    pub fn transition(&mut self, next: StateId) {
        if next != self.current {
            info!("FSM transition: {} -> {}", self.current.name(), next.name());
        }
        self.current = next;
    }
}
