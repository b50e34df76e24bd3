//! Sleep scheduler and wake-deadline arithmetic.
//!
//! The scheduler owns the absolute wake deadline.  Every decision to sleep
//! goes through it:
//!
//! ```text
//!   duty cycle done ──▶ arm(now, interval) ──▶ deadline = now + duration
//!                                                     │
//!        ┌────────────────────────────────────────────┘
//!        ▼
//!   enter_low_power(duration) ──▶ WakeReason::ClockDeadline ──▶ next cycle
//!        │
//!        └──▶ WakeReason::ExternalSignal ──▶ remaining = deadline - now
//!                                              └─▶ sleep again for remaining
//! ```
//!
//! Suspension itself is delegated to a [`PowerPort`]; the scheduler only
//! decides how long and with which wake sources.

use log::{debug, info};

use crate::app::ports::PowerPort;
use crate::config::{RetentionMode, WakeStrategy};

/// Shortest sleep the scheduler will ever request.
pub const MIN_SLEEP_SECS: u32 = 1;

/// Why `enter_low_power` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// The RTC deadline elapsed.
    ClockDeadline,
    /// A registered GPIO line fired before the deadline.
    ExternalSignal,
}

/// Wake sources armed for one sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeSources {
    pub clock: bool,
    pub signal: bool,
}

impl WakeSources {
    pub const fn from_strategy(strategy: WakeStrategy) -> Self {
        match strategy {
            WakeStrategy::ClockOnly => Self {
                clock: true,
                signal: false,
            },
            WakeStrategy::SignalOnly => Self {
                clock: false,
                signal: true,
            },
            WakeStrategy::ClockOrSignal => Self {
                clock: true,
                signal: true,
            },
        }
    }
}

/// Absolute wake time in RTC seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeDeadline {
    at_secs: u64,
}

impl WakeDeadline {
    pub const fn at(at_secs: u64) -> Self {
        Self { at_secs }
    }

    pub fn after(now_secs: u64, duration_secs: u32) -> Self {
        Self {
            at_secs: now_secs.saturating_add(u64::from(duration_secs)),
        }
    }

    pub fn at_secs(&self) -> u64 {
        self.at_secs
    }

    /// Seconds left until the deadline; zero once it has passed.
    pub fn remaining_secs(&self, now_secs: u64) -> u32 {
        self.at_secs
            .saturating_sub(now_secs)
            .min(u64::from(u32::MAX)) as u32
    }

    pub fn is_reached(&self, now_secs: u64) -> bool {
        now_secs >= self.at_secs
    }
}

/// Seconds until the next full duty cycle for a given transmit interval.
///
/// Deterministic, and never zero: an interval of 0 still yields
/// [`MIN_SLEEP_SECS`] so the RTC alarm is always in the future.
pub fn compute_sleep_duration(interval_secs: u32) -> u32 {
    interval_secs.max(MIN_SLEEP_SECS)
}

/// Decides sleep length and wake sources, and tracks the wake deadline.
pub struct SleepScheduler {
    retention: RetentionMode,
    sources: WakeSources,
    deadline: Option<WakeDeadline>,
}

impl SleepScheduler {
    pub fn new(retention: RetentionMode, strategy: WakeStrategy) -> Self {
        Self {
            retention,
            sources: WakeSources::from_strategy(strategy),
            deadline: None,
        }
    }

    /// Compute a fresh deadline for a full interval and remember it.
    pub fn arm(&mut self, now_secs: u64, interval_secs: u32) -> WakeDeadline {
        let duration = compute_sleep_duration(interval_secs);
        let deadline = WakeDeadline::after(now_secs, duration);
        debug!(
            "Scheduler: armed {}s (deadline={})",
            duration,
            deadline.at_secs()
        );
        self.deadline = Some(deadline);
        deadline
    }

    /// Re-seed the deadline after a non-retaining sleep.
    pub fn restore_deadline(&mut self, at_secs: u64) {
        self.deadline = (at_secs != 0).then(|| WakeDeadline::at(at_secs));
    }

    pub fn deadline(&self) -> Option<WakeDeadline> {
        self.deadline
    }

    /// Seconds left before the armed deadline (0 when nothing is armed).
    pub fn remaining_secs(&self, now_secs: u64) -> u32 {
        self.deadline.map_or(0, |d| d.remaining_secs(now_secs))
    }

    pub fn retention(&self) -> RetentionMode {
        self.retention
    }

    /// Suspend until the clock or an armed signal wakes us.
    ///
    /// This is the only blocking call in the firmware.
    pub fn enter_low_power(
        &mut self,
        power: &mut impl PowerPort,
        duration_secs: u32,
    ) -> WakeReason {
        info!(
            "Sleeping {}s ({:?}, clock={}, signal={})",
            duration_secs, self.retention, self.sources.clock, self.sources.signal
        );
        power.enter_low_power(duration_secs, self.retention, self.sources)
    }
}
