//! Error types for transition requests and notifier callbacks

use thiserror::Error;

use crate::phase::SleepPhase;

/// Errors returned by transition requests.
///
/// None of these are fatal: every variant leaves the coordinator back in
/// the idle state, and `Busy` in particular is an invitation to retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// The requested label does not name a supported sleep state.
    #[error("invalid sleep state: {0:?}")]
    InvalidState(String),

    /// Another transition attempt already holds the coordinator.
    #[error("a sleep transition is already in progress")]
    Busy,

    /// A wakeup event arrived after the counter was read; the attempt
    /// must be abandoned.
    #[error("wakeup count mismatch: expected {expected}, current {current}")]
    CountMismatch { expected: u64, current: u64 },

    /// A subscriber declined the prepare announcement.
    #[error("prepare announcement vetoed by {subscriber}: {reason}")]
    PrepareVetoed { subscriber: String, reason: String },

    /// The platform executor reported a failure in a specific phase.
    #[error("phase {phase} failed in {component}: errno {errno}")]
    PhaseFailed {
        phase: SleepPhase,
        component: String,
        errno: i32,
    },
}

/// Rejection returned by a notifier subscriber.
///
/// Only the prepare announcement treats this as a veto; for every other
/// phase it is logged and ignored.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct NotifyRejection {
    /// Why the subscriber declined.
    pub reason: String,
}

impl NotifyRejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
