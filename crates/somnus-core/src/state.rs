//! Sleep states and their canonical label mapping
//!
//! States are ordered by aggressiveness: `Working` is the running system,
//! the suspend family gets progressively deeper, and `Disk` (hibernation)
//! is the deepest. The derived `Ord` lets callers ask questions like
//! "has autosleep escalated beyond the working state".

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TransitionError;

/// A system power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SleepState {
    /// Fully running. Not a sleep state and never a valid transition target.
    Working,
    /// Suspend-to-idle: tasks frozen, processors idled, no platform support needed.
    ToIdle,
    /// Standby: shallow platform sleep state.
    Standby,
    /// Suspend-to-RAM.
    Mem,
    /// Hibernate: image written to persistent storage, then power off.
    Disk,
}

impl SleepState {
    /// All states that can be requested as a transition target,
    /// shallowest first.
    pub const SLEEP_STATES: [SleepState; 4] = [
        SleepState::ToIdle,
        SleepState::Standby,
        SleepState::Mem,
        SleepState::Disk,
    ];

    /// The canonical label for this state.
    pub fn label(&self) -> &'static str {
        match self {
            SleepState::Working => "on",
            SleepState::ToIdle => "freeze",
            SleepState::Standby => "standby",
            SleepState::Mem => "mem",
            SleepState::Disk => "disk",
        }
    }

    /// Decode a state label.
    ///
    /// Only sleep-state labels decode; anything else, including the
    /// working state's own label, is an [`TransitionError::InvalidState`].
    /// Unrecognized input never silently maps to a no-op target.
    pub fn from_label(label: &str) -> Result<SleepState, TransitionError> {
        for state in SleepState::SLEEP_STATES {
            if label == state.label() {
                return Ok(state);
            }
        }
        Err(TransitionError::InvalidState(label.to_string()))
    }

    /// Whether this state is a sleep state (anything deeper than working).
    pub fn is_sleep(&self) -> bool {
        *self > SleepState::Working
    }
}

impl fmt::Display for SleepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
