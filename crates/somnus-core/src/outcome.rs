//! Transition outcomes and phase failure records

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::phase::SleepPhase;

/// Failure reported by the platform executor for a specific phase.
///
/// `errno` follows the platform convention of negative error codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseFailure {
    /// The phase that failed.
    pub phase: SleepPhase,
    /// Name of the failing device or component.
    pub component: String,
    /// Platform error code.
    pub errno: i32,
}

impl PhaseFailure {
    pub fn new(phase: SleepPhase, component: impl Into<String>, errno: i32) -> Self {
        Self {
            phase,
            component: component.into(),
            errno,
        }
    }
}

impl fmt::Display for PhaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed in {} (errno {})",
            self.component,
            self.phase.label(),
            self.errno
        )
    }
}

/// Why a transition attempt was abandoned before any hardware-facing phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    /// A subscriber declined the prepare announcement.
    PrepareVetoed,
    /// A wakeup event arrived after the requester committed its count.
    WakeupRace,
}

/// The result of one transition attempt, folded into the statistics
/// recorder and then discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionOutcome {
    /// The full transition ran and the system returned to working.
    Success,
    /// The attempt was abandoned cleanly before touching hardware.
    Aborted(AbortReason),
    /// A collaborator-reported failure during or after hardware phases.
    Failed(PhaseFailure),
}
