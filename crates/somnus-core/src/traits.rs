//! Collaborator seams for the sleep coordinator
//!
//! The coordinator owns the transition state machine but delegates the
//! actual device choreography, the idleness signal, and phase-change
//! reactions to implementations of these traits. Tests substitute the
//! mocks from [`crate::mock`].

use async_trait::async_trait;

use crate::error::NotifyRejection;
use crate::outcome::PhaseFailure;
use crate::phase::{PhaseDirection, SleepPhase, TestLevel};
use crate::state::SleepState;

/// Platform-specific transition choreography.
///
/// Implementations perform the real work of entering and leaving a sleep
/// state: freezing tasks, quiescing devices, executing the low-power entry,
/// and unwinding in reverse order. The coordinator treats the whole
/// sequence as a single opaque, possibly blocking call; a failure in any
/// phase stops the sequence and is reported with the phase, the failing
/// component, and an errno-style code. Timeouts are the executor's
/// responsibility and surface as ordinary phase failures.
#[async_trait]
pub trait PlatformExecutor: Send + Sync {
    /// Run the full suspend/resume sequence for `target`.
    ///
    /// `level` lets platform code cut the sequence short at its own
    /// truncation points; implementations honor the same phase ordering
    /// the coordinator announces.
    async fn suspend(&self, target: SleepState, level: TestLevel) -> Result<(), PhaseFailure>;

    /// Write the hibernation image and power down, resuming later.
    ///
    /// Once image writing begins the operation can no longer be aborted;
    /// the coordinator only cancels before this call.
    async fn hibernate(&self, level: TestLevel) -> Result<(), PhaseFailure>;

    /// Whether hibernation is supported on this platform.
    fn hibernation_available(&self) -> bool {
        false
    }
}

/// Source of the system idleness signal that gates autosleep attempts.
pub trait IdleMonitor: Send + Sync {
    /// True when the system has no activity holding it awake.
    fn is_idle(&self) -> bool;
}

/// Subscriber notified of transition phase changes.
///
/// Callbacks run synchronously on the transition task in registration
/// order and must not block for long. Returning an error from the
/// `(Prepare, Enter)` announcement vetoes the transition; rejections of
/// any other announcement are logged and ignored.
pub trait SleepNotifier: Send + Sync {
    /// Short name used in logs and veto errors.
    fn name(&self) -> &str;

    /// React to a phase change.
    fn on_phase(&self, phase: SleepPhase, direction: PhaseDirection) -> Result<(), NotifyRejection>;
}
