//! Mock collaborators for testing
//!
//! In-memory stand-ins for the platform executor, the idle monitor, and
//! notifier subscribers, so coordinator logic can be exercised without a
//! real platform underneath.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use somnus_core::{MockExecutor, PhaseFailure, SleepPhase, SleepState, TestLevel};
//!
//! let executor = MockExecutor::new()
//!     .with_failure(PhaseFailure::new(SleepPhase::SuspendNoIrq, "deviceX", -5));
//!
//! let err = executor.suspend(SleepState::Mem, TestLevel::None).await.unwrap_err();
//! assert_eq!(err.component, "deviceX");
//! assert_eq!(executor.suspend_calls().len(), 1);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::NotifyRejection;
use crate::outcome::PhaseFailure;
use crate::phase::{PhaseDirection, SleepPhase, TestLevel};
use crate::state::SleepState;
use crate::traits::{IdleMonitor, PlatformExecutor, SleepNotifier};

/// A scripted platform executor.
///
/// Records every invocation, optionally holds each call for a configured
/// duration (to widen race windows in concurrency tests), and returns a
/// scripted failure when one is set.
#[derive(Default)]
pub struct MockExecutor {
    suspend_calls: Mutex<Vec<(SleepState, TestLevel)>>,
    hibernate_calls: AtomicU64,
    failure: Mutex<Option<PhaseFailure>>,
    hold: Mutex<Option<Duration>>,
    hibernation: AtomicBool,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script every subsequent call to fail with `failure`.
    pub fn with_failure(self, failure: PhaseFailure) -> Self {
        *self.failure.lock() = Some(failure);
        self
    }

    /// Hold each call for `duration` before returning.
    pub fn with_hold(self, duration: Duration) -> Self {
        *self.hold.lock() = Some(duration);
        self
    }

    /// Report hibernation as available.
    pub fn with_hibernation(self) -> Self {
        self.hibernation.store(true, Ordering::SeqCst);
        self
    }

    /// Replace the scripted failure after construction.
    pub fn set_failure(&self, failure: Option<PhaseFailure>) {
        *self.failure.lock() = failure;
    }

    /// Flip hibernation availability after construction.
    pub fn set_hibernation(&self, available: bool) {
        self.hibernation.store(available, Ordering::SeqCst);
    }

    /// Every recorded suspend invocation, in call order.
    pub fn suspend_calls(&self) -> Vec<(SleepState, TestLevel)> {
        self.suspend_calls.lock().clone()
    }

    /// Total invocations across suspend and hibernate.
    pub fn call_count(&self) -> usize {
        self.suspend_calls.lock().len() + self.hibernate_calls.load(Ordering::SeqCst) as usize
    }

    /// Number of hibernate invocations.
    pub fn hibernate_count(&self) -> u64 {
        self.hibernate_calls.load(Ordering::SeqCst)
    }

    async fn settle(&self) -> Result<(), PhaseFailure> {
        let hold = *self.hold.lock();
        if let Some(duration) = hold {
            tokio::time::sleep(duration).await;
        }
        match self.failure.lock().clone() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PlatformExecutor for MockExecutor {
    async fn suspend(&self, target: SleepState, level: TestLevel) -> Result<(), PhaseFailure> {
        self.suspend_calls.lock().push((target, level));
        self.settle().await
    }

    async fn hibernate(&self, _level: TestLevel) -> Result<(), PhaseFailure> {
        self.hibernate_calls.fetch_add(1, Ordering::SeqCst);
        self.settle().await
    }

    fn hibernation_available(&self) -> bool {
        self.hibernation.load(Ordering::SeqCst)
    }
}

/// An idle monitor whose answer is a settable flag.
pub struct MockIdleMonitor {
    idle: AtomicBool,
}

impl MockIdleMonitor {
    pub fn new(idle: bool) -> Self {
        Self {
            idle: AtomicBool::new(idle),
        }
    }

    pub fn set_idle(&self, idle: bool) {
        self.idle.store(idle, Ordering::SeqCst);
    }
}

impl IdleMonitor for MockIdleMonitor {
    fn is_idle(&self) -> bool {
        self.idle.load(Ordering::SeqCst)
    }
}

/// A notifier that records every announcement it sees and can be told to
/// veto prepare.
pub struct RecordingNotifier {
    name: String,
    seen: Mutex<Vec<(SleepPhase, PhaseDirection)>>,
    veto_prepare: AtomicBool,
}

impl RecordingNotifier {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            seen: Mutex::new(Vec::new()),
            veto_prepare: AtomicBool::new(false),
        })
    }

    pub fn veto_prepare(&self, veto: bool) {
        self.veto_prepare.store(veto, Ordering::SeqCst);
    }

    /// Every announcement seen so far, in order.
    pub fn seen(&self) -> Vec<(SleepPhase, PhaseDirection)> {
        self.seen.lock().clone()
    }
}

impl SleepNotifier for RecordingNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_phase(&self, phase: SleepPhase, direction: PhaseDirection) -> Result<(), NotifyRejection> {
        self.seen.lock().push((phase, direction));
        if phase == SleepPhase::Prepare
            && direction == PhaseDirection::Enter
            && self.veto_prepare.load(Ordering::SeqCst)
        {
            return Err(NotifyRejection::new("vetoed by test notifier"));
        }
        Ok(())
    }
}
