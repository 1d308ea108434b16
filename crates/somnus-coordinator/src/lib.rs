//! # Somnus Coordinator
//!
//! Coordinates global power-state transitions for a host platform:
//! explicit suspend/hibernate requests, the autonomous autosleep loop, and
//! the wakeup-count handshake that keeps asynchronous wakeup events from
//! racing an in-flight transition.
//!
//! The coordinator owns the transition state machine and delegates the
//! actual device choreography to a [`somnus_core::PlatformExecutor`]
//! implementation.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use somnus_core::SleepState;
//! use somnus_coordinator::{CoordinatorConfig, SleepCoordinator};
//!
//! let coordinator = Arc::new(SleepCoordinator::new(
//!     CoordinatorConfig::default(),
//!     Arc::new(MyPlatform::probe()?),
//! ));
//!
//! // Wakeup-safe sleep request: read, prepare, commit, enter.
//! let (count, ok) = coordinator.wakeup().read_count();
//! assert!(ok);
//! coordinator.wakeup().compare_and_commit(count)?;
//! coordinator.request_sleep(SleepState::Mem).await?;
//! ```

mod config;

pub mod attributes;
pub mod autosleep;
pub mod notifier;
pub mod stats;
pub mod wakeup;

pub use attributes::{AttributeError, AttributeSet};
pub use autosleep::AutosleepTask;
pub use config::CoordinatorConfig;
pub use notifier::{NotifierId, NotifierRegistry};
pub use stats::SleepStats;
pub use wakeup::WakeupCounter;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;
use tokio::sync::Mutex as TransitionMutex;
use tracing::{debug, error, info, instrument, warn};

use somnus_core::{
    AbortReason, PhaseDirection, PhaseFailure, PlatformExecutor, SleepPhase, SleepState, TestLevel,
    TransitionError, TransitionOutcome,
};

/// Stage of the transition attempt currently in flight, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStage {
    Idle,
    Preparing,
    Suspending,
    Resuming,
    Aborting,
}

/// The process-wide sleep-transition coordinator.
///
/// One attempt runs at a time: the transition mutex is claimed with
/// `try_lock` and contenders get [`TransitionError::Busy`] immediately
/// rather than queueing. Callers that want eventual progress retry on
/// their own schedule, as the autosleep loop does.
pub struct SleepCoordinator {
    config: CoordinatorConfig,
    executor: Arc<dyn PlatformExecutor>,
    wakeup: Arc<WakeupCounter>,
    notifiers: Arc<NotifierRegistry>,
    stats: Arc<SleepStats>,
    /// Coarse-grained mutual exclusion over transition attempts. Held
    /// across the executor call; never queued on.
    transition_lock: TransitionMutex<()>,
    stage: Mutex<TransitionStage>,
    test_level: Mutex<TestLevel>,
    autosleep_target: Mutex<Option<SleepState>>,
    async_enabled: AtomicBool,
    trace_enabled: AtomicBool,
    print_times: AtomicBool,
    freeze_timeout_ms: AtomicU32,
}

impl SleepCoordinator {
    pub fn new(config: CoordinatorConfig, executor: Arc<dyn PlatformExecutor>) -> Self {
        let stats = Arc::new(SleepStats::new(config.failure_history));
        let print_times = config.print_times;
        let freeze_timeout_ms = config.freeze_timeout_ms;
        Self {
            config,
            executor,
            wakeup: Arc::new(WakeupCounter::new()),
            notifiers: Arc::new(NotifierRegistry::new()),
            stats,
            transition_lock: TransitionMutex::new(()),
            stage: Mutex::new(TransitionStage::Idle),
            test_level: Mutex::new(TestLevel::None),
            autosleep_target: Mutex::new(None),
            async_enabled: AtomicBool::new(true),
            trace_enabled: AtomicBool::new(false),
            print_times: AtomicBool::new(print_times),
            freeze_timeout_ms: AtomicU32::new(freeze_timeout_ms),
        }
    }

    /// The wakeup counter. Event sources hold a clone of this and call
    /// [`WakeupCounter::record_event`] whenever a wakeup-capable event
    /// fires.
    pub fn wakeup(&self) -> &Arc<WakeupCounter> {
        &self.wakeup
    }

    /// The phase-change notifier registry.
    pub fn notifiers(&self) -> &Arc<NotifierRegistry> {
        &self.notifiers
    }

    /// The outcome statistics recorder.
    pub fn stats(&self) -> &Arc<SleepStats> {
        &self.stats
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Stage of the attempt currently in flight, `Idle` between attempts.
    pub fn stage(&self) -> TransitionStage {
        *self.stage.lock()
    }

    /// Suspend states the platform can enter right now, plus hibernation
    /// when the executor reports it available.
    pub fn available_states(&self) -> Vec<SleepState> {
        let mut states: Vec<SleepState> = self
            .config
            .supported_states
            .iter()
            .copied()
            .filter(|state| state.is_sleep() && *state != SleepState::Disk)
            .collect();
        if self.executor.hibernation_available() {
            states.push(SleepState::Disk);
        }
        states
    }

    /// Explicit sleep request on behalf of an operator.
    ///
    /// Serializes against autosleep through the wakeup counter's
    /// in-progress flag and fails with `Busy` while an autosleep target
    /// is set: explicit requests and autosleep are mutually exclusive.
    pub async fn request_sleep(&self, target: SleepState) -> Result<(), TransitionError> {
        self.wakeup.try_acquire()?;
        let result = if self.autosleep_target().is_some() {
            Err(TransitionError::Busy)
        } else {
            self.enter_state(target).await
        };
        self.wakeup.release();
        result
    }

    /// Run one transition attempt to `target`.
    ///
    /// This is the shared core under both the explicit path and the
    /// autosleep loop; callers normally go through [`Self::request_sleep`],
    /// which adds the handshake serialization on top.
    #[instrument(skip(self))]
    pub async fn enter_state(&self, target: SleepState) -> Result<(), TransitionError> {
        if target == SleepState::Disk {
            return self.hibernate().await;
        }
        self.validate_suspend_target(target)?;

        let Ok(_guard) = self.transition_lock.try_lock() else {
            return Err(TransitionError::Busy);
        };

        info!(state = target.label(), "starting suspend transition");
        self.set_stage(TransitionStage::Preparing);

        if let Err(err) = self.notifiers.announce(SleepPhase::Prepare, PhaseDirection::Enter) {
            warn!(error = %err, "suspend prepare vetoed");
            self.abort(AbortReason::PrepareVetoed);
            return Err(err);
        }

        if let Err(err) = self.wakeup.check_pending() {
            info!("wakeup event aborted suspend before hardware phases");
            self.abort(AbortReason::WakeupRace);
            return Err(err);
        }

        let level = self.test_level();
        if level >= TestLevel::Core {
            info!(
                level = level.label(),
                "test level stops the transition before the platform executor"
            );
            self.stats.record(&TransitionOutcome::Success);
            self.teardown();
            return Ok(());
        }

        self.set_stage(TransitionStage::Suspending);
        let result = self.executor.suspend(target, level).await;
        self.set_stage(TransitionStage::Resuming);
        self.conclude(target, result)
    }

    /// Write the hibernation image and power down.
    ///
    /// Same skeleton as suspend, but with stronger commit semantics: only
    /// `TestLevel::Core` short-circuits it, and once the executor starts
    /// writing the image the attempt can no longer be aborted.
    #[instrument(skip(self))]
    pub async fn hibernate(&self) -> Result<(), TransitionError> {
        if !self.executor.hibernation_available() {
            return Err(TransitionError::InvalidState(
                SleepState::Disk.label().to_string(),
            ));
        }

        let Ok(_guard) = self.transition_lock.try_lock() else {
            return Err(TransitionError::Busy);
        };

        info!("starting hibernation");
        self.set_stage(TransitionStage::Preparing);

        if let Err(err) = self.notifiers.announce(SleepPhase::Prepare, PhaseDirection::Enter) {
            warn!(error = %err, "hibernation prepare vetoed");
            self.abort(AbortReason::PrepareVetoed);
            return Err(err);
        }

        if let Err(err) = self.wakeup.check_pending() {
            info!("wakeup event aborted hibernation before image writing");
            self.abort(AbortReason::WakeupRace);
            return Err(err);
        }

        let level = self.test_level();
        if level == TestLevel::Core {
            info!("test level stops hibernation before the platform executor");
            self.stats.record(&TransitionOutcome::Success);
            self.teardown();
            return Ok(());
        }

        self.set_stage(TransitionStage::Suspending);
        let result = self.executor.hibernate(level).await;
        self.set_stage(TransitionStage::Resuming);
        self.conclude(SleepState::Disk, result)
    }

    /// One autosleep attempt: the full read/commit handshake around
    /// `enter_state`, so a wakeup event between tick and entry aborts.
    pub(crate) async fn autosleep_attempt(
        &self,
        target: SleepState,
    ) -> Result<(), TransitionError> {
        let (count, ok) = self.wakeup.read_count();
        if !ok {
            return Err(TransitionError::Busy);
        }
        self.wakeup.try_acquire()?;
        let result = self.commit_and_enter(count, target).await;
        self.wakeup.release();
        result
    }

    async fn commit_and_enter(
        &self,
        count: u64,
        target: SleepState,
    ) -> Result<(), TransitionError> {
        self.wakeup.compare_and_commit(count)?;
        self.enter_state(target).await
    }

    /// The configured autosleep target, `None` when autosleep is off.
    pub fn autosleep_target(&self) -> Option<SleepState> {
        *self.autosleep_target.lock()
    }

    /// Enable (`Some`) or disable (`None`) autosleep.
    ///
    /// Serialized through the wakeup counter's in-progress flag so the
    /// target cannot change under a mid-flight transition; fails with
    /// `Busy` while one is running.
    pub fn set_autosleep(&self, target: Option<SleepState>) -> Result<(), TransitionError> {
        if let Some(state) = target {
            if state == SleepState::Disk {
                if !self.executor.hibernation_available() {
                    return Err(TransitionError::InvalidState(state.label().to_string()));
                }
            } else {
                self.validate_suspend_target(state)?;
            }
        }
        self.wakeup.try_acquire()?;
        *self.autosleep_target.lock() = target;
        self.wakeup.release();
        match target {
            Some(state) => info!(target = state.label(), "autosleep enabled"),
            None => info!("autosleep disabled"),
        }
        Ok(())
    }

    /// Drop the autosleep target after a configuration error, without the
    /// handshake: the loop calls this for a target that can no longer be
    /// entered, and clearing it cannot harm a concurrent attempt.
    pub(crate) fn clear_autosleep(&self) {
        *self.autosleep_target.lock() = None;
    }

    pub fn test_level(&self) -> TestLevel {
        *self.test_level.lock()
    }

    pub fn set_test_level(&self, level: TestLevel) {
        *self.test_level.lock() = level;
        debug!(level = level.label(), "test level changed");
    }

    /// Whether devices may be suspended and resumed asynchronously.
    pub fn async_enabled(&self) -> bool {
        self.async_enabled.load(Ordering::SeqCst)
    }

    pub fn set_async_enabled(&self, enabled: bool) {
        self.async_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn trace_enabled(&self) -> bool {
        self.trace_enabled.load(Ordering::SeqCst)
    }

    /// Enable or disable resume tracing.
    ///
    /// Tracing works by perturbing a persistent clock value so the last
    /// active component can be recovered after a hang; operators must be
    /// warned that the system time will be wrong after resume.
    pub fn set_trace_enabled(&self, enabled: bool) {
        self.trace_enabled.store(enabled, Ordering::SeqCst);
        if enabled {
            warn!(
                "enabling resume tracing changes the system date and time during resume; \
                 correct system time has to be restored manually afterwards"
            );
        }
    }

    pub fn print_times(&self) -> bool {
        self.print_times.load(Ordering::SeqCst)
    }

    pub fn set_print_times(&self, enabled: bool) {
        self.print_times.store(enabled, Ordering::SeqCst);
    }

    pub fn freeze_timeout_ms(&self) -> u32 {
        self.freeze_timeout_ms.load(Ordering::SeqCst)
    }

    pub fn set_freeze_timeout_ms(&self, timeout: u32) {
        self.freeze_timeout_ms.store(timeout, Ordering::SeqCst);
    }

    fn validate_suspend_target(&self, target: SleepState) -> Result<(), TransitionError> {
        if target.is_sleep()
            && target != SleepState::Disk
            && self.config.supported_states.contains(&target)
        {
            Ok(())
        } else {
            Err(TransitionError::InvalidState(target.label().to_string()))
        }
    }

    fn set_stage(&self, stage: TransitionStage) {
        *self.stage.lock() = stage;
    }

    fn abort(&self, reason: AbortReason) {
        self.set_stage(TransitionStage::Aborting);
        self.stats.record(&TransitionOutcome::Aborted(reason));
        self.teardown();
    }

    fn conclude(
        &self,
        target: SleepState,
        result: Result<(), PhaseFailure>,
    ) -> Result<(), TransitionError> {
        let mapped = match result {
            Ok(()) => {
                info!(state = target.label(), "transition completed");
                self.stats.record(&TransitionOutcome::Success);
                Ok(())
            }
            Err(failure) => {
                error!(
                    state = target.label(),
                    phase = failure.phase.label(),
                    component = %failure.component,
                    errno = failure.errno,
                    "transition failed; unwinding"
                );
                self.stats.record(&TransitionOutcome::Failed(failure.clone()));
                Err(TransitionError::PhaseFailed {
                    phase: failure.phase,
                    component: failure.component,
                    errno: failure.errno,
                })
            }
        };
        self.teardown();
        mapped
    }

    /// Common tail of every attempt: teardown announcement, disarm the
    /// committed wakeup count, back to idle. Runs on success, failure,
    /// and abort alike so the coordinator never stays wedged.
    fn teardown(&self) {
        // Teardown is not veto-capable; rejections are logged by the registry.
        let _ = self
            .notifiers
            .announce(SleepPhase::Complete, PhaseDirection::Exit);
        self.wakeup.disarm();
        self.set_stage(TransitionStage::Idle);
    }
}
