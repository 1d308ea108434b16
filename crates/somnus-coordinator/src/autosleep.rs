//! Background autosleep retry loop
//!
//! Whenever an autosleep target is set, the task repeatedly asks the
//! coordinator to enter it while the system reports idle. `Busy` and
//! wakeup races are normal and retried after an exponential backoff;
//! an invalid target is a configuration error, so the task disables
//! itself instead of retrying forever.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use somnus_core::{IdleMonitor, TransitionError};

use crate::SleepCoordinator;

/// Tracks retry state between autosleep attempts.
struct Backoff {
    consecutive_failures: u32,
    last_attempt: Option<Instant>,
}

impl Backoff {
    fn new() -> Self {
        Self {
            consecutive_failures: 0,
            last_attempt: None,
        }
    }

    /// Exponential backoff: 2^failures seconds, capped at 64s (2^6).
    fn backoff_duration(&self) -> Duration {
        Duration::from_secs(2u64.pow(self.consecutive_failures.min(6)))
    }

    /// Whether enough time has elapsed since the last attempt to retry.
    /// Always true before the first failure.
    fn should_retry(&self) -> bool {
        if self.consecutive_failures == 0 {
            return true;
        }
        match self.last_attempt {
            Some(at) => at.elapsed() >= self.backoff_duration(),
            None => true,
        }
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_attempt = Some(Instant::now());
    }

    fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_attempt = Some(Instant::now());
    }
}

/// Background autosleep task.
pub struct AutosleepTask {
    /// The coordinator whose target state this task keeps attempting.
    coordinator: Arc<SleepCoordinator>,
    /// Idleness signal gating attempts.
    idle: Arc<dyn IdleMonitor>,
    /// Cadence of attempts while a target is set.
    interval: Duration,
    /// Shutdown signal.
    shutdown_rx: broadcast::Receiver<()>,
    /// Retry state across attempts.
    backoff: Backoff,
}

impl AutosleepTask {
    pub fn new(
        coordinator: Arc<SleepCoordinator>,
        idle: Arc<dyn IdleMonitor>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        let interval = coordinator.config().autosleep_interval;
        Self {
            coordinator,
            idle,
            interval,
            shutdown_rx,
            backoff: Backoff::new(),
        }
    }

    /// Spawn the autosleep loop as a background task.
    pub fn spawn(
        coordinator: Arc<SleepCoordinator>,
        idle: Arc<dyn IdleMonitor>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let task = Self::new(coordinator, idle, shutdown_rx);
        tokio::spawn(async move {
            task.run().await;
        })
    }

    /// Run the autosleep loop.
    pub async fn run(mut self) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "autosleep task started"
        );

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("autosleep task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&mut self) {
        let Some(target) = self.coordinator.autosleep_target() else {
            return;
        };
        if !self.idle.is_idle() {
            debug!("system busy; skipping autosleep attempt");
            return;
        }
        if !self.backoff.should_retry() {
            debug!(
                failures = self.backoff.consecutive_failures,
                "autosleep attempt deferred by backoff"
            );
            return;
        }

        match self.coordinator.autosleep_attempt(target).await {
            Ok(()) => {
                self.backoff.record_success();
                info!(target = target.label(), "autosleep attempt completed");
            }
            Err(TransitionError::InvalidState(label)) => {
                // Config error: the target cannot be entered any more.
                // Retrying would loop forever, so disable instead.
                error!(
                    target = %label,
                    "autosleep target is no longer valid; disabling autosleep"
                );
                self.coordinator.clear_autosleep();
            }
            Err(err @ TransitionError::Busy)
            | Err(err @ TransitionError::CountMismatch { .. }) => {
                self.backoff.record_failure();
                debug!(error = %err, "autosleep attempt deferred");
            }
            Err(err) => {
                self.backoff.record_failure();
                warn!(
                    error = %err,
                    failures = self.backoff.consecutive_failures,
                    "autosleep attempt failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use somnus_core::{MockExecutor, MockIdleMonitor, SleepState};

    use crate::CoordinatorConfig;

    #[test]
    fn test_backoff_initial_state() {
        let backoff = Backoff::new();
        assert_eq!(backoff.consecutive_failures, 0);
        assert!(backoff.should_retry());
        assert_eq!(backoff.backoff_duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = Backoff::new();
        backoff.record_failure();
        assert_eq!(backoff.backoff_duration(), Duration::from_secs(2));
        backoff.record_failure();
        assert_eq!(backoff.backoff_duration(), Duration::from_secs(4));

        for _ in 0..10 {
            backoff.record_failure();
        }
        assert_eq!(backoff.backoff_duration(), Duration::from_secs(64));
    }

    #[test]
    fn test_backoff_success_resets() {
        let mut backoff = Backoff::new();
        backoff.record_failure();
        backoff.record_failure();
        assert!(!backoff.should_retry());

        backoff.record_success();
        assert_eq!(backoff.consecutive_failures, 0);
        assert!(backoff.should_retry());
    }

    fn fast_coordinator(executor: Arc<MockExecutor>) -> Arc<SleepCoordinator> {
        let config =
            CoordinatorConfig::default().with_autosleep_interval(Duration::from_millis(10));
        Arc::new(SleepCoordinator::new(config, executor))
    }

    #[tokio::test]
    async fn test_loop_attempts_target_while_idle() {
        let executor = Arc::new(MockExecutor::new());
        let coordinator = fast_coordinator(executor.clone());
        coordinator.set_autosleep(Some(SleepState::Mem)).unwrap();

        let idle = Arc::new(MockIdleMonitor::new(true));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = AutosleepTask::spawn(coordinator.clone(), idle, shutdown_rx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert!(executor.call_count() >= 1);
        assert!(coordinator.stats().success_count() >= 1);
        assert_eq!(coordinator.autosleep_target(), Some(SleepState::Mem));
    }

    #[tokio::test]
    async fn test_loop_waits_for_idle() {
        let executor = Arc::new(MockExecutor::new());
        let coordinator = fast_coordinator(executor.clone());
        coordinator.set_autosleep(Some(SleepState::Mem)).unwrap();

        let idle = Arc::new(MockIdleMonitor::new(false));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = AutosleepTask::spawn(coordinator.clone(), idle.clone(), shutdown_rx);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(executor.call_count(), 0);

        idle.set_idle(true);
        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert!(executor.call_count() >= 1);
    }

    #[tokio::test]
    async fn test_loop_idles_with_no_target() {
        let executor = Arc::new(MockExecutor::new());
        let coordinator = fast_coordinator(executor.clone());

        let idle = Arc::new(MockIdleMonitor::new(true));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = AutosleepTask::spawn(coordinator, idle, shutdown_rx);

        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_target_disables_autosleep() {
        let executor = Arc::new(MockExecutor::new().with_hibernation());
        let coordinator = fast_coordinator(executor.clone());
        coordinator.set_autosleep(Some(SleepState::Disk)).unwrap();

        // Hibernation support disappears after the target was accepted.
        executor.set_hibernation(false);

        let idle = Arc::new(MockIdleMonitor::new(true));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = AutosleepTask::spawn(coordinator.clone(), idle, shutdown_rx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(coordinator.autosleep_target(), None);
        assert_eq!(executor.hibernate_count(), 0);
    }
}
