//! Configuration for the sleep coordinator

use std::time::Duration;

use somnus_core::SleepState;

use crate::stats::DEFAULT_HISTORY;

/// Configuration for a [`SleepCoordinator`](crate::SleepCoordinator).
///
/// Capabilities the original platform would select at build time are
/// runtime flags here, checked when the coordinator and its attribute
/// surface are constructed, so the whole state machine is always present
/// and testable. Hibernation availability is reported by the platform
/// executor rather than configured.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Suspend states the platform can enter, shallowest first.
    pub supported_states: Vec<SleepState>,
    /// Expose the diagnostic test-level attribute.
    pub debug: bool,
    /// Expose the resume-trace attribute.
    pub trace: bool,
    /// Initially report device suspend/resume timings.
    pub print_times: bool,
    /// Depth of the failure history rings.
    pub failure_history: usize,
    /// Cadence of autosleep attempts while a target is set.
    pub autosleep_interval: Duration,
    /// Initial task-freezer timeout in milliseconds.
    pub freeze_timeout_ms: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            supported_states: vec![SleepState::ToIdle, SleepState::Standby, SleepState::Mem],
            debug: true,
            trace: false,
            print_times: false,
            failure_history: DEFAULT_HISTORY,
            autosleep_interval: Duration::from_secs(5),
            freeze_timeout_ms: 20_000,
        }
    }
}

impl CoordinatorConfig {
    /// Restrict the supported suspend states.
    pub fn with_supported_states(mut self, states: Vec<SleepState>) -> Self {
        self.supported_states = states;
        self
    }

    /// Enable or disable the diagnostic test-level attribute.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enable or disable the resume-trace attribute.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Set the failure history depth.
    pub fn with_failure_history(mut self, depth: usize) -> Self {
        self.failure_history = depth;
        self
    }

    /// Set the autosleep attempt cadence.
    pub fn with_autosleep_interval(mut self, interval: Duration) -> Self {
        self.autosleep_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();
        assert!(config.supported_states.contains(&SleepState::Mem));
        assert!(!config.supported_states.contains(&SleepState::Disk));
        assert_eq!(config.failure_history, DEFAULT_HISTORY);
        assert_eq!(config.freeze_timeout_ms, 20_000);
    }

    #[test]
    fn test_builders() {
        let config = CoordinatorConfig::default()
            .with_supported_states(vec![SleepState::Mem])
            .with_debug(false)
            .with_trace(true)
            .with_failure_history(8)
            .with_autosleep_interval(Duration::from_millis(50));
        assert_eq!(config.supported_states, vec![SleepState::Mem]);
        assert!(!config.debug);
        assert!(config.trace);
        assert_eq!(config.failure_history, 8);
        assert_eq!(config.autosleep_interval, Duration::from_millis(50));
    }
}
