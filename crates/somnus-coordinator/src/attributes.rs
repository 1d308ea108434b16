//! Named read/write settings surface
//!
//! Operator-facing knobs exposed as named string attributes: short strings
//! in, short strings out, failures surfaced as write errors. The exact
//! transport (sysfs, RPC, debug console) is the embedder's concern; this
//! adapter only maps names and values onto coordinator operations.
//!
//! Attributes gated by a capability flag in [`crate::CoordinatorConfig`]
//! simply do not exist when the flag is off: reads and writes report an
//! unknown attribute.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use somnus_core::{SleepState, TestLevel, TransitionError};

use crate::SleepCoordinator;

/// Errors surfaced by attribute reads and writes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttributeError {
    #[error("unknown attribute: {0}")]
    Unknown(String),

    #[error("attribute {0} is read-only")]
    ReadOnly(String),

    #[error("invalid value for {attribute}: {value:?}")]
    InvalidValue { attribute: String, value: String },

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// The coordinator's named-settings surface.
pub struct AttributeSet {
    coordinator: Arc<SleepCoordinator>,
}

impl AttributeSet {
    pub fn new(coordinator: Arc<SleepCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Names of the attributes that exist under the current configuration.
    pub fn names(&self) -> Vec<&'static str> {
        let config = self.coordinator.config();
        let mut names = vec![
            "state",
            "autosleep",
            "wakeup_count",
            "suspend_stats",
            "pm_async",
            "pm_freeze_timeout",
        ];
        if config.debug {
            names.push("pm_test");
            names.push("pm_print_times");
        }
        if config.trace {
            names.push("pm_trace");
        }
        names
    }

    /// Read an attribute's current value.
    pub fn read(&self, name: &str) -> Result<String, AttributeError> {
        let coordinator = &self.coordinator;
        match name {
            "state" => {
                let labels: Vec<&str> = coordinator
                    .available_states()
                    .iter()
                    .map(|state| state.label())
                    .collect();
                Ok(format!("{}\n", labels.join(" ")))
            }
            "autosleep" => match coordinator.autosleep_target() {
                Some(state) => Ok(format!("{}\n", state.label())),
                None => Ok("off\n".to_string()),
            },
            "wakeup_count" => {
                let (count, ok) = coordinator.wakeup().read_count();
                if ok {
                    Ok(format!("{count}\n"))
                } else {
                    Err(AttributeError::Transition(TransitionError::Busy))
                }
            }
            "suspend_stats" => Ok(coordinator.stats().render()),
            "pm_async" => Ok(render_bool(coordinator.async_enabled())),
            "pm_freeze_timeout" => Ok(format!("{}\n", coordinator.freeze_timeout_ms())),
            "pm_test" if coordinator.config().debug => {
                let current = coordinator.test_level();
                let rendered: Vec<String> = TestLevel::ALL
                    .iter()
                    .map(|level| {
                        if *level == current {
                            format!("[{}]", level.label())
                        } else {
                            level.label().to_string()
                        }
                    })
                    .collect();
                Ok(format!("{}\n", rendered.join(" ")))
            }
            "pm_print_times" if coordinator.config().debug => {
                Ok(render_bool(coordinator.print_times()))
            }
            "pm_trace" if coordinator.config().trace => {
                Ok(render_bool(coordinator.trace_enabled()))
            }
            _ => Err(AttributeError::Unknown(name.to_string())),
        }
    }

    /// Write an attribute, performing whatever operation the name maps to.
    ///
    /// `state` writes run a full transition attempt and only return once
    /// it concludes.
    pub async fn write(&self, name: &str, value: &str) -> Result<(), AttributeError> {
        let coordinator = &self.coordinator;
        let trimmed = value.trim();
        debug!(attribute = name, value = trimmed, "attribute write");
        match name {
            "state" => {
                let target = SleepState::from_label(trimmed)?;
                coordinator.request_sleep(target).await?;
                Ok(())
            }
            "autosleep" => {
                if trimmed == "off" {
                    coordinator.set_autosleep(None)?;
                } else {
                    let target = SleepState::from_label(trimmed)?;
                    coordinator.set_autosleep(Some(target))?;
                }
                Ok(())
            }
            "wakeup_count" => {
                let expected: u64 = trimmed
                    .parse()
                    .map_err(|_| invalid(name, value))?;
                // Same serialization as an explicit request: the commit
                // cannot interleave with autosleep or a running attempt.
                coordinator.wakeup().try_acquire()?;
                let result = if coordinator.autosleep_target().is_some() {
                    Err(TransitionError::Busy)
                } else {
                    coordinator.wakeup().compare_and_commit(expected)
                };
                coordinator.wakeup().release();
                result?;
                Ok(())
            }
            "suspend_stats" => Err(AttributeError::ReadOnly(name.to_string())),
            "pm_async" => {
                coordinator.set_async_enabled(parse_bool(name, value)?);
                Ok(())
            }
            "pm_freeze_timeout" => {
                let timeout: u32 = trimmed
                    .parse()
                    .map_err(|_| invalid(name, value))?;
                coordinator.set_freeze_timeout_ms(timeout);
                Ok(())
            }
            "pm_test" if coordinator.config().debug => {
                let level =
                    TestLevel::from_label(trimmed).ok_or_else(|| invalid(name, value))?;
                coordinator.set_test_level(level);
                Ok(())
            }
            "pm_print_times" if coordinator.config().debug => {
                coordinator.set_print_times(parse_bool(name, value)?);
                Ok(())
            }
            "pm_trace" if coordinator.config().trace => {
                let numeric: i64 = trimmed
                    .parse()
                    .map_err(|_| invalid(name, value))?;
                coordinator.set_trace_enabled(numeric != 0);
                Ok(())
            }
            _ => Err(AttributeError::Unknown(name.to_string())),
        }
    }
}

fn render_bool(value: bool) -> String {
    if value { "1\n".to_string() } else { "0\n".to_string() }
}

fn invalid(attribute: &str, value: &str) -> AttributeError {
    AttributeError::InvalidValue {
        attribute: attribute.to_string(),
        value: value.to_string(),
    }
}

/// Strict boolean parse: exactly `0` or `1`.
fn parse_bool(attribute: &str, value: &str) -> Result<bool, AttributeError> {
    match value.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(invalid(attribute, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use somnus_core::{MockExecutor, PhaseFailure, SleepPhase};

    use crate::CoordinatorConfig;

    fn setup() -> (Arc<MockExecutor>, Arc<SleepCoordinator>, AttributeSet) {
        setup_with(CoordinatorConfig::default())
    }

    fn setup_with(config: CoordinatorConfig) -> (Arc<MockExecutor>, Arc<SleepCoordinator>, AttributeSet) {
        let executor = Arc::new(MockExecutor::new());
        let coordinator = Arc::new(SleepCoordinator::new(config, executor.clone()));
        let attributes = AttributeSet::new(coordinator.clone());
        (executor, coordinator, attributes)
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("somnus_coordinator=debug"))
            .with_test_writer()
            .try_init();
    }

    #[test]
    fn test_state_read_lists_available_labels() {
        let (executor, _, attributes) = setup();
        assert_eq!(attributes.read("state").unwrap(), "freeze standby mem\n");

        executor.set_hibernation(true);
        assert_eq!(attributes.read("state").unwrap(), "freeze standby mem disk\n");
    }

    #[tokio::test]
    async fn test_state_write_runs_transition() {
        init_tracing();
        let (executor, coordinator, attributes) = setup();

        attributes.write("state", "standby\n").await.unwrap();
        assert_eq!(executor.suspend_calls().len(), 1);
        assert_eq!(coordinator.stats().success_count(), 1);
    }

    #[tokio::test]
    async fn test_state_write_rejects_unknown_label() {
        let (executor, coordinator, attributes) = setup();

        let err = attributes.write("state", "bogus").await.unwrap_err();
        assert_eq!(
            err,
            AttributeError::Transition(TransitionError::InvalidState("bogus".to_string()))
        );
        assert_eq!(executor.call_count(), 0);
        assert_eq!(coordinator.stats().success_count(), 0);
        assert_eq!(coordinator.stats().fail_count(), 0);
    }

    #[tokio::test]
    async fn test_wakeup_count_handshake() {
        let (_, coordinator, attributes) = setup();

        assert_eq!(attributes.read("wakeup_count").unwrap(), "0\n");

        for _ in 0..5 {
            coordinator.wakeup().record_event("rtc");
        }
        assert_eq!(attributes.read("wakeup_count").unwrap(), "5\n");

        // A sixth event lands between read and commit.
        coordinator.wakeup().record_event("keyboard");
        let err = attributes.write("wakeup_count", "5").await.unwrap_err();
        assert_eq!(
            err,
            AttributeError::Transition(TransitionError::CountMismatch {
                expected: 5,
                current: 6,
            })
        );

        attributes.write("wakeup_count", "6").await.unwrap();
        attributes.write("state", "mem").await.unwrap();
    }

    #[tokio::test]
    async fn test_wakeup_race_between_commit_and_state_write() {
        let (executor, coordinator, attributes) = setup();

        attributes.write("wakeup_count", "0").await.unwrap();
        coordinator.wakeup().record_event("network");

        let err = attributes.write("state", "mem").await.unwrap_err();
        assert!(matches!(
            err,
            AttributeError::Transition(TransitionError::CountMismatch { .. })
        ));
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_pm_test_render_and_truncation() {
        let (executor, _, attributes) = setup();

        assert_eq!(
            attributes.read("pm_test").unwrap(),
            "[none] core processors platform devices freezer\n"
        );

        attributes.write("pm_test", "core").await.unwrap();
        assert_eq!(
            attributes.read("pm_test").unwrap(),
            "none [core] processors platform devices freezer\n"
        );

        attributes.write("state", "mem").await.unwrap();
        assert_eq!(executor.call_count(), 0);

        attributes.write("pm_test", "none").await.unwrap();
        attributes.write("state", "mem").await.unwrap();
        assert_eq!(executor.call_count(), 1);
    }

    #[tokio::test]
    async fn test_pm_test_rejects_unknown_level() {
        let (_, _, attributes) = setup();
        let err = attributes.write("pm_test", "bogus").await.unwrap_err();
        assert!(matches!(err, AttributeError::InvalidValue { .. }));
    }

    #[test]
    fn test_debug_gated_attributes_absent() {
        let (_, _, attributes) = setup_with(CoordinatorConfig::default().with_debug(false));

        assert!(matches!(
            attributes.read("pm_test"),
            Err(AttributeError::Unknown(_))
        ));
        assert!(matches!(
            attributes.read("pm_print_times"),
            Err(AttributeError::Unknown(_))
        ));
        assert!(!attributes.names().contains(&"pm_test"));
    }

    #[tokio::test]
    async fn test_pm_trace_gated_and_toggles() {
        init_tracing();
        // Absent without the trace capability.
        let (_, _, attributes) = setup();
        assert!(matches!(
            attributes.read("pm_trace"),
            Err(AttributeError::Unknown(_))
        ));

        let (_, coordinator, attributes) =
            setup_with(CoordinatorConfig::default().with_trace(true));
        assert_eq!(attributes.read("pm_trace").unwrap(), "0\n");

        attributes.write("pm_trace", "1").await.unwrap();
        assert!(coordinator.trace_enabled());
        assert_eq!(attributes.read("pm_trace").unwrap(), "1\n");

        attributes.write("pm_trace", "0").await.unwrap();
        assert!(!coordinator.trace_enabled());
    }

    #[tokio::test]
    async fn test_pm_async_strict_bool() {
        let (_, coordinator, attributes) = setup();
        assert_eq!(attributes.read("pm_async").unwrap(), "1\n");

        attributes.write("pm_async", "0").await.unwrap();
        assert!(!coordinator.async_enabled());

        let err = attributes.write("pm_async", "2").await.unwrap_err();
        assert!(matches!(err, AttributeError::InvalidValue { .. }));
    }

    #[tokio::test]
    async fn test_suspend_stats_read_only() {
        let (_, coordinator, attributes) = setup();
        let err = attributes.write("suspend_stats", "0").await.unwrap_err();
        assert_eq!(err, AttributeError::ReadOnly("suspend_stats".to_string()));

        coordinator
            .stats()
            .record(&somnus_core::TransitionOutcome::Failed(PhaseFailure::new(
                SleepPhase::SuspendNoIrq,
                "deviceX",
                -5,
            )));
        let report = attributes.read("suspend_stats").unwrap();
        assert!(report.contains("last_failed_dev:\tdeviceX"));
        assert!(report.contains("suspend_noirq"));
    }

    #[tokio::test]
    async fn test_autosleep_attribute() {
        let (_, coordinator, attributes) = setup();
        assert_eq!(attributes.read("autosleep").unwrap(), "off\n");

        attributes.write("autosleep", "mem").await.unwrap();
        assert_eq!(attributes.read("autosleep").unwrap(), "mem\n");
        assert_eq!(coordinator.autosleep_target(), Some(somnus_core::SleepState::Mem));

        let err = attributes.write("autosleep", "bogus").await.unwrap_err();
        assert!(matches!(
            err,
            AttributeError::Transition(TransitionError::InvalidState(_))
        ));

        attributes.write("autosleep", "off").await.unwrap();
        assert_eq!(coordinator.autosleep_target(), None);
    }

    #[tokio::test]
    async fn test_wakeup_count_write_busy_while_autosleep_set() {
        let (_, _, attributes) = setup();
        attributes.write("autosleep", "mem").await.unwrap();

        let err = attributes.write("wakeup_count", "0").await.unwrap_err();
        assert_eq!(err, AttributeError::Transition(TransitionError::Busy));
    }

    #[test]
    fn test_freeze_timeout_round_trip() {
        let (_, coordinator, attributes) = setup();
        assert_eq!(attributes.read("pm_freeze_timeout").unwrap(), "20000\n");

        tokio_test::block_on(attributes.write("pm_freeze_timeout", "12000")).unwrap();
        assert_eq!(coordinator.freeze_timeout_ms(), 12_000);
        assert_eq!(attributes.read("pm_freeze_timeout").unwrap(), "12000\n");

        let err = tokio_test::block_on(attributes.write("pm_freeze_timeout", "soon")).unwrap_err();
        assert!(matches!(err, AttributeError::InvalidValue { .. }));
    }

    #[test]
    fn test_unknown_attribute() {
        let (_, _, attributes) = setup();
        assert!(matches!(
            attributes.read("cpufreq_table"),
            Err(AttributeError::Unknown(_))
        ));
        assert!(matches!(
            tokio_test::block_on(attributes.write("cpufreq_table", "1")),
            Err(AttributeError::Unknown(_))
        ));
    }

    #[test]
    fn test_names_follow_capabilities() {
        let (_, _, attributes) = setup();
        let names = attributes.names();
        assert!(names.contains(&"state"));
        assert!(names.contains(&"pm_test"));
        assert!(!names.contains(&"pm_trace"));

        let (_, _, attributes) = setup_with(CoordinatorConfig::default().with_trace(true));
        assert!(attributes.names().contains(&"pm_trace"));
    }
}
