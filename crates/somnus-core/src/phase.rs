//! Transition phases, announcement directions, and diagnostic test levels

use std::fmt;

use serde::{Deserialize, Serialize};

/// A named step within a transition.
///
/// Used for notifier announcements, failure attribution in the statistics
/// recorder, and diagnostic truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SleepPhase {
    /// Freezing user tasks.
    Freeze,
    /// Pre-transition preparation; the only veto-capable announcement.
    Prepare,
    /// Suspending devices.
    Suspend,
    /// Late device suspend callbacks.
    SuspendLate,
    /// Device suspend with interrupts disabled.
    SuspendNoIrq,
    /// The hardware-specific low-power entry itself.
    Core,
    /// Device resume with interrupts disabled.
    ResumeNoIrq,
    /// Early device resume callbacks.
    ResumeEarly,
    /// Resuming devices.
    Resume,
    /// Post-transition teardown announcement.
    Complete,
}

impl SleepPhase {
    /// Every phase, in transition order.
    pub const ALL: [SleepPhase; 10] = [
        SleepPhase::Freeze,
        SleepPhase::Prepare,
        SleepPhase::Suspend,
        SleepPhase::SuspendLate,
        SleepPhase::SuspendNoIrq,
        SleepPhase::Core,
        SleepPhase::ResumeNoIrq,
        SleepPhase::ResumeEarly,
        SleepPhase::Resume,
        SleepPhase::Complete,
    ];

    /// The snake_case label used in reports and logs.
    pub fn label(&self) -> &'static str {
        match self {
            SleepPhase::Freeze => "freeze",
            SleepPhase::Prepare => "prepare",
            SleepPhase::Suspend => "suspend",
            SleepPhase::SuspendLate => "suspend_late",
            SleepPhase::SuspendNoIrq => "suspend_noirq",
            SleepPhase::Core => "core",
            SleepPhase::ResumeNoIrq => "resume_noirq",
            SleepPhase::ResumeEarly => "resume_early",
            SleepPhase::Resume => "resume",
            SleepPhase::Complete => "complete",
        }
    }
}

impl fmt::Display for SleepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Direction of a phase announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseDirection {
    /// Heading into the sleep state.
    Enter,
    /// Unwinding back toward the working state.
    Exit,
}

/// Diagnostic truncation point for transition attempts.
///
/// Any level other than `None` makes the coordinator stop a suspend
/// attempt before the platform executor runs, reporting synthetic
/// success. Levels beyond `Core` are forwarded to the executor so
/// platform code can implement its own deeper truncation points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TestLevel {
    /// No truncation; the full transition runs.
    None,
    /// Stop before the hardware-facing core step.
    Core,
    /// Stop after disabling non-boot processors.
    Processors,
    /// Stop after platform preparation.
    Platform,
    /// Stop after suspending devices.
    Devices,
    /// Stop after freezing tasks.
    Freezer,
}

impl TestLevel {
    /// Every level, in the order reports list them.
    pub const ALL: [TestLevel; 6] = [
        TestLevel::None,
        TestLevel::Core,
        TestLevel::Processors,
        TestLevel::Platform,
        TestLevel::Devices,
        TestLevel::Freezer,
    ];

    /// The label used by the diagnostic attribute.
    pub fn label(&self) -> &'static str {
        match self {
            TestLevel::None => "none",
            TestLevel::Core => "core",
            TestLevel::Processors => "processors",
            TestLevel::Platform => "platform",
            TestLevel::Devices => "devices",
            TestLevel::Freezer => "freezer",
        }
    }

    /// Decode a level label.
    pub fn from_label(label: &str) -> Option<TestLevel> {
        TestLevel::ALL.into_iter().find(|level| level.label() == label)
    }
}

impl fmt::Display for TestLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_labels() {
        assert_eq!(SleepPhase::SuspendNoIrq.label(), "suspend_noirq");
        assert_eq!(SleepPhase::ResumeEarly.label(), "resume_early");
        assert_eq!(SleepPhase::Core.label(), "core");
        assert_eq!(SleepPhase::Freeze.to_string(), "freeze");
    }

    #[test]
    fn test_phase_order() {
        // ALL is sorted by transition order, matching the enum ordering.
        let mut sorted = SleepPhase::ALL;
        sorted.sort();
        assert_eq!(sorted, SleepPhase::ALL);
        assert!(SleepPhase::Prepare < SleepPhase::Core);
        assert!(SleepPhase::Core < SleepPhase::Resume);
    }

    #[test]
    fn test_level_labels_round_trip() {
        for level in TestLevel::ALL {
            assert_eq!(TestLevel::from_label(level.label()), Some(level));
        }
        assert_eq!(TestLevel::from_label("bogus"), None);
    }

    #[test]
    fn test_level_ordering() {
        assert!(TestLevel::None < TestLevel::Core);
        assert!(TestLevel::Core <= TestLevel::Freezer);
        // Anything other than `None` is at least `Core`.
        for level in TestLevel::ALL.into_iter().skip(1) {
            assert!(level >= TestLevel::Core);
        }
    }
}
