//! Transition outcome accounting and the failure history rings
//!
//! Counters for successes, failures, and aborts, a per-phase failure
//! breakdown, and fixed-capacity rings holding the most recent failures:
//! parallel rings of failing component name, errno, and phase sharing one
//! write head. Appends are O(1) and overwrite the oldest entry; reports
//! walk the rings from most recent to oldest with modulo arithmetic.

use parking_lot::Mutex;

use somnus_core::{PhaseFailure, SleepPhase, TransitionOutcome};

/// Default depth of the failure history rings.
pub const DEFAULT_HISTORY: usize = 4;

/// Phases that get their own failure counter line in the report,
/// in transition order.
const COUNTED_PHASES: [SleepPhase; 9] = [
    SleepPhase::Freeze,
    SleepPhase::Prepare,
    SleepPhase::Suspend,
    SleepPhase::SuspendLate,
    SleepPhase::SuspendNoIrq,
    SleepPhase::Core,
    SleepPhase::ResumeNoIrq,
    SleepPhase::ResumeEarly,
    SleepPhase::Resume,
];

#[derive(Debug, Default)]
struct StatsInner {
    success: u64,
    fail: u64,
    aborted: u64,
    phase_failures: [u64; SleepPhase::ALL.len()],
    components: Vec<String>,
    errnos: Vec<i32>,
    phases: Vec<SleepPhase>,
    /// Next ring slot to overwrite.
    head: usize,
    /// Total failures ever pushed into the rings.
    recorded: u64,
}

/// Rolling record of transition outcomes.
#[derive(Debug)]
pub struct SleepStats {
    inner: Mutex<StatsInner>,
    capacity: usize,
}

impl SleepStats {
    /// Create a recorder keeping the last `capacity` failures.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(StatsInner::default()),
            capacity: capacity.max(1),
        }
    }

    /// Fold one transition outcome into the counters and rings.
    pub fn record(&self, outcome: &TransitionOutcome) {
        let mut inner = self.inner.lock();
        match outcome {
            TransitionOutcome::Success => inner.success += 1,
            TransitionOutcome::Aborted(_) => inner.aborted += 1,
            TransitionOutcome::Failed(failure) => {
                inner.fail += 1;
                inner.phase_failures[failure.phase as usize] += 1;
                self.push_failure(&mut inner, failure);
            }
        }
    }

    fn push_failure(&self, inner: &mut StatsInner, failure: &PhaseFailure) {
        if inner.components.len() < self.capacity {
            inner.components.push(failure.component.clone());
            inner.errnos.push(failure.errno);
            inner.phases.push(failure.phase);
        } else {
            let head = inner.head;
            inner.components[head] = failure.component.clone();
            inner.errnos[head] = failure.errno;
            inner.phases[head] = failure.phase;
        }
        inner.head = (inner.head + 1) % self.capacity;
        inner.recorded += 1;
    }

    pub fn success_count(&self) -> u64 {
        self.inner.lock().success
    }

    pub fn fail_count(&self) -> u64 {
        self.inner.lock().fail
    }

    pub fn aborted_count(&self) -> u64 {
        self.inner.lock().aborted
    }

    /// Failures counted against `phase`.
    pub fn phase_fail_count(&self, phase: SleepPhase) -> u64 {
        self.inner.lock().phase_failures[phase as usize]
    }

    /// Retained failures, most recent first.
    pub fn recent_failures(&self) -> Vec<PhaseFailure> {
        let inner = self.inner.lock();
        let len = inner.components.len();
        let mut out = Vec::with_capacity(len);
        for i in 1..=len {
            // Walk backwards from the slot before head, wrapping.
            let index = (inner.head + len - i) % len;
            out.push(PhaseFailure::new(
                inner.phases[index],
                inner.components[index].clone(),
                inner.errnos[index],
            ));
        }
        out
    }

    /// The most recent failure, if any has ever been recorded.
    pub fn last_failure(&self) -> Option<PhaseFailure> {
        self.recent_failures().into_iter().next()
    }

    /// Render the statistics report.
    pub fn render(&self) -> String {
        let inner = self.inner.lock();
        let mut out = String::new();
        out.push_str(&format!("success: {}\n", inner.success));
        out.push_str(&format!("fail: {}\n", inner.fail));
        out.push_str(&format!("aborted: {}\n", inner.aborted));
        for phase in COUNTED_PHASES {
            out.push_str(&format!(
                "failed_{}: {}\n",
                phase.label(),
                inner.phase_failures[phase as usize]
            ));
        }

        if inner.recorded == 0 {
            out.push_str("failures: none recorded\n");
            return out;
        }
        drop(inner);

        let recent = self.recent_failures();
        out.push_str("failures:\n");
        Self::render_column(&mut out, "last_failed_dev", recent.iter().map(|f| f.component.clone()));
        Self::render_column(&mut out, "last_failed_errno", recent.iter().map(|f| f.errno.to_string()));
        Self::render_column(
            &mut out,
            "last_failed_step",
            recent.iter().map(|f| f.phase.label().to_string()),
        );
        out
    }

    fn render_column(out: &mut String, title: &str, values: impl Iterator<Item = String>) {
        for (i, value) in values.enumerate() {
            if i == 0 {
                out.push_str(&format!("  {title}:\t{value}\n"));
            } else {
                out.push_str(&format!("\t\t\t{value}\n"));
            }
        }
    }
}

impl Default for SleepStats {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}
