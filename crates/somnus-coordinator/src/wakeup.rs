//! Wakeup-event counting and the sleep-entry handshake
//!
//! A wakeup event that arrives while the system is already asleep simply
//! wakes it. One that arrives while a transition is mid-flight must abort
//! that transition, and one that arrives between a requester reading the
//! counter and committing it must prevent the transition from starting at
//! all. The counter therefore pairs a monotonic event count with an
//! in-progress flag behind a single lock, so increment-and-check is atomic
//! with respect to the flag. The lock is held only for field updates and
//! never across a blocking call, keeping event producers non-blocking.
//!
//! The handshake: a requester calls [`WakeupCounter::read_count`], does its
//! own preparations, then calls [`WakeupCounter::compare_and_commit`] with
//! the value it read. A mismatch means an event fired in between and the
//! sleep attempt must be abandoned. A match arms in-flight detection: any
//! event recorded afterwards trips [`WakeupCounter::check_pending`], which
//! the controller polls before hardware-facing phases.

use parking_lot::Mutex;
use tracing::{debug, warn};

use somnus_core::TransitionError;

/// Number of recent wakeup source names kept for diagnostics.
const RECENT_SOURCES: usize = 4;

#[derive(Debug, Default)]
struct CounterInner {
    count: u64,
    in_progress: bool,
    armed_at: Option<u64>,
    pending: bool,
    recent_sources: Vec<String>,
}

/// Process-wide wakeup event counter with the transition in-progress flag.
#[derive(Debug, Default)]
pub struct WakeupCounter {
    inner: Mutex<CounterInner>,
}

impl WakeupCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter value, and whether the read is usable.
    ///
    /// `ok` is false while a transition attempt holds the in-progress
    /// flag; callers must retry or fail rather than trust the value.
    pub fn read_count(&self) -> (u64, bool) {
        let inner = self.inner.lock();
        (inner.count, !inner.in_progress)
    }

    /// Claim the in-progress flag for one transition attempt.
    ///
    /// At most one holder at a time; a second claim fails with `Busy`
    /// rather than queueing.
    pub fn try_acquire(&self) -> Result<(), TransitionError> {
        let mut inner = self.inner.lock();
        if inner.in_progress {
            return Err(TransitionError::Busy);
        }
        inner.in_progress = true;
        Ok(())
    }

    /// Clear the in-progress flag. Idempotent.
    pub fn release(&self) {
        self.inner.lock().in_progress = false;
    }

    /// Commit a previously read counter value.
    ///
    /// Fails with `CountMismatch` if the live counter advanced past
    /// `expected`, signaling a wakeup event between read and commit. On a
    /// match, arms in-flight event detection for [`Self::check_pending`].
    pub fn compare_and_commit(&self, expected: u64) -> Result<(), TransitionError> {
        let mut inner = self.inner.lock();
        if inner.count != expected {
            warn!(
                expected,
                current = inner.count,
                sources = ?inner.recent_sources,
                "wakeup events occurred since the count was read"
            );
            return Err(TransitionError::CountMismatch {
                expected,
                current: inner.count,
            });
        }
        inner.armed_at = Some(inner.count);
        inner.pending = false;
        Ok(())
    }

    /// Record one wakeup event from `source`.
    ///
    /// Increments unconditionally; if a requester has committed a count,
    /// the event also flags the in-flight attempt for abort.
    pub fn record_event(&self, source: &str) {
        let mut inner = self.inner.lock();
        inner.count += 1;
        if inner.armed_at.is_some() {
            inner.pending = true;
        }
        if inner.recent_sources.len() == RECENT_SOURCES {
            inner.recent_sources.remove(0);
        }
        inner.recent_sources.push(source.to_string());
        debug!(source, count = inner.count, "wakeup event recorded");
    }

    /// Abort checkpoint polled by the controller between phases.
    ///
    /// Errors when an armed attempt has seen a wakeup event since its
    /// commit.
    pub fn check_pending(&self) -> Result<(), TransitionError> {
        let inner = self.inner.lock();
        if inner.pending {
            return Err(TransitionError::CountMismatch {
                expected: inner.armed_at.unwrap_or(inner.count),
                current: inner.count,
            });
        }
        Ok(())
    }

    /// Drop the armed commit once the attempt it guarded has concluded.
    pub fn disarm(&self) {
        let mut inner = self.inner.lock();
        inner.armed_at = None;
        inner.pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_count_reports_in_progress() {
        let counter = WakeupCounter::new();
        assert_eq!(counter.read_count(), (0, true));

        counter.try_acquire().unwrap();
        assert_eq!(counter.read_count(), (0, false));

        counter.release();
        assert_eq!(counter.read_count(), (0, true));
    }

    #[test]
    fn test_acquire_is_exclusive() {
        let counter = WakeupCounter::new();
        counter.try_acquire().unwrap();
        assert_eq!(counter.try_acquire(), Err(TransitionError::Busy));

        // Release is idempotent.
        counter.release();
        counter.release();
        counter.try_acquire().unwrap();
    }

    #[test]
    fn test_commit_detects_race() {
        let counter = WakeupCounter::new();
        for _ in 0..5 {
            counter.record_event("rtc");
        }
        let (count, ok) = counter.read_count();
        assert!(ok);
        assert_eq!(count, 5);

        counter.record_event("keyboard");

        assert_eq!(
            counter.compare_and_commit(5),
            Err(TransitionError::CountMismatch {
                expected: 5,
                current: 6,
            })
        );
    }

    #[test]
    fn test_commit_arms_pending_detection() {
        let counter = WakeupCounter::new();
        let (count, _) = counter.read_count();
        counter.compare_and_commit(count).unwrap();
        counter.check_pending().unwrap();

        counter.record_event("network");
        let err = counter.check_pending().unwrap_err();
        assert_eq!(
            err,
            TransitionError::CountMismatch {
                expected: 0,
                current: 1,
            }
        );

        counter.disarm();
        counter.check_pending().unwrap();
    }

    #[test]
    fn test_events_without_commit_do_not_flag_abort() {
        let counter = WakeupCounter::new();
        counter.record_event("rtc");
        counter.record_event("rtc");
        counter.check_pending().unwrap();
    }

    #[test]
    fn test_recent_sources_capped() {
        let counter = WakeupCounter::new();
        for i in 0..10 {
            counter.record_event(&format!("source{i}"));
        }
        let inner = counter.inner.lock();
        assert_eq!(inner.recent_sources.len(), RECENT_SOURCES);
        assert_eq!(inner.recent_sources.first().map(String::as_str), Some("source6"));
        assert_eq!(inner.recent_sources.last().map(String::as_str), Some("source9"));
    }
}
