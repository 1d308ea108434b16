//! Ordered phase-change announcements
//!
//! Subscribers are invoked synchronously, in registration order, for every
//! phase transition. The `(Prepare, Enter)` announcement is a vote: the
//! first rejection stops the walk and vetoes the transition. Every other
//! announcement is purely informational; rejections are logged as warnings
//! and the walk continues.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::warn;

use somnus_core::{PhaseDirection, SleepNotifier, SleepPhase, TransitionError};

/// Handle returned by [`NotifierRegistry::register`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotifierId(u64);

struct Registration {
    id: u64,
    subscriber: Arc<dyn SleepNotifier>,
}

/// Ordered list of phase-change subscribers.
#[derive(Default)]
pub struct NotifierRegistry {
    subscribers: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber at the end of the announcement order.
    pub fn register(&self, subscriber: Arc<dyn SleepNotifier>) -> NotifierId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().push(Registration { id, subscriber });
        NotifierId(id)
    }

    /// Remove a subscriber. Returns false if the id was already gone.
    pub fn unregister(&self, id: NotifierId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|registration| registration.id != id.0);
        subscribers.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Announce a phase change to all subscribers in registration order.
    ///
    /// For `(Prepare, Enter)` the first rejection is returned as a
    /// [`TransitionError::PrepareVetoed`] and later subscribers are not
    /// invoked, mirroring a two-phase-commit prepare vote.
    pub fn announce(
        &self,
        phase: SleepPhase,
        direction: PhaseDirection,
    ) -> Result<(), TransitionError> {
        let veto_capable = phase == SleepPhase::Prepare && direction == PhaseDirection::Enter;

        // Snapshot so a callback can re-enter the registry without
        // deadlocking against the list lock.
        let subscribers: Vec<Arc<dyn SleepNotifier>> = self
            .subscribers
            .read()
            .iter()
            .map(|registration| Arc::clone(&registration.subscriber))
            .collect();

        for subscriber in subscribers {
            if let Err(rejection) = subscriber.on_phase(phase, direction) {
                if veto_capable {
                    return Err(TransitionError::PrepareVetoed {
                        subscriber: subscriber.name().to_string(),
                        reason: rejection.reason,
                    });
                }
                warn!(
                    subscriber = subscriber.name(),
                    phase = phase.label(),
                    reason = %rejection.reason,
                    "subscriber rejected a non-veto announcement"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use somnus_core::RecordingNotifier;

    #[test]
    fn test_announce_in_registration_order() {
        let registry = NotifierRegistry::new();
        let first = RecordingNotifier::new("first");
        let second = RecordingNotifier::new("second");
        registry.register(first.clone());
        registry.register(second.clone());

        registry
            .announce(SleepPhase::Suspend, PhaseDirection::Enter)
            .unwrap();

        assert_eq!(first.seen(), vec![(SleepPhase::Suspend, PhaseDirection::Enter)]);
        assert_eq!(second.seen(), vec![(SleepPhase::Suspend, PhaseDirection::Enter)]);
    }

    #[test]
    fn test_prepare_veto_stops_walk() {
        let registry = NotifierRegistry::new();
        let vetoer = RecordingNotifier::new("vetoer");
        vetoer.veto_prepare(true);
        let later = RecordingNotifier::new("later");
        registry.register(vetoer.clone());
        registry.register(later.clone());

        let err = registry
            .announce(SleepPhase::Prepare, PhaseDirection::Enter)
            .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::PrepareVetoed { ref subscriber, .. } if subscriber == "vetoer"
        ));
        // The subscriber after the vetoer was never invoked.
        assert!(later.seen().is_empty());
    }

    #[test]
    fn test_non_veto_rejection_continues() {
        let registry = NotifierRegistry::new();
        let vetoer = RecordingNotifier::new("vetoer");
        vetoer.veto_prepare(true);
        let later = RecordingNotifier::new("later");
        registry.register(vetoer);
        registry.register(later.clone());

        // Prepare on the way out is not veto-capable.
        registry
            .announce(SleepPhase::Complete, PhaseDirection::Exit)
            .unwrap();
        assert_eq!(later.seen().len(), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = NotifierRegistry::new();
        let notifier = RecordingNotifier::new("gone");
        let id = registry.register(notifier.clone());
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(registry.is_empty());

        registry
            .announce(SleepPhase::Prepare, PhaseDirection::Enter)
            .unwrap();
        assert!(notifier.seen().is_empty());
    }
}
