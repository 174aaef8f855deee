//! Cache change notifications.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::project::ProjectId;
use crate::realtime::DeltaOutcome;

/// Handle returned by [`Observers::subscribe`].
pub type SubscriptionId = u64;

/// Why the cache changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeReason {
    /// A full reload replaced the cache
    Reloaded,
    /// A realtime delta was applied
    Delta(DeltaOutcome),
    /// An update was applied ahead of remote confirmation
    Optimistic(ProjectId),
    /// A failed update was rolled back to its snapshot
    Reverted(ProjectId),
    /// The post-mutation reload failed; the confirmed change was applied directly
    PointReconciled(ProjectId),
}

/// Notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheChange {
    pub reason: ChangeReason,
    /// Increments by one per notification
    pub revision: u64,
}

type Callback = Arc<dyn Fn(&CacheChange) + Send + Sync>;

/// Subscriber list. Callbacks run synchronously on the notifying thread.
#[derive(Default)]
pub struct Observers {
    next_id: AtomicU64,
    revision: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, Callback)>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&CacheChange) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        id
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// Deliver one notification to every subscriber.
    ///
    /// The list is copied out first so callbacks may subscribe or
    /// unsubscribe without deadlocking.
    pub fn notify(&self, reason: ChangeReason) -> CacheChange {
        let change = CacheChange {
            reason,
            revision: self.revision.fetch_add(1, Ordering::SeqCst) + 1,
        };
        let callbacks: Vec<Callback> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(&change);
        }
        change
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("subscribers", &self.len())
            .field("revision", &self.revision())
            .finish()
    }
}
