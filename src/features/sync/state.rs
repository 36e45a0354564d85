//! Observable sync state.
//!
//! One [`SyncStateStore`] is created per process and handed to everything
//! that reads or writes the state. Listeners receive a full snapshot
//! synchronously after every change.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::operation::ErrorType;

/// Snapshot of the sync engine's observable state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncState {
    pub is_syncing: bool,
    /// Queue rows that are pending, in flight or failed
    pub pending_count: usize,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_type: Option<ErrorType>,
    pub last_error_details: Option<Value>,
    /// Round trip of the last successful request, in milliseconds
    pub latency: Option<u64>,
}

impl SyncState {
    /// Record a failure, replacing any previous one.
    pub fn set_error(
        &mut self,
        message: impl Into<String>,
        kind: ErrorType,
        details: Option<Value>,
    ) {
        self.last_error = Some(message.into());
        self.last_error_type = Some(kind);
        self.last_error_details = details;
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
        self.last_error_type = None;
        self.last_error_details = None;
    }
}

type Listener = Arc<dyn Fn(&SyncState) + Send + Sync>;

struct Inner {
    state: SyncState,
    listeners: Vec<(u64, Listener)>,
    next_id: u64,
    disposed: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    // Serializes notification so listeners see snapshots in order
    dispatch: Mutex<()>,
}

/// Injectable container for [`SyncState`].
///
/// Cloning shares the same state. Listeners run on the thread that made the
/// change, after the state lock is released; they may read the state or
/// unsubscribe but must not update it.
#[derive(Clone)]
pub struct SyncStateStore {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for SyncStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncStateStore")
            .field("state", &self.get_state())
            .finish_non_exhaustive()
    }
}

impl Default for SyncStateStore {
    fn default() -> Self {
        Self::new(SyncState::default())
    }
}

impl SyncStateStore {
    #[must_use]
    pub fn new(initial: SyncState) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: initial,
                    listeners: Vec::new(),
                    next_id: 0,
                    disposed: false,
                }),
                dispatch: Mutex::new(()),
            }),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        lock(&self.shared.inner)
    }

    /// Current snapshot.
    #[must_use]
    pub fn get_state(&self) -> SyncState {
        self.inner().state.clone()
    }

    /// Register a listener for state changes.
    ///
    /// The listener stays attached until the returned [`Subscription`] is
    /// dropped or unsubscribed. After [`dispose`](Self::dispose) the
    /// subscription is inert.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncState) + Send + Sync + 'static,
    {
        let mut inner = self.inner();
        if inner.disposed {
            return Subscription {
                shared: Weak::new(),
                id: 0,
            };
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push((id, Arc::new(listener)));

        Subscription {
            shared: Arc::downgrade(&self.shared),
            id,
        }
    }

    /// Apply a change and notify listeners if the state differs.
    ///
    /// Returns the new snapshot.
    pub fn update<F>(&self, change: F) -> SyncState
    where
        F: FnOnce(&mut SyncState),
    {
        let _dispatch = lock(&self.shared.dispatch);

        let (snapshot, listeners) = {
            let mut inner = self.inner();
            let before = inner.state.clone();
            change(&mut inner.state);

            if inner.state == before {
                return before;
            }

            let listeners: Vec<Listener> =
                inner.listeners.iter().map(|(_, l)| Arc::clone(l)).collect();
            (inner.state.clone(), listeners)
        };

        for listener in listeners {
            listener(&snapshot);
        }

        snapshot
    }

    /// Publish a recomputed queue length.
    pub fn set_pending_count(&self, count: usize) {
        self.update(|state| state.pending_count = count);
    }

    /// Number of attached listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner().listeners.len()
    }

    /// Detach every listener. Later subscriptions are ignored.
    pub fn dispose(&self) {
        let mut inner = self.inner();
        inner.disposed = true;
        inner.listeners.clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // State stays consistent even if a listener panicked mid-dispatch
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle returned by [`SyncStateStore::subscribe`].
#[must_use = "dropping a Subscription detaches its listener"]
pub struct Subscription {
    shared: Weak<Shared>,
    id: u64,
}

impl Subscription {
    /// Detach the listener.
    pub fn unsubscribe(self) {
        // Drop does the work
    }

    fn detach(&self) {
        if let Some(shared) = self.shared.upgrade() {
            lock(&shared.inner)
                .listeners
                .retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
