//! # Network Monitor
//!
//! Last known connectivity state, fed by the platform's online/offline
//! notifications.
//!
//! ```text
//!   platform signal ──► set_online(bool) ──┬──► watch::Sender<bool>
//!                                          │      (scheduler, projector)
//!                       (transitions only) └──► on_change listeners
//! ```
//!
//! There is no polling. Repeating the current state is not a transition and
//! notifies nobody.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;
use tracing::info;

type Listener = Arc<dyn Fn(bool) + Send + Sync>;

struct Inner {
    state: watch::Sender<bool>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

impl Inner {
    fn listeners(&self) -> MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Connectivity observer. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct NetworkMonitor {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for NetworkMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkMonitor")
            .field("online", &self.is_online())
            .finish()
    }
}

impl NetworkMonitor {
    /// Creates a monitor seeded with the platform's current signal.
    pub fn new(initial_online: bool) -> Self {
        let (state, _) = watch::channel(initial_online);
        NetworkMonitor {
            inner: Arc::new(Inner {
                state,
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Last known connectivity state.
    pub fn is_online(&self) -> bool {
        *self.inner.state.borrow()
    }

    /// Records a connectivity notification from the platform.
    ///
    /// Returns true if this was a transition.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.inner.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            info!(online, "Connectivity changed");
            // Snapshot so listeners may subscribe or unsubscribe while called.
            let listeners: Vec<Listener> = self
                .inner
                .listeners()
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect();
            for listener in listeners {
                listener(online);
            }
        }

        changed
    }

    /// Registers a callback invoked on every transition with the new state.
    ///
    /// The callback stays registered until the returned [`Subscription`] is
    /// dropped.
    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners().push((id, Arc::new(listener)));
        Subscription {
            id,
            monitor: Arc::downgrade(&self.inner),
        }
    }

    /// Async view of the state, for tasks that `select!` on transitions.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.inner.state.subscribe()
    }
}

/// Keeps an [`on_change`](NetworkMonitor::on_change) listener registered.
#[must_use = "dropping the subscription unregisters the listener"]
pub struct Subscription {
    id: u64,
    monitor: Weak<Inner>,
}

impl Subscription {
    /// Unregisters the listener now.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.monitor.upgrade() {
            inner.listeners().retain(|(id, _)| *id != self.id);
        }
    }
}
