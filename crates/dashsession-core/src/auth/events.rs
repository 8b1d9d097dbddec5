//! `authChanged` notifications.
//!
//! Listeners are called synchronously inside [`EventBus::emit`], so anyone
//! subscribed before a state change observes it before the triggering call
//! returns. There is no replay for late subscribers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name of the process-wide channel the events travel on
pub const AUTH_CHANGED: &str = "authChanged";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    TokenRefreshed { token: String },
    Logout,
}

impl SessionEvent {
    pub fn is_logout(&self) -> bool {
        matches!(self, SessionEvent::Logout)
    }
}

type Listener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Subscription(u64);

#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    listeners: Mutex<BTreeMap<Subscription, Listener>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn listeners(&self) -> MutexGuard<'_, BTreeMap<Subscription, Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = Subscription(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners().insert(id, Arc::new(listener));
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.listeners().remove(&subscription).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners().len()
    }

    /// Deliver `event` to every current listener.
    pub fn emit(&self, event: &SessionEvent) {
        // Snapshot so listeners may (un)subscribe without deadlocking
        let listeners: Vec<Listener> = self.listeners().values().cloned().collect();
        debug!(
            channel = AUTH_CHANGED,
            logout = event.is_logout(),
            listeners = listeners.len(),
            "Broadcasting session event"
        );
        for listener in listeners {
            listener(event);
        }
    }
}
