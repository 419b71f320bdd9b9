//! Routing of `cfx_subscription` push messages.
//!
//! Subscriptions live only as long as the connection that opened them. When
//! the connection drops, [`SubscriptionManager::clear`] drops every sender so
//! the caller's feed ends instead of being silently re-established.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::mpsc;

/// A unique subscription ID returned by `cfx_subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub String);

impl From<String> for SubscriptionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Active subscriptions of one connection.
#[derive(Clone, Default)]
pub struct SubscriptionManager {
    entries: Arc<Mutex<HashMap<SubscriptionId, mpsc::UnboundedSender<Value>>>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<SubscriptionId, mpsc::UnboundedSender<Value>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new subscription and return the feed it delivers to.
    pub fn register(&self, id: SubscriptionId) -> mpsc::UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.entries().insert(id, tx);
        rx
    }

    /// Forward an incoming notification to the correct subscription.
    ///
    /// A feed whose receiver is gone is forgotten.
    pub fn dispatch(&self, id: &SubscriptionId, message: Value) {
        let mut entries = self.entries();
        let Some(sender) = entries.get(id) else {
            tracing::debug!(subscription = %id, "notification for unknown subscription");
            return;
        };
        if sender.send(message).is_err() {
            entries.remove(id);
        }
    }

    /// Remove a subscription (e.g. after `cfx_unsubscribe`). Returns `true`
    /// if it was active.
    pub fn remove(&self, id: &SubscriptionId) -> bool {
        self.entries().remove(id).is_some()
    }

    /// Drop every subscription, closing all feeds.
    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns `true` if there are no active subscriptions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_dispatch() {
        let mgr = SubscriptionManager::new();
        let id = SubscriptionId("0xdeadbeef".into());
        let mut rx = mgr.register(id.clone());

        mgr.dispatch(&id, serde_json::json!({"epochNumber": "0x1"}));

        let msg = rx.try_recv().unwrap();
        assert_eq!(msg["epochNumber"], "0x1");
    }

    #[test]
    fn remove_subscription() {
        let mgr = SubscriptionManager::new();
        let id = SubscriptionId("0x1".into());
        let _rx = mgr.register(id.clone());
        assert_eq!(mgr.len(), 1);
        assert!(mgr.remove(&id));
        assert!(!mgr.remove(&id));
        assert!(mgr.is_empty());
    }

    #[test]
    fn clear_closes_every_feed() {
        let mgr = SubscriptionManager::new();
        let mut a = mgr.register(SubscriptionId("0xa".into()));
        let mut b = mgr.register(SubscriptionId("0xb".into()));

        mgr.clear();

        assert!(matches!(a.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));
        assert!(matches!(b.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));
    }

    #[test]
    fn dropped_receiver_is_forgotten() {
        let mgr = SubscriptionManager::new();
        let id = SubscriptionId("0xc".into());
        drop(mgr.register(id.clone()));
        mgr.dispatch(&id, Value::Null);
        assert!(mgr.is_empty());
    }
}
