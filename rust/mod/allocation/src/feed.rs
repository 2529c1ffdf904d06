//! In-process change feed for allocation and history rows.
//!
//! Events are hints for subscribers to re-fetch; they carry ids, not row
//! contents. The ledger publishes only after a transaction commits, and
//! publishing with no subscribers does nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;

/// Table an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Allocations,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// A row-level change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub op: ChangeOp,
    pub college_id: String,
    pub record_id: String,
}

/// Callback type for change notifications.
pub type ChangeHandler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Handle returned by [`ChangeFeed::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    /// `None` receives events for every college.
    college_id: Option<String>,
    handler: ChangeHandler,
}

/// Per-college subscriber registry.
pub struct ChangeFeed {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `handler` for one college, or all colleges with `None`.
    pub fn subscribe(
        &self,
        college_id: Option<&str>,
        handler: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let sub = Subscription {
            id,
            college_id: college_id.map(str::to_string),
            handler: Arc::new(handler),
        };
        self.subscriptions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(sub);
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.write().unwrap_or_else(|e| e.into_inner());
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Deliver `event` to every matching subscriber.
    pub fn publish(&self, event: &ChangeEvent) {
        // Clone matching handlers out so a handler may (un)subscribe.
        let handlers: Vec<ChangeHandler> = self
            .subscriptions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|s| s.college_id.as_deref().is_none_or(|c| c == event.college_id))
            .map(|s| Arc::clone(&s.handler))
            .collect();

        for handler in handlers {
            handler(event);
        }
    }

    pub fn publish_all(&self, events: &[ChangeEvent]) {
        for event in events {
            self.publish(event);
        }
    }
}
