//! Remote sync channel contract.
//!
//! # Responsibility
//! - Describe the keyed real-time store consumed by the list engine.
//! - Carry snapshots and transport failures as plain values.
//!
//! # Invariants
//! - `subscribe_collection` emits the current state once immediately, then a
//!   complete snapshot after every change under `lists/{listId}/tasks`.
//! - Dropping a `Subscription` unsubscribes; no event is delivered afterwards.

use crate::sync::path::{PathError, StorePath};
use crossbeam_channel::Receiver;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ChannelResult<T> = Result<T, ChannelError>;

/// Transport, read or write failure reported by a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelError {
    cause: String,
}

impl ChannelError {
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
        }
    }

    /// Human-readable failure cause.
    pub fn cause(&self) -> &str {
        &self.cause
    }
}

impl Display for ChannelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "sync channel error: {}", self.cause)
    }
}

impl Error for ChannelError {}

impl From<PathError> for ChannelError {
    fn from(value: PathError) -> Self {
        Self::new(value.to_string())
    }
}

/// Point-in-time value at one store path.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    path: StorePath,
    value: Option<Value>,
}

impl Snapshot {
    pub fn new(path: StorePath, value: Option<Value>) -> Self {
        Self { path, value }
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Returns whether anything is stored at this path.
    pub fn exists(&self) -> bool {
        !matches!(self.value, None | Some(Value::Null))
    }

    /// Number of direct children; leaves and absent nodes have none.
    pub fn children_count(&self) -> usize {
        match &self.value {
            Some(Value::Object(map)) => map.len(),
            Some(Value::Array(items)) => items.iter().filter(|item| !item.is_null()).count(),
            _ => 0,
        }
    }
}

/// Complete task subtree of one list, in store iteration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionSnapshot {
    pub list_id: String,
    pub entries: Vec<(String, Value)>,
}

impl CollectionSnapshot {
    pub fn new(list_id: impl Into<String>, entries: Vec<(String, Value)>) -> Self {
        Self {
            list_id: list_id.into(),
            entries,
        }
    }

    /// Builds a snapshot from the raw `tasks` node; absent or non-object
    /// nodes yield an empty collection.
    pub fn from_node(list_id: impl Into<String>, node: Option<&Value>) -> Self {
        let entries = match node {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            _ => Vec::new(),
        };
        Self::new(list_id, entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One notification delivered on a collection subscription.
pub type SnapshotEvent = Result<CollectionSnapshot, ChannelError>;

/// Live collection subscription. Unsubscribes when dropped.
pub struct Subscription {
    events: Receiver<SnapshotEvent>,
    on_cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(events: Receiver<SnapshotEvent>, on_cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            events,
            on_cancel: Some(Box::new(on_cancel)),
        }
    }

    /// Notification stream for this subscription.
    pub fn events(&self) -> &Receiver<SnapshotEvent> {
        &self.events
    }

    /// Explicitly unsubscribes. Equivalent to dropping the handle.
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(on_cancel) = self.on_cancel.take() {
            on_cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

/// Keyed hierarchical real-time store.
pub trait SyncChannel: Send + Sync {
    /// Opens a full-snapshot subscription on `lists/{list_id}/tasks`.
    fn subscribe_collection(&self, list_id: &str) -> ChannelResult<Subscription>;

    /// One-shot read of any path.
    fn read_once(&self, path: &StorePath) -> ChannelResult<Snapshot>;

    /// Upsert: replaces whatever was stored at `path`.
    fn write(&self, path: &StorePath, value: Value) -> ChannelResult<()>;

    fn remove(&self, path: &StorePath) -> ChannelResult<()>;

    /// Store-side key generation for new children (push keys).
    fn generate_key(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::{CollectionSnapshot, Snapshot, Subscription};
    use crate::sync::path::StorePath;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn snapshot_existence_and_children() {
        let path = StorePath::users("abc").expect("valid path");
        let users = Snapshot::new(path.clone(), Some(json!({"u1": true, "u2": true})));
        assert!(users.exists());
        assert_eq!(users.children_count(), 2);

        let absent = Snapshot::new(path, None);
        assert!(!absent.exists());
        assert_eq!(absent.children_count(), 0);
    }

    #[test]
    fn collection_snapshot_from_missing_node_is_empty() {
        let snapshot = CollectionSnapshot::from_node("abc", None);
        assert!(snapshot.is_empty());

        let node = json!({"b": {"title": "B"}, "a": {"title": "A"}});
        let snapshot = CollectionSnapshot::from_node("abc", Some(&node));
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn dropping_subscription_runs_cancel_once() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let (_sender, receiver) = crossbeam_channel::unbounded();
        let subscription = Subscription::new(receiver, move || {
            assert!(!flag.swap(true, Ordering::SeqCst), "cancel must run once");
        });

        subscription.cancel();
        assert!(cancelled.load(Ordering::SeqCst));
    }
}
