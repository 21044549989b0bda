//! In-process reference implementation of the sync channel.
//!
//! # Responsibility
//! - Hold a hierarchical JSON tree with the hosted store's observable rules.
//! - Fan out full collection snapshots to subscribers after each change.
//!
//! # Invariants
//! - Object keys iterate in sorted order (matches hosted key ordering).
//! - Writing `null` removes a node; empty parents are pruned.
//! - Snapshots for one subscriber are sent in mutation order.
//!
//! Clones share the same tree, so several engines can observe one store the
//! way several devices observe one hosted database.

use crate::sync::channel::{
    ChannelError, ChannelResult, CollectionSnapshot, Snapshot, SnapshotEvent, Subscription,
    SyncChannel,
};
use crate::sync::path::StorePath;
use crossbeam_channel::Sender;
use log::{debug, warn};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};
use uuid::Uuid;

struct Subscriber {
    id: u64,
    list_id: String,
    sender: Sender<SnapshotEvent>,
}

struct StoreState {
    root: Value,
    subscribers: Vec<Subscriber>,
    next_subscriber_id: u64,
    available: bool,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            root: Value::Object(Map::new()),
            subscribers: Vec::new(),
            next_subscriber_id: 1,
            available: true,
        }
    }
}

/// Thread-safe in-memory keyed store.
#[derive(Clone, Default)]
pub struct MemorySyncChannel {
    state: Arc<Mutex<StoreState>>,
}

impl MemorySyncChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates connectivity loss: every operation fails while unavailable.
    pub fn set_available(&self, available: bool) {
        self.state.lock().available = available;
    }

    /// Pushes a transport failure to every subscriber of `list_id`.
    pub fn inject_error(&self, list_id: &str, cause: &str) {
        let mut state = self.state.lock();
        let error = ChannelError::new(cause);
        state.subscribers.retain(|subscriber| {
            subscriber.list_id != list_id || subscriber.sender.send(Err(error.clone())).is_ok()
        });
    }

    /// Number of live subscriptions on `list_id`.
    pub fn subscriber_count(&self, list_id: &str) -> usize {
        self.state
            .lock()
            .subscribers
            .iter()
            .filter(|subscriber| subscriber.list_id == list_id)
            .count()
    }

    /// Raw value stored at `path`, if any.
    pub fn value_at(&self, path: &StorePath) -> Option<Value> {
        let state = self.state.lock();
        node_at(&state.root, path.segments()).cloned()
    }

    fn ensure_available(state: &StoreState) -> ChannelResult<()> {
        if state.available {
            Ok(())
        } else {
            Err(ChannelError::new("store unavailable"))
        }
    }

    fn notify_affected(state: &mut StoreState, changed: &StorePath) {
        let root = &state.root;
        state.subscribers.retain(|subscriber| {
            let tasks_path = match StorePath::tasks(&subscriber.list_id) {
                Ok(path) => path,
                Err(_) => return false,
            };
            if !tasks_path.overlaps(changed) {
                return true;
            }
            let snapshot = CollectionSnapshot::from_node(
                subscriber.list_id.as_str(),
                node_at(root, tasks_path.segments()),
            );
            subscriber.sender.send(Ok(snapshot)).is_ok()
        });
    }

    fn unsubscribe(state: &Weak<Mutex<StoreState>>, subscriber_id: u64) {
        if let Some(state) = state.upgrade() {
            state
                .lock()
                .subscribers
                .retain(|subscriber| subscriber.id != subscriber_id);
            debug!("event=channel_unsubscribe module=sync status=ok subscriber_id={subscriber_id}");
        }
    }
}

impl SyncChannel for MemorySyncChannel {
    fn subscribe_collection(&self, list_id: &str) -> ChannelResult<Subscription> {
        let tasks_path = StorePath::tasks(list_id)?;
        let mut state = self.state.lock();
        Self::ensure_available(&state)?;

        let (sender, receiver) = crossbeam_channel::unbounded();
        let initial = CollectionSnapshot::from_node(
            tasks_path.segments()[1].as_str(),
            node_at(&state.root, tasks_path.segments()),
        );
        sender
            .send(Ok(initial))
            .map_err(|_| ChannelError::new("subscriber dropped before first snapshot"))?;

        let subscriber_id = state.next_subscriber_id;
        state.next_subscriber_id += 1;
        state.subscribers.push(Subscriber {
            id: subscriber_id,
            list_id: tasks_path.segments()[1].clone(),
            sender,
        });
        debug!(
            "event=channel_subscribe module=sync status=ok subscriber_id={subscriber_id} path={tasks_path}"
        );

        let weak = Arc::downgrade(&self.state);
        Ok(Subscription::new(receiver, move || {
            Self::unsubscribe(&weak, subscriber_id)
        }))
    }

    fn read_once(&self, path: &StorePath) -> ChannelResult<Snapshot> {
        let state = self.state.lock();
        Self::ensure_available(&state)?;
        let value = node_at(&state.root, path.segments()).cloned();
        Ok(Snapshot::new(path.clone(), value))
    }

    fn write(&self, path: &StorePath, value: Value) -> ChannelResult<()> {
        let mut state = self.state.lock();
        Self::ensure_available(&state)?;
        if value.is_null() {
            remove_node(&mut state.root, path.segments());
        } else {
            set_node(&mut state.root, path.segments(), value);
        }
        Self::notify_affected(&mut state, path);
        Ok(())
    }

    fn remove(&self, path: &StorePath) -> ChannelResult<()> {
        let mut state = self.state.lock();
        Self::ensure_available(&state)?;
        if !remove_node(&mut state.root, path.segments()) {
            warn!("event=channel_remove module=sync status=noop path={path}");
        }
        Self::notify_affected(&mut state, path);
        Ok(())
    }

    fn generate_key(&self) -> String {
        // v7 ids sort by creation time, so new tasks iterate after older ones.
        Uuid::now_v7().simple().to_string()
    }
}

fn node_at<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
}

fn set_node(root: &mut Value, segments: &[String], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return;
    };
    let mut node = root;
    for segment in parents {
        node = object_mut(node)
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    object_mut(node).insert(last.clone(), value);
}

fn object_mut(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced by an object"),
    }
}

/// Removes the node and prunes parents left empty. Returns whether a node
/// existed.
fn remove_node(node: &mut Value, segments: &[String]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return false;
    };
    let Value::Object(map) = node else {
        return false;
    };
    if rest.is_empty() {
        return map.remove(first).is_some();
    }
    let Some(child) = map.get_mut(first) else {
        return false;
    };
    let removed = remove_node(child, rest);
    if child.as_object().is_some_and(Map::is_empty) {
        map.remove(first);
    }
    removed
}
