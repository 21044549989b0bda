//! Snapshot reconciliation.
//!
//! # Responsibility
//! - Decode a full collection snapshot into tasks keyed by store id.
//! - Produce the canonical order: due date ascending, undated tasks last.
//! - Collapse a burst of queued snapshots into the latest one.
//!
//! # Invariants
//! - Malformed records are skipped, never fatal.
//! - Sorting is stable, so undated tasks keep snapshot order.
//! - Output contains no duplicate ids.

use crate::model::task::Task;
use crate::sync::channel::{ChannelError, CollectionSnapshot, SnapshotEvent};
use crossbeam_channel::Receiver;
use log::debug;
use std::collections::HashMap;

/// A snapshot entry excluded because it could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeSkip {
    pub key: String,
    pub reason: String,
}

/// Result of reconciling one snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reconciled {
    /// Canonical ordered collection.
    pub tasks: Vec<Task>,
    pub skipped: Vec<DecodeSkip>,
}

/// Decodes and orders a full collection snapshot.
pub fn reconcile(snapshot: &CollectionSnapshot) -> Reconciled {
    let mut tasks: Vec<Task> = Vec::with_capacity(snapshot.len());
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(snapshot.len());
    let mut skipped = Vec::new();

    for (key, record) in &snapshot.entries {
        let task = match Task::from_record(key, record) {
            Ok(task) => task,
            Err(err) => {
                debug!(
                    "event=snapshot_decode module=view status=skip list_id={} key={} error={}",
                    snapshot.list_id, key, err
                );
                skipped.push(DecodeSkip {
                    key: key.clone(),
                    reason: err.to_string(),
                });
                continue;
            }
        };

        match positions.get(key.as_str()) {
            Some(&index) => tasks[index] = task,
            None => {
                positions.insert(key.as_str(), tasks.len());
                tasks.push(task);
            }
        }
    }

    sort_canonical(&mut tasks);
    Reconciled { tasks, skipped }
}

/// Stable sort by due date ascending; tasks without a due date go last.
pub fn sort_canonical(tasks: &mut [Task]) {
    tasks.sort_by_key(|task| (task.due_date.is_none(), task.due_date));
}

/// Queue state after collapsing pending notifications.
#[derive(Debug, Default)]
pub struct Drained {
    /// Most recent snapshot seen, if any.
    pub latest: Option<CollectionSnapshot>,
    /// Transport errors seen while draining, in arrival order.
    pub errors: Vec<ChannelError>,
    /// Snapshots dropped because a later one superseded them.
    pub superseded: usize,
}

impl Drained {
    fn absorb(&mut self, event: SnapshotEvent) {
        match event {
            Ok(snapshot) => {
                if self.latest.replace(snapshot).is_some() {
                    self.superseded += 1;
                }
            }
            Err(err) => self.errors.push(err),
        }
    }
}

/// Starts from an already received event and drains everything queued behind
/// it. Only the latest snapshot survives; earlier ones are dropped.
pub fn drain_latest(first: SnapshotEvent, events: &Receiver<SnapshotEvent>) -> Drained {
    let mut drained = Drained::default();
    drained.absorb(first);
    while let Ok(event) = events.try_recv() {
        drained.absorb(event);
    }
    drained
}

#[cfg(test)]
mod tests {
    use super::{drain_latest, reconcile};
    use crate::sync::channel::{ChannelError, CollectionSnapshot};
    use serde_json::json;

    fn snapshot(entries: Vec<(&str, serde_json::Value)>) -> CollectionSnapshot {
        CollectionSnapshot::new(
            "list",
            entries
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        )
    }

    #[test]
    fn skips_malformed_records_and_keeps_the_rest() {
        let result = reconcile(&snapshot(vec![
            ("a", json!({"title": "A"})),
            ("bad", json!({"title": ["not", "a", "string"]})),
            ("c", json!(17)),
        ]));

        assert_eq!(result.tasks.len(), 1);
        assert_eq!(result.tasks[0].id.as_deref(), Some("a"));
        let skipped = result
            .skipped
            .iter()
            .map(|skip| skip.key.as_str())
            .collect::<Vec<_>>();
        assert_eq!(skipped, vec!["bad", "c"]);
    }

    #[test]
    fn duplicate_keys_collapse_to_last_entry() {
        let result = reconcile(&snapshot(vec![
            ("a", json!({"title": "first"})),
            ("a", json!({"title": "second"})),
        ]));

        assert_eq!(result.tasks.len(), 1);
        assert_eq!(result.tasks[0].title, "second");
    }

    #[test]
    fn drain_keeps_latest_snapshot_and_collects_errors() {
        let (sender, receiver) = crossbeam_channel::unbounded();
        sender
            .send(Err(ChannelError::new("flaky")))
            .expect("send error");
        sender
            .send(Ok(snapshot(vec![("b", json!({"title": "B"}))])))
            .expect("send second");

        let first = Ok(snapshot(vec![("a", json!({"title": "A"}))]));
        let drained = drain_latest(first, &receiver);

        let latest = drained.latest.expect("latest snapshot");
        assert_eq!(latest.entries[0].0, "b");
        assert_eq!(drained.superseded, 1);
        assert_eq!(drained.errors, vec![ChannelError::new("flaky")]);
    }
}
