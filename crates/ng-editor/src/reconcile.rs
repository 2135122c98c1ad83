//! Pending-operation reconciler.
//!
//! A drop that lands in a group becomes a [`PendingDrop`] record keyed by
//! the group id. Records are applied against the store as it is at the next
//! reconciliation pass, not as it was when the drop happened, so a group
//! that disappeared in between simply never receives the drop. A record
//! that cannot be applied within the timeout is discarded.
//!
//! Every apply is a single store operation, so a record is applied
//! all-or-nothing.

use crate::claim::DropTicket;
use crate::input::DragPayload;
use ng_core::{GraphStore, NodeId, Point, StoreError};
use std::time::{Duration, Instant};

/// A drop waiting to be applied to a group.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDrop {
    /// Sequence number of the drop ticket that produced this record.
    pub seq: u64,
    pub group_id: NodeId,
    pub payload: DragPayload,
    /// Position relative to the group's origin.
    pub position: Point,
    /// Slot in the group's child sequence; `None` appends.
    pub index: Option<usize>,
}

impl PendingDrop {
    /// The drop ticket this record answers to.
    pub fn ticket(&self) -> DropTicket {
        DropTicket { seq: self.seq }
    }

    /// Write the record to the store. Returns the id of the node that now
    /// sits in the group.
    pub fn apply(&self, store: &mut GraphStore) -> Result<NodeId, StoreError> {
        match &self.payload {
            DragPayload::Element(desc) => {
                let id = store.fresh_node_id(desc.kind.as_str());
                let node = desc
                    .clone()
                    .into_node(id, self.position, Some(self.group_id));
                store.add_node(node, self.index)?;
                Ok(id)
            }
            DragPayload::Node(id) => {
                store.move_into(*id, Some(self.group_id), self.position, self.index)?;
                Ok(*id)
            }
        }
    }
}

/// What happened to a record during a reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Applied {
        seq: u64,
        group_id: NodeId,
        node: NodeId,
    },
    /// Not consumed within the timeout. The error says why it could not be
    /// applied when the group was missing.
    Expired {
        record: PendingDrop,
        reason: Option<StoreError>,
    },
    /// The store refused the mutation; nothing was written.
    Rejected {
        record: PendingDrop,
        error: StoreError,
    },
}

#[derive(Debug)]
struct Entry {
    record: PendingDrop,
    submitted_at: Instant,
}

/// Holds at most one pending record per group.
#[derive(Debug)]
pub struct Reconciler {
    entries: Vec<Entry>,
    timeout: Duration,
}

impl Reconciler {
    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: Vec::new(),
            timeout,
        }
    }

    /// How long a record may wait before it is discarded.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The record queued for `group_id`, if any.
    pub fn get(&self, group_id: NodeId) -> Option<&PendingDrop> {
        self.entries
            .iter()
            .find(|e| e.record.group_id == group_id)
            .map(|e| &e.record)
    }

    /// Queue `record`, replacing any unconsumed record for the same group.
    /// Returns the replaced record.
    pub fn submit(&mut self, record: PendingDrop, now: Instant) -> Option<PendingDrop> {
        let entry = Entry {
            record,
            submitted_at: now,
        };
        match self
            .entries
            .iter_mut()
            .find(|e| e.record.group_id == entry.record.group_id)
        {
            Some(slot) => {
                log::debug!(
                    "reconcile: #{} replaces #{} for {}",
                    entry.record.seq,
                    slot.record.seq,
                    slot.record.group_id
                );
                Some(std::mem::replace(slot, entry).record)
            }
            None => {
                self.entries.push(entry);
                None
            }
        }
    }

    /// Discard every record older than the timeout.
    #[must_use = "expired records are reported, not retried"]
    pub fn expire(&mut self, store: &GraphStore, now: Instant) -> Vec<ReconcileOutcome> {
        let timeout = self.timeout;
        let (expired, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| now.saturating_duration_since(e.submitted_at) >= timeout);
        self.entries = live;
        expired
            .into_iter()
            .map(|e| {
                let reason = (!store.contains(e.record.group_id))
                    .then_some(StoreError::GroupNotFound(e.record.group_id));
                log::warn!(
                    "reconcile: #{} for {} expired unapplied",
                    e.record.seq,
                    e.record.group_id
                );
                ReconcileOutcome::Expired {
                    record: e.record,
                    reason,
                }
            })
            .collect()
    }

    /// Expire stale records, then apply every record whose group exists.
    /// Records for missing groups stay queued until they expire.
    #[must_use = "reconcile outcomes report expired and rejected drops"]
    pub fn reconcile(&mut self, store: &mut GraphStore, now: Instant) -> Vec<ReconcileOutcome> {
        let mut outcomes = self.expire(store, now);
        let mut waiting = Vec::new();
        for entry in std::mem::take(&mut self.entries) {
            if !store.contains(entry.record.group_id) {
                waiting.push(entry);
                continue;
            }
            let record = entry.record;
            match record.apply(store) {
                Ok(node) => {
                    log::debug!(
                        "reconcile: #{} applied {node} into {}",
                        record.seq,
                        record.group_id
                    );
                    outcomes.push(ReconcileOutcome::Applied {
                        seq: record.seq,
                        group_id: record.group_id,
                        node,
                    });
                }
                Err(error) => {
                    log::warn!("reconcile: #{} rejected: {error}", record.seq);
                    outcomes.push(ReconcileOutcome::Rejected { record, error });
                }
            }
        }
        self.entries = waiting;
        outcomes
    }

    /// Drop every queued record without applying it.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ng_core::{ElementDescriptor, Node};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    fn element_drop(seq: u64, group: &str) -> PendingDrop {
        PendingDrop {
            seq,
            group_id: id(group),
            payload: DragPayload::Element(ElementDescriptor::new(
                "textNode",
                json!({ "label": "Text" }),
            )),
            position: Point::new(50.0, 30.0),
            index: None,
        }
    }

    fn store() -> GraphStore {
        let mut store = GraphStore::new();
        store
            .add_node(Node::group(id("rg"), Point::new(300.0, 200.0)), None)
            .unwrap();
        store
    }

    #[test]
    fn applies_when_group_exists() {
        let mut store = store();
        let mut reconciler = Reconciler::new(Duration::from_millis(1000));
        let t0 = Instant::now();
        reconciler.submit(element_drop(1, "rg"), t0);

        let outcomes = reconciler.reconcile(&mut store, t0);
        let [ReconcileOutcome::Applied { node, .. }] = outcomes.as_slice() else {
            panic!("expected one applied record, got {outcomes:?}");
        };
        let created = store.node(*node).unwrap();
        assert_eq!(created.parent_id, Some(id("rg")));
        assert_eq!(created.position, Point::new(50.0, 30.0));
        assert_eq!(created.data, json!({ "label": "Text" }));
        assert!(reconciler.is_empty());
    }

    #[test]
    fn newer_record_replaces_older() {
        let mut reconciler = Reconciler::new(Duration::from_millis(1000));
        let t0 = Instant::now();
        assert!(reconciler.submit(element_drop(1, "rg"), t0).is_none());
        let replaced = reconciler.submit(element_drop(2, "rg"), t0).unwrap();
        assert_eq!(replaced.seq, 1);
        assert_eq!(reconciler.len(), 1);
        assert_eq!(reconciler.get(id("rg")).unwrap().seq, 2);
    }

    #[test]
    fn missing_group_waits_then_expires() {
        let mut store = store();
        let mut reconciler = Reconciler::new(Duration::from_millis(1000));
        let t0 = Instant::now();
        reconciler.submit(element_drop(1, "rg-missing"), t0);

        assert!(
            reconciler
                .reconcile(&mut store, t0 + Duration::from_millis(500))
                .is_empty()
        );
        assert_eq!(reconciler.len(), 1);

        let outcomes = reconciler.reconcile(&mut store, t0 + Duration::from_millis(1000));
        assert_eq!(
            outcomes,
            vec![ReconcileOutcome::Expired {
                record: element_drop(1, "rg-missing"),
                reason: Some(StoreError::GroupNotFound(id("rg-missing"))),
            }]
        );
        assert_eq!(store.len(), 1);
        assert!(reconciler.is_empty());
    }

    #[test]
    fn rejected_record_leaves_store_untouched() {
        let mut store = store();
        let before = store.snapshot();
        let mut reconciler = Reconciler::new(Duration::from_millis(1000));
        let t0 = Instant::now();
        reconciler.submit(
            PendingDrop {
                payload: DragPayload::Node(id("rg-ghost")),
                ..element_drop(1, "rg")
            },
            t0,
        );

        let outcomes = reconciler.reconcile(&mut store, t0);
        assert!(matches!(
            outcomes.as_slice(),
            [ReconcileOutcome::Rejected {
                error: StoreError::NodeNotFound(_),
                ..
            }]
        ));
        assert_eq!(store.snapshot(), before);
        assert!(reconciler.is_empty());
    }

    #[test]
    fn existing_node_moves_into_group_at_index() {
        let mut store = store();
        for (name, y) in [("rc1", 76.0), ("rc2", 164.0)] {
            store
                .add_node(
                    Node::new(id(name), "textNode", Point::new(20.0, y)).with_parent(id("rg")),
                    None,
                )
                .unwrap();
        }
        store
            .add_node(Node::new(id("rf"), "textNode", Point::new(10.0, 10.0)), None)
            .unwrap();

        let record = PendingDrop {
            seq: 7,
            group_id: id("rg"),
            payload: DragPayload::Node(id("rf")),
            position: Point::new(20.0, 120.0),
            index: Some(1),
        };
        assert_eq!(record.apply(&mut store), Ok(id("rf")));
        assert_eq!(store.child_ids(id("rg")), vec![id("rc1"), id("rf"), id("rc2")]);
        assert_eq!(store.node(id("rf")).unwrap().position, Point::new(20.0, 120.0));
        store.check_invariants().unwrap();
    }
}
