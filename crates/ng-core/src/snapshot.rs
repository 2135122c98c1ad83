//! `{nodes, edges}` snapshots exchanged with persistence / import-export.
//!
//! Child order inside a group is the order in which the children appear in
//! `nodes`. Any snapshot that passes [`GraphSnapshot::validate`] is a valid
//! starting state for a [`GraphStore`].

use crate::error::{SnapshotError, StoreError};
use crate::id::{EdgeId, NodeId};
use crate::model::{Edge, Node};
use crate::store::GraphStore;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl GraphSnapshot {
    /// Check the data-model invariants without building a store.
    pub fn validate(&self) -> Result<(), StoreError> {
        let mut by_id: HashMap<NodeId, &Node> = HashMap::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if by_id.insert(node.id, node).is_some() {
                return Err(StoreError::DuplicateId(node.id.to_string()));
            }
        }

        for node in &self.nodes {
            let Some(parent_id) = node.parent_id else {
                continue;
            };
            if parent_id == node.id || node.is_group() {
                return Err(StoreError::CyclicParent {
                    node: node.id,
                    parent: parent_id,
                });
            }
            let parent = by_id
                .get(&parent_id)
                .ok_or(StoreError::GroupNotFound(parent_id))?;
            if parent.parent_id.is_some() {
                return Err(StoreError::CyclicParent {
                    node: node.id,
                    parent: parent_id,
                });
            }
            if !parent.is_group() {
                return Err(StoreError::NotAGroup(parent_id));
            }
        }

        let mut edge_ids: HashSet<EdgeId> = HashSet::with_capacity(self.edges.len());
        for edge in &self.edges {
            if !edge_ids.insert(edge.id) {
                return Err(StoreError::DuplicateId(edge.id.to_string()));
            }
            for endpoint in [edge.source, edge.target] {
                if !by_id.contains_key(&endpoint) {
                    return Err(StoreError::DanglingEdge {
                        edge: edge.id,
                        node: endpoint,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Compact binary encoding (MessagePack, field names preserved).
    pub fn to_msgpack(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

impl GraphStore {
    /// Build a store from a snapshot, rejecting snapshots that violate the
    /// data-model invariants.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self, SnapshotError> {
        snapshot.validate()?;

        let mut store = GraphStore::new();
        // Insert detached to keep document order, then link children in the
        // order they were listed (a child may precede its group).
        let mut links = Vec::new();
        for mut node in snapshot.nodes {
            if let Some(parent) = node.parent_id.take() {
                links.push((node.id, parent, node.position));
            }
            store.add_node(node, None)?;
        }
        for (child, parent, position) in links {
            store.move_into(child, Some(parent), position, None)?;
        }
        for edge in snapshot.edges {
            store.add_edge(edge)?;
        }
        Ok(store)
    }

    /// Export the current state. Children are listed in membership order so
    /// a round-trip through [`GraphStore::from_snapshot`] preserves it.
    pub fn snapshot(&self) -> GraphSnapshot {
        let mut nodes: Vec<Node> = Vec::with_capacity(self.len());
        for node in self.nodes().filter(|n| n.parent_id.is_none()) {
            nodes.push(node.clone());
            if node.is_group() {
                nodes.extend(self.children(node.id).cloned());
            }
        }
        GraphSnapshot {
            nodes,
            edges: self.edges().to_vec(),
        }
    }
}
