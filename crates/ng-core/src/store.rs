//! The Graph Store: canonical nodes, edges and group membership.
//!
//! Nodes live in a `StableDiGraph` whose edges encode containment
//! (group → child). Group membership order is kept explicitly per group, and
//! document order (creation order) is kept for the whole node set, so
//! iteration never depends on petgraph's adjacency order.
//!
//! Every mutating operation validates first and then applies, so a rejected
//! call leaves the store untouched and no observer can see a half-applied
//! reparent.

use crate::error::{Result, StoreError};
use crate::geometry::{to_absolute, to_relative};
use crate::id::{EdgeId, NodeId};
use crate::model::{Edge, Node, NodeChange};
use kurbo::Point;
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    /// Node storage; edges are parent → child containment links.
    graph: StableDiGraph<Node, ()>,

    /// Index from NodeId → NodeIndex for fast lookup.
    id_index: HashMap<NodeId, NodeIndex>,

    /// Creation order of all nodes.
    order: Vec<NodeIndex>,

    /// Explicit child sequence of every group.
    child_order: HashMap<NodeIndex, Vec<NodeIndex>>,

    /// Visual edges (connections between nodes), in insertion order.
    edges: Vec<Edge>,
}

impl GraphStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    /// Number of nodes, groups included.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether a node with `id` exists.
    pub fn contains(&self, id: NodeId) -> bool {
        self.id_index.contains_key(&id)
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.id_index.get(&id).map(|idx| &self.graph[*idx])
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.order.iter().map(move |idx| &self.graph[*idx])
    }

    /// Group nodes in creation order. This is the hit-test iteration order.
    pub fn groups(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes().filter(|n| n.is_group())
    }

    /// Children of `group` in membership order. Empty if `group` is unknown.
    pub fn children(&self, group: NodeId) -> impl Iterator<Item = &Node> + '_ {
        self.id_index
            .get(&group)
            .and_then(|idx| self.child_order.get(idx))
            .into_iter()
            .flatten()
            .map(move |idx| &self.graph[*idx])
    }

    /// Ids of `group`'s children in membership order.
    pub fn child_ids(&self, group: NodeId) -> Vec<NodeId> {
        self.children(group).map(|n| n.id).collect()
    }

    /// Number of children in `group`; 0 if `group` is unknown.
    pub fn child_count(&self, group: NodeId) -> usize {
        self.id_index
            .get(&group)
            .and_then(|idx| self.child_order.get(idx))
            .map_or(0, Vec::len)
    }

    /// Parent of `id`, read from the containment graph.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        let idx = self.index_of(id)?;
        self.parent(idx).map(|pidx| self.graph[pidx].id)
    }

    /// Position of `id` in its parent's child sequence.
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let idx = self.index_of(id)?;
        let parent = self.parent(idx)?;
        self.child_order.get(&parent)?.iter().position(|c| *c == idx)
    }

    /// Absolute canvas position of a node, resolving the parent frame.
    pub fn absolute_position(&self, id: NodeId) -> Option<Point> {
        let node = self.node(id)?;
        match node.parent_id.and_then(|p| self.node(p)) {
            Some(parent) => Some(to_absolute(node.position, parent.position)),
            None => Some(node.position),
        }
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges touching `id` as source or target.
    pub fn edges_of(&self, id: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.edges
            .iter()
            .filter(move |e| e.source == id || e.target == id)
    }

    /// Generate a node id with `prefix` that is not used in this store.
    pub fn fresh_node_id(&self, prefix: &str) -> NodeId {
        loop {
            let id = NodeId::with_prefix(prefix);
            if !self.contains(id) {
                return id;
            }
        }
    }

    fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.id_index.get(&id).copied()
    }

    fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .next()
    }

    // ─── Node insertion / removal ────────────────────────────────────────

    /// Insert a node. If `node.parent_id` is set, the node joins that group
    /// at `index` (clamped; `None` appends) and its position is taken as
    /// relative to the group.
    pub fn add_node(&mut self, node: Node, index: Option<usize>) -> Result<()> {
        if self.contains(node.id) {
            return Err(StoreError::DuplicateId(node.id.to_string()));
        }
        let parent = match node.parent_id {
            Some(parent) => Some(self.check_parent(node.id, node.is_group(), parent)?),
            None => None,
        };

        let id = node.id;
        let idx = self.graph.add_node(node);
        self.id_index.insert(id, idx);
        self.order.push(idx);
        if self.graph[idx].is_group() {
            self.child_order.insert(idx, Vec::new());
        }
        if let Some(pidx) = parent {
            self.attach(idx, pidx, index);
        }
        log::trace!("store: added {id}");
        Ok(())
    }

    /// Remove a node and every edge touching it.
    ///
    /// Removing a group releases its children onto the canvas at their
    /// current absolute positions, so no remaining node ever points at a
    /// missing parent.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node> {
        let idx = self.index_of(id).ok_or(StoreError::NodeNotFound(id))?;

        if let Some(children) = self.child_order.remove(&idx) {
            let origin = self.graph[idx].position;
            for child in children {
                let node = &mut self.graph[child];
                node.position = to_absolute(node.position, origin);
                node.parent_id = None;
            }
        }
        if let Some(pidx) = self.parent(idx)
            && let Some(siblings) = self.child_order.get_mut(&pidx)
        {
            siblings.retain(|c| *c != idx);
        }

        self.edges.retain(|e| e.source != id && e.target != id);
        self.order.retain(|i| *i != idx);
        self.id_index.remove(&id);
        // Also drops the containment links in both directions.
        let removed = self
            .graph
            .remove_node(idx)
            .ok_or(StoreError::NodeNotFound(id))?;
        log::debug!("store: removed {id}");
        Ok(removed)
    }

    // ─── Reparenting ─────────────────────────────────────────────────────

    /// Atomically set a node's parent and position.
    ///
    /// `position` is absolute when `new_parent` is `None`, relative to the
    /// new parent otherwise. Reparenting to the current parent keeps the
    /// node's place in the child sequence; joining a new group appends.
    pub fn reparent(
        &mut self,
        id: NodeId,
        new_parent: Option<NodeId>,
        position: Point,
    ) -> Result<()> {
        let (idx, parent) = self.check_reparent(id, new_parent)?;
        self.relink(idx, parent, position, None);
        Ok(())
    }

    /// Reparent and place at `index` in one step. Both halves are validated
    /// before anything is written.
    pub fn move_into(
        &mut self,
        id: NodeId,
        new_parent: Option<NodeId>,
        position: Point,
        index: Option<usize>,
    ) -> Result<()> {
        let (idx, parent) = self.check_reparent(id, new_parent)?;
        self.relink(idx, parent, position, index);
        Ok(())
    }

    /// Move `id` to `index` within `parent`'s child sequence. The index is
    /// clamped to the sequence bounds. Positions and parents are untouched.
    pub fn insert_child_at(&mut self, parent: NodeId, id: NodeId, index: usize) -> Result<()> {
        let pidx = self
            .index_of(parent)
            .ok_or(StoreError::GroupNotFound(parent))?;
        let idx = self.index_of(id).ok_or(StoreError::NodeNotFound(id))?;
        let siblings = self
            .child_order
            .get_mut(&pidx)
            .ok_or(StoreError::NotAGroup(parent))?;
        let from = siblings
            .iter()
            .position(|c| *c == idx)
            .ok_or(StoreError::NotAChild { node: id, parent })?;

        siblings.remove(from);
        let to = index.min(siblings.len());
        siblings.insert(to, idx);
        Ok(())
    }

    /// Apply a batch of position / parent changes atomically.
    ///
    /// A plain [`NodeChange::Position`] on a child is rejected with
    /// [`StoreError::DetachedChildMove`]: children only move with their
    /// group or through an explicit [`NodeChange::Reparent`]. Moving a group
    /// moves its children implicitly since their positions are relative.
    pub fn apply_node_changes(&mut self, changes: &[NodeChange]) -> Result<()> {
        // Parent state as it will be after the earlier changes in the batch.
        let mut pending_parent: HashMap<NodeId, Option<NodeId>> = HashMap::new();
        for change in changes {
            match change {
                NodeChange::Position { id, .. } => {
                    let node = self.node(*id).ok_or(StoreError::NodeNotFound(*id))?;
                    let parent = pending_parent.get(id).copied().unwrap_or(node.parent_id);
                    if parent.is_some() {
                        return Err(StoreError::DetachedChildMove(*id));
                    }
                }
                NodeChange::Reparent { id, parent, .. } => {
                    self.check_reparent(*id, *parent)?;
                    pending_parent.insert(*id, *parent);
                }
            }
        }

        for change in changes {
            match change {
                NodeChange::Position { id, position } => {
                    if let Some(idx) = self.index_of(*id) {
                        self.graph[idx].position = *position;
                    }
                }
                NodeChange::Reparent {
                    id,
                    parent,
                    position,
                } => {
                    if let Ok((idx, pidx)) = self.check_reparent(*id, *parent) {
                        self.relink(idx, pidx, *position, None);
                    }
                }
            }
        }
        Ok(())
    }

    /// Express an absolute canvas point in `parent`'s frame.
    pub fn position_in_frame(&self, absolute: Point, parent: Option<NodeId>) -> Point {
        match parent.and_then(|p| self.node(p)) {
            Some(group) => to_relative(absolute, group.position),
            None => absolute,
        }
    }

    fn check_parent(&self, id: NodeId, is_group: bool, parent: NodeId) -> Result<NodeIndex> {
        if parent == id {
            return Err(StoreError::CyclicParent { node: id, parent });
        }
        let pidx = self
            .index_of(parent)
            .ok_or(StoreError::GroupNotFound(parent))?;
        let parent_node = &self.graph[pidx];
        if parent_node.parent_id.is_some() || is_group {
            return Err(StoreError::CyclicParent { node: id, parent });
        }
        if !parent_node.is_group() {
            return Err(StoreError::NotAGroup(parent));
        }
        Ok(pidx)
    }

    fn check_reparent(
        &self,
        id: NodeId,
        new_parent: Option<NodeId>,
    ) -> Result<(NodeIndex, Option<NodeIndex>)> {
        let idx = self.index_of(id).ok_or(StoreError::NodeNotFound(id))?;
        let parent = match new_parent {
            Some(parent) => Some(self.check_parent(id, self.graph[idx].is_group(), parent)?),
            None => None,
        };
        Ok((idx, parent))
    }

    /// Write a validated reparent. Infallible.
    fn relink(
        &mut self,
        idx: NodeIndex,
        new_parent: Option<NodeIndex>,
        position: Point,
        index: Option<usize>,
    ) {
        let old_parent = self.parent(idx);
        if old_parent != new_parent {
            if let Some(old) = old_parent {
                self.detach(idx, old);
            }
            if let Some(new) = new_parent {
                self.attach(idx, new, index);
            }
        } else if let (Some(pidx), Some(index)) = (new_parent, index)
            && let Some(siblings) = self.child_order.get_mut(&pidx)
        {
            siblings.retain(|c| *c != idx);
            let to = index.min(siblings.len());
            siblings.insert(to, idx);
        }

        let parent_id = new_parent.map(|p| self.graph[p].id);
        let node = &mut self.graph[idx];
        node.parent_id = parent_id;
        node.position = position;
        log::debug!(
            "store: {} now under {}",
            node.id,
            parent_id.map_or_else(|| "canvas".to_string(), |p| p.to_string())
        );
    }

    fn attach(&mut self, idx: NodeIndex, pidx: NodeIndex, index: Option<usize>) {
        self.graph.add_edge(pidx, idx, ());
        let siblings = self.child_order.entry(pidx).or_default();
        let to = index.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(to, idx);
        self.graph[idx].parent_id = Some(self.graph[pidx].id);
    }

    fn detach(&mut self, idx: NodeIndex, pidx: NodeIndex) {
        if let Some(edge) = self.graph.find_edge(pidx, idx) {
            self.graph.remove_edge(edge);
        }
        if let Some(siblings) = self.child_order.get_mut(&pidx) {
            siblings.retain(|c| *c != idx);
        }
        self.graph[idx].parent_id = None;
    }

    // ─── Edges ───────────────────────────────────────────────────────────

    /// Add a visual edge. Both endpoints must exist and the id must be
    /// unused.
    pub fn add_edge(&mut self, edge: Edge) -> Result<()> {
        if self.edges.iter().any(|e| e.id == edge.id) {
            return Err(StoreError::DuplicateId(edge.id.to_string()));
        }
        for endpoint in [edge.source, edge.target] {
            if !self.contains(endpoint) {
                return Err(StoreError::DanglingEdge {
                    edge: edge.id,
                    node: endpoint,
                });
            }
        }
        self.edges.push(edge);
        Ok(())
    }

    /// Remove an edge and return it. Its endpoints are untouched.
    pub fn remove_edge(&mut self, id: EdgeId) -> Result<Edge> {
        let pos = self
            .edges
            .iter()
            .position(|e| e.id == id)
            .ok_or(StoreError::EdgeNotFound(id))?;
        Ok(self.edges.remove(pos))
    }

    // ─── Invariants ──────────────────────────────────────────────────────

    /// Verify the data-model invariants plus internal consistency between
    /// the containment graph, `parent_id` fields and child sequences.
    pub fn check_invariants(&self) -> Result<()> {
        for node in self.nodes() {
            let idx = self
                .index_of(node.id)
                .ok_or(StoreError::MembershipMismatch(node.id))?;
            let graph_parent = self.parent(idx).map(|p| self.graph[p].id);
            if graph_parent != node.parent_id {
                return Err(StoreError::MembershipMismatch(node.id));
            }
            if let Some(parent) = node.parent_id {
                let pidx = self
                    .index_of(parent)
                    .ok_or(StoreError::GroupNotFound(parent))?;
                let parent_node = &self.graph[pidx];
                if node.is_group() || parent_node.parent_id.is_some() {
                    return Err(StoreError::CyclicParent {
                        node: node.id,
                        parent,
                    });
                }
                let listed = self
                    .child_order
                    .get(&pidx)
                    .map_or(0, |s| s.iter().filter(|c| **c == idx).count());
                if listed != 1 {
                    return Err(StoreError::MembershipMismatch(node.id));
                }
            }
        }
        for (pidx, siblings) in &self.child_order {
            if siblings.iter().any(|c| self.parent(*c) != Some(*pidx)) {
                return Err(StoreError::MembershipMismatch(self.graph[*pidx].id));
            }
        }
        for edge in &self.edges {
            for endpoint in [edge.source, edge.target] {
                if !self.contains(endpoint) {
                    return Err(StoreError::DanglingEdge {
                        edge: edge.id,
                        node: endpoint,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    /// g1 at (300,200) with children a, b, c; a free node n at (10,10).
    fn sample() -> GraphStore {
        let mut store = GraphStore::new();
        store
            .add_node(Node::group(id("g1"), Point::new(300.0, 200.0)), None)
            .unwrap();
        for (name, y) in [("a", 76.0), ("b", 164.0), ("c", 252.0)] {
            store
                .add_node(
                    Node::new(id(name), "textNode", Point::new(20.0, y)).with_parent(id("g1")),
                    None,
                )
                .unwrap();
        }
        store
            .add_node(Node::new(id("n"), "textNode", Point::new(10.0, 10.0)), None)
            .unwrap();
        store
    }

    #[test]
    fn children_follow_membership_order() {
        let store = sample();
        assert_eq!(store.child_ids(id("g1")), vec![id("a"), id("b"), id("c")]);
        assert_eq!(store.parent_of(id("b")), Some(id("g1")));
        assert_eq!(store.index_in_parent(id("c")), Some(2));
        assert_eq!(store.parent_of(id("n")), None);
        store.check_invariants().unwrap();
    }

    #[test]
    fn insert_child_at_reorders_and_clamps() {
        let mut store = sample();
        store.insert_child_at(id("g1"), id("a"), 99).unwrap();
        assert_eq!(store.child_ids(id("g1")), vec![id("b"), id("c"), id("a")]);
        store.insert_child_at(id("g1"), id("a"), 0).unwrap();
        assert_eq!(store.child_ids(id("g1")), vec![id("a"), id("b"), id("c")]);
        // Positions are untouched.
        assert_eq!(store.node(id("a")).unwrap().position, Point::new(20.0, 76.0));
    }

    #[test]
    fn insert_child_at_is_idempotent() {
        let mut once = sample();
        once.insert_child_at(id("g1"), id("c"), 1).unwrap();
        let mut twice = sample();
        twice.insert_child_at(id("g1"), id("c"), 1).unwrap();
        twice.insert_child_at(id("g1"), id("c"), 1).unwrap();
        assert_eq!(once.child_ids(id("g1")), twice.child_ids(id("g1")));
    }

    #[test]
    fn insert_child_at_rejects_non_child() {
        let mut store = sample();
        assert_eq!(
            store.insert_child_at(id("g1"), id("n"), 0),
            Err(StoreError::NotAChild {
                node: id("n"),
                parent: id("g1")
            })
        );
    }

    #[test]
    fn reparent_out_and_back_restores_position_and_order() {
        let mut store = sample();
        let rel = store.node(id("b")).unwrap().position;
        let abs = store.absolute_position(id("b")).unwrap();

        store.reparent(id("b"), None, abs).unwrap();
        assert_eq!(store.child_ids(id("g1")), vec![id("a"), id("c")]);
        assert_eq!(store.node(id("b")).unwrap().position, abs);

        store
            .move_into(id("b"), Some(id("g1")), rel, Some(1))
            .unwrap();
        assert_eq!(store.child_ids(id("g1")), vec![id("a"), id("b"), id("c")]);
        assert_eq!(store.node(id("b")).unwrap().position, rel);
        store.check_invariants().unwrap();
    }

    #[test]
    fn reparent_rejects_nesting() {
        let mut store = sample();
        store
            .add_node(Node::group(id("g2"), Point::new(0.0, 600.0)), None)
            .unwrap();
        let before = store.clone();

        let err = store.reparent(id("g2"), Some(id("g1")), Point::ZERO);
        assert!(matches!(err, Err(StoreError::CyclicParent { .. })));
        let err = store.reparent(id("g1"), Some(id("g1")), Point::ZERO);
        assert!(matches!(err, Err(StoreError::CyclicParent { .. })));
        let err = store.reparent(id("n"), Some(id("a")), Point::ZERO);
        assert!(matches!(err, Err(StoreError::CyclicParent { .. })));
        let err = store.reparent(id("ghost"), None, Point::ZERO);
        assert_eq!(err, Err(StoreError::NodeNotFound(id("ghost"))));

        assert_eq!(store.child_ids(id("g1")), before.child_ids(id("g1")));
        assert_eq!(store.node(id("g2")), before.node(id("g2")));
    }

    #[test]
    fn reparent_into_content_node_is_rejected() {
        let mut store = sample();
        store
            .add_node(Node::new(id("m"), "imageNode", Point::ZERO), None)
            .unwrap();
        assert_eq!(
            store.reparent(id("n"), Some(id("m")), Point::ZERO),
            Err(StoreError::NotAGroup(id("m")))
        );
    }

    #[test]
    fn plain_move_of_child_is_rejected_atomically() {
        let mut store = sample();
        let result = store.apply_node_changes(&[
            NodeChange::Position {
                id: id("n"),
                position: Point::new(99.0, 99.0),
            },
            NodeChange::Position {
                id: id("a"),
                position: Point::new(0.0, 0.0),
            },
        ]);
        assert_eq!(result, Err(StoreError::DetachedChildMove(id("a"))));
        // First change was not applied either.
        assert_eq!(store.node(id("n")).unwrap().position, Point::new(10.0, 10.0));
    }

    #[test]
    fn child_move_allowed_after_explicit_unparent_in_same_batch() {
        let mut store = sample();
        store
            .apply_node_changes(&[
                NodeChange::Reparent {
                    id: id("a"),
                    parent: None,
                    position: Point::new(320.0, 276.0),
                },
                NodeChange::Position {
                    id: id("a"),
                    position: Point::new(700.0, 50.0),
                },
            ])
            .unwrap();
        assert_eq!(store.parent_of(id("a")), None);
        assert_eq!(store.node(id("a")).unwrap().position, Point::new(700.0, 50.0));
    }

    #[test]
    fn moving_group_carries_children() {
        let mut store = sample();
        let before = store.absolute_position(id("a")).unwrap();
        store
            .apply_node_changes(&[NodeChange::Position {
                id: id("g1"),
                position: Point::new(350.0, 180.0),
            }])
            .unwrap();
        let after = store.absolute_position(id("a")).unwrap();
        assert_eq!(after - before, kurbo::Vec2::new(50.0, -20.0));
        assert_eq!(store.node(id("a")).unwrap().position, Point::new(20.0, 76.0));
    }

    #[test]
    fn removing_group_releases_children_at_absolute_positions() {
        let mut store = sample();
        store
            .add_edge(Edge::new(EdgeId::intern("e1"), id("a"), id("g1")))
            .unwrap();
        let abs = store.absolute_position(id("a")).unwrap();

        store.remove_node(id("g1")).unwrap();

        assert!(!store.contains(id("g1")));
        assert_eq!(store.parent_of(id("a")), None);
        assert_eq!(store.node(id("a")).unwrap().parent_id, None);
        assert_eq!(store.node(id("a")).unwrap().position, abs);
        assert!(store.edges().is_empty());
        store.check_invariants().unwrap();
    }

    #[test]
    fn edges_reject_dangling_endpoints() {
        let mut store = sample();
        let err = store.add_edge(Edge::new(EdgeId::intern("e2"), id("a"), id("ghost")));
        assert!(matches!(err, Err(StoreError::DanglingEdge { .. })));
        store
            .add_edge(Edge::new(EdgeId::intern("e3"), id("a"), id("n")))
            .unwrap();
        assert_eq!(store.edges_of(id("n")).count(), 1);
        store.remove_edge(EdgeId::intern("e3")).unwrap();
        assert!(store.edges().is_empty());
    }

    #[test]
    fn add_node_rejects_duplicates() {
        let mut store = sample();
        let err = store.add_node(Node::new(id("a"), "textNode", Point::ZERO), None);
        assert_eq!(err, Err(StoreError::DuplicateId("a".into())));
    }

    #[test]
    fn groups_iterate_in_creation_order() {
        let mut store = sample();
        store
            .add_node(Node::group(id("g0"), Point::ZERO), None)
            .unwrap();
        let groups: Vec<NodeId> = store.groups().map(|g| g.id).collect();
        assert_eq!(groups, vec![id("g1"), id("g0")]);
    }
}
