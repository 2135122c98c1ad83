//! Group hit testing: pointer → target group + insertion index.
//!
//! Walks groups in creation order and returns the first one whose box
//! (measured size, or the estimate from its child count) contains the
//! pointer within the configured tolerance. Overlapping groups therefore
//! resolve by iteration order, not by z-order or area.

use ng_core::geometry::{
    estimate_group_bounds, point_in_rect, to_absolute, vertical_insertion_index,
};
use ng_core::{EngineConfig, GraphStore, Node, NodeId, Point, Rect, Size};
use std::collections::HashMap;

/// Live sizes reported by the rendering surface. Absent entries fall back
/// to estimates.
#[derive(Debug, Clone, Default)]
pub struct MeasuredSizes {
    sizes: HashMap<NodeId, Size>,
}

impl MeasuredSizes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: NodeId) -> Option<Size> {
        self.sizes.get(&id).copied()
    }

    pub fn set(&mut self, id: NodeId, size: Size) {
        self.sizes.insert(id, size);
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Size> {
        self.sizes.remove(&id)
    }

    /// Drop sizes of nodes that no longer exist.
    pub fn retain_known(&mut self, store: &GraphStore) {
        self.sizes.retain(|id, _| store.contains(*id));
    }
}

/// Result of a successful group hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupHit {
    pub group_id: NodeId,
    /// Index in the group's child sequence (with the dragged node removed).
    pub insertion_index: usize,
}

/// Everything the hit-tester reads. Borrowed, never mutated.
#[derive(Clone, Copy)]
pub struct HitContext<'a> {
    pub store: &'a GraphStore,
    pub sizes: &'a MeasuredSizes,
    pub config: &'a EngineConfig,
}

impl<'a> HitContext<'a> {
    pub fn new(store: &'a GraphStore, sizes: &'a MeasuredSizes, config: &'a EngineConfig) -> Self {
        Self {
            store,
            sizes,
            config,
        }
    }

    /// Absolute bounding box of a group.
    pub fn group_box(&self, group: &Node) -> Rect {
        let size = self.sizes.get(group.id).unwrap_or_else(|| {
            estimate_group_bounds(&self.config.group, self.store.child_count(group.id))
        });
        Rect::from_origin_size(group.position, size)
    }

    /// Absolute rects of a group's children in membership order, skipping
    /// `exclude`.
    pub fn child_rects(&self, group: &Node, exclude: Option<NodeId>) -> Vec<Rect> {
        let fallback = Size::new(self.config.child.width, self.config.child.height);
        self.store
            .children(group.id)
            .filter(|child| Some(child.id) != exclude)
            .map(|child| {
                let origin = to_absolute(child.position, group.position);
                Rect::from_origin_size(origin, self.sizes.get(child.id).unwrap_or(fallback))
            })
            .collect()
    }
}

/// Find the group under `pointer` (absolute canvas space).
///
/// `dragged` is the node being moved, if any: its own rect is excluded from
/// the insertion-index computation, and a dragged group never targets a
/// group since groups do not nest.
pub fn hit_test_groups(
    ctx: &HitContext<'_>,
    pointer: Point,
    dragged: Option<NodeId>,
) -> Option<GroupHit> {
    if let Some(id) = dragged
        && ctx.store.node(id).is_some_and(Node::is_group)
    {
        return None;
    }

    let group = ctx
        .store
        .groups()
        .find(|g| point_in_rect(pointer, ctx.group_box(g), ctx.config.hit_tolerance))?;

    let rects = ctx.child_rects(group, dragged);
    let insertion_index = vertical_insertion_index(pointer.y, &rects);
    log::trace!(
        "hit: {} at ({:.1}, {:.1}) -> index {insertion_index}",
        group.id,
        pointer.x,
        pointer.y
    );
    Some(GroupHit {
        group_id: group.id,
        insertion_index,
    })
}

/// All groups under `pointer`, in iteration order. Only the first one is
/// authoritative; the rest are useful for diagnosing overlapping layouts.
pub fn groups_at(ctx: &HitContext<'_>, pointer: Point) -> Vec<NodeId> {
    ctx.store
        .groups()
        .filter(|g| point_in_rect(pointer, ctx.group_box(g), ctx.config.hit_tolerance))
        .map(|g| g.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    fn store_with_group() -> GraphStore {
        let mut store = GraphStore::new();
        store
            .add_node(Node::group(id("hg"), Point::new(300.0, 200.0)), None)
            .unwrap();
        store
    }

    #[test]
    fn empty_group_hit_uses_estimate() {
        let store = store_with_group();
        let sizes = MeasuredSizes::new();
        let config = EngineConfig::default();
        let ctx = HitContext::new(&store, &sizes, &config);

        let hit = hit_test_groups(&ctx, Point::new(350.0, 230.0), None).unwrap();
        assert_eq!(hit.group_id, id("hg"));
        assert_eq!(hit.insertion_index, 0);

        // Within tolerance of the estimated (320 x 160) box.
        assert!(hit_test_groups(&ctx, Point::new(628.0, 368.0), None).is_some());
        assert!(hit_test_groups(&ctx, Point::new(640.0, 368.0), None).is_none());
    }

    #[test]
    fn measured_size_takes_precedence() {
        let store = store_with_group();
        let mut sizes = MeasuredSizes::new();
        sizes.set(id("hg"), Size::new(100.0, 100.0));
        let config = EngineConfig::default();
        let ctx = HitContext::new(&store, &sizes, &config);

        assert!(hit_test_groups(&ctx, Point::new(500.0, 230.0), None).is_none());
        assert!(hit_test_groups(&ctx, Point::new(405.0, 305.0), None).is_some());
    }

    #[test]
    fn dragged_child_does_not_affect_its_own_index() {
        let mut store = store_with_group();
        for (name, y) in [("hc1", 76.0), ("hc2", 164.0)] {
            store
                .add_node(
                    Node::new(id(name), "textNode", Point::new(20.0, y)).with_parent(id("hg")),
                    None,
                )
                .unwrap();
        }
        let sizes = MeasuredSizes::new();
        let config = EngineConfig::default();
        let ctx = HitContext::new(&store, &sizes, &config);

        let pointer = Point::new(400.0, 200.0 + 140.0);
        assert_eq!(
            hit_test_groups(&ctx, pointer, None).unwrap().insertion_index,
            1
        );
        // Dragging hc1 itself: only hc2 remains, pointer is above its midpoint.
        assert_eq!(
            hit_test_groups(&ctx, pointer, Some(id("hc1")))
                .unwrap()
                .insertion_index,
            0
        );
    }

    #[test]
    fn overlapping_groups_resolve_by_creation_order() {
        let mut store = store_with_group();
        store
            .add_node(Node::group(id("hg2"), Point::new(350.0, 220.0)), None)
            .unwrap();
        let sizes = MeasuredSizes::new();
        let config = EngineConfig::default();
        let ctx = HitContext::new(&store, &sizes, &config);

        let pointer = Point::new(400.0, 250.0);
        assert_eq!(groups_at(&ctx, pointer), vec![id("hg"), id("hg2")]);
        assert_eq!(
            hit_test_groups(&ctx, pointer, None).unwrap().group_id,
            id("hg")
        );
    }

    #[test]
    fn dragged_group_never_targets_a_group() {
        let mut store = store_with_group();
        store
            .add_node(Node::group(id("hg3"), Point::new(0.0, 0.0)), None)
            .unwrap();
        let sizes = MeasuredSizes::new();
        let config = EngineConfig::default();
        let ctx = HitContext::new(&store, &sizes, &config);
        assert!(hit_test_groups(&ctx, Point::new(350.0, 230.0), Some(id("hg3"))).is_none());
    }
}
