//! Pure geometry helpers for grouping.
//!
//! All hit-testing happens in absolute canvas space. Child positions are
//! stored relative to their parent's origin, and the conversion between the
//! two frames happens only at the reparenting boundary via [`to_relative`]
//! and [`to_absolute`].

use crate::config::GroupMetrics;
use kurbo::{Point, Rect, Size};

/// Whether `point` lies inside `rect` grown by `tolerance` on every side.
/// Edges are inclusive.
pub fn point_in_rect(point: Point, rect: Rect, tolerance: f64) -> bool {
    let r = rect.abs().inflate(tolerance, tolerance);
    point.x >= r.x0 && point.x <= r.x1 && point.y >= r.y0 && point.y <= r.y1
}

/// Estimated size of a group that has not been measured yet.
///
/// Height grows with the number of children and never drops below the base
/// height; width is fixed.
pub fn estimate_group_bounds(metrics: &GroupMetrics, child_count: usize) -> Size {
    let height = metrics
        .base_height
        .max(child_count as f64 * metrics.per_child_height);
    Size::new(metrics.width, height)
}

/// Absolute point → position relative to `origin`.
pub fn to_relative(absolute: Point, origin: Point) -> Point {
    (absolute - origin).to_point()
}

/// Position relative to `origin` → absolute point.
pub fn to_absolute(relative: Point, origin: Point) -> Point {
    origin + relative.to_vec2()
}

/// Index at which a pointer at `pointer_y` should insert into a vertical
/// list of rects.
///
/// Scans in order and returns the first rect whose vertical midpoint lies
/// below the pointer; returns `rects.len()` (append) if there is none.
pub fn vertical_insertion_index(pointer_y: f64, rects: &[Rect]) -> usize {
    rects
        .iter()
        .position(|r| pointer_y < r.center().y)
        .unwrap_or(rects.len())
}
