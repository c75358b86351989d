//! Hit testing: screen point / rectangle → item lookup.
//!
//! Item footprints are derived from their world position, the configured
//! icon width (3:4 width:height) and the viewport scale.

use muse_core::layout::{Bounds, ItemMetrics};
use muse_core::{CanvasItem, ItemId, Point, ViewTransform};

/// Screen-space footprint of an item.
pub fn screen_bounds(item: &CanvasItem, view: &ViewTransform, metrics: &ItemMetrics) -> Bounds {
    let origin = view.world_to_screen(item.position);
    Bounds {
        x: origin.x,
        y: origin.y,
        width: metrics.icon_width * view.scale,
        height: metrics.icon_height() * view.scale,
    }
}

/// Find the topmost item at screen position `p` (highest stack order,
/// later list position on ties). Returns `None` on empty canvas.
pub fn hit_test(
    items: &[CanvasItem],
    view: &ViewTransform,
    metrics: &ItemMetrics,
    p: Point,
) -> Option<ItemId> {
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| screen_bounds(item, view, metrics).contains(p))
        .max_by_key(|(index, item)| (item.stack_order, *index))
        .map(|(_, item)| item.id)
}

/// All items whose screen footprint strictly overlaps `rect`.
/// Used for box selection.
pub fn hit_test_rect(
    items: &[CanvasItem],
    view: &ViewTransform,
    metrics: &ItemMetrics,
    rect: &Bounds,
) -> Vec<ItemId> {
    items
        .iter()
        .filter(|item| screen_bounds(item, view, metrics).intersects(rect))
        .map(|item| item.id)
        .collect()
}
