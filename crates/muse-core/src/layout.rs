//! Item placement: footprints, smart positioning, grid arrangement.
//!
//! Every item occupies a fixed 3:4 (width:height) footprint whose width is
//! the configured icon size. Positions are the footprint's top-left corner
//! in world coordinates.

use crate::model::Point;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Columns of the virtual grid scanned by smart placement and drop layout.
pub const PLACEMENT_COLUMNS: usize = 4;
/// Grid cells probed before smart placement gives up and falls back.
pub const MAX_PLACEMENT_PROBES: usize = 2000;
/// Extent of the fallback area (world units) when no free cell is found.
pub const FALLBACK_EXTENT: f64 = 500.0;
/// Footprint height relative to width.
pub const ASPECT_HEIGHT_RATIO: f64 = 4.0 / 3.0;

/// The canvas (screen) dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

/// How a newly imported item picks its position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// First free cell of the virtual grid.
    Auto,
    /// Explicit world position (e.g. a drop location).
    At(Point),
}

/// Footprint sizing for canvas items (world units).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemMetrics {
    pub icon_width: f64,
    pub grid_gap: f64,
}

impl Default for ItemMetrics {
    fn default() -> Self {
        Self {
            icon_width: 150.0,
            grid_gap: 20.0,
        }
    }
}

impl ItemMetrics {
    pub fn icon_height(&self) -> f64 {
        self.icon_width * ASPECT_HEIGHT_RATIO
    }

    /// Horizontal distance between grid cells.
    pub fn cell_width(&self) -> f64 {
        self.icon_width + self.grid_gap
    }

    /// Vertical distance between grid cells.
    pub fn cell_height(&self) -> f64 {
        self.icon_height() + self.grid_gap
    }

    /// World-space footprint of an item placed at `position`.
    pub fn bounds_at(&self, position: Point) -> Bounds {
        Bounds {
            x: position.x,
            y: position.y,
            width: self.icon_width,
            height: self.icon_height(),
        }
    }

    /// Two footprints overlap when both axis deltas are below half the
    /// footprint.
    pub fn overlaps(&self, a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < self.icon_width * 0.5 && (a.y - b.y).abs() < self.icon_height() * 0.5
    }
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    /// Normalize a rectangle spanned by two corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (b.x - a.x).abs(),
            height: (b.y - a.y).abs(),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Non-empty intersection (AABB overlap). Touching edges do not count.
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }
}

/// Top-left of grid cell `index` in a `cols`-wide row-major grid.
fn cell_origin(index: usize, cols: usize, metrics: &ItemMetrics) -> Point {
    let col = index % cols;
    let row = index / cols;
    Point::new(
        col as f64 * metrics.cell_width(),
        row as f64 * metrics.cell_height(),
    )
}

/// Find a free spot for a new item.
///
/// Scans the virtual grid row-major and returns the first cell that does
/// not overlap any `occupied` position. After [`MAX_PLACEMENT_PROBES`]
/// occupied cells, returns a pseudo-random position inside
/// [`FALLBACK_EXTENT`], seeded from the number of existing items so the
/// result is reproducible.
pub fn smart_position(occupied: &[Point], metrics: &ItemMetrics) -> Point {
    for index in 0..MAX_PLACEMENT_PROBES {
        let candidate = cell_origin(index, PLACEMENT_COLUMNS, metrics);
        if !occupied.iter().any(|p| metrics.overlaps(*p, candidate)) {
            return candidate;
        }
    }

    log::warn!(
        "no free grid cell after {MAX_PLACEMENT_PROBES} probes, using fallback position"
    );
    let mut rng = SmallRng::seed_from_u64(occupied.len() as u64);
    Point::new(
        rng.random_range(0.0..FALLBACK_EXTENT),
        rng.random_range(0.0..FALLBACK_EXTENT),
    )
}

/// Number of grid columns that fit a canvas of `canvas_width` screen
/// pixels at `scale`. Always at least one.
pub fn grid_columns(canvas_width: f64, scale: f64, metrics: &ItemMetrics) -> usize {
    let world_width = canvas_width / scale;
    let cols = ((world_width - metrics.grid_gap) / metrics.cell_width()).floor();
    if cols.is_finite() && cols >= 1.0 {
        cols as usize
    } else {
        1
    }
}

/// Deterministic row-major positions for `count` items.
pub fn grid_positions(count: usize, cols: usize, metrics: &ItemMetrics) -> Vec<Point> {
    let cols = cols.max(1);
    (0..count)
        .map(|index| cell_origin(index, cols, metrics))
        .collect()
}

/// Positions for `count` files dropped at `drop` (world coordinates).
///
/// The first footprint is centered on the drop point, the rest follow in a
/// [`PLACEMENT_COLUMNS`]-wide block.
pub fn drop_positions(drop: Point, count: usize, metrics: &ItemMetrics) -> Vec<Point> {
    let start = Point::new(
        drop.x - metrics.icon_width / 2.0,
        drop.y - metrics.icon_height() / 2.0,
    );
    grid_positions(count, PLACEMENT_COLUMNS, metrics)
        .into_iter()
        .map(|offset| Point::new(start.x + offset.x, start.y + offset.y))
        .collect()
}
