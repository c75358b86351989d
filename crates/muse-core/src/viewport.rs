//! Pan/zoom transform between screen and world coordinates.
//!
//! `screen = world * scale + offset`. Zooming is anchored: the world point
//! under the anchor stays under the anchor across the scale change.

use crate::model::Point;
use serde::{Deserialize, Serialize};

/// Smallest allowed zoom.
pub const MIN_SCALE: f64 = 0.1;
/// Largest allowed zoom.
pub const MAX_SCALE: f64 = 5.0;
/// Scale change per wheel delta unit.
pub const ZOOM_SENSITIVITY: f64 = 0.001;

/// Viewport pan/zoom state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            offset_x: 50.0,
            offset_y: 50.0,
            scale: 1.0,
        }
    }
}

/// A wheel or trackpad gesture, with the modifiers that pick zoom vs pan.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelInput {
    pub delta_x: f64,
    pub delta_y: f64,
    /// Pointer position in screen space (zoom anchor).
    pub anchor: Point,
    /// Ctrl or Cmd held (pinch gestures arrive this way too).
    pub zoom_modifier: bool,
    /// Shift held: plain scrolling instead of zooming.
    pub scroll_modifier: bool,
}

impl ViewTransform {
    pub fn new(offset_x: f64, offset_y: f64, scale: f64) -> Self {
        Self {
            offset_x,
            offset_y,
            scale: clamp_scale(scale),
        }
    }

    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.offset_x) / self.scale,
            (screen.y - self.offset_y) / self.scale,
        )
    }

    pub fn world_to_screen(&self, world: Point) -> Point {
        Point::new(
            world.x * self.scale + self.offset_x,
            world.y * self.scale + self.offset_y,
        )
    }

    /// Translate by a screen-space delta.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    pub fn set_offset(&mut self, offset_x: f64, offset_y: f64) {
        self.offset_x = offset_x;
        self.offset_y = offset_y;
    }

    /// Multiply the scale by `factor`, keeping the world point under
    /// `anchor` fixed. The resulting scale is clamped to
    /// [`MIN_SCALE`, `MAX_SCALE`].
    pub fn zoom_at(&mut self, anchor: Point, factor: f64) {
        self.zoom_to(anchor, self.scale * factor);
    }

    /// Set an absolute scale, anchored at `anchor`.
    pub fn zoom_to(&mut self, anchor: Point, scale: f64) {
        let world = self.screen_to_world(anchor);
        let scale = clamp_scale(scale);
        self.scale = scale;
        self.offset_x = anchor.x - world.x * scale;
        self.offset_y = anchor.y - world.y * scale;
    }

    /// Apply a wheel gesture: zoom unless only the scroll modifier is held.
    pub fn apply_wheel(&mut self, wheel: WheelInput) {
        if wheel.zoom_modifier || !wheel.scroll_modifier {
            let factor = 1.0 - wheel.delta_y * ZOOM_SENSITIVITY;
            self.zoom_at(wheel.anchor, factor);
        } else {
            self.pan_by(-wheel.delta_x, -wheel.delta_y);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn clamp_scale(scale: f64) -> f64 {
    if scale.is_nan() {
        return 1.0;
    }
    scale.clamp(MIN_SCALE, MAX_SCALE)
}
