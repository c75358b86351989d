//! User-tunable settings.

use crate::layout::ItemMetrics;
use crate::model::{CaptionStyle, ModelTier};
use crate::persona::DEFAULT_PERSONA_ID;
use serde::{Deserialize, Serialize};

/// World units per snap step while dragging with snap enabled.
pub const SNAP_GRID: f64 = 20.0;
/// Screen pixels a pointer must travel (on either axis) before a press
/// becomes a drag, pan or box selection.
pub const DRAG_THRESHOLD: f64 = 2.0;

/// Canvas display settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CanvasConfig {
    /// Footprint width in world units.
    pub icon_size: f64,
    pub grid_gap: f64,
    pub snap_to_grid: bool,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            icon_size: 150.0,
            grid_gap: 20.0,
            snap_to_grid: false,
        }
    }
}

impl CanvasConfig {
    pub fn metrics(&self) -> ItemMetrics {
        ItemMetrics {
            icon_width: self.icon_size,
            grid_gap: self.grid_gap,
        }
    }
}

/// Round a world coordinate to the snap grid.
pub fn snap(value: f64) -> f64 {
    (value / SNAP_GRID).round() * SNAP_GRID
}

/// Key-value settings persisted outside the collections database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    pub active_persona_id: String,
    /// User-supplied backend key; overrides the process default.
    pub api_key: Option<String>,
    /// User-supplied endpoint base URL.
    pub base_url: Option<String>,
    pub model: ModelTier,
    pub style: CaptionStyle,
    pub canvas: CanvasConfig,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            active_persona_id: DEFAULT_PERSONA_ID.into(),
            api_key: None,
            base_url: None,
            model: ModelTier::default(),
            style: CaptionStyle::default(),
            canvas: CanvasConfig::default(),
        }
    }
}

impl AppSettings {
    /// Forget the user key and endpoint.
    pub fn clear_credentials(&mut self) {
        self.api_key = None;
        self.base_url = None;
    }
}
