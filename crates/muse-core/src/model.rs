//! Core data model for the caption canvas.
//!
//! A canvas is a flat, ordered list of `CanvasItem`s placed in world
//! coordinates. Each item carries its image and an append-only history of
//! `GenerationResult`s; `view_index` points at the entry currently shown.
//! Results are partitioned into independent version lines by `CaptionStyle`.

use crate::id::ItemId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

// ─── Geometry ────────────────────────────────────────────────────────────

/// A point in world (canvas) or screen coordinates, depending on context.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

// ─── Styles & Model tiers ────────────────────────────────────────────────

/// Caption-writing mode. Each style is an independent version line in an
/// item's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CaptionStyle {
    #[default]
    Social,
    #[serde(rename = "One-Liner")]
    OneLiner,
    Interactive,
}

impl CaptionStyle {
    pub const ALL: [CaptionStyle; 3] = [
        CaptionStyle::Social,
        CaptionStyle::OneLiner,
        CaptionStyle::Interactive,
    ];

    /// The wire / display tag (`Social`, `One-Liner`, `Interactive`).
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionStyle::Social => "Social",
            CaptionStyle::OneLiner => "One-Liner",
            CaptionStyle::Interactive => "Interactive",
        }
    }
}

impl fmt::Display for CaptionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability tier of the captioning model, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelTier {
    #[serde(rename = "gemini-3-pro-preview")]
    Pro3,
    #[serde(rename = "gemini-2.5-pro")]
    Pro25,
    #[serde(rename = "gemini-2.5-flash")]
    Flash,
    #[default]
    #[serde(rename = "gemini-2.5-flash-lite")]
    Lite,
}

impl ModelTier {
    /// Backend model name.
    pub fn model_name(&self) -> &'static str {
        match self {
            ModelTier::Pro3 => "gemini-3-pro-preview",
            ModelTier::Pro25 => "gemini-2.5-pro",
            ModelTier::Flash => "gemini-2.5-flash",
            ModelTier::Lite => "gemini-2.5-flash-lite",
        }
    }

    /// Short label shown on the model toggle.
    pub fn label(&self) -> &'static str {
        match self {
            ModelTier::Pro3 => "ULTRA (3.0 PRO)",
            ModelTier::Pro25 => "PRECISION (2.5 PRO)",
            ModelTier::Flash => "TURBO (2.5 FLASH)",
            ModelTier::Lite => "LITE (2.5 LITE)",
        }
    }

    /// Next tier on the retry ladder.
    ///
    /// Steps down one capability level per retry. Lite has nowhere lower to
    /// go, so it sidegrades back to Flash.
    pub fn fallback(&self) -> ModelTier {
        match self {
            ModelTier::Pro3 => ModelTier::Pro25,
            ModelTier::Pro25 => ModelTier::Flash,
            ModelTier::Flash => ModelTier::Lite,
            ModelTier::Lite => ModelTier::Flash,
        }
    }

    /// Next tier for the user-facing model toggle (wraps around).
    pub fn cycle(&self) -> ModelTier {
        match self {
            ModelTier::Pro3 => ModelTier::Pro25,
            ModelTier::Pro25 => ModelTier::Flash,
            ModelTier::Flash => ModelTier::Lite,
            ModelTier::Lite => ModelTier::Pro3,
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_name())
    }
}

// ─── Generation results ──────────────────────────────────────────────────

/// One generated caption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    pub id: String,
    pub text: String,
    /// Chinese translation; shown as metadata, never copied.
    pub translation: String,
    pub emoji: String,
    pub tone: String,
}

impl Caption {
    /// Text placed on the clipboard: the caption followed by its emoji.
    pub fn clipboard_text(&self) -> String {
        if self.emoji.is_empty() {
            self.text.clone()
        } else {
            format!("{} {}", self.text, self.emoji)
        }
    }
}

/// The outcome of one successful generation request. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub captions: Vec<Caption>,
    pub hashtags: Vec<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Tier that actually answered (may be lower than requested).
    pub model_used: ModelTier,
    /// Style the result was generated under. `None` only for entries written
    /// before styles were recorded; see [`GenerationResult::matches_style`].
    #[serde(default)]
    pub style: Option<CaptionStyle>,
}

impl GenerationResult {
    /// Whether this entry belongs to the version line of `active`.
    ///
    /// Entries without a recorded style belong to the `Social` line.
    pub fn matches_style(&self, active: CaptionStyle) -> bool {
        self.style.unwrap_or(CaptionStyle::Social) == active
    }
}

// ─── Images ──────────────────────────────────────────────────────────────

/// An ephemeral, in-memory display handle for decoded image bytes.
///
/// Handles are never persisted: every session creates fresh ones, either on
/// import or when rehydrating stored items.
#[derive(Clone, PartialEq)]
pub struct DisplayHandle {
    serial: u64,
    bytes: Arc<[u8]>,
}

static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

impl DisplayHandle {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            serial: HANDLE_COUNTER.fetch_add(1, Ordering::Relaxed),
            bytes: bytes.into(),
        }
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for DisplayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DisplayHandle(#{}, {} bytes)", self.serial, self.bytes.len())
    }
}

/// Image payload of a canvas item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    /// Original file name, for previews.
    pub name: String,
    pub mime_type: String,
    /// Base64-encoded image bytes. This is the persisted form.
    pub data: String,
    #[serde(skip)]
    pub handle: Option<DisplayHandle>,
}

// ─── Canvas items ────────────────────────────────────────────────────────

/// A placed image with its generation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasItem {
    pub id: ItemId,
    pub image: ImageRef,
    /// Top-left corner in world coordinates.
    pub position: Point,
    /// Degrees.
    pub rotation: f64,
    pub stack_order: u32,
    pub history: Vec<GenerationResult>,
    /// Index into `history` of the entry being viewed; `None` when nothing
    /// is shown. Always a valid index when `Some`.
    #[serde(default)]
    pub view_index: Option<usize>,
}

impl CanvasItem {
    pub fn new(id: ItemId, image: ImageRef, position: Point, stack_order: u32) -> Self {
        Self {
            id,
            image,
            position,
            rotation: 0.0,
            stack_order,
            history: Vec::new(),
            view_index: None,
        }
    }

    /// Append a result and make it the viewed entry.
    pub fn push_result(&mut self, result: GenerationResult) {
        self.history.push(result);
        self.view_index = Some(self.history.len() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(style: Option<CaptionStyle>) -> GenerationResult {
        GenerationResult {
            captions: vec![],
            hashtags: vec![],
            timestamp: 0,
            model_used: ModelTier::Flash,
            style,
        }
    }

    #[test]
    fn unstyled_entries_match_social_only() {
        let legacy = result(None);
        assert!(legacy.matches_style(CaptionStyle::Social));
        assert!(!legacy.matches_style(CaptionStyle::OneLiner));
        assert!(!legacy.matches_style(CaptionStyle::Interactive));
    }

    #[test]
    fn fallback_ladder_steps_down_then_sidegrades() {
        assert_eq!(ModelTier::Pro3.fallback(), ModelTier::Pro25);
        assert_eq!(ModelTier::Pro25.fallback(), ModelTier::Flash);
        assert_eq!(ModelTier::Flash.fallback(), ModelTier::Lite);
        assert_eq!(ModelTier::Lite.fallback(), ModelTier::Flash);
    }

    #[test]
    fn toggle_cycles_through_every_tier() {
        let mut tier = ModelTier::Pro3;
        let mut seen = vec![tier];
        for _ in 0..3 {
            tier = tier.cycle();
            seen.push(tier);
        }
        assert_eq!(tier.cycle(), ModelTier::Pro3);
        assert_eq!(
            seen,
            vec![ModelTier::Pro3, ModelTier::Pro25, ModelTier::Flash, ModelTier::Lite]
        );
    }

    #[test]
    fn style_serializes_with_wire_tags() {
        let json = serde_json::to_string(&CaptionStyle::OneLiner).unwrap();
        assert_eq!(json, "\"One-Liner\"");
        let tier = serde_json::to_string(&ModelTier::Pro25).unwrap();
        assert_eq!(tier, "\"gemini-2.5-pro\"");
    }

    #[test]
    fn legacy_result_without_style_deserializes() {
        let json = r##"{"captions":[],"hashtags":["#a"],"timestamp":5,"modelUsed":"gemini-2.5-flash"}"##;
        let parsed: GenerationResult = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.style, None);
        assert!(parsed.matches_style(CaptionStyle::Social));
    }

    #[test]
    fn clipboard_text_excludes_translation() {
        let caption = Caption {
            id: "c".into(),
            text: "concrete dreams".into(),
            translation: "混凝土之梦".into(),
            emoji: "🖤".into(),
            tone: "witty".into(),
        };
        assert_eq!(caption.clipboard_text(), "concrete dreams 🖤");
    }

    #[test]
    fn push_result_points_view_at_newest() {
        let mut item = CanvasItem::new(
            ItemId::intern("push"),
            ImageRef {
                name: "a.jpg".into(),
                mime_type: "image/jpeg".into(),
                data: String::new(),
                handle: None,
            },
            Point::ORIGIN,
            1,
        );
        item.push_result(result(Some(CaptionStyle::Social)));
        item.push_result(result(Some(CaptionStyle::OneLiner)));
        assert_eq!(item.view_index, Some(1));
    }
}
