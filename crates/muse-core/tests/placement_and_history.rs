//! Integration tests: placement → history → persisted form.
//!
//! Exercises `muse-core` end to end: items placed on the virtual grid,
//! results appended under several styles, and the serialized shape.

use muse_core::layout::{PLACEMENT_COLUMNS, smart_position};
use muse_core::*;
use pretty_assertions::assert_eq;

// ─── Helpers ─────────────────────────────────────────────────────────────

fn image(name: &str) -> ImageRef {
    ImageRef {
        name: name.into(),
        mime_type: "image/jpeg".into(),
        data: "AAAA".into(),
        handle: None,
    }
}

fn result(style: CaptionStyle, model: ModelTier, timestamp: u64) -> GenerationResult {
    GenerationResult {
        captions: vec![Caption {
            id: format!("c{timestamp}"),
            text: format!("caption {timestamp}"),
            translation: String::new(),
            emoji: "🖤".into(),
            tone: "witty".into(),
        }],
        hashtags: vec!["#raw".into()],
        timestamp,
        model_used: model,
        style: Some(style),
    }
}

// ─── Placement ───────────────────────────────────────────────────────────

#[test]
fn sequential_imports_fill_rows_of_four() {
    let metrics = CanvasConfig::default().metrics();
    let mut occupied = Vec::new();
    for _ in 0..(PLACEMENT_COLUMNS + 1) {
        let next = smart_position(&occupied, &metrics);
        occupied.push(next);
    }
    assert_eq!(occupied[0], Point::ORIGIN);
    assert_eq!(occupied[3], Point::new(3.0 * 170.0, 0.0));
    assert_eq!(occupied[4], Point::new(0.0, 220.0));
}

// ─── History ─────────────────────────────────────────────────────────────

#[test]
fn styles_keep_independent_version_lines() {
    let mut item = CanvasItem::new(ItemId::intern("lines"), image("a.jpg"), Point::ORIGIN, 1);
    item.push_result(result(CaptionStyle::Social, ModelTier::Lite, 1));
    item.push_result(result(CaptionStyle::OneLiner, ModelTier::Lite, 2));
    item.push_result(result(CaptionStyle::Social, ModelTier::Flash, 3));

    // newest entry is Social, so One-Liner shows nothing until reconciled
    assert!(item.visible_result(CaptionStyle::OneLiner).is_none());
    assert!(item.reconcile_view(CaptionStyle::OneLiner));
    assert_eq!(item.view_index, Some(1));
    assert_eq!(
        item.version_info(CaptionStyle::OneLiner),
        VersionInfo {
            current: Some(1),
            total: 1,
            can_go_prev: false,
            can_go_next: false,
        }
    );

    item.jump_to_latest(CaptionStyle::Social);
    assert_eq!(item.version_info(CaptionStyle::Social).current, Some(2));
    assert!(item.show_previous(CaptionStyle::Social));
    assert_eq!(item.visible_result(CaptionStyle::Social).map(|r| r.timestamp), Some(1));
}

// ─── Persisted form ──────────────────────────────────────────────────────

#[test]
fn item_roundtrips_without_display_handle() {
    let mut item = CanvasItem::new(ItemId::intern("persisted"), image("b.png"), Point::new(5.0, 7.0), 3);
    item.image.handle = Some(DisplayHandle::new(vec![1u8, 2, 3]));
    item.push_result(result(CaptionStyle::Interactive, ModelTier::Pro25, 9));

    let json = serde_json::to_string(&item).unwrap();
    assert!(json.contains("\"viewIndex\":0"));
    assert!(json.contains("\"stackOrder\":3"));

    let back: CanvasItem = serde_json::from_str(&json).unwrap();
    assert_eq!(back.image.handle, None);
    assert_eq!(back.history, item.history);
    assert_eq!(back.position, item.position);
}
