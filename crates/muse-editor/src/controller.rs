//! Canvas controller: the single entry point for interaction.
//!
//! Holds the viewport, the item store, the selection and the gesture
//! disambiguator. Host UI events (pointer, wheel, keyboard, drop) go
//! through this struct; it applies the resulting mutations and keeps the
//! primary item's visible result consistent with the active style.

use crate::gesture::{CanvasMutation, GestureContext, GestureDisambiguator};
use crate::hit::hit_test;
use crate::input::{InputEvent, Modifiers, PointerButton};
use crate::selection::Selection;
use crate::shortcuts::{ShortcutAction, ShortcutMap};
use crate::store::CanvasStore;
use muse_core::layout::{drop_positions, grid_columns};
use muse_core::{
    CanvasConfig, CanvasItem, CanvasSize, CaptionStyle, GenerationResult, ImageRef, ItemId,
    Placement, Point, VersionInfo, ViewTransform, WheelInput,
};

/// Zoom step for keyboard zoom in / out.
const KEY_ZOOM_FACTOR: f64 = 1.2;

pub struct CanvasController {
    view: ViewTransform,
    store: CanvasStore,
    selection: Selection,
    gesture: GestureDisambiguator,
    config: CanvasConfig,
    style: CaptionStyle,
    canvas_size: CanvasSize,
    /// Space currently held.
    pan_key_held: bool,
    maximized: Option<ItemId>,
}

impl Default for CanvasController {
    fn default() -> Self {
        Self::new(CanvasConfig::default(), CaptionStyle::default())
    }
}

impl CanvasController {
    pub fn new(config: CanvasConfig, style: CaptionStyle) -> Self {
        Self {
            view: ViewTransform::default(),
            store: CanvasStore::new(),
            selection: Selection::new(),
            gesture: GestureDisambiguator::new(),
            config,
            style,
            canvas_size: CanvasSize::default(),
            pan_key_held: false,
            maximized: None,
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    pub fn store(&self) -> &CanvasStore {
        &self.store
    }

    pub fn items(&self) -> &[CanvasItem] {
        self.store.items()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn gesture(&self) -> &GestureDisambiguator {
        &self.gesture
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn style(&self) -> CaptionStyle {
        self.style
    }

    pub fn maximized(&self) -> Option<ItemId> {
        self.maximized
    }

    pub fn is_pan_key_held(&self) -> bool {
        self.pan_key_held
    }

    /// The single selected item.
    pub fn primary_item(&self) -> Option<&CanvasItem> {
        self.selection.primary().and_then(|id| self.store.get(id))
    }

    /// Result shown for the primary item under the active style.
    pub fn visible_result(&self) -> Option<&GenerationResult> {
        self.primary_item()?.visible_result(self.style)
    }

    pub fn version_info(&self) -> VersionInfo {
        self.primary_item()
            .map(|item| item.version_info(self.style))
            .unwrap_or_default()
    }

    // ─── Configuration ───────────────────────────────────────────────────

    pub fn resize(&mut self, width: f64, height: f64) {
        self.canvas_size = CanvasSize { width, height };
    }

    pub fn set_config(&mut self, config: CanvasConfig) {
        self.config = config;
    }

    /// Switch the active style. The primary item jumps to its most recent
    /// entry for the new style.
    pub fn set_style(&mut self, style: CaptionStyle) -> bool {
        if style == self.style {
            return false;
        }
        log::debug!("style {} -> {}", self.style, style);
        self.style = style;
        if let Some(id) = self.selection.primary() {
            let needs_jump = self
                .store
                .get(id)
                .and_then(|item| item.latest_index_for(style).map(|i| item.view_index != Some(i)))
                .unwrap_or(false);
            if needs_jump {
                self.store.update(id, |item| item.jump_to_latest(style));
            }
        }
        true
    }

    /// Replace all items (after loading from storage).
    pub fn restore_items(&mut self, items: Vec<CanvasItem>) {
        self.store.restore(items);
        let store = &self.store;
        self.selection.retain(|id| store.contains(id));
        if self.maximized.is_some_and(|id| !self.store.contains(id)) {
            self.maximized = None;
        }
        self.reconcile_primary();
    }

    // ─── Pointer input ───────────────────────────────────────────────────

    /// Route any input event. Returns true if visible state changed.
    pub fn handle_event(&mut self, event: &InputEvent) -> bool {
        match event {
            InputEvent::Wheel {
                dx,
                dy,
                x,
                y,
                modifiers,
            } => self.handle_wheel(*dx, *dy, *x, *y, *modifiers),
            InputEvent::Key {
                key,
                pressed: true,
                modifiers,
            } => self.handle_key(key, *modifiers).is_some(),
            InputEvent::Key {
                key,
                pressed: false,
                ..
            } => self.handle_key_up(key),
            pointer => self.handle_pointer(pointer),
        }
    }

    pub fn handle_pointer_down(
        &mut self,
        x: f64,
        y: f64,
        button: PointerButton,
        modifiers: Modifiers,
    ) -> bool {
        self.handle_pointer(&InputEvent::PointerDown {
            x,
            y,
            button,
            modifiers,
        })
    }

    pub fn handle_pointer_move(&mut self, x: f64, y: f64, modifiers: Modifiers) -> bool {
        self.handle_pointer(&InputEvent::PointerMove { x, y, modifiers })
    }

    pub fn handle_pointer_up(&mut self, x: f64, y: f64, modifiers: Modifiers) -> bool {
        let was_active = !self.gesture.is_idle();
        self.handle_pointer(&InputEvent::PointerUp { x, y, modifiers });
        was_active
    }

    fn handle_pointer(&mut self, event: &InputEvent) -> bool {
        let metrics = self.config.metrics();
        let hit = event
            .position()
            .and_then(|(x, y)| hit_test(self.store.items(), &self.view, &metrics, Point::new(x, y)));
        let ctx = GestureContext {
            items: self.store.items(),
            selection: &self.selection,
            view: &self.view,
            metrics,
            snap_to_grid: self.config.snap_to_grid,
            pan_key_held: self.pan_key_held,
        };
        let mutations = self.gesture.handle(event, hit, &ctx);
        let box_active = self.gesture.selection_box().is_some();
        self.apply_mutations(mutations) || box_active
    }

    /// Zoom (anchored at the pointer) or pan, depending on modifiers.
    pub fn handle_wheel(&mut self, dx: f64, dy: f64, x: f64, y: f64, modifiers: Modifiers) -> bool {
        let before = self.view;
        self.view.apply_wheel(WheelInput {
            delta_x: dx,
            delta_y: dy,
            anchor: Point::new(x, y),
            zoom_modifier: modifiers.command(),
            scroll_modifier: modifiers.shift,
        });
        self.view != before
    }

    /// Apply gesture mutations. Returns true if anything changed.
    pub fn apply_mutations(&mut self, mutations: Vec<CanvasMutation>) -> bool {
        let mut changed = false;
        let mut selection_changed = false;
        for mutation in mutations {
            match mutation {
                CanvasMutation::SetViewOffset { offset_x, offset_y } => {
                    self.view.set_offset(offset_x, offset_y);
                    changed = true;
                }
                CanvasMutation::MoveItem { id, position } => {
                    changed |= self.store.move_to(id, position);
                }
                CanvasMutation::SelectOnly(id) => {
                    self.selection.select_only(id);
                    selection_changed = true;
                }
                CanvasMutation::AddToSelection(id) => {
                    self.selection.add(id);
                    selection_changed = true;
                }
                CanvasMutation::RemoveFromSelection(id) => {
                    selection_changed |= self.selection.remove(id);
                }
                CanvasMutation::ClearSelection => {
                    selection_changed |= !self.selection.is_empty();
                    self.selection.clear();
                }
                CanvasMutation::ReplaceSelection(ids) => {
                    self.selection.select_all(ids);
                    selection_changed = true;
                }
            }
        }
        if selection_changed {
            self.reconcile_primary();
        }
        changed || selection_changed
    }

    // ─── Keyboard ────────────────────────────────────────────────────────

    /// Handle a key press. Returns the action taken, if any.
    pub fn handle_key(&mut self, key: &str, modifiers: Modifiers) -> Option<ShortcutAction> {
        let action = ShortcutMap::resolve(key, modifiers)?;
        self.dispatch_action(action);
        Some(action)
    }

    /// Handle a key release. Returns true if a pan ended.
    pub fn handle_key_up(&mut self, key: &str) -> bool {
        match ShortcutMap::resolve_release(key) {
            Some(action) => self.dispatch_action(action),
            None => false,
        }
    }

    fn dispatch_action(&mut self, action: ShortcutAction) -> bool {
        match action {
            ShortcutAction::Delete => self.delete_selected() > 0,
            ShortcutAction::SelectAll => {
                let ids: Vec<ItemId> = self.store.ids().collect();
                self.select_all(ids);
                true
            }
            ShortcutAction::ZoomIn => self.zoom_centered(KEY_ZOOM_FACTOR),
            ShortcutAction::ZoomOut => self.zoom_centered(1.0 / KEY_ZOOM_FACTOR),
            ShortcutAction::ResetView => {
                self.reset_view();
                true
            }
            ShortcutAction::PanStart => {
                self.pan_key_held = true;
                false
            }
            ShortcutAction::PanEnd => {
                self.pan_key_held = false;
                self.gesture.release_pan_key()
            }
            ShortcutAction::Dismiss => self.maximized.take().is_some(),
        }
    }

    fn zoom_centered(&mut self, factor: f64) -> bool {
        let before = self.view.scale;
        let center = Point::new(self.canvas_size.width / 2.0, self.canvas_size.height / 2.0);
        self.view.zoom_at(center, factor);
        self.view.scale != before
    }

    pub fn reset_view(&mut self) {
        self.view.reset();
    }

    // ─── Selection ───────────────────────────────────────────────────────

    pub fn select_only(&mut self, id: ItemId) {
        self.selection.select_only(id);
        self.reconcile_primary();
    }

    pub fn toggle_selection(&mut self, id: ItemId) {
        self.selection.toggle(id);
        self.reconcile_primary();
    }

    pub fn select_all(&mut self, ids: impl IntoIterator<Item = ItemId>) {
        self.selection.select_all(ids);
        self.reconcile_primary();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Repoint the primary item at a result of the active style when the
    /// viewed entry belongs to another style.
    fn reconcile_primary(&mut self) {
        let Some(id) = self.selection.primary() else {
            return;
        };
        let style = self.style;
        let needs_repoint = self.store.get(id).is_some_and(|item| {
            item.visible_result(style).is_none() && item.latest_index_for(style).is_some()
        });
        if needs_repoint {
            self.store.update(id, |item| item.reconcile_view(style));
        }
    }

    // ─── Items ───────────────────────────────────────────────────────────

    /// Import one image and add it to the selection.
    pub fn import_image(&mut self, image: ImageRef, placement: Placement) -> ItemId {
        let id = self.store.import(image, placement, &self.config.metrics());
        self.selection.add(id);
        self.reconcile_primary();
        id
    }

    /// Import images dropped at screen position (`x`, `y`). The selection is
    /// replaced by the dropped items.
    pub fn drop_images(&mut self, images: Vec<ImageRef>, x: f64, y: f64) -> Vec<ItemId> {
        let world = self.view.screen_to_world(Point::new(x, y));
        let positions = drop_positions(world, images.len(), &self.config.metrics());
        self.selection.clear();
        images
            .into_iter()
            .zip(positions)
            .map(|(image, at)| self.import_image(image, Placement::At(at)))
            .collect()
    }

    pub fn delete_item(&mut self, id: ItemId) -> bool {
        if !self.store.remove(id) {
            return false;
        }
        self.selection.remove(id);
        if self.maximized == Some(id) {
            self.maximized = None;
        }
        self.reconcile_primary();
        true
    }

    /// Delete every selected item. Returns how many were removed.
    pub fn delete_selected(&mut self) -> usize {
        if self.selection.is_empty() {
            return 0;
        }
        let doomed: Vec<ItemId> = self.selection.iter().collect();
        let removed = self.store.remove_many(doomed.iter().copied());
        if self.maximized.is_some_and(|id| doomed.contains(&id)) {
            self.maximized = None;
        }
        self.selection.clear();
        log::debug!("deleted {removed} selected item(s)");
        removed
    }

    /// Lay all items out in a grid as wide as the visible canvas.
    pub fn arrange_grid(&mut self) {
        let metrics = self.config.metrics();
        let cols = grid_columns(self.canvas_size.width, self.view.scale, &metrics);
        self.store.arrange_grid(cols, &metrics);
    }

    pub fn maximize(&mut self, id: ItemId) -> bool {
        if !self.store.contains(id) {
            return false;
        }
        self.maximized = Some(id);
        true
    }

    // ─── History ─────────────────────────────────────────────────────────

    /// Append a finished result and view it.
    pub fn append_result(&mut self, id: ItemId, result: GenerationResult) -> bool {
        self.store.append_result(id, result)
    }

    pub fn show_previous_version(&mut self) -> bool {
        self.step_version(|item, style| item.previous_index(style))
    }

    pub fn show_next_version(&mut self) -> bool {
        self.step_version(|item, style| item.next_index(style))
    }

    fn step_version(&mut self, target: impl Fn(&CanvasItem, CaptionStyle) -> Option<usize>) -> bool {
        let Some(id) = self.selection.primary() else {
            return false;
        };
        let style = self.style;
        let Some(index) = self.store.get(id).and_then(|item| target(item, style)) else {
            return false;
        };
        self.store
            .update(id, |item| item.view_index = Some(index))
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muse_core::ModelTier;

    fn image(name: &str) -> ImageRef {
        ImageRef {
            name: name.into(),
            mime_type: "image/jpeg".into(),
            data: String::new(),
            handle: None,
        }
    }

    fn result(style: CaptionStyle, timestamp: u64) -> GenerationResult {
        GenerationResult {
            captions: vec![],
            hashtags: vec![],
            timestamp,
            model_used: ModelTier::Lite,
            style: Some(style),
        }
    }

    #[test]
    fn import_adds_to_selection() {
        let mut c = CanvasController::default();
        let a = c.import_image(image("a"), Placement::Auto);
        let b = c.import_image(image("b"), Placement::Auto);
        assert!(c.selection().contains(a));
        assert!(c.selection().contains(b));
        assert_eq!(c.selection().primary(), None);
    }

    #[test]
    fn style_switch_jumps_primary_to_latest() {
        let mut c = CanvasController::default();
        let id = c.import_image(image("a"), Placement::Auto);
        c.append_result(id, result(CaptionStyle::Social, 1));
        c.append_result(id, result(CaptionStyle::OneLiner, 2));
        c.append_result(id, result(CaptionStyle::Social, 3));
        c.set_style(CaptionStyle::OneLiner);
        assert_eq!(c.visible_result().map(|r| r.timestamp), Some(2));
        c.set_style(CaptionStyle::Social);
        assert_eq!(c.visible_result().map(|r| r.timestamp), Some(3));
    }

    #[test]
    fn selecting_item_reconciles_view() {
        let mut c = CanvasController::default();
        let id = c.import_image(image("a"), Placement::Auto);
        c.append_result(id, result(CaptionStyle::Social, 1));
        c.append_result(id, result(CaptionStyle::OneLiner, 2));
        c.clear_selection();
        c.select_only(id);
        // active style is Social, newest entry was One-Liner
        assert_eq!(c.visible_result().map(|r| r.timestamp), Some(1));
    }

    #[test]
    fn version_navigation_on_primary() {
        let mut c = CanvasController::default();
        let id = c.import_image(image("a"), Placement::Auto);
        c.append_result(id, result(CaptionStyle::Social, 1));
        c.append_result(id, result(CaptionStyle::Social, 2));
        assert_eq!(c.version_info().current, Some(2));
        assert!(c.show_previous_version());
        assert!(!c.show_previous_version());
        assert_eq!(c.version_info().current, Some(1));
        assert!(c.show_next_version());
        assert!(!c.show_next_version());
    }

    #[test]
    fn drop_replaces_selection_and_lays_out_block() {
        let mut c = CanvasController::default();
        let old = c.import_image(image("old"), Placement::Auto);
        let dropped = c.drop_images(vec![image("x"), image("y")], 550.0, 550.0);
        assert_eq!(dropped.len(), 2);
        assert!(!c.selection().contains(old));
        assert_eq!(c.selection().len(), 2);
        // screen (550,550) with default offset (50,50) → world (500,500)
        let first = c.store().get(dropped[0]).map(|i| i.position);
        assert_eq!(first, Some(Point::new(425.0, 400.0)));
    }

    #[test]
    fn delete_key_removes_selection_and_maximized() {
        let mut c = CanvasController::default();
        let a = c.import_image(image("a"), Placement::Auto);
        c.maximize(a);
        assert_eq!(c.handle_key("Delete", Modifiers::NONE), Some(ShortcutAction::Delete));
        assert!(c.store().is_empty());
        assert!(c.selection().is_empty());
        assert_eq!(c.maximized(), None);
    }

    #[test]
    fn escape_clears_maximized_preview() {
        let mut c = CanvasController::default();
        let a = c.import_image(image("a"), Placement::Auto);
        c.maximize(a);
        c.handle_key("Escape", Modifiers::NONE);
        assert_eq!(c.maximized(), None);
        assert!(c.store().contains(a));
    }

    #[test]
    fn space_drag_pans_viewport() {
        let mut c = CanvasController::default();
        c.handle_key(" ", Modifiers::NONE);
        c.handle_pointer_down(100.0, 100.0, PointerButton::Primary, Modifiers::NONE);
        c.handle_pointer_move(130.0, 90.0, Modifiers::NONE);
        assert_eq!((c.view().offset_x, c.view().offset_y), (80.0, 40.0));
        c.handle_key_up(" ");
        assert!(c.gesture().is_idle());
        assert!(!c.is_pan_key_held());
    }

    #[test]
    fn arrange_grid_uses_canvas_width() {
        let mut c = CanvasController::default();
        c.resize(400.0, 600.0);
        for name in ["a", "b", "c"] {
            c.import_image(image(name), Placement::At(Point::new(1000.0, 1000.0)));
        }
        c.arrange_grid();
        // (400 - 20) / 170 = 2 columns
        let third = c.items()[2].position;
        assert_eq!(third, Point::new(0.0, c.config().metrics().cell_height()));
    }

    #[test]
    fn keyboard_zoom_is_anchored_at_center() {
        let mut c = CanvasController::default();
        c.resize(800.0, 600.0);
        let center = Point::new(400.0, 300.0);
        let before = c.view().screen_to_world(center);
        c.handle_key("=", Modifiers { ctrl: true, ..Modifiers::NONE });
        let after = c.view().screen_to_world(center);
        assert!((c.view().scale - 1.2).abs() < 1e-9);
        assert!((before.x - after.x).abs() < 1e-9 && (before.y - after.y).abs() < 1e-9);
        c.handle_key("0", Modifiers { meta: true, ..Modifiers::NONE });
        assert_eq!(*c.view(), ViewTransform::default());
    }
}
