//! Canvas item store.
//!
//! Holds the authoritative item list. The list is shared copy-on-write:
//! `snapshot()` hands out an `Arc` that stays valid while the store keeps
//! mutating, which is what the persistence layer serializes. Every
//! mutation bumps `revision`.

use muse_core::layout::{ItemMetrics, grid_positions, smart_position};
use muse_core::{CanvasItem, GenerationResult, ImageRef, ItemId, Placement, Point};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct CanvasStore {
    items: Arc<Vec<CanvasItem>>,
    revision: u64,
    next_stack_order: u32,
}

impl Default for CanvasStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasStore {
    pub fn new() -> Self {
        Self {
            items: Arc::default(),
            revision: 0,
            next_stack_order: 1,
        }
    }

    /// Build from loaded items. Stack orders continue above the highest
    /// stored one.
    pub fn from_items(items: Vec<CanvasItem>) -> Self {
        let next_stack_order = items.iter().map(|i| i.stack_order).max().unwrap_or(0) + 1;
        Self {
            items: Arc::new(items),
            revision: 0,
            next_stack_order,
        }
    }

    pub fn items(&self) -> &[CanvasItem] {
        &self.items
    }

    /// Cheap shared view of the current list.
    pub fn snapshot(&self) -> Arc<Vec<CanvasItem>> {
        Arc::clone(&self.items)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&CanvasItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.items.iter().map(|i| i.id)
    }

    /// Replace the whole list (e.g. after loading from storage).
    pub fn restore(&mut self, items: Vec<CanvasItem>) {
        *self = Self {
            revision: self.revision + 1,
            ..Self::from_items(items)
        };
    }

    fn items_mut(&mut self) -> &mut Vec<CanvasItem> {
        self.revision += 1;
        Arc::make_mut(&mut self.items)
    }

    /// Run `f` on one item. Returns `None` (and leaves the revision alone)
    /// when the item does not exist.
    pub fn update<R>(&mut self, id: ItemId, f: impl FnOnce(&mut CanvasItem) -> R) -> Option<R> {
        let index = self.items.iter().position(|i| i.id == id)?;
        Some(f(&mut self.items_mut()[index]))
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Add a new item and return its id.
    pub fn import(&mut self, image: ImageRef, placement: Placement, metrics: &ItemMetrics) -> ItemId {
        let position = match placement {
            Placement::At(p) => p,
            Placement::Auto => {
                let occupied: Vec<Point> = self.items.iter().map(|i| i.position).collect();
                smart_position(&occupied, metrics)
            }
        };
        let id = ItemId::generate();
        let stack_order = self.next_stack_order;
        self.next_stack_order += 1;
        log::debug!("import {id:?} ({}) at ({}, {})", image.name, position.x, position.y);
        self.items_mut()
            .push(CanvasItem::new(id, image, position, stack_order));
        id
    }

    pub fn remove(&mut self, id: ItemId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.items_mut().retain(|i| i.id != id);
        true
    }

    /// Remove every item in `ids`. Returns how many were removed.
    pub fn remove_many(&mut self, ids: impl IntoIterator<Item = ItemId>) -> usize {
        let doomed: Vec<ItemId> = ids.into_iter().filter(|id| self.contains(*id)).collect();
        if doomed.is_empty() {
            return 0;
        }
        self.items_mut().retain(|i| !doomed.contains(&i.id));
        doomed.len()
    }

    // ─── Geometry ────────────────────────────────────────────────────────

    pub fn move_to(&mut self, id: ItemId, position: Point) -> bool {
        self.update(id, |item| item.position = position).is_some()
    }

    /// Lay every item out on a `cols`-wide grid and reset rotation.
    pub fn arrange_grid(&mut self, cols: usize, metrics: &ItemMetrics) {
        if self.items.is_empty() {
            return;
        }
        let positions = grid_positions(self.items.len(), cols, metrics);
        for (item, position) in self.items_mut().iter_mut().zip(positions) {
            item.position = position;
            item.rotation = 0.0;
        }
    }

    // ─── History ─────────────────────────────────────────────────────────

    /// Append a generation result and view it. Returns `false` if the item
    /// was deleted in the meantime.
    pub fn append_result(&mut self, id: ItemId, result: GenerationResult) -> bool {
        self.update(id, |item| item.push_result(result)).is_some()
    }
}
