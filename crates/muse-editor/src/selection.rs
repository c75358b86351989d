//! Selection model.
//!
//! An unordered set of item ids, shared copy-on-write: cloning a
//! `Selection` is an `Arc` bump, and mutation only copies the set when
//! another clone is still alive.

use muse_core::ItemId;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    ids: Arc<HashSet<ItemId>>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.ids.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.ids.iter().copied()
    }

    /// The single selected id; `None` unless exactly one item is selected.
    pub fn primary(&self) -> Option<ItemId> {
        if self.ids.len() == 1 {
            self.ids.iter().next().copied()
        } else {
            None
        }
    }

    pub fn select_only(&mut self, id: ItemId) {
        if self.ids.len() == 1 && self.ids.contains(&id) {
            return;
        }
        let mut set = HashSet::with_capacity(1);
        set.insert(id);
        self.ids = Arc::new(set);
    }

    /// Add or remove `id`.
    pub fn toggle(&mut self, id: ItemId) {
        let set = Arc::make_mut(&mut self.ids);
        if !set.remove(&id) {
            set.insert(id);
        }
    }

    pub fn add(&mut self, id: ItemId) {
        if !self.ids.contains(&id) {
            Arc::make_mut(&mut self.ids).insert(id);
        }
    }

    /// Returns whether `id` was selected.
    pub fn remove(&mut self, id: ItemId) -> bool {
        if self.ids.contains(&id) {
            Arc::make_mut(&mut self.ids).remove(&id)
        } else {
            false
        }
    }

    /// Overwrite the selection with `ids`.
    pub fn select_all(&mut self, ids: impl IntoIterator<Item = ItemId>) {
        self.ids = Arc::new(ids.into_iter().collect());
    }

    pub fn clear(&mut self) {
        if !self.ids.is_empty() {
            self.ids = Arc::default();
        }
    }

    /// Drop ids that no longer exist.
    pub fn retain(&mut self, mut keep: impl FnMut(ItemId) -> bool) {
        if self.ids.iter().any(|id| !keep(*id)) {
            Arc::make_mut(&mut self.ids).retain(|id| keep(*id));
        }
    }
}
