//! Per-item version history navigation.
//!
//! An item's history is a single append-only list shared by every caption
//! style. Navigation only ever looks at the subsequence of entries that
//! match the active style; `view_index` may point at an entry of another
//! style, in which case nothing is visible until [`CanvasItem::reconcile_view`]
//! or [`CanvasItem::jump_to_latest`] repoints it.

use crate::model::{CanvasItem, CaptionStyle, GenerationResult};

/// "N / M" version counter for the active style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersionInfo {
    /// 1-based rank of the visible entry among matching entries.
    pub current: Option<usize>,
    /// Number of entries matching the active style.
    pub total: usize,
    pub can_go_prev: bool,
    pub can_go_next: bool,
}

impl CanvasItem {
    /// The entry at `view_index`, if it belongs to `style`.
    pub fn visible_result(&self, style: CaptionStyle) -> Option<&GenerationResult> {
        self.view_index
            .and_then(|i| self.history.get(i))
            .filter(|entry| entry.matches_style(style))
    }

    /// Index of the most recent entry for `style`.
    pub fn latest_index_for(&self, style: CaptionStyle) -> Option<usize> {
        self.history.iter().rposition(|entry| entry.matches_style(style))
    }

    /// Make sure the viewed entry belongs to `style`.
    ///
    /// Leaves a matching `view_index` alone. Otherwise repoints it at the
    /// most recent matching entry; with no match at all the index stays
    /// unresolved. Returns whether `view_index` changed.
    pub fn reconcile_view(&mut self, style: CaptionStyle) -> bool {
        if self.visible_result(style).is_some() {
            return false;
        }
        match self.latest_index_for(style) {
            Some(latest) => {
                self.view_index = Some(latest);
                true
            }
            None => false,
        }
    }

    /// Jump to the most recent entry for `style`, even when the current
    /// entry already matches. Used when the active style is switched.
    pub fn jump_to_latest(&mut self, style: CaptionStyle) -> bool {
        match self.latest_index_for(style) {
            Some(latest) if self.view_index != Some(latest) => {
                self.view_index = Some(latest);
                true
            }
            _ => false,
        }
    }

    /// Closest matching entry strictly before `view_index`.
    pub fn previous_index(&self, style: CaptionStyle) -> Option<usize> {
        let current = self.view_index?;
        self.history[..current.min(self.history.len())]
            .iter()
            .rposition(|entry| entry.matches_style(style))
    }

    /// Closest matching entry strictly after `view_index` (from the start
    /// when nothing is viewed).
    pub fn next_index(&self, style: CaptionStyle) -> Option<usize> {
        let start = self.view_index.map_or(0, |i| i + 1);
        self.history
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, entry)| entry.matches_style(style))
            .map(|(i, _)| i)
    }

    /// Step back one version; no-op at the first matching entry.
    pub fn show_previous(&mut self, style: CaptionStyle) -> bool {
        match self.previous_index(style) {
            Some(i) => {
                self.view_index = Some(i);
                true
            }
            None => false,
        }
    }

    /// Step forward one version; no-op at the last matching entry.
    pub fn show_next(&mut self, style: CaptionStyle) -> bool {
        match self.next_index(style) {
            Some(i) => {
                self.view_index = Some(i);
                true
            }
            None => false,
        }
    }

    pub fn version_info(&self, style: CaptionStyle) -> VersionInfo {
        let matching: Vec<usize> = self
            .history
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.matches_style(style))
            .map(|(i, _)| i)
            .collect();

        let rank = self
            .visible_result(style)
            .and(self.view_index)
            .and_then(|view| matching.iter().position(|&i| i == view));

        VersionInfo {
            current: rank.map(|r| r + 1),
            total: matching.len(),
            can_go_prev: rank.is_some_and(|r| r > 0),
            can_go_next: rank.is_some_and(|r| r + 1 < matching.len()),
        }
    }
}
