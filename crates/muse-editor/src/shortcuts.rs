//! Keyboard shortcut mapping.
//!
//! Maps key + modifier combos to semantic `ShortcutAction`s.
//! `key` is the `KeyboardEvent.key` value (e.g. `"a"`, `"Delete"`, `" "`).

use crate::input::Modifiers;

/// Actions that keyboard shortcuts can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    // ── Edit ──
    /// Delete every selected item.
    Delete,
    SelectAll,

    // ── View ──
    ZoomIn,
    ZoomOut,
    /// Back to the default transform.
    ResetView,
    /// Space pressed: primary presses pan.
    PanStart,
    /// Space released.
    PanEnd,

    // ── UI ──
    /// Close the maximized preview.
    Dismiss,
}

pub struct ShortcutMap;

impl ShortcutMap {
    /// Resolve a key press to an action. Returns `None` if the combo has
    /// no binding.
    pub fn resolve(key: &str, modifiers: Modifiers) -> Option<ShortcutAction> {
        if modifiers.command() {
            return match key {
                "a" | "A" => Some(ShortcutAction::SelectAll),
                "=" | "+" => Some(ShortcutAction::ZoomIn),
                "-" => Some(ShortcutAction::ZoomOut),
                "0" => Some(ShortcutAction::ResetView),
                _ => None,
            };
        }

        match key {
            "Delete" | "Backspace" => Some(ShortcutAction::Delete),
            "Escape" => Some(ShortcutAction::Dismiss),
            " " => Some(ShortcutAction::PanStart),
            _ => None,
        }
    }

    /// Resolve a key release.
    pub fn resolve_release(key: &str) -> Option<ShortcutAction> {
        match key {
            " " => Some(ShortcutAction::PanEnd),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CMD: Modifiers = Modifiers {
        meta: true,
        ..Modifiers::NONE
    };
    const CTRL: Modifiers = Modifiers {
        ctrl: true,
        ..Modifiers::NONE
    };

    #[test]
    fn resolve_delete() {
        assert_eq!(
            ShortcutMap::resolve("Delete", Modifiers::NONE),
            Some(ShortcutAction::Delete)
        );
        assert_eq!(
            ShortcutMap::resolve("Backspace", Modifiers::NONE),
            Some(ShortcutAction::Delete)
        );
    }

    #[test]
    fn resolve_select_all_on_both_platforms() {
        assert_eq!(ShortcutMap::resolve("a", CMD), Some(ShortcutAction::SelectAll));
        assert_eq!(ShortcutMap::resolve("a", CTRL), Some(ShortcutAction::SelectAll));
        assert_eq!(ShortcutMap::resolve("a", Modifiers::NONE), None);
    }

    #[test]
    fn resolve_view_shortcuts() {
        assert_eq!(ShortcutMap::resolve("=", CMD), Some(ShortcutAction::ZoomIn));
        assert_eq!(ShortcutMap::resolve("-", CTRL), Some(ShortcutAction::ZoomOut));
        assert_eq!(ShortcutMap::resolve("0", CMD), Some(ShortcutAction::ResetView));
    }

    #[test]
    fn space_press_and_release() {
        assert_eq!(
            ShortcutMap::resolve(" ", Modifiers::NONE),
            Some(ShortcutAction::PanStart)
        );
        assert_eq!(ShortcutMap::resolve_release(" "), Some(ShortcutAction::PanEnd));
        assert_eq!(ShortcutMap::resolve_release("a"), None);
    }

    #[test]
    fn escape_dismisses() {
        assert_eq!(
            ShortcutMap::resolve("Escape", Modifiers::NONE),
            Some(ShortcutAction::Dismiss)
        );
    }
}
