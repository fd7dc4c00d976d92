//! Keyboard shortcut mapping.
//!
//! Maps key + modifier combos to semantic `ShortcutAction`s.
//! The map lives in Rust so it's shared by the WASM bridge and native
//! hosts.

use crate::input::Modifiers;

/// Actions that keyboard shortcuts can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    // ── Edit ──
    Undo,
    Redo,
    Delete,

    // ── Transform ──
    RotateRight,
    RotateLeft,
    FlipHorizontal,
    FlipVertical,

    // ── View ──
    ZoomIn,
    ZoomOut,
    ZoomReset,

    /// Abort an edge drag, or clear the selection when idle.
    Cancel,
}

/// Resolves key events into shortcut actions.
///
/// Uses platform-aware modifier detection: on macOS `meta` is ⌘, on other
/// platforms `ctrl` serves the same role.
pub struct ShortcutMap;

impl ShortcutMap {
    /// Resolve a key event to an action, or `None` if unbound.
    pub fn resolve(key: &str, modifiers: Modifiers) -> Option<ShortcutAction> {
        let cmd = modifiers.command();
        let shift = modifiers.shift;

        // ⌘ + Shift combos first (most specific)
        if cmd && shift {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Redo),
                _ => None,
            };
        }

        if cmd {
            return match key {
                "z" => Some(ShortcutAction::Undo),
                "y" => Some(ShortcutAction::Redo),
                "=" | "+" => Some(ShortcutAction::ZoomIn),
                "-" => Some(ShortcutAction::ZoomOut),
                "0" => Some(ShortcutAction::ZoomReset),
                _ => None,
            };
        }

        // Shift alone, or the shifted letter the browser reports.
        if shift {
            return match key {
                "r" | "R" => Some(ShortcutAction::RotateLeft),
                _ => None,
            };
        }

        match key {
            "r" => Some(ShortcutAction::RotateRight),
            "R" => Some(ShortcutAction::RotateLeft),
            "h" | "H" => Some(ShortcutAction::FlipHorizontal),
            "v" | "V" => Some(ShortcutAction::FlipVertical),
            "Delete" | "Backspace" => Some(ShortcutAction::Delete),
            "Escape" => Some(ShortcutAction::Cancel),
            _ => None,
        }
    }
}
