//! Key bindings: normal and vim-style, plus therapy calibration keys.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MoveLeft,
    MoveRight,
    Rotate,
    SoftDrop,
    HardDrop,
    /// Start a game / confirm the hovered menu entry.
    Start,
    /// Return to the main menu.
    Menu,
    /// Swap which eye is the amblyopic one.
    SwapEye,
    GaborToggle,
    ContrastDown,
    ContrastUp,
    Quit,
    None,
}

/// Map key event to action. Supports normal (arrows, space/enter) and vim
/// (hjkl) movement, and the calibration keys used on every screen.
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod && modifiers != KeyModifiers::CONTROL {
        return Action::None;
    }
    match code {
        KeyCode::Char('q') if no_mod => Action::Quit,
        KeyCode::Esc if no_mod => Action::Menu,
        KeyCode::Left | KeyCode::Char('h') if no_mod => Action::MoveLeft,
        KeyCode::Right | KeyCode::Char('l') if no_mod => Action::MoveRight,
        KeyCode::Up | KeyCode::Char('k') if no_mod => Action::Rotate,
        KeyCode::Down | KeyCode::Char('j') if no_mod => Action::SoftDrop,
        KeyCode::Char(' ') if no_mod => Action::HardDrop,
        KeyCode::Enter if no_mod => Action::Start,
        KeyCode::Char('e') if no_mod => Action::SwapEye,
        KeyCode::Char('g') if no_mod => Action::GaborToggle,
        KeyCode::Char('[') if no_mod => Action::ContrastDown,
        KeyCode::Char(']') if no_mod => Action::ContrastUp,
        _ => Action::None,
    }
}
