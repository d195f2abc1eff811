//! The key binding table.
//!
//! Bindings live in an input mode and name the mode to enter after firing.
//! A bind with `key == Key::None` is the mode's default and matches any key
//! press.

use core_events::{InputMode, Key, KeyEvent, KeyEventType, Modifiers};
use core_layout::{Direction, NavigateDirection, ResizeDirection};

use crate::actions::{self, Action};

pub struct KeyBind {
    pub key: Key,
    pub modifiers: Modifiers,
    /// Mode this binding is active in.
    pub mode: InputMode,
    /// Mode entered after the action runs.
    pub next_mode: InputMode,
    pub action: Action,
}

impl KeyBind {
    fn new(key: Key, modifiers: Modifiers, mode: InputMode, next_mode: InputMode, action: Action) -> KeyBind {
        KeyBind {
            key,
            modifiers,
            mode,
            next_mode,
            action,
        }
    }

    pub fn is_default(&self) -> bool {
        self.key == Key::None
    }

    pub fn matches(&self, event: &KeyEvent, mode: InputMode) -> bool {
        if mode != self.mode {
            return false;
        }
        if self.is_default() {
            return true;
        }
        event.kind != KeyEventType::Release
            && event.key == self.key
            && (event.modifiers & !Modifiers::LOCKS) == self.modifiers
    }
}

fn navigate_binds(binds: &mut Vec<KeyBind>, mode: InputMode, next_mode: InputMode) {
    let keys = [
        (Key::J, NavigateDirection::Down),
        (Key::K, NavigateDirection::Up),
        (Key::L, NavigateDirection::Right),
        (Key::H, NavigateDirection::Left),
    ];
    for (key, direction) in keys {
        binds.push(KeyBind::new(
            key,
            Modifiers::CONTROL,
            mode,
            next_mode,
            actions::navigate(direction),
        ));
    }
}

fn resize_binds(binds: &mut Vec<KeyBind>, mode: InputMode) {
    let keys = [
        (Key::J, ResizeDirection::Bottom),
        (Key::K, ResizeDirection::Top),
        (Key::L, ResizeDirection::Right),
        (Key::H, ResizeDirection::Left),
    ];
    for (key, direction) in keys {
        binds.push(KeyBind::new(
            key,
            Modifiers::empty(),
            mode,
            InputMode::Resize,
            actions::resize(direction, 2),
        ));
        binds.push(KeyBind::new(
            key,
            Modifiers::SHIFT,
            mode,
            InputMode::Resize,
            actions::resize(direction, -2),
        ));
    }
}

fn switch_tab_binds(binds: &mut Vec<KeyBind>) {
    for index in 1..=9 {
        let key = Key::digit(index as u32).expect("digits 1..=9 exist");
        binds.push(KeyBind::new(
            key,
            Modifiers::empty(),
            InputMode::Normal,
            InputMode::Insert,
            actions::switch_tab(index),
        ));
    }
    binds.push(KeyBind::new(
        Key::N,
        Modifiers::empty(),
        InputMode::Normal,
        InputMode::Insert,
        actions::next_tab(),
    ));
    binds.push(KeyBind::new(
        Key::P,
        Modifiers::empty(),
        InputMode::Normal,
        InputMode::Insert,
        actions::previous_tab(),
    ));
}

/// The default table, parameterized by the prefix key and the optional
/// pane-state save path.
pub fn make_key_binds(prefix: Key, save_state_path: Option<std::path::PathBuf>) -> Vec<KeyBind> {
    let mut binds = Vec::new();

    // Insert mode: the prefix enters normal mode; everything else goes to
    // the pane.
    binds.push(KeyBind::new(
        prefix,
        Modifiers::CONTROL,
        InputMode::Insert,
        InputMode::Normal,
        actions::enter_normal_mode(),
    ));
    binds.push(KeyBind::new(
        Key::None,
        Modifiers::empty(),
        InputMode::Insert,
        InputMode::Insert,
        actions::send_to_pane(),
    ));

    // Normal mode. Hitting the prefix again sends it through literally.
    binds.push(KeyBind::new(
        prefix,
        Modifiers::CONTROL,
        InputMode::Normal,
        InputMode::Insert,
        actions::send_to_pane(),
    ));
    resize_binds(&mut binds, InputMode::Normal);
    navigate_binds(&mut binds, InputMode::Normal, InputMode::Insert);
    switch_tab_binds(&mut binds);
    binds.push(KeyBind::new(
        Key::C,
        Modifiers::empty(),
        InputMode::Normal,
        InputMode::Insert,
        actions::create_tab(),
    ));
    binds.push(KeyBind::new(
        Key::BackSlash,
        Modifiers::SHIFT,
        InputMode::Normal,
        InputMode::Insert,
        actions::add_pane(Direction::Horizontal),
    ));
    binds.push(KeyBind::new(
        Key::Minus,
        Modifiers::empty(),
        InputMode::Normal,
        InputMode::Insert,
        actions::add_pane(Direction::Vertical),
    ));
    binds.push(KeyBind::new(
        Key::Z,
        Modifiers::empty(),
        InputMode::Normal,
        InputMode::Insert,
        actions::toggle_full_screen_pane(),
    ));
    binds.push(KeyBind::new(
        Key::X,
        Modifiers::empty(),
        InputMode::Normal,
        InputMode::Insert,
        actions::exit_pane(),
    ));
    binds.push(KeyBind::new(
        Key::D,
        Modifiers::empty(),
        InputMode::Normal,
        InputMode::Insert,
        actions::quit(),
    ));
    binds.push(KeyBind::new(
        Key::S,
        Modifiers::SHIFT,
        InputMode::Normal,
        InputMode::Insert,
        actions::save_layout(),
    ));
    if let Some(path) = save_state_path {
        binds.push(KeyBind::new(
            Key::I,
            Modifiers::SHIFT,
            InputMode::Normal,
            InputMode::Insert,
            actions::save_pane_state(path),
        ));
    }
    binds.push(KeyBind::new(
        Key::LeftBracket,
        Modifiers::empty(),
        InputMode::Normal,
        InputMode::Switch,
        actions::scroll(-1),
    ));
    binds.push(KeyBind::new(
        Key::RightBracket,
        Modifiers::empty(),
        InputMode::Normal,
        InputMode::Switch,
        actions::scroll(1),
    ));

    // Switch mode: repeated scrolling without the prefix.
    for (key, rows) in [
        (Key::K, -1),
        (Key::J, 1),
        (Key::U, -10),
        (Key::D, 10),
        (Key::LeftBracket, -1),
        (Key::RightBracket, 1),
    ] {
        binds.push(KeyBind::new(
            key,
            Modifiers::empty(),
            InputMode::Switch,
            InputMode::Switch,
            actions::scroll(rows),
        ));
    }
    for (key, cols) in [(Key::H, -2), (Key::L, 2)] {
        binds.push(KeyBind::new(
            key,
            Modifiers::empty(),
            InputMode::Switch,
            InputMode::Switch,
            actions::scroll_horizontal(cols),
        ));
    }
    binds.push(KeyBind::new(
        Key::None,
        Modifiers::empty(),
        InputMode::Switch,
        InputMode::Insert,
        actions::reset_mode(),
    ));

    // Resize mode keeps resizing until another key is hit.
    resize_binds(&mut binds, InputMode::Resize);
    navigate_binds(&mut binds, InputMode::Resize, InputMode::Insert);
    binds.push(KeyBind::new(
        Key::None,
        Modifiers::empty(),
        InputMode::Resize,
        InputMode::Insert,
        actions::reset_mode(),
    ));

    // Any unbound key in normal mode falls back to insert.
    binds.push(KeyBind::new(
        Key::None,
        Modifiers::empty(),
        InputMode::Normal,
        InputMode::Insert,
        actions::reset_mode(),
    ));

    binds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_enters_normal_mode() {
        let binds = make_key_binds(Key::B, None);
        let event = KeyEvent::key_down(Key::B).with_modifiers(Modifiers::CONTROL);
        let hit = binds
            .iter()
            .find(|bind| bind.matches(&event, InputMode::Insert))
            .unwrap();
        assert_eq!(hit.next_mode, InputMode::Normal);
    }

    #[test]
    fn default_bind_catches_everything_in_insert() {
        let binds = make_key_binds(Key::B, None);
        let event = KeyEvent::key_down(Key::Q);
        let hit = binds
            .iter()
            .find(|bind| bind.matches(&event, InputMode::Insert))
            .unwrap();
        assert!(hit.is_default());
        assert_eq!(hit.next_mode, InputMode::Insert);
    }

    #[test]
    fn unbound_normal_key_resets_mode() {
        let binds = make_key_binds(Key::B, None);
        let event = KeyEvent::key_down(Key::Q);
        let hit = binds
            .iter()
            .find(|bind| bind.matches(&event, InputMode::Normal))
            .unwrap();
        assert!(hit.is_default());
        assert_eq!(hit.next_mode, InputMode::Insert);
    }

    #[test]
    fn lock_modifiers_do_not_break_matching() {
        let binds = make_key_binds(Key::B, None);
        let event = KeyEvent::key_down(Key::B)
            .with_modifiers(Modifiers::CONTROL | Modifiers::CAPS_LOCK);
        let hit = binds
            .iter()
            .find(|bind| bind.matches(&event, InputMode::Insert))
            .unwrap();
        assert_eq!(hit.next_mode, InputMode::Normal);
    }
}
