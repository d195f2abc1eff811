//! Key events.

use crate::key::{Key, Modifiers};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyEventType {
    #[default]
    Press = 1,
    Repeat = 2,
    Release = 3,
}

impl KeyEventType {
    pub fn from_u32(value: u32) -> Option<KeyEventType> {
        Some(match value {
            1 => KeyEventType::Press,
            2 => KeyEventType::Repeat,
            3 => KeyEventType::Release,
            _ => return None,
        })
    }
}

/// A key event, carrying the text the key produced (when any) and the
/// shifted/base-layout alternates the kitty protocol can report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: KeyEventType,
    pub key: Key,
    pub modifiers: Modifiers,
    /// Text produced by the key under the active layout, empty if none.
    pub text: String,
    /// Code point the key produces with shift held, 0 if not reported.
    pub shifted_key: u32,
    /// Code point of the key in the standard PC-101 layout, 0 if equal.
    pub base_layout_key: u32,
}

impl KeyEvent {
    pub fn key_down(key: Key) -> KeyEvent {
        KeyEvent {
            kind: KeyEventType::Press,
            key,
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> KeyEvent {
        self.text = text.into();
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> KeyEvent {
        self.modifiers = modifiers;
        self
    }

    pub fn with_kind(mut self, kind: KeyEventType) -> KeyEvent {
        self.kind = kind;
        self
    }
}
