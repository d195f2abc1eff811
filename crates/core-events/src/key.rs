//! Physical keys and modifier flags.
//!
//! The key set follows the kitty keyboard protocol's functional key
//! vocabulary; keys a legacy terminal cannot report still exist here so that
//! the encoder can downgrade them deliberately rather than by accident.

use bitflags::bitflags;

bitflags! {
    /// Keyboard modifiers, encoded on the wire as `1 + bits`.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u32 {
        const SHIFT = 1 << 0;
        const ALT = 1 << 1;
        const CONTROL = 1 << 2;
        const SUPER = 1 << 3;
        const HYPER = 1 << 4;
        const META = 1 << 5;
        const CAPS_LOCK = 1 << 6;
        const NUM_LOCK = 1 << 7;
    }
}

impl Modifiers {
    pub const LOCKS: Modifiers = Modifiers::CAPS_LOCK.union(Modifiers::NUM_LOCK);
}

/// A physical key, independent of layout-produced text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Key {
    #[default]
    None,

    // Printable block.
    Space,
    Quote,
    Comma,
    Minus,
    Period,
    Slash,
    Digit0,
    Digit1,
    Digit2,
    Digit3,
    Digit4,
    Digit5,
    Digit6,
    Digit7,
    Digit8,
    Digit9,
    SemiColon,
    Equal,
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    LeftBracket,
    BackSlash,
    RightBracket,
    Backtick,
    Star,
    Plus,

    // Editing and navigation.
    Escape,
    Enter,
    Tab,
    Backspace,
    Insert,
    Delete,
    Left,
    Right,
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,

    // Locks and system keys.
    CapsLock,
    ScrollLock,
    NumLock,
    PrintScreen,
    Pause,
    Menu,

    // Function keys.
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    F13,
    F14,
    F15,
    F16,
    F17,
    F18,
    F19,
    F20,
    F21,
    F22,
    F23,
    F24,
    F25,
    F26,
    F27,
    F28,
    F29,
    F30,
    F31,
    F32,
    F33,
    F34,
    F35,

    // Keypad.
    KeyPad0,
    KeyPad1,
    KeyPad2,
    KeyPad3,
    KeyPad4,
    KeyPad5,
    KeyPad6,
    KeyPad7,
    KeyPad8,
    KeyPad9,
    KeyPadDecimal,
    KeyPadDivide,
    KeyPadMultiply,
    KeyPadSubtract,
    KeyPadAdd,
    KeyPadEnter,
    KeyPadEqual,
    KeyPadSeparator,
    KeyPadLeft,
    KeyPadRight,
    KeyPadUp,
    KeyPadDown,
    KeyPadPageUp,
    KeyPadPageDown,
    KeyPadHome,
    KeyPadEnd,
    KeyPadInsert,
    KeyPadDelete,
    KeyPadBegin,

    // Media keys.
    MediaPlay,
    MediaPause,
    MediaPlayPause,
    MediaReverse,
    MediaStop,
    MediaFastForward,
    MediaRewind,
    MediaTrackNext,
    MediaTrackPrevious,
    MediaRecord,
    LowerVolume,
    RaiseVolume,
    MuteVolume,

    // Modifier keys as keys.
    LeftShift,
    LeftControl,
    LeftAlt,
    LeftSuper,
    LeftHyper,
    LeftMeta,
    RightShift,
    RightControl,
    RightAlt,
    RightSuper,
    RightHyper,
    RightMeta,
    IsoLevel3Shift,
    IsoLevel5Shift,
}

impl Key {
    /// True for keys that are themselves modifiers (shift, control, ...).
    pub fn is_modifier_key(&self) -> bool {
        matches!(
            self,
            Key::LeftShift
                | Key::LeftControl
                | Key::LeftAlt
                | Key::LeftSuper
                | Key::LeftHyper
                | Key::LeftMeta
                | Key::RightShift
                | Key::RightControl
                | Key::RightAlt
                | Key::RightSuper
                | Key::RightHyper
                | Key::RightMeta
                | Key::IsoLevel3Shift
                | Key::IsoLevel5Shift
        )
    }

    /// True for lock keys reported only under full escape-code reporting.
    pub fn is_lock_key(&self) -> bool {
        matches!(self, Key::CapsLock | Key::ScrollLock | Key::NumLock)
    }

    /// The digit keys 1..=9, used by tab-switch bindings.
    pub fn digit(n: u32) -> Option<Key> {
        Some(match n {
            0 => Key::Digit0,
            1 => Key::Digit1,
            2 => Key::Digit2,
            3 => Key::Digit3,
            4 => Key::Digit4,
            5 => Key::Digit5,
            6 => Key::Digit6,
            7 => Key::Digit7,
            8 => Key::Digit8,
            9 => Key::Digit9,
            _ => return None,
        })
    }
}
