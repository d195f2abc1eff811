//! Key event encoding and decoding.
//!
//! Encoding obeys the kitty keyboard protocol's progressive enhancement
//! flags; with no flags set the output degrades to the legacy xterm byte
//! vocabulary. Decoding is the inverse, applied to CSI and SS3 sequences
//! arriving from the host terminal.
//!
//! The legacy table is ordered so that the *first* entry for a byte is the
//! event produced when decoding that byte; later entries are alternate key
//! chords that encode to the same byte.

use core_vt::{Csi, Params};

use crate::key::{Key, Modifiers};
use crate::key_event::{KeyEvent, KeyEventType};

/// DECCKM. When enabled, unmodified arrows/home/end report via SS3.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApplicationCursorKeysMode {
    #[default]
    Disabled,
    Enabled,
}

bitflags::bitflags! {
    /// Kitty keyboard protocol progressive enhancement flags.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct KeyReportingFlags: u32 {
        const DISAMBIGUATE = 1 << 0;
        const REPORT_EVENT_TYPES = 1 << 1;
        const REPORT_ALTERNATE_KEYS = 1 << 2;
        const REPORT_ALL_KEYS_AS_ESCAPE_CODES = 1 << 3;
        const REPORT_ASSOCIATED_TEXT = 1 << 4;
    }
}

struct CodePointMapping {
    code_point: u32,
    key: Key,
    modifiers: Modifiers,
}

const fn m(code_point: u32, key: Key, modifiers: Modifiers) -> CodePointMapping {
    CodePointMapping {
        code_point,
        key,
        modifiers,
    }
}

const NONE: Modifiers = Modifiers::empty();
const SHIFT: Modifiers = Modifiers::SHIFT;
const CONTROL: Modifiers = Modifiers::CONTROL;
const CONTROL_SHIFT: Modifiers = Modifiers::CONTROL.union(Modifiers::SHIFT);

#[rustfmt::skip]
const LEGACY_CODE_POINT_MAPPINGS: &[CodePointMapping] = &[
    m(0x00, Key::Digit2, CONTROL_SHIFT),
    m(0x00, Key::Digit2, CONTROL),
    m(0x00, Key::Space, CONTROL),
    m(0x00, Key::Space, CONTROL_SHIFT),

    m(0x01, Key::A, CONTROL),
    m(0x02, Key::B, CONTROL),
    m(0x03, Key::C, CONTROL),
    m(0x04, Key::D, CONTROL),
    m(0x05, Key::E, CONTROL),
    m(0x06, Key::F, CONTROL),
    m(0x07, Key::G, CONTROL),

    m(0x08, Key::H, CONTROL),
    m(0x08, Key::Backspace, CONTROL),
    m(0x08, Key::Backspace, CONTROL_SHIFT),

    m(0x09, Key::I, CONTROL),
    m(0x09, Key::Tab, NONE),
    m(0x09, Key::Tab, CONTROL),

    m(0x0A, Key::J, CONTROL),
    m(0x0B, Key::K, CONTROL),
    m(0x0C, Key::L, CONTROL),

    m(0x0D, Key::M, CONTROL),
    m(0x0D, Key::Enter, NONE),
    m(0x0D, Key::Enter, SHIFT),
    m(0x0D, Key::Enter, CONTROL),
    m(0x0D, Key::Enter, CONTROL_SHIFT),

    m(0x0E, Key::N, CONTROL),
    m(0x0F, Key::O, CONTROL),
    m(0x10, Key::P, CONTROL),
    m(0x11, Key::Q, CONTROL),
    m(0x12, Key::R, CONTROL),
    m(0x13, Key::S, CONTROL),
    m(0x14, Key::T, CONTROL),
    m(0x15, Key::U, CONTROL),
    m(0x16, Key::V, CONTROL),
    m(0x17, Key::W, CONTROL),
    m(0x18, Key::X, CONTROL),
    m(0x19, Key::Y, CONTROL),
    m(0x1A, Key::Z, CONTROL),

    m(0x1B, Key::Escape, NONE),
    m(0x1B, Key::Escape, CONTROL),
    m(0x1B, Key::Escape, SHIFT),
    m(0x1B, Key::Escape, CONTROL_SHIFT),
    m(0x1B, Key::LeftBracket, CONTROL),
    m(0x1B, Key::Digit3, CONTROL),

    m(0x1C, Key::BackSlash, CONTROL),
    m(0x1C, Key::Digit4, CONTROL),

    m(0x1D, Key::RightBracket, CONTROL),
    m(0x1D, Key::Digit5, CONTROL),

    m(0x1E, Key::Digit6, CONTROL_SHIFT),
    m(0x1E, Key::Digit6, CONTROL),
    m(0x1E, Key::Backtick, CONTROL_SHIFT),

    m(0x1F, Key::Minus, CONTROL_SHIFT),
    m(0x1F, Key::Slash, CONTROL),
    m(0x1F, Key::Digit7, CONTROL),

    m(b' ' as u32, Key::Space, NONE),
    m(b' ' as u32, Key::Space, SHIFT),
    m(b'!' as u32, Key::Digit1, SHIFT),
    m(b'"' as u32, Key::Quote, SHIFT),
    m(b'#' as u32, Key::Digit3, SHIFT),
    m(b'$' as u32, Key::Digit4, SHIFT),
    m(b'%' as u32, Key::Digit5, SHIFT),
    m(b'&' as u32, Key::Digit7, SHIFT),
    m(b'\'' as u32, Key::Quote, NONE),
    m(b'(' as u32, Key::Digit9, SHIFT),
    m(b')' as u32, Key::Digit0, SHIFT),
    m(b'*' as u32, Key::Digit8, SHIFT),
    m(b'*' as u32, Key::Star, NONE),
    m(b'+' as u32, Key::Equal, SHIFT),
    m(b'+' as u32, Key::Plus, NONE),
    m(b',' as u32, Key::Comma, NONE),
    m(b'-' as u32, Key::Minus, NONE),
    m(b'.' as u32, Key::Period, NONE),
    m(b'/' as u32, Key::Slash, NONE),
    m(b'0' as u32, Key::Digit0, NONE),
    m(b'1' as u32, Key::Digit1, NONE),
    m(b'2' as u32, Key::Digit2, NONE),
    m(b'3' as u32, Key::Digit3, NONE),
    m(b'4' as u32, Key::Digit4, NONE),
    m(b'5' as u32, Key::Digit5, NONE),
    m(b'6' as u32, Key::Digit6, NONE),
    m(b'7' as u32, Key::Digit7, NONE),
    m(b'8' as u32, Key::Digit8, NONE),
    m(b'9' as u32, Key::Digit9, NONE),
    m(b'9' as u32, Key::Digit9, CONTROL),
    m(b':' as u32, Key::SemiColon, SHIFT),
    m(b';' as u32, Key::SemiColon, NONE),
    m(b'<' as u32, Key::Comma, SHIFT),
    m(b'=' as u32, Key::Equal, NONE),
    m(b'>' as u32, Key::Period, SHIFT),
    m(b'?' as u32, Key::Slash, SHIFT),
    m(b'@' as u32, Key::Digit2, SHIFT),
    m(b'A' as u32, Key::A, SHIFT),
    m(b'B' as u32, Key::B, SHIFT),
    m(b'C' as u32, Key::C, SHIFT),
    m(b'D' as u32, Key::D, SHIFT),
    m(b'E' as u32, Key::E, SHIFT),
    m(b'F' as u32, Key::F, SHIFT),
    m(b'G' as u32, Key::G, SHIFT),
    m(b'H' as u32, Key::H, SHIFT),
    m(b'I' as u32, Key::I, SHIFT),
    m(b'J' as u32, Key::J, SHIFT),
    m(b'K' as u32, Key::K, SHIFT),
    m(b'L' as u32, Key::L, SHIFT),
    m(b'M' as u32, Key::M, SHIFT),
    m(b'N' as u32, Key::N, SHIFT),
    m(b'O' as u32, Key::O, SHIFT),
    m(b'P' as u32, Key::P, SHIFT),
    m(b'Q' as u32, Key::Q, SHIFT),
    m(b'R' as u32, Key::R, SHIFT),
    m(b'S' as u32, Key::S, SHIFT),
    m(b'T' as u32, Key::T, SHIFT),
    m(b'U' as u32, Key::U, SHIFT),
    m(b'V' as u32, Key::V, SHIFT),
    m(b'W' as u32, Key::W, SHIFT),
    m(b'X' as u32, Key::X, SHIFT),
    m(b'Y' as u32, Key::Y, SHIFT),
    m(b'Z' as u32, Key::Z, SHIFT),
    m(b'[' as u32, Key::LeftBracket, NONE),
    m(b'\\' as u32, Key::BackSlash, NONE),
    m(b']' as u32, Key::RightBracket, NONE),
    m(b'^' as u32, Key::Digit6, SHIFT),
    m(b'_' as u32, Key::Minus, SHIFT),
    m(b'`' as u32, Key::Backtick, NONE),
    m(b'a' as u32, Key::A, NONE),
    m(b'b' as u32, Key::B, NONE),
    m(b'c' as u32, Key::C, NONE),
    m(b'd' as u32, Key::D, NONE),
    m(b'e' as u32, Key::E, NONE),
    m(b'f' as u32, Key::F, NONE),
    m(b'g' as u32, Key::G, NONE),
    m(b'h' as u32, Key::H, NONE),
    m(b'i' as u32, Key::I, NONE),
    m(b'j' as u32, Key::J, NONE),
    m(b'k' as u32, Key::K, NONE),
    m(b'l' as u32, Key::L, NONE),
    m(b'm' as u32, Key::M, NONE),
    m(b'n' as u32, Key::N, NONE),
    m(b'o' as u32, Key::O, NONE),
    m(b'p' as u32, Key::P, NONE),
    m(b'q' as u32, Key::Q, NONE),
    m(b'r' as u32, Key::R, NONE),
    m(b's' as u32, Key::S, NONE),
    m(b't' as u32, Key::T, NONE),
    m(b'u' as u32, Key::U, NONE),
    m(b'v' as u32, Key::V, NONE),
    m(b'w' as u32, Key::W, NONE),
    m(b'x' as u32, Key::X, NONE),
    m(b'y' as u32, Key::Y, NONE),
    m(b'z' as u32, Key::Z, NONE),
    m(b'{' as u32, Key::LeftBracket, SHIFT),
    m(b'|' as u32, Key::BackSlash, SHIFT),
    m(b'}' as u32, Key::RightBracket, SHIFT),
    m(b'~' as u32, Key::Backtick, SHIFT),

    m(0x7F, Key::Slash, CONTROL_SHIFT),
    m(0x7F, Key::Digit7, CONTROL),
    m(0x7F, Key::Backspace, NONE),
    m(0x7F, Key::Backspace, SHIFT),
];

#[rustfmt::skip]
const SS3_MAPPINGS: &[CodePointMapping] = &[
    m(b'A' as u32, Key::Up, NONE),
    m(b'B' as u32, Key::Down, NONE),
    m(b'C' as u32, Key::Right, NONE),
    m(b'D' as u32, Key::Left, NONE),
    m(b'E' as u32, Key::KeyPadBegin, NONE),
    m(b'H' as u32, Key::Home, NONE),
    m(b'F' as u32, Key::End, NONE),
    m(b'P' as u32, Key::F1, NONE),
    m(b'Q' as u32, Key::F2, NONE),
    m(b'R' as u32, Key::F3, NONE),
    m(b'S' as u32, Key::F4, NONE),
    // CSI Z is the legacy encoding of shift+tab.
    m(b'Z' as u32, Key::Tab, SHIFT),
];

#[rustfmt::skip]
const LEGACY_FUNCTIONAL_KEY_MAPPINGS: &[CodePointMapping] = &[
    m(2, Key::Insert, NONE),
    m(3, Key::Delete, NONE),
    m(5, Key::PageUp, NONE),
    m(6, Key::PageDown, NONE),
    m(7, Key::Home, NONE),
    m(8, Key::End, NONE),
    m(11, Key::F1, NONE),
    m(12, Key::F2, NONE),
    m(13, Key::F3, NONE),
    m(14, Key::F4, NONE),
    m(15, Key::F5, NONE),
    m(17, Key::F6, NONE),
    m(18, Key::F7, NONE),
    m(19, Key::F8, NONE),
    m(20, Key::F9, NONE),
    m(21, Key::F10, NONE),
    m(23, Key::F11, NONE),
    m(24, Key::F12, NONE),
    m(29, Key::Menu, NONE),
];

#[rustfmt::skip]
const CODE_POINT_KEY_MAPPINGS: &[CodePointMapping] = &[
    m(0, Key::None, NONE),
    m(9, Key::Tab, NONE),
    m(13, Key::Enter, NONE),
    m(27, Key::Escape, NONE),
    m(b' ' as u32, Key::Space, NONE),
    m(b'\'' as u32, Key::Quote, NONE),
    m(b',' as u32, Key::Comma, NONE),
    m(b'-' as u32, Key::Minus, NONE),
    m(b'.' as u32, Key::Period, NONE),
    m(b'/' as u32, Key::Slash, NONE),
    m(b'0' as u32, Key::Digit0, NONE),
    m(b'1' as u32, Key::Digit1, NONE),
    m(b'2' as u32, Key::Digit2, NONE),
    m(b'3' as u32, Key::Digit3, NONE),
    m(b'4' as u32, Key::Digit4, NONE),
    m(b'5' as u32, Key::Digit5, NONE),
    m(b'6' as u32, Key::Digit6, NONE),
    m(b'7' as u32, Key::Digit7, NONE),
    m(b'8' as u32, Key::Digit8, NONE),
    m(b'9' as u32, Key::Digit9, NONE),
    m(b';' as u32, Key::SemiColon, NONE),
    m(b'=' as u32, Key::Equal, NONE),
    m(b'[' as u32, Key::LeftBracket, NONE),
    m(b'\\' as u32, Key::BackSlash, NONE),
    m(b']' as u32, Key::RightBracket, NONE),
    m(b'`' as u32, Key::Backtick, NONE),
    m(b'a' as u32, Key::A, NONE),
    m(b'b' as u32, Key::B, NONE),
    m(b'c' as u32, Key::C, NONE),
    m(b'd' as u32, Key::D, NONE),
    m(b'e' as u32, Key::E, NONE),
    m(b'f' as u32, Key::F, NONE),
    m(b'g' as u32, Key::G, NONE),
    m(b'h' as u32, Key::H, NONE),
    m(b'i' as u32, Key::I, NONE),
    m(b'j' as u32, Key::J, NONE),
    m(b'k' as u32, Key::K, NONE),
    m(b'l' as u32, Key::L, NONE),
    m(b'm' as u32, Key::M, NONE),
    m(b'n' as u32, Key::N, NONE),
    m(b'o' as u32, Key::O, NONE),
    m(b'p' as u32, Key::P, NONE),
    m(b'q' as u32, Key::Q, NONE),
    m(b'r' as u32, Key::R, NONE),
    m(b's' as u32, Key::S, NONE),
    m(b't' as u32, Key::T, NONE),
    m(b'u' as u32, Key::U, NONE),
    m(b'v' as u32, Key::V, NONE),
    m(b'w' as u32, Key::W, NONE),
    m(b'x' as u32, Key::X, NONE),
    m(b'y' as u32, Key::Y, NONE),
    m(b'z' as u32, Key::Z, NONE),
    m(127, Key::Backspace, NONE),

    m(b'*' as u32, Key::Star, NONE),
    m(b'+' as u32, Key::Plus, NONE),

    m(57358, Key::CapsLock, NONE),
    m(57359, Key::ScrollLock, NONE),
    m(57360, Key::NumLock, NONE),
    m(57361, Key::PrintScreen, NONE),
    m(57362, Key::Pause, NONE),
    m(57363, Key::Menu, NONE),
    m(57376, Key::F13, NONE),
    m(57377, Key::F14, NONE),
    m(57378, Key::F15, NONE),
    m(57379, Key::F16, NONE),
    m(57380, Key::F17, NONE),
    m(57381, Key::F18, NONE),
    m(57382, Key::F19, NONE),
    m(57383, Key::F20, NONE),
    m(57384, Key::F21, NONE),
    m(57385, Key::F22, NONE),
    m(57386, Key::F23, NONE),
    m(57387, Key::F24, NONE),
    m(57388, Key::F25, NONE),
    m(57389, Key::F26, NONE),
    m(57390, Key::F27, NONE),
    m(57391, Key::F28, NONE),
    m(57392, Key::F29, NONE),
    m(57393, Key::F30, NONE),
    m(57394, Key::F31, NONE),
    m(57395, Key::F32, NONE),
    m(57396, Key::F33, NONE),
    m(57397, Key::F34, NONE),
    m(57398, Key::F35, NONE),
    m(57399, Key::KeyPad0, NONE),
    m(57400, Key::KeyPad1, NONE),
    m(57401, Key::KeyPad2, NONE),
    m(57402, Key::KeyPad3, NONE),
    m(57403, Key::KeyPad4, NONE),
    m(57404, Key::KeyPad5, NONE),
    m(57405, Key::KeyPad6, NONE),
    m(57406, Key::KeyPad7, NONE),
    m(57407, Key::KeyPad8, NONE),
    m(57408, Key::KeyPad9, NONE),
    m(57409, Key::KeyPadDecimal, NONE),
    m(57410, Key::KeyPadDivide, NONE),
    m(57411, Key::KeyPadMultiply, NONE),
    m(57412, Key::KeyPadSubtract, NONE),
    m(57413, Key::KeyPadAdd, NONE),
    m(57414, Key::KeyPadEnter, NONE),
    m(57415, Key::KeyPadEqual, NONE),
    m(57416, Key::KeyPadSeparator, NONE),
    m(57417, Key::KeyPadLeft, NONE),
    m(57418, Key::KeyPadRight, NONE),
    m(57419, Key::KeyPadUp, NONE),
    m(57420, Key::KeyPadDown, NONE),
    m(57421, Key::KeyPadPageUp, NONE),
    m(57422, Key::KeyPadPageDown, NONE),
    m(57423, Key::KeyPadHome, NONE),
    m(57424, Key::KeyPadEnd, NONE),
    m(57425, Key::KeyPadInsert, NONE),
    m(57426, Key::KeyPadDelete, NONE),
    m(57427, Key::KeyPadBegin, NONE),
    m(57428, Key::MediaPlay, NONE),
    m(57429, Key::MediaPause, NONE),
    m(57430, Key::MediaPlayPause, NONE),
    m(57431, Key::MediaReverse, NONE),
    m(57432, Key::MediaStop, NONE),
    m(57433, Key::MediaFastForward, NONE),
    m(57434, Key::MediaRewind, NONE),
    m(57435, Key::MediaTrackNext, NONE),
    m(57436, Key::MediaTrackPrevious, NONE),
    m(57437, Key::MediaRecord, NONE),
    m(57438, Key::LowerVolume, NONE),
    m(57439, Key::RaiseVolume, NONE),
    m(57440, Key::MuteVolume, NONE),
    m(57441, Key::LeftShift, NONE),
    m(57442, Key::LeftControl, NONE),
    m(57443, Key::LeftAlt, NONE),
    m(57444, Key::LeftSuper, NONE),
    m(57445, Key::LeftHyper, NONE),
    m(57446, Key::LeftMeta, NONE),
    m(57447, Key::RightShift, NONE),
    m(57448, Key::RightControl, NONE),
    m(57449, Key::RightAlt, NONE),
    m(57450, Key::RightSuper, NONE),
    m(57451, Key::RightHyper, NONE),
    m(57452, Key::RightMeta, NONE),
    m(57453, Key::IsoLevel3Shift, NONE),
    m(57454, Key::IsoLevel5Shift, NONE),
];

const NUMPAD_KEY_MAPPINGS: &[(Key, Key)] = &[
    (Key::KeyPad0, Key::Digit0),
    (Key::KeyPad1, Key::Digit1),
    (Key::KeyPad2, Key::Digit2),
    (Key::KeyPad3, Key::Digit3),
    (Key::KeyPad4, Key::Digit4),
    (Key::KeyPad5, Key::Digit5),
    (Key::KeyPad6, Key::Digit6),
    (Key::KeyPad7, Key::Digit7),
    (Key::KeyPad8, Key::Digit8),
    (Key::KeyPad9, Key::Digit9),
    (Key::KeyPadDecimal, Key::Period),
    (Key::KeyPadDivide, Key::Slash),
    (Key::KeyPadMultiply, Key::Star),
    (Key::KeyPadSubtract, Key::Minus),
    (Key::KeyPadAdd, Key::Plus),
    (Key::KeyPadEnter, Key::Enter),
    (Key::KeyPadEqual, Key::Equal),
    (Key::KeyPadSeparator, Key::Comma),
    (Key::KeyPadLeft, Key::Left),
    (Key::KeyPadRight, Key::Right),
    (Key::KeyPadUp, Key::Up),
    (Key::KeyPadDown, Key::Down),
    (Key::KeyPadPageUp, Key::PageUp),
    (Key::KeyPadPageDown, Key::PageDown),
    (Key::KeyPadHome, Key::Home),
    (Key::KeyPadEnd, Key::End),
    (Key::KeyPadInsert, Key::Insert),
    (Key::KeyPadDelete, Key::Delete),
];

/// Convert a keypad key to its non-keypad equivalent. Very uncommon keys
/// (KeyPadBegin) are left untouched.
fn normalize_keypad_key(key: Key) -> Key {
    for &(keypad, plain) in NUMPAD_KEY_MAPPINGS {
        if key == keypad {
            return plain;
        }
    }
    key
}

/// Enter, tab and backspace keep their legacy byte forms even under
/// disambiguation, for compatibility.
fn is_special_key_for_reporting(key: Key) -> bool {
    matches!(key, Key::Enter | Key::Tab | Key::Backspace)
}

#[allow(clippy::too_many_arguments)]
fn make_key_event_string(
    num: u32,
    modifiers: u32,
    terminator: char,
    event_type: u32,
    shifted_key: u32,
    base_layout_key: u32,
    text: &str,
    cursor_key_mode: ApplicationCursorKeysMode,
) -> String {
    // Bare key: CSI (or SS3 in application cursor key mode) terminator.
    if num == 1
        && modifiers == 1
        && event_type == 1
        && shifted_key == 0
        && base_layout_key == 0
        && text.is_empty()
    {
        return if cursor_key_mode == ApplicationCursorKeysMode::Enabled {
            format!("\x1bO{terminator}")
        } else {
            format!("\x1b[{terminator}")
        };
    }

    if modifiers == 1
        && event_type == 1
        && shifted_key == 0
        && base_layout_key == 0
        && text.is_empty()
    {
        return format!("\x1b[{num}{terminator}");
    }

    // Full form: CSI num:shifted:base ; modifiers:type ; text terminator.
    let mut params = Params::new();
    params.add_param(num);
    if shifted_key != 0 {
        params.add_subparam(shifted_key);
    }
    if base_layout_key != 0 {
        if params.subparams(0).len() == 1 {
            params.add_empty_subparam();
        }
        params.add_subparam(base_layout_key);
    }

    if modifiers != 1 {
        params.add_param(modifiers);
    }
    if event_type != 1 {
        if params.len() == 1 {
            params.add_param(modifiers);
        }
        params.add_subparam(event_type);
    }
    if !text.is_empty() {
        if params.len() == 1 {
            params.add_empty_param();
        }
        params.add_subparams(text.chars().map(|c| Some(c as u32)).collect());
    }

    format!("\x1b[{params}{terminator}")
}

/// Encode a key event for a child terminal with the given reporting state.
/// Returns `None` when the event is not reportable under those modes.
pub fn serialize_key_event(
    event: &KeyEvent,
    cursor_key_mode: ApplicationCursorKeysMode,
    flags: KeyReportingFlags,
) -> Option<String> {
    // If keys are not reported as escape codes, text-producing keys send
    // their text.
    if !flags.contains(KeyReportingFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES) && !event.text.is_empty()
    {
        if event.kind == KeyEventType::Release {
            return None;
        }
        let alt_prefix = if event.modifiers.contains(Modifiers::ALT) {
            "\x1b"
        } else {
            ""
        };
        return Some(format!("{alt_prefix}{}", event.text));
    }

    let key = if flags.contains(KeyReportingFlags::DISAMBIGUATE) {
        event.key
    } else {
        normalize_keypad_key(event.key)
    };

    // Without event-type reporting, release events vanish; special keys also
    // ignore releases unless everything is an escape code.
    if event.kind == KeyEventType::Release
        && (!flags.contains(KeyReportingFlags::REPORT_EVENT_TYPES)
            || (!flags.contains(KeyReportingFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES)
                && is_special_key_for_reporting(key)))
    {
        return None;
    }

    // Modifier and lock keys only exist under full reporting.
    if (key.is_modifier_key() || key.is_lock_key())
        && !flags.contains(KeyReportingFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES)
    {
        return None;
    }

    let event_type = if event.kind == KeyEventType::Repeat
        && !flags.contains(KeyReportingFlags::REPORT_EVENT_TYPES)
    {
        KeyEventType::Press
    } else {
        event.kind
    };

    // Legacy single-byte path.
    let try_legacy = event.text.is_empty()
        && event_type != KeyEventType::Release
        && (!flags.contains(KeyReportingFlags::DISAMBIGUATE)
            || (is_special_key_for_reporting(key)
                && !flags.contains(KeyReportingFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES)));
    if try_legacy {
        let has_alt = event.modifiers.contains(Modifiers::ALT);
        let alt_prefix = if has_alt { "\x1b" } else { "" };
        let mut modifiers = event.modifiers & !(Modifiers::ALT | Modifiers::LOCKS);

        // Keypad keys drop a lone shift.
        if key != event.key && modifiers == Modifiers::SHIFT {
            modifiers &= !Modifiers::SHIFT;
        }

        // Shift+tab is CSI Z.
        if key == Key::Tab
            && modifiers.contains(Modifiers::SHIFT)
            && (modifiers & !(Modifiers::SHIFT | Modifiers::CONTROL)).is_empty()
        {
            return Some(format!("{alt_prefix}\x1b[Z"));
        }

        for mapping in LEGACY_CODE_POINT_MAPPINGS {
            if key == mapping.key && modifiers == mapping.modifiers {
                let byte = char::from_u32(mapping.code_point)?;
                return Some(format!("{alt_prefix}{byte}"));
            }
        }

        // If control was the only modifier and nothing matched, retry
        // without it so keys like `'` pass through unchanged.
        if modifiers == Modifiers::CONTROL {
            for mapping in LEGACY_CODE_POINT_MAPPINGS {
                if key == mapping.key && mapping.modifiers.is_empty() {
                    let byte = char::from_u32(mapping.code_point)?;
                    return Some(format!("{alt_prefix}{byte}"));
                }
            }
        }
    }

    let reported_modifiers = if flags.contains(KeyReportingFlags::DISAMBIGUATE) {
        event.modifiers
    } else {
        event.modifiers & !Modifiers::LOCKS
    };
    let modifiers = 1 + reported_modifiers.bits();

    let text = if flags.contains(KeyReportingFlags::REPORT_ASSOCIATED_TEXT) {
        event.text.as_str()
    } else {
        ""
    };
    let (shifted_key, base_layout_key) = if flags.contains(KeyReportingFlags::REPORT_ALTERNATE_KEYS)
    {
        (event.shifted_key, event.base_layout_key)
    } else {
        (0, 0)
    };

    // SS3-style keys first; tab always, and F3 under disambiguation, must
    // not collide with other CSI forms.
    if key != Key::Tab && (key != Key::F3 || !flags.contains(KeyReportingFlags::DISAMBIGUATE)) {
        for mapping in SS3_MAPPINGS {
            if key == mapping.key {
                let terminator = char::from_u32(mapping.code_point)?;
                return Some(make_key_event_string(
                    1,
                    modifiers,
                    terminator,
                    event_type as u32,
                    shifted_key,
                    base_layout_key,
                    text,
                    cursor_key_mode,
                ));
            }
        }
    }

    // Legacy functional keys (CSI n ~); the menu key moves to CSI u form
    // under disambiguation.
    if key != Key::Menu || !flags.contains(KeyReportingFlags::DISAMBIGUATE) {
        for mapping in LEGACY_FUNCTIONAL_KEY_MAPPINGS {
            if key == mapping.key {
                return Some(make_key_event_string(
                    mapping.code_point,
                    modifiers,
                    '~',
                    event_type as u32,
                    shifted_key,
                    base_layout_key,
                    text,
                    cursor_key_mode,
                ));
            }
        }
    }

    // CSI u form.
    for mapping in CODE_POINT_KEY_MAPPINGS {
        if key == mapping.key {
            return Some(make_key_event_string(
                mapping.code_point,
                modifiers,
                'u',
                event_type as u32,
                shifted_key,
                base_layout_key,
                text,
                cursor_key_mode,
            ));
        }
    }

    None
}

/// Decode a bare code point received from the host terminal.
pub fn key_event_from_legacy_code_point(code_point: char, base_modifiers: Modifiers) -> KeyEvent {
    for mapping in LEGACY_CODE_POINT_MAPPINGS {
        if mapping.code_point == code_point as u32 {
            let text = if (0x20..0x7F).contains(&mapping.code_point) {
                code_point.to_string()
            } else {
                String::new()
            };
            return KeyEvent {
                kind: KeyEventType::Press,
                key: mapping.key,
                modifiers: mapping.modifiers | base_modifiers,
                text,
                ..Default::default()
            };
        }
    }

    // Anything else is a unicode text key event.
    KeyEvent {
        kind: KeyEventType::Press,
        key: Key::None,
        modifiers: base_modifiers,
        text: code_point.to_string(),
        ..Default::default()
    }
}

fn lookup(
    table: &[CodePointMapping],
    number: u32,
    shifted_key: u32,
    base_layout_key: u32,
    base_modifiers: Modifiers,
    text: String,
    kind: KeyEventType,
) -> Option<KeyEvent> {
    for mapping in table {
        if mapping.code_point == number {
            return Some(KeyEvent {
                kind,
                key: mapping.key,
                modifiers: base_modifiers | mapping.modifiers,
                text,
                shifted_key,
                base_layout_key,
            });
        }
    }
    None
}

/// Decode an `SS3 <terminator>` key report.
pub fn key_event_from_ss3(code_point: char) -> Option<KeyEvent> {
    lookup(
        SS3_MAPPINGS,
        code_point as u32,
        0,
        0,
        Modifiers::empty(),
        String::new(),
        KeyEventType::Press,
    )
}

/// Decode a CSI-form key report, in either the kitty or the legacy shape:
/// `CSI num:shifted:base ; modifiers:type ; text [ABCDEFHPQS~u]`.
pub fn key_event_from_csi(csi: &Csi) -> Option<KeyEvent> {
    if !csi.intermediate.is_empty() {
        return None;
    }

    let params = &csi.params;
    let number = params.get(0, 1);
    let shifted_key = params.get_subparam(0, 1, 0);
    let base_layout_key = params.get_subparam(0, 2, 0);
    let modifiers = Modifiers::from_bits_truncate(params.get(1, 1).saturating_sub(1));
    let kind = KeyEventType::from_u32(params.get_subparam(1, 1, KeyEventType::Press as u32))
        .unwrap_or(KeyEventType::Press);

    let mut text = String::new();
    let text_subparams = params.subparams(2);
    for i in 0..text_subparams.len() {
        if let Some(c) = char::from_u32(text_subparams.get(i, 0)) {
            if c != '\0' {
                text.push(c);
            }
        }
    }

    match csi.terminator {
        'u' => lookup(
            CODE_POINT_KEY_MAPPINGS,
            number,
            shifted_key,
            base_layout_key,
            modifiers,
            text,
            kind,
        ),
        '~' => lookup(
            LEGACY_FUNCTIONAL_KEY_MAPPINGS,
            number,
            shifted_key,
            base_layout_key,
            modifiers,
            text,
            kind,
        ),
        terminator => lookup(
            SS3_MAPPINGS,
            terminator as u32,
            shifted_key,
            base_layout_key,
            modifiers,
            text,
            kind,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn encode(event: &KeyEvent, flags: KeyReportingFlags) -> Option<String> {
        serialize_key_event(event, ApplicationCursorKeysMode::Disabled, flags)
    }

    #[test]
    fn legacy_text_passthrough() {
        let event = KeyEvent::key_down(Key::A).with_text("a");
        assert_eq!(encode(&event, KeyReportingFlags::empty()), Some("a".into()));
    }

    #[test]
    fn legacy_control_byte() {
        let event = KeyEvent::key_down(Key::C).with_modifiers(Modifiers::CONTROL);
        assert_eq!(
            encode(&event, KeyReportingFlags::empty()),
            Some("\u{3}".into())
        );
    }

    #[test]
    fn legacy_alt_prefixes_escape() {
        let event = KeyEvent::key_down(Key::X).with_modifiers(Modifiers::ALT);
        assert_eq!(
            encode(&event, KeyReportingFlags::empty()),
            Some("\x1bx".into())
        );
    }

    #[test]
    fn shift_tab_is_csi_z() {
        let event = KeyEvent::key_down(Key::Tab).with_modifiers(Modifiers::SHIFT);
        assert_eq!(
            encode(&event, KeyReportingFlags::empty()),
            Some("\x1b[Z".into())
        );
    }

    #[test]
    fn arrows_use_csi_or_ss3() {
        let event = KeyEvent::key_down(Key::Up);
        assert_eq!(
            encode(&event, KeyReportingFlags::empty()),
            Some("\x1b[A".into())
        );
        assert_eq!(
            serialize_key_event(
                &event,
                ApplicationCursorKeysMode::Enabled,
                KeyReportingFlags::empty()
            ),
            Some("\x1bOA".into())
        );
    }

    #[test]
    fn kitty_shifted_a_with_text() {
        // Press A with shift and text "A" under
        // disambiguate + all-escape-codes + associated-text.
        let flags = KeyReportingFlags::DISAMBIGUATE
            | KeyReportingFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES
            | KeyReportingFlags::REPORT_ASSOCIATED_TEXT;
        let event = KeyEvent::key_down(Key::A)
            .with_text("A")
            .with_modifiers(Modifiers::SHIFT);
        assert_eq!(encode(&event, flags), Some("\x1b[97;2;65u".into()));
    }

    #[test]
    fn release_needs_event_types() {
        let flags = KeyReportingFlags::DISAMBIGUATE;
        let event = KeyEvent::key_down(Key::A).with_kind(KeyEventType::Release);
        assert_eq!(encode(&event, flags), None);

        let flags = KeyReportingFlags::DISAMBIGUATE | KeyReportingFlags::REPORT_EVENT_TYPES;
        assert_eq!(encode(&event, flags), Some("\x1b[97;1:3u".into()));
    }

    #[test]
    fn functional_keys() {
        let event = KeyEvent::key_down(Key::PageUp);
        assert_eq!(
            encode(&event, KeyReportingFlags::empty()),
            Some("\x1b[5~".into())
        );
        let event = KeyEvent::key_down(Key::PageUp).with_modifiers(Modifiers::CONTROL);
        assert_eq!(
            encode(&event, KeyReportingFlags::empty()),
            Some("\x1b[5;5~".into())
        );
        let event = KeyEvent::key_down(Key::F5);
        assert_eq!(
            encode(&event, KeyReportingFlags::empty()),
            Some("\x1b[15~".into())
        );
    }

    #[test]
    fn decode_legacy_code_points() {
        let event = key_event_from_legacy_code_point('a', Modifiers::empty());
        assert_eq!(event.key, Key::A);
        assert_eq!(event.text, "a");

        let event = key_event_from_legacy_code_point('\u{3}', Modifiers::empty());
        assert_eq!(event.key, Key::C);
        assert_eq!(event.modifiers, Modifiers::CONTROL);

        let event = key_event_from_legacy_code_point('é', Modifiers::empty());
        assert_eq!(event.key, Key::None);
        assert_eq!(event.text, "é");
    }

    #[test]
    fn decode_inverts_encode_for_kitty_press_events() {
        let flags = KeyReportingFlags::DISAMBIGUATE
            | KeyReportingFlags::REPORT_ALTERNATE_KEYS
            | KeyReportingFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES
            | KeyReportingFlags::REPORT_ASSOCIATED_TEXT;
        let events = [
            KeyEvent::key_down(Key::A).with_text("a"),
            KeyEvent::key_down(Key::Up).with_modifiers(Modifiers::CONTROL),
            KeyEvent::key_down(Key::F6),
            KeyEvent::key_down(Key::KeyPad5),
            KeyEvent::key_down(Key::Escape).with_modifiers(Modifiers::SHIFT),
        ];
        for event in events {
            let encoded = encode(&event, flags).unwrap();
            let mut parser = core_vt::EscapeSequenceParser::new(core_vt::ParserMode::Input);
            let parsed = parser.parse(&encoded);
            let [core_vt::ParserEvent::Csi(csi)] = parsed.as_slice() else {
                panic!("expected one CSI for {encoded:?}");
            };
            assert_eq!(key_event_from_csi(csi).unwrap(), event);
        }
    }

    #[test]
    fn decode_ss3() {
        assert_eq!(key_event_from_ss3('A').unwrap().key, Key::Up);
        assert_eq!(key_event_from_ss3('Q').unwrap().key, Key::F2);
        assert_eq!(key_event_from_ss3('x'), None);
    }
}
