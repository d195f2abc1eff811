//! Mouse event encoding and decoding.
//!
//! The protocol decides *whether* an event is reported, the encoding decides
//! *how*. Coordinates are 0-indexed internally; each encoding applies its own
//! offset on the wire.

use core_vt::Csi;

use crate::Size;
use crate::key::{Key, Modifiers};
use crate::key_event::KeyEvent;
use crate::key_io::{ApplicationCursorKeysMode, KeyReportingFlags, serialize_key_event};
use crate::mouse::{
    AlternateScrollMode, MouseButton, MouseCoordinate, MouseEncoding, MouseEvent, MouseEventType,
    MousePosition, MouseProtocol,
};

const BUTTON_MAPPINGS: &[(u32, MouseButton)] = &[
    (0, MouseButton::LEFT),
    (1, MouseButton::MIDDLE),
    (2, MouseButton::RIGHT),
    (3, MouseButton::empty()),
    (64, MouseButton::SCROLL_UP),
    (65, MouseButton::SCROLL_DOWN),
    (66, MouseButton::SCROLL_LEFT),
    (67, MouseButton::SCROLL_RIGHT),
    (128, MouseButton::BUTTON_8),
    (129, MouseButton::BUTTON_9),
    (130, MouseButton::BUTTON_10),
    (131, MouseButton::BUTTON_11),
];

/// Terminal state the scroll fallback path depends on.
#[derive(Debug, Clone, Copy, Default)]
pub struct MouseScrollProtocol {
    pub alternate_scroll_mode: AlternateScrollMode,
    pub application_cursor_keys_mode: ApplicationCursorKeysMode,
    pub in_alternate_screen_buffer: bool,
}

fn mouse_button_to_number(target: MouseButton) -> u32 {
    for &(number, button) in BUTTON_MAPPINGS {
        if target == button {
            return number;
        }
    }
    // Unknown buttons degrade to "no button" rather than misreporting.
    3
}

fn modifiers_to_number(modifiers: Modifiers) -> u32 {
    let mut result = 0;
    if modifiers.contains(Modifiers::SHIFT) {
        result += 4;
    }
    if modifiers.contains(Modifiers::ALT) {
        result += 8;
    }
    if modifiers.contains(Modifiers::CONTROL) {
        result += 16;
    }
    result
}

fn mouse_number(
    kind: MouseEventType,
    button: MouseButton,
    modifiers: Modifiers,
    default_release_events: bool,
) -> u32 {
    let mut number = mouse_button_to_number(button) + modifiers_to_number(modifiers);
    if kind == MouseEventType::Move {
        number += 32;
    } else if default_release_events && kind == MouseEventType::Release {
        number = 3;
    }
    number
}

fn serialize_as_x10(
    kind: MouseEventType,
    button: MouseButton,
    position: MouseCoordinate,
    modifiers: Modifiers,
) -> Option<Vec<u8>> {
    // Single-byte coordinates limit the representable range.
    if position.x() + 33 > 255 || position.y() + 33 > 255 {
        return None;
    }
    let number = mouse_number(kind, button, modifiers, true);
    let mut result = b"\x1b[M".to_vec();
    result.push((number + 32) as u8);
    result.push((position.x() + 33) as u8);
    result.push((position.y() + 33) as u8);
    Some(result)
}

fn serialize_as_utf8(
    kind: MouseEventType,
    button: MouseButton,
    position: MouseCoordinate,
    modifiers: Modifiers,
) -> Option<Vec<u8>> {
    // Coordinates are encoded as UTF-8 scalars; the button byte is not, so
    // the whole string is not necessarily valid UTF-8. Events beyond the
    // maximum scalar are dropped.
    let x = char::from_u32(position.x() + 33)?;
    let y = char::from_u32(position.y() + 33)?;
    let number = mouse_number(kind, button, modifiers, true);

    let mut result = b"\x1b[M".to_vec();
    result.push((number + 32) as u8);
    let mut buffer = [0u8; 4];
    result.extend_from_slice(x.encode_utf8(&mut buffer).as_bytes());
    result.extend_from_slice(y.encode_utf8(&mut buffer).as_bytes());
    Some(result)
}

fn serialize_as_urxvt(
    kind: MouseEventType,
    button: MouseButton,
    position: MouseCoordinate,
    modifiers: Modifiers,
) -> Option<Vec<u8>> {
    let number = mouse_number(kind, button, modifiers, true);
    Some(
        format!(
            "\x1b[{};{};{}M",
            number + 32,
            position.x() + 1,
            position.y() + 1
        )
        .into_bytes(),
    )
}

fn serialize_as_sgr(
    kind: MouseEventType,
    button: MouseButton,
    position: MouseCoordinate,
    modifiers: Modifiers,
) -> Option<Vec<u8>> {
    let number = mouse_number(kind, button, modifiers, false);
    let final_char = if kind == MouseEventType::Release {
        'm'
    } else {
        'M'
    };
    Some(
        format!(
            "\x1b[<{};{};{}{}",
            number,
            position.x(),
            position.y(),
            final_char
        )
        .into_bytes(),
    )
}

/// Encode a mouse event for a child terminal, or `None` when the child's
/// protocol does not admit it. The output is bytes, not a string: the X10 and
/// UTF-8 encodings are not UTF-8 clean.
pub fn serialize_mouse_event(
    event: &MouseEvent,
    protocol: MouseProtocol,
    encoding: MouseEncoding,
    prev_event_position: &Option<MousePosition>,
    scroll_protocol: &MouseScrollProtocol,
    window_size: &Size,
) -> Option<Vec<u8>> {
    // Wheel events the protocol won't report may become arrow keys.
    if matches!(protocol, MouseProtocol::None | MouseProtocol::X10)
        && event.is_vertical_scroll()
        && event.kind == MouseEventType::Press
    {
        if scroll_protocol.in_alternate_screen_buffer
            && scroll_protocol.alternate_scroll_mode == AlternateScrollMode::Enabled
        {
            let key = if event.button == MouseButton::SCROLL_UP {
                Key::Up
            } else {
                Key::Down
            };
            return serialize_key_event(
                &KeyEvent::key_down(key),
                scroll_protocol.application_cursor_keys_mode,
                KeyReportingFlags::empty(),
            )
            .map(String::into_bytes);
        }
        return None;
    }

    let reported_by_protocol = match protocol {
        MouseProtocol::None => false,
        MouseProtocol::X10 => {
            event.kind == MouseEventType::Press
                && event
                    .button
                    .intersects(MouseButton::LEFT | MouseButton::MIDDLE | MouseButton::RIGHT)
        }
        MouseProtocol::VT200 => event.kind != MouseEventType::Move,
        MouseProtocol::BtnEvent => {
            event.kind != MouseEventType::Move || !event.button.is_empty()
        }
        MouseProtocol::AnyEvent => true,
    };
    if !reported_by_protocol {
        return None;
    }

    let kind = event.kind;
    let button = event.button;
    // X10 has no modifier bits.
    let modifiers = if protocol == MouseProtocol::X10 {
        Modifiers::empty()
    } else {
        event.modifiers
    };

    let (position, prev_position) = if encoding == MouseEncoding::SgrPixels {
        (
            event.position.in_pixels_with_fallback(window_size),
            prev_event_position.map(|p| p.in_pixels_with_fallback(window_size)),
        )
    } else {
        (
            event.position.in_cells(),
            prev_event_position.map(|p| p.in_cells()),
        )
    };

    // Motion that didn't change position is noise.
    if kind == MouseEventType::Move && Some(position) == prev_position {
        return None;
    }

    match encoding {
        MouseEncoding::X10 => serialize_as_x10(kind, button, position, modifiers),
        MouseEncoding::Utf8 => serialize_as_utf8(kind, button, position, modifiers),
        MouseEncoding::Urxvt => serialize_as_urxvt(kind, button, position, modifiers),
        MouseEncoding::Sgr => serialize_as_sgr(
            kind,
            button,
            MouseCoordinate::new(position.x() + 1, position.y() + 1),
            modifiers,
        ),
        MouseEncoding::SgrPixels => serialize_as_sgr(kind, button, position, modifiers),
    }
}

/// Decode an SGR mouse report: `CSI < Pb ; Px ; Py [Mm]`.
pub fn mouse_event_from_csi(
    csi: &Csi,
    window_size_if_using_pixels: Option<&Size>,
) -> Option<MouseEvent> {
    if csi.intermediate != "<" || (csi.terminator != 'M' && csi.terminator != 'm') {
        return None;
    }

    let params = &csi.params;
    let mut button_code = params.get(0, 0);
    let mut x = params.get(1, 1);
    let mut y = params.get(2, 1);
    if window_size_if_using_pixels.is_none() {
        // Cell coordinates are 1-indexed on the wire; guard against a
        // terminal mistakenly sending 0.
        x = x.saturating_sub(1);
        y = y.saturating_sub(1);
    }

    let mut modifiers = Modifiers::empty();
    let mut kind = if csi.terminator == 'M' {
        MouseEventType::Press
    } else {
        MouseEventType::Release
    };

    if button_code & 4 != 0 {
        modifiers |= Modifiers::SHIFT;
    }
    if button_code & 8 != 0 {
        modifiers |= Modifiers::ALT;
    }
    if button_code & 16 != 0 {
        modifiers |= Modifiers::CONTROL;
    }
    if button_code & 32 != 0 && kind == MouseEventType::Press {
        kind = MouseEventType::Move;
    }
    button_code &= !(4 | 8 | 16 | 32);

    let button = BUTTON_MAPPINGS
        .iter()
        .find(|(code, _)| *code == button_code)
        .map(|(_, button)| *button)?;

    let position = match window_size_if_using_pixels {
        Some(size) => MousePosition::from_pixels(MouseCoordinate::new(x, y), size),
        None => MousePosition::new(MouseCoordinate::new(x, y), None),
    };
    Some(MouseEvent {
        kind,
        button,
        position,
        modifiers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_vt::Params;
    use pretty_assertions::assert_eq;

    fn sgr_event(kind: MouseEventType, button: MouseButton, x: u32, y: u32) -> MouseEvent {
        MouseEvent {
            kind,
            button,
            position: MousePosition::new(MouseCoordinate::new(x, y), None),
            modifiers: Modifiers::empty(),
        }
    }

    fn encode_sgr(event: &MouseEvent, protocol: MouseProtocol) -> Option<Vec<u8>> {
        serialize_mouse_event(
            event,
            protocol,
            MouseEncoding::Sgr,
            &None,
            &MouseScrollProtocol::default(),
            &Size::new(24, 80),
        )
    }

    #[test]
    fn sgr_press_release() {
        let press = sgr_event(MouseEventType::Press, MouseButton::LEFT, 2, 3);
        assert_eq!(
            encode_sgr(&press, MouseProtocol::VT200),
            Some(b"\x1b[<0;3;4M".to_vec())
        );
        let release = sgr_event(MouseEventType::Release, MouseButton::LEFT, 2, 3);
        assert_eq!(
            encode_sgr(&release, MouseProtocol::VT200),
            Some(b"\x1b[<0;3;4m".to_vec())
        );
    }

    #[test]
    fn sgr_decode_left_press() {
        // `\x1b[<0;3;4M` decodes to a left press at column 2, row 3.
        let csi = Csi::new("<", "0;3;4".parse::<Params>().unwrap(), 'M');
        let event = mouse_event_from_csi(&csi, None).unwrap();
        assert_eq!(event.kind, MouseEventType::Press);
        assert_eq!(event.button, MouseButton::LEFT);
        assert_eq!(event.position.in_cells(), MouseCoordinate::new(2, 3));
        assert_eq!(event.modifiers, Modifiers::empty());
    }

    #[test]
    fn sgr_round_trip() {
        let events = [
            sgr_event(MouseEventType::Press, MouseButton::LEFT, 0, 0),
            sgr_event(MouseEventType::Release, MouseButton::RIGHT, 10, 20),
            sgr_event(MouseEventType::Press, MouseButton::SCROLL_UP, 5, 5),
        ];
        for event in events {
            let encoded = encode_sgr(&event, MouseProtocol::AnyEvent).unwrap();
            let text = String::from_utf8(encoded).unwrap();
            let mut parser = core_vt::EscapeSequenceParser::new(core_vt::ParserMode::Input);
            let parsed = parser.parse(&text);
            let [core_vt::ParserEvent::Csi(csi)] = parsed.as_slice() else {
                panic!("expected one CSI for {text:?}");
            };
            assert_eq!(mouse_event_from_csi(csi, None), Some(event));
        }
    }

    #[test]
    fn protocol_gating() {
        let motion = sgr_event(MouseEventType::Move, MouseButton::empty(), 1, 1);
        assert_eq!(encode_sgr(&motion, MouseProtocol::VT200), None);
        assert_eq!(encode_sgr(&motion, MouseProtocol::BtnEvent), None);
        assert!(encode_sgr(&motion, MouseProtocol::AnyEvent).is_some());

        let release = sgr_event(MouseEventType::Release, MouseButton::LEFT, 1, 1);
        assert_eq!(encode_sgr(&release, MouseProtocol::X10), None);
        assert!(encode_sgr(&release, MouseProtocol::VT200).is_some());
    }

    #[test]
    fn motion_bit_and_modifiers() {
        let event = MouseEvent {
            kind: MouseEventType::Move,
            button: MouseButton::LEFT,
            position: MousePosition::new(MouseCoordinate::new(0, 0), None),
            modifiers: Modifiers::SHIFT | Modifiers::CONTROL,
        };
        // 0 (left) + 4 (shift) + 16 (control) + 32 (motion) = 52.
        assert_eq!(
            encode_sgr(&event, MouseProtocol::AnyEvent),
            Some(b"\x1b[<52;1;1M".to_vec())
        );
    }

    #[test]
    fn x10_encoding_and_range_limit() {
        let press = sgr_event(MouseEventType::Press, MouseButton::LEFT, 2, 3);
        let encoded = serialize_mouse_event(
            &press,
            MouseProtocol::VT200,
            MouseEncoding::X10,
            &None,
            &MouseScrollProtocol::default(),
            &Size::new(24, 80),
        )
        .unwrap();
        assert_eq!(encoded, vec![0x1b, b'[', b'M', 32, 35, 36]);

        let far = sgr_event(MouseEventType::Press, MouseButton::LEFT, 500, 3);
        assert_eq!(
            serialize_mouse_event(
                &far,
                MouseProtocol::VT200,
                MouseEncoding::X10,
                &None,
                &MouseScrollProtocol::default(),
                &Size::new(24, 80),
            ),
            None
        );
    }

    #[test]
    fn alternate_scroll_synthesizes_arrows() {
        let wheel = sgr_event(MouseEventType::Press, MouseButton::SCROLL_UP, 0, 0);
        let scroll = MouseScrollProtocol {
            alternate_scroll_mode: AlternateScrollMode::Enabled,
            application_cursor_keys_mode: ApplicationCursorKeysMode::Disabled,
            in_alternate_screen_buffer: true,
        };
        let encoded = serialize_mouse_event(
            &wheel,
            MouseProtocol::None,
            MouseEncoding::Sgr,
            &None,
            &scroll,
            &Size::new(24, 80),
        );
        assert_eq!(encoded, Some(b"\x1b[A".to_vec()));
    }

    #[test]
    fn suppressed_duplicate_motion() {
        let position = MousePosition::new(MouseCoordinate::new(4, 4), None);
        let motion = MouseEvent {
            kind: MouseEventType::Move,
            button: MouseButton::empty(),
            position,
            modifiers: Modifiers::empty(),
        };
        let encoded = serialize_mouse_event(
            &motion,
            MouseProtocol::AnyEvent,
            MouseEncoding::Sgr,
            &Some(position),
            &MouseScrollProtocol::default(),
            &Size::new(24, 80),
        );
        assert_eq!(encoded, None);
    }
}
