//! Decoding of host-terminal input into events.
//!
//! The byte stream from the host runs through the UTF-8 decoder and the
//! escape parser in input mode; the parser events are then decoded into key,
//! mouse, focus, and paste events. Sequences that decode to nothing are
//! dropped here, not in the parser.
//!
//! A bare `ESC` with no continuation is reported as the escape key at the
//! end of a read: a human pressing escape produces a lone byte, while a
//! terminal transmitting a sequence delivers the rest in the same read.

use core_events::{
    FocusEvent, KeyEvent, Modifiers, MouseEvent, PasteEvent, focus_event_from_csi,
    is_bracketed_paste_begin, is_bracketed_paste_end, key_event_from_csi,
    key_event_from_legacy_code_point, key_event_from_ss3, mouse_event_from_csi,
};
use core_vt::{EscapeSequenceParser, ParserEvent, ParserMode, Utf8StreamDecoder};

/// A decoded input event from the host terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Focus(FocusEvent),
    Paste(PasteEvent),
}

/// Stateful decoder for the host input stream.
pub struct TerminalInputParser {
    decoder: Utf8StreamDecoder,
    parser: EscapeSequenceParser,
    paste: Option<String>,
}

impl Default for TerminalInputParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalInputParser {
    pub fn new() -> TerminalInputParser {
        TerminalInputParser {
            decoder: Utf8StreamDecoder::new(),
            parser: EscapeSequenceParser::new(ParserMode::Input),
            paste: None,
        }
    }

    pub fn parse(&mut self, input: &[u8]) -> Vec<InputEvent> {
        let text = self.decoder.decode(input);
        let mut events = Vec::new();
        for parser_event in self.parser.parse(&text) {
            self.decode(parser_event, &mut events);
        }

        // A read that ends on a bare ESC is the escape key.
        if self.parser.take_pending_escape() {
            events.push(InputEvent::Key(key_event_from_legacy_code_point(
                '\x1b',
                Modifiers::empty(),
            )));
        }
        events
    }

    fn decode(&mut self, event: ParserEvent, out: &mut Vec<InputEvent>) {
        // Inside a bracketed paste everything is literal until the end
        // marker.
        if self.paste.is_some() {
            match event {
                ParserEvent::Csi(csi) if is_bracketed_paste_end(&csi) => {
                    let text = self.paste.take().unwrap_or_default();
                    out.push(InputEvent::Paste(PasteEvent::new(text)));
                }
                ParserEvent::Printable { code_point } => {
                    if let Some(buffer) = &mut self.paste {
                        buffer.push(code_point);
                    }
                }
                ParserEvent::Control(control) => {
                    if let (Some(buffer), Some(c)) =
                        (&mut self.paste, char::from_u32(control.code_point))
                    {
                        buffer.push(c);
                    }
                }
                _ => {}
            }
            return;
        }

        match event {
            ParserEvent::Printable { code_point } => {
                out.push(InputEvent::Key(key_event_from_legacy_code_point(
                    code_point,
                    Modifiers::empty(),
                )));
            }
            ParserEvent::Control(control) => {
                if control.was_in_escape {
                    return;
                }
                if let Some(c) = char::from_u32(control.code_point) {
                    out.push(InputEvent::Key(key_event_from_legacy_code_point(
                        c,
                        Modifiers::empty(),
                    )));
                }
            }
            ParserEvent::Csi(csi) => {
                if is_bracketed_paste_begin(&csi) {
                    self.paste = Some(String::new());
                    return;
                }
                if let Some(event) = mouse_event_from_csi(&csi, None) {
                    out.push(InputEvent::Mouse(event));
                    return;
                }
                if let Some(event) = focus_event_from_csi(&csi) {
                    out.push(InputEvent::Focus(event));
                    return;
                }
                if let Some(event) = key_event_from_csi(&csi) {
                    out.push(InputEvent::Key(event));
                    return;
                }
                tracing::trace!(target: "input", ?csi, "undecodable CSI dropped");
            }
            ParserEvent::Ss3 { code_point } => {
                if let Some(event) = key_event_from_ss3(code_point) {
                    out.push(InputEvent::Key(event));
                }
            }
            ParserEvent::Escape(escape) => {
                // `ESC x` is alt+x in the legacy encoding.
                if escape.intermediate.is_empty() {
                    out.push(InputEvent::Key(key_event_from_legacy_code_point(
                        escape.terminator,
                        Modifiers::ALT,
                    )));
                }
            }
            // Strings from the host terminal (responses we did not ask
            // for) are dropped.
            ParserEvent::Dcs(_) | ParserEvent::Osc(_) | ParserEvent::Apc { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::{Key, KeyEventType, MouseButton, MouseEventType};
    use pretty_assertions::assert_eq;

    fn parse(input: &[u8]) -> Vec<InputEvent> {
        TerminalInputParser::new().parse(input)
    }

    fn expect_key(event: &InputEvent) -> &KeyEvent {
        match event {
            InputEvent::Key(key) => key,
            other => panic!("expected key event, got {other:?}"),
        }
    }

    #[test]
    fn plain_text_becomes_key_presses() {
        let events = parse(b"hi");
        assert_eq!(events.len(), 2);
        assert_eq!(expect_key(&events[0]).key, Key::H);
        assert_eq!(expect_key(&events[1]).key, Key::I);
        assert_eq!(expect_key(&events[0]).text, "h");
    }

    #[test]
    fn control_bytes_decode() {
        let events = parse(b"\x03");
        let key = expect_key(&events[0]);
        assert_eq!(key.key, Key::C);
        assert!(key.modifiers.contains(Modifiers::CONTROL));
    }

    #[test]
    fn lone_escape_is_the_escape_key() {
        let events = parse(b"\x1b");
        assert_eq!(expect_key(&events[0]).key, Key::Escape);
    }

    #[test]
    fn alt_letter() {
        let events = parse(b"\x1bx");
        let key = expect_key(&events[0]);
        assert_eq!(key.key, Key::X);
        assert!(key.modifiers.contains(Modifiers::ALT));
    }

    #[test]
    fn arrows_in_both_encodings() {
        let events = parse(b"\x1b[A\x1bOB");
        assert_eq!(expect_key(&events[0]).key, Key::Up);
        assert_eq!(expect_key(&events[1]).key, Key::Down);
    }

    #[test]
    fn kitty_release_event() {
        let events = parse(b"\x1b[97;1:3u");
        let key = expect_key(&events[0]);
        assert_eq!(key.key, Key::A);
        assert_eq!(key.kind, KeyEventType::Release);
    }

    #[test]
    fn sgr_mouse_event() {
        let events = parse(b"\x1b[<0;3;4M");
        let InputEvent::Mouse(mouse) = &events[0] else {
            panic!("expected mouse event");
        };
        assert_eq!(mouse.kind, MouseEventType::Press);
        assert_eq!(mouse.button, MouseButton::LEFT);
        assert_eq!(mouse.position.in_cells().x(), 2);
        assert_eq!(mouse.position.in_cells().y(), 3);
    }

    #[test]
    fn focus_events() {
        let events = parse(b"\x1b[I\x1b[O");
        assert_eq!(events[0], InputEvent::Focus(FocusEvent::In));
        assert_eq!(events[1], InputEvent::Focus(FocusEvent::Out));
    }

    #[test]
    fn bracketed_paste_collects_text() {
        let events = parse(b"\x1b[200~hello\nworld\x1b[201~x");
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            InputEvent::Paste(PasteEvent::new("hello\nworld"))
        );
        assert_eq!(expect_key(&events[1]).key, Key::X);
    }

    #[test]
    fn paste_survives_split_reads() {
        let mut parser = TerminalInputParser::new();
        let mut events = parser.parse(b"\x1b[200~abc");
        assert!(events.is_empty());
        events.extend(parser.parse(b"def\x1b[201~"));
        assert_eq!(events, vec![InputEvent::Paste(PasteEvent::new("abcdef"))]);
    }

    #[test]
    fn split_utf8_reassembles() {
        let mut parser = TerminalInputParser::new();
        let bytes = "é".as_bytes();
        assert!(parser.parse(&bytes[..1]).is_empty());
        let events = parser.parse(&bytes[1..]);
        assert_eq!(expect_key(&events[0]).text, "é");
    }

    #[test]
    fn unknown_csi_dropped() {
        let events = parse(b"\x1b[?99x");
        assert!(events.is_empty());
    }
}
