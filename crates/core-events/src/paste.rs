//! Paste events and bracketed-paste framing.

use core_vt::Csi;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BracketedPasteMode {
    #[default]
    Disabled,
    Enabled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasteEvent {
    pub text: String,
}

impl PasteEvent {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Encode for a child terminal. Without bracketed paste the text is sent raw;
/// the outer terminal is relied on to have sanitized embedded escapes.
pub fn serialize_paste_event(event: &PasteEvent, mode: BracketedPasteMode) -> String {
    match mode {
        BracketedPasteMode::Disabled => event.text.clone(),
        BracketedPasteMode::Enabled => format!("\x1b[200~{}\x1b[201~", event.text),
    }
}

pub fn is_bracketed_paste_begin(csi: &Csi) -> bool {
    csi.intermediate.is_empty() && csi.terminator == '~' && csi.params.get(0, 0) == 200
}

pub fn is_bracketed_paste_end(csi: &Csi) -> bool {
    csi.intermediate.is_empty() && csi.terminator == '~' && csi.params.get(0, 0) == 201
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing() {
        let event = PasteEvent::new("hello");
        assert_eq!(
            serialize_paste_event(&event, BracketedPasteMode::Enabled),
            "\x1b[200~hello\x1b[201~"
        );
        assert_eq!(
            serialize_paste_event(&event, BracketedPasteMode::Disabled),
            "hello"
        );
    }

    #[test]
    fn begin_end_detection() {
        let mut parser = core_vt::EscapeSequenceParser::new(core_vt::ParserMode::Input);
        let parsed = parser.parse("\x1b[200~\x1b[201~");
        let [core_vt::ParserEvent::Csi(begin), core_vt::ParserEvent::Csi(end)] = parsed.as_slice()
        else {
            panic!("expected two CSIs");
        };
        assert!(is_bracketed_paste_begin(begin));
        assert!(!is_bracketed_paste_end(begin));
        assert!(is_bracketed_paste_end(end));
    }
}
