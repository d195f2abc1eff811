//! XTGETTCAP: terminfo capability queries over the wire.
//!
//! Requests arrive as `DCS + q <hex-name> ST`; replies are
//! `DCS 1 + r <hex-name>=<hex-value> ST` for a known capability and
//! `DCS 0 + r ST` otherwise. Only the capabilities the multiplexer itself
//! relies on are answered; this is not a terminfo database.

use core_vt::Dcs;

/// A capability value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Flag,
    Number(u32),
    Text(&'static str),
}

/// Capabilities advertised to children. Kept to what a multiplexed program
/// actually probes for: identity, color support, and the handful of feature
/// flags that gate modern escape usage.
const CAPABILITIES: &[(&str, Capability)] = &[
    ("TN", Capability::Text("xterm-256color")),
    ("name", Capability::Text("xterm-256color")),
    ("Co", Capability::Number(256)),
    ("colors", Capability::Number(256)),
    ("RGB", Capability::Flag),
    ("Tc", Capability::Flag),
    ("Su", Capability::Flag),
    ("Smulx", Capability::Text("\\E[4:%p1%dm")),
    ("hs", Capability::Flag),
    ("km", Capability::Flag),
    ("fullkbd", Capability::Flag),
];

pub fn lookup_capability(name: &str) -> Option<Capability> {
    CAPABILITIES
        .iter()
        .find(|(cap, _)| *cap == name)
        .map(|(_, value)| *value)
}

/// One XTGETTCAP reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminfoString {
    pub name: Option<String>,
    pub value: Option<String>,
}

impl TerminfoString {
    pub fn hex(bytes: &str) -> String {
        bytes.bytes().map(|byte| format!("{byte:02X}")).collect()
    }

    pub fn unhex(hex_text: &str) -> Option<String> {
        if hex_text.is_empty() || hex_text.len() % 2 != 0 {
            return None;
        }
        let mut bytes = Vec::with_capacity(hex_text.len() / 2);
        let raw = hex_text.as_bytes();
        for pair in raw.chunks(2) {
            let high = (pair[0] as char).to_digit(16)?;
            let low = (pair[1] as char).to_digit(16)?;
            bytes.push((high * 16 + low) as u8);
        }
        String::from_utf8(bytes).ok()
    }

    pub fn valid(&self) -> bool {
        self.name.is_some()
    }

    pub fn from_capability(name: &str, capability: Capability) -> TerminfoString {
        let value = match capability {
            // A flag's presence is the value.
            Capability::Flag => None,
            Capability::Number(value) => Some(value.to_string()),
            Capability::Text(value) => Some(unescape_capability(value)),
        };
        TerminfoString {
            name: Some(name.to_owned()),
            value,
        }
    }

    /// Parse a *reply* (`+r`).
    pub fn from_dcs(dcs: &Dcs) -> Option<TerminfoString> {
        if dcs.intermediate != "+r" || dcs.params.len() != 1 {
            return None;
        }
        match dcs.params.get(0, 0) {
            0 if dcs.data.is_empty() => Some(TerminfoString::default()),
            1 => {
                let (name_hex, value_hex) = match dcs.data.split_once('=') {
                    Some((name, value)) => (name, Some(value)),
                    None => (dcs.data.as_str(), None),
                };
                let name = Self::unhex(name_hex)?;
                let value = match value_hex {
                    Some(hex_text) => Some(Self::unhex(hex_text)?),
                    None => None,
                };
                Some(TerminfoString {
                    name: Some(name),
                    value,
                })
            }
            _ => None,
        }
    }

    pub fn serialize(&self) -> String {
        let Some(name) = &self.name else {
            return "\x1bP0+r\x1b\\".to_owned();
        };
        match &self.value {
            None => format!("\x1bP1+r{}\x1b\\", Self::hex(name)),
            Some(value) => format!("\x1bP1+r{}={}\x1b\\", Self::hex(name), Self::hex(value)),
        }
    }
}

/// Expand terminfo source escapes (`\E`, `^X`) into real bytes; strings
/// containing parameter operators are passed through untouched.
fn unescape_capability(value: &str) -> String {
    if value.contains('%') {
        return value.replace("\\E", "\x1b");
    }
    let mut result = String::new();
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'E') => {
                chars.next();
                result.push('\x1b');
            }
            '^' => match chars.next() {
                Some('?') => result.push('\u{7f}'),
                Some(control) => {
                    result.push(char::from((control as u8).wrapping_sub(64)));
                }
                None => result.push('^'),
            },
            c => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_vt::{EscapeSequenceParser, ParserEvent, ParserMode};
    use pretty_assertions::assert_eq;

    #[test]
    fn hex_round_trip() {
        assert_eq!(TerminfoString::hex("Co"), "436F");
        assert_eq!(TerminfoString::unhex("436F"), Some("Co".to_owned()));
        assert_eq!(TerminfoString::unhex("43X"), None);
        assert_eq!(TerminfoString::unhex(""), None);
    }

    #[test]
    fn reply_round_trip() {
        let samples = [
            TerminfoString::default(),
            TerminfoString::from_capability("RGB", Capability::Flag),
            TerminfoString::from_capability("Co", Capability::Number(256)),
            TerminfoString::from_capability("TN", Capability::Text("xterm-256color")),
        ];
        let mut parser = EscapeSequenceParser::new(ParserMode::Application);
        for sample in samples {
            let parsed = parser.parse(&sample.serialize());
            let Some(ParserEvent::Dcs(dcs)) = parsed.first() else {
                panic!("expected a DCS");
            };
            assert_eq!(TerminfoString::from_dcs(dcs), Some(sample));
        }
    }

    #[test]
    fn lookup_known_and_unknown() {
        assert!(lookup_capability("RGB").is_some());
        assert!(lookup_capability("xyzzy").is_none());
    }

    #[test]
    fn unescapes_terminfo_strings() {
        let reply = TerminfoString::from_capability("x", Capability::Text("\\E[H^?"));
        assert_eq!(reply.value.as_deref(), Some("\x1b[H\u{7f}"));
    }
}
