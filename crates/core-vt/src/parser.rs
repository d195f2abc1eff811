//! DEC-ANSI escape sequence parser.
//!
//! A 15-state machine following vt100.net/emu/dec_ansi_parser, operating on
//! decoded code points rather than raw bytes. Two modes exist:
//!
//! - `Application` parses output written by a child process.
//! - `Input` parses what the host terminal sends us, and adds an `Ss3` state
//!   entered on `ESC O` so that legacy function keys can be decoded.
//!
//! Entry actions (clear, hook, osc_start) run on the first code point seen in
//! a state; exit actions (param finalization, unhook, osc_end) run when the
//! state is left. The universal transitions for CAN, SUB and ESC apply from
//! every state.

use crate::params::Params;

/// Control Sequence Introducer sequence: `ESC [ params intermediate term`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Csi {
    pub intermediate: String,
    pub params: Params,
    pub terminator: char,
}

impl Csi {
    pub fn new(intermediate: impl Into<String>, params: Params, terminator: char) -> Self {
        Self {
            intermediate: intermediate.into(),
            params,
            terminator,
        }
    }
}

impl Default for Csi {
    fn default() -> Self {
        Self {
            intermediate: String::new(),
            params: Params::new(),
            terminator: '\0',
        }
    }
}

/// Device Control String: `ESC P params intermediate term data ST`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dcs {
    pub intermediate: String,
    pub params: Params,
    pub data: String,
}

/// Operating System Command: `ESC ] data (BEL | ST)`.
///
/// The terminator is recorded so replies can mirror the sender's framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Osc {
    pub data: String,
    pub terminator: String,
}

/// Plain escape: `ESC intermediate term`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escape {
    pub intermediate: String,
    pub terminator: char,
}

impl Escape {
    pub fn new(intermediate: impl Into<String>, terminator: char) -> Self {
        Self {
            intermediate: intermediate.into(),
            terminator,
        }
    }
}

/// A C0/C1 control routed to the executable path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlCharacter {
    pub code_point: u32,
    /// True when the control character arrived in the middle of an escape
    /// sequence rather than from the ground state.
    pub was_in_escape: bool,
}

/// Output of the parser, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserEvent {
    Printable { code_point: char },
    Control(ControlCharacter),
    Csi(Csi),
    Dcs(Dcs),
    Osc(Osc),
    Apc { data: String },
    Escape(Escape),
    /// Input mode only: `ESC O <terminator>`.
    Ss3 { code_point: char },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserMode {
    Application,
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    CsiIgnore,
    DcsEntry,
    DcsParam,
    DcsIntermediate,
    DcsPassthrough,
    DcsIgnore,
    OscString,
    SosPmApcString,
    Ss3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringKind {
    Osc,
    Apc,
    /// SOS and PM strings are consumed and dropped.
    Ignored,
}

const ST: &str = "\u{1b}\\";
const BEL: &str = "\u{7}";

fn is_printable(cp: char) -> bool {
    let cp = cp as u32;
    (0x20..=0x7F).contains(&cp) || cp >= 0xA0
}

fn is_executable(cp: char) -> bool {
    let cp = cp as u32;
    cp <= 0x17 || cp == 0x19 || (0x1C..=0x1F).contains(&cp)
}

fn is_csi_terminator(cp: char) -> bool {
    ('\u{40}'..='\u{7E}').contains(&cp)
}

fn is_param(cp: char) -> bool {
    cp.is_ascii_digit() || cp == ';' || cp == ':'
}

fn is_intermediate(cp: char) -> bool {
    ('\u{20}'..='\u{2F}').contains(&cp)
}

fn is_dcs_terminator(cp: char) -> bool {
    ('\u{40}'..='\u{7E}').contains(&cp)
}

fn is_escape_terminator(cp: char) -> bool {
    let cp = cp as u32;
    (0x30..=0x4F).contains(&cp)
        || (0x51..=0x57).contains(&cp)
        || cp == 0x59
        || cp == 0x5A
        || cp == 0x5C
        || (0x60..=0x7E).contains(&cp)
}

/// The VT500-series state machine.
pub struct EscapeSequenceParser {
    mode: ParserMode,
    state: State,
    entered: bool,

    intermediate: String,
    params: Params,
    current_subparams: Vec<Option<u32>>,
    current_value: String,
    data: String,
    string_kind: StringKind,

    result: Vec<ParserEvent>,
}

impl EscapeSequenceParser {
    pub fn new(mode: ParserMode) -> Self {
        Self {
            mode,
            state: State::Ground,
            entered: true,
            intermediate: String::new(),
            params: Params::new(),
            current_subparams: Vec::new(),
            current_value: String::new(),
            data: String::new(),
            string_kind: StringKind::Ignored,
            result: Vec::new(),
        }
    }

    /// Parse a chunk of decoded text, returning the events it completes.
    /// Partial sequences are carried over to the next call.
    pub fn parse(&mut self, input: &str) -> Vec<ParserEvent> {
        for cp in input.chars() {
            self.on_input(cp);
        }
        std::mem::take(&mut self.result)
    }

    /// True when the last input ended on a bare `ESC` with nothing following.
    /// Input decoding uses this to disambiguate the escape key from a
    /// partially transmitted escape sequence.
    pub fn pending_escape(&self) -> bool {
        // `entered` still being set means no code point followed the ESC.
        self.state == State::Escape && self.entered
    }

    /// Abandon a bare pending `ESC` and return to ground. Returns whether
    /// there was one to abandon.
    pub fn take_pending_escape(&mut self) -> bool {
        if self.pending_escape() {
            self.state = State::Ground;
            self.entered = true;
            return true;
        }
        false
    }

    fn on_input(&mut self, cp: char) {
        // Universal transitions.
        if cp == '\u{18}' || cp == '\u{1a}' {
            self.abort_string();
            self.execute(cp);
            self.transition(State::Ground);
            return;
        }
        if cp == '\u{1b}' {
            if self.in_string_state() {
                self.end_string(ST);
            }
            self.transition(State::Escape);
            return;
        }
        // C1 ST terminates string states directly.
        if cp == '\u{9c}' && self.in_string_state() {
            self.end_string("\u{9c}");
            self.transition(State::Ground);
            return;
        }

        match self.state {
            State::Ground => self.ground_state(cp),
            State::Escape => self.escape_state(cp),
            State::EscapeIntermediate => self.escape_intermediate_state(cp),
            State::CsiEntry => self.csi_entry_state(cp),
            State::CsiParam => self.csi_param_state(cp),
            State::CsiIntermediate => self.csi_intermediate_state(cp),
            State::CsiIgnore => self.csi_ignore_state(cp),
            State::DcsEntry => self.dcs_entry_state(cp),
            State::DcsParam => self.dcs_param_state(cp),
            State::DcsIntermediate => self.dcs_intermediate_state(cp),
            State::DcsPassthrough => self.dcs_passthrough_state(cp),
            State::DcsIgnore => self.dcs_ignore_state(cp),
            State::OscString => self.osc_string_state(cp),
            State::SosPmApcString => self.sos_pm_apc_string_state(cp),
            State::Ss3 => self.ss3_state(cp),
        }
    }

    fn transition(&mut self, state: State) {
        self.state = state;
        self.entered = true;
    }

    fn on_entry(&mut self) -> bool {
        std::mem::take(&mut self.entered)
    }

    fn in_string_state(&self) -> bool {
        matches!(
            self.state,
            State::OscString | State::SosPmApcString | State::DcsPassthrough | State::DcsIgnore
        )
    }

    // -- Actions ---------------------------------------------------------

    fn print(&mut self, cp: char) {
        self.result.push(ParserEvent::Printable { code_point: cp });
    }

    fn execute(&mut self, cp: char) {
        self.result.push(ParserEvent::Control(ControlCharacter {
            code_point: cp as u32,
            was_in_escape: self.state != State::Ground,
        }));
    }

    fn clear(&mut self) {
        self.intermediate.clear();
        self.params = Params::new();
        self.current_subparams.clear();
        self.current_value.clear();
    }

    fn collect(&mut self, cp: char) {
        self.intermediate.push(cp);
    }

    fn param(&mut self, cp: char) {
        match cp {
            ';' => {
                self.finish_param_value();
                self.params
                    .add_subparams(std::mem::take(&mut self.current_subparams));
            }
            ':' => self.finish_param_value(),
            digit => self.current_value.push(digit),
        }
    }

    fn finish_param_value(&mut self) {
        let slot = if self.current_value.is_empty() {
            None
        } else {
            Some(self.current_value.parse::<u32>().unwrap_or(0))
        };
        self.current_subparams.push(slot);
        self.current_value.clear();
    }

    /// Exit action for the param states.
    fn finalize_params(&mut self) {
        if !self.current_value.is_empty() || !self.current_subparams.is_empty() {
            self.finish_param_value();
            self.params
                .add_subparams(std::mem::take(&mut self.current_subparams));
        }
    }

    fn esc_dispatch(&mut self, cp: char) {
        self.result.push(ParserEvent::Escape(Escape {
            intermediate: std::mem::take(&mut self.intermediate),
            terminator: cp,
        }));
    }

    fn csi_dispatch(&mut self, cp: char) {
        self.finalize_params();
        self.result.push(ParserEvent::Csi(Csi {
            intermediate: std::mem::take(&mut self.intermediate),
            params: std::mem::take(&mut self.params),
            terminator: cp,
        }));
    }

    fn hook(&mut self) {
        self.finalize_params();
        self.data.clear();
    }

    fn put(&mut self, cp: char) {
        self.data.push(cp);
    }

    fn unhook(&mut self) {
        self.result.push(ParserEvent::Dcs(Dcs {
            intermediate: std::mem::take(&mut self.intermediate),
            params: std::mem::take(&mut self.params),
            data: std::mem::take(&mut self.data),
        }));
    }

    fn osc_start(&mut self, kind: StringKind) {
        self.string_kind = kind;
        self.data.clear();
    }

    fn end_string(&mut self, terminator: &str) {
        match self.state {
            State::DcsPassthrough => self.unhook(),
            State::OscString => {
                self.result.push(ParserEvent::Osc(Osc {
                    data: std::mem::take(&mut self.data),
                    terminator: terminator.to_owned(),
                }));
            }
            State::SosPmApcString => {
                if self.string_kind == StringKind::Apc {
                    self.result.push(ParserEvent::Apc {
                        data: std::mem::take(&mut self.data),
                    });
                } else {
                    self.data.clear();
                }
            }
            _ => {}
        }
    }

    /// CAN and SUB abandon an in-progress string without dispatching it.
    fn abort_string(&mut self) {
        self.data.clear();
    }

    // -- States ----------------------------------------------------------

    fn ground_state(&mut self, cp: char) {
        self.on_entry();
        if is_executable(cp) {
            self.execute(cp);
        } else if is_printable(cp) {
            self.print(cp);
        }
    }

    fn escape_state(&mut self, cp: char) {
        if self.on_entry() {
            self.clear();
        }

        if is_executable(cp) {
            return self.execute(cp);
        }
        if self.mode == ParserMode::Input && cp == 'O' {
            return self.transition(State::Ss3);
        }
        if cp == '[' {
            return self.transition(State::CsiEntry);
        }
        if cp == ']' {
            return self.transition(State::OscString);
        }
        if cp == 'P' {
            return self.transition(State::DcsEntry);
        }
        if cp == 'X' || cp == '^' || cp == '_' {
            self.string_kind = if cp == '_' {
                StringKind::Apc
            } else {
                StringKind::Ignored
            };
            return self.transition(State::SosPmApcString);
        }
        if is_escape_terminator(cp) {
            self.esc_dispatch(cp);
            return self.transition(State::Ground);
        }
        if is_intermediate(cp) {
            self.collect(cp);
            return self.transition(State::EscapeIntermediate);
        }
        // DEL is ignored.
    }

    fn escape_intermediate_state(&mut self, cp: char) {
        self.on_entry();
        if is_executable(cp) {
            return self.execute(cp);
        }
        if is_intermediate(cp) {
            return self.collect(cp);
        }
        if ('\u{30}'..='\u{7E}').contains(&cp) {
            self.esc_dispatch(cp);
            return self.transition(State::Ground);
        }
    }

    fn csi_entry_state(&mut self, cp: char) {
        if self.on_entry() {
            self.clear();
        }

        if is_executable(cp) {
            return self.execute(cp);
        }
        if is_csi_terminator(cp) {
            self.csi_dispatch(cp);
            return self.transition(State::Ground);
        }
        if is_intermediate(cp) {
            self.collect(cp);
            return self.transition(State::CsiIntermediate);
        }
        if is_param(cp) {
            self.param(cp);
            return self.transition(State::CsiParam);
        }
        if ('\u{3C}'..='\u{3F}').contains(&cp) {
            self.collect(cp);
            return self.transition(State::CsiParam);
        }
    }

    fn csi_param_state(&mut self, cp: char) {
        self.on_entry();
        if is_executable(cp) {
            return self.execute(cp);
        }
        if is_param(cp) {
            return self.param(cp);
        }
        if is_intermediate(cp) {
            self.finalize_params();
            self.collect(cp);
            return self.transition(State::CsiIntermediate);
        }
        if is_csi_terminator(cp) {
            self.csi_dispatch(cp);
            return self.transition(State::Ground);
        }
        if ('\u{3C}'..='\u{3F}').contains(&cp) {
            return self.transition(State::CsiIgnore);
        }
    }

    fn csi_intermediate_state(&mut self, cp: char) {
        self.on_entry();
        if is_executable(cp) {
            return self.execute(cp);
        }
        if is_intermediate(cp) {
            return self.collect(cp);
        }
        if is_csi_terminator(cp) {
            self.csi_dispatch(cp);
            return self.transition(State::Ground);
        }
        if ('\u{30}'..='\u{3F}').contains(&cp) {
            return self.transition(State::CsiIgnore);
        }
    }

    fn csi_ignore_state(&mut self, cp: char) {
        self.on_entry();
        if is_executable(cp) {
            return self.execute(cp);
        }
        if is_csi_terminator(cp) {
            return self.transition(State::Ground);
        }
    }

    fn dcs_entry_state(&mut self, cp: char) {
        if self.on_entry() {
            self.clear();
        }

        if is_executable(cp) {
            return; // ignored
        }
        if is_intermediate(cp) {
            self.collect(cp);
            return self.transition(State::DcsIntermediate);
        }
        if is_param(cp) {
            self.param(cp);
            return self.transition(State::DcsParam);
        }
        if ('\u{3C}'..='\u{3F}').contains(&cp) {
            self.collect(cp);
            return self.transition(State::DcsParam);
        }
        if is_dcs_terminator(cp) {
            self.collect(cp);
            self.hook();
            return self.transition(State::DcsPassthrough);
        }
    }

    fn dcs_param_state(&mut self, cp: char) {
        self.on_entry();
        if is_executable(cp) {
            return; // ignored
        }
        if is_param(cp) {
            return self.param(cp);
        }
        if is_intermediate(cp) {
            self.finalize_params();
            self.collect(cp);
            return self.transition(State::DcsIntermediate);
        }
        if is_dcs_terminator(cp) {
            self.collect(cp);
            self.hook();
            return self.transition(State::DcsPassthrough);
        }
        if ('\u{3C}'..='\u{3F}').contains(&cp) {
            return self.transition(State::DcsIgnore);
        }
    }

    fn dcs_intermediate_state(&mut self, cp: char) {
        self.on_entry();
        if is_executable(cp) {
            return; // ignored
        }
        if is_intermediate(cp) {
            return self.collect(cp);
        }
        if is_dcs_terminator(cp) {
            self.collect(cp);
            self.hook();
            return self.transition(State::DcsPassthrough);
        }
        if ('\u{30}'..='\u{3F}').contains(&cp) {
            return self.transition(State::DcsIgnore);
        }
    }

    fn dcs_passthrough_state(&mut self, cp: char) {
        self.on_entry();
        if cp == '\u{7f}' {
            return; // ignored
        }
        self.put(cp);
    }

    fn dcs_ignore_state(&mut self, _cp: char) {
        self.on_entry();
        // Consumed until a string terminator arrives via the universal
        // transitions.
    }

    fn osc_string_state(&mut self, cp: char) {
        if self.on_entry() {
            self.osc_start(StringKind::Osc);
        }
        if cp == '\u{7}' {
            self.end_string(BEL);
            return self.transition(State::Ground);
        }
        if is_executable(cp) {
            return; // ignored
        }
        if is_printable(cp) {
            self.put(cp);
        }
    }

    fn sos_pm_apc_string_state(&mut self, cp: char) {
        self.on_entry();
        if self.string_kind == StringKind::Apc {
            self.put(cp);
        }
    }

    fn ss3_state(&mut self, cp: char) {
        self.on_entry();
        self.result.push(ParserEvent::Ss3 { code_point: cp });
        self.transition(State::Ground);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_app(input: &str) -> Vec<ParserEvent> {
        EscapeSequenceParser::new(ParserMode::Application).parse(input)
    }

    fn parse_input(input: &str) -> Vec<ParserEvent> {
        EscapeSequenceParser::new(ParserMode::Input).parse(input)
    }

    fn csi(intermediate: &str, params: &str, terminator: char) -> ParserEvent {
        ParserEvent::Csi(Csi {
            intermediate: intermediate.to_owned(),
            params: params.parse().unwrap(),
            terminator,
        })
    }

    #[test]
    fn printable_and_executable() {
        assert_eq!(
            parse_app("a\nb"),
            vec![
                ParserEvent::Printable { code_point: 'a' },
                ParserEvent::Control(ControlCharacter {
                    code_point: 0x0A,
                    was_in_escape: false
                }),
                ParserEvent::Printable { code_point: 'b' },
            ]
        );
    }

    #[test]
    fn basic_csi() {
        assert_eq!(parse_app("\x1b[2;3H"), vec![csi("", "2;3", 'H')]);
        assert_eq!(parse_app("\x1b[m"), vec![csi("", "", 'm')]);
    }

    #[test]
    fn csi_with_private_marker_and_subparams() {
        assert_eq!(parse_app("\x1b[?1049h"), vec![csi("?", "1049", 'h')]);
        assert_eq!(
            parse_app("\x1b[38:2::10:20:30m"),
            vec![csi("", "38:2::10:20:30", 'm')]
        );
        assert_eq!(parse_app("\x1b[1;;3m"), vec![csi("", "1;;3", 'm')]);
    }

    #[test]
    fn csi_intermediate() {
        assert_eq!(parse_app("\x1b[ q"), vec![csi(" ", "", 'q')]);
        assert_eq!(parse_app("\x1b[2 q"), vec![csi(" ", "2", 'q')]);
    }

    #[test]
    fn split_across_calls() {
        let mut parser = EscapeSequenceParser::new(ParserMode::Application);
        assert_eq!(parser.parse("\x1b[1;"), vec![]);
        assert_eq!(parser.parse("2H"), vec![csi("", "1;2", 'H')]);
    }

    #[test]
    fn escape_sequences() {
        assert_eq!(
            parse_app("\x1b7\x1bM"),
            vec![
                ParserEvent::Escape(Escape::new("", '7')),
                ParserEvent::Escape(Escape::new("", 'M')),
            ]
        );
        assert_eq!(
            parse_app("\x1b#8"),
            vec![ParserEvent::Escape(Escape::new("#", '8'))]
        );
    }

    #[test]
    fn osc_with_bel_and_st() {
        assert_eq!(
            parse_app("\x1b]0;title\x07"),
            vec![ParserEvent::Osc(Osc {
                data: "0;title".to_owned(),
                terminator: "\u{7}".to_owned(),
            })]
        );
        let events = parse_app("\x1b]8;;http://x\x1b\\");
        assert_eq!(
            events[0],
            ParserEvent::Osc(Osc {
                data: "8;;http://x".to_owned(),
                terminator: "\u{1b}\\".to_owned(),
            })
        );
    }

    #[test]
    fn dcs_passthrough() {
        assert_eq!(
            parse_app("\x1bP1$rm\x1b\\"),
            vec![
                ParserEvent::Dcs(Dcs {
                    intermediate: "$r".to_owned(),
                    params: "1".parse().unwrap(),
                    data: "m".to_owned(),
                }),
                ParserEvent::Escape(Escape::new("", '\\')),
            ]
        );
    }

    #[test]
    fn apc_captured() {
        assert_eq!(
            parse_app("\x1b_Gi=1\x1b\\"),
            vec![
                ParserEvent::Apc {
                    data: "Gi=1".to_owned()
                },
                ParserEvent::Escape(Escape::new("", '\\')),
            ]
        );
    }

    #[test]
    fn can_aborts_sequence() {
        let events = parse_app("\x1b[12\x18X");
        assert_eq!(
            events,
            vec![
                ParserEvent::Control(ControlCharacter {
                    code_point: 0x18,
                    was_in_escape: true
                }),
                ParserEvent::Printable { code_point: 'X' },
            ]
        );
    }

    #[test]
    fn colon_in_entry_goes_to_param() {
        // A leading colon yields an empty first sub-parameter.
        assert_eq!(parse_app("\x1b[:1m"), vec![csi("", ":1", 'm')]);
    }

    #[test]
    fn control_inside_csi_executes() {
        let events = parse_app("\x1b[1\n2H");
        assert_eq!(
            events,
            vec![
                ParserEvent::Control(ControlCharacter {
                    code_point: 0x0A,
                    was_in_escape: true
                }),
                csi("", "12", 'H'),
            ]
        );
    }

    #[test]
    fn ss3_only_in_input_mode() {
        assert_eq!(
            parse_input("\x1bOA"),
            vec![ParserEvent::Ss3 { code_point: 'A' }]
        );
        assert_eq!(
            parse_app("\x1bOA"),
            vec![
                ParserEvent::Escape(Escape::new("", 'O')),
                ParserEvent::Printable { code_point: 'A' },
            ]
        );
    }

    #[test]
    fn pending_escape_detection() {
        let mut parser = EscapeSequenceParser::new(ParserMode::Input);
        assert_eq!(parser.parse("\x1b"), vec![]);
        assert!(parser.pending_escape());
        assert!(parser.take_pending_escape());
        assert!(!parser.pending_escape());

        // Not pending once sequence data follows.
        let mut parser = EscapeSequenceParser::new(ParserMode::Input);
        parser.parse("\x1b[");
        assert!(!parser.pending_escape());
    }

    #[test]
    fn kitty_key_release_sequence() {
        assert_eq!(parse_input("\x1b[97;1:3u"), vec![csi("", "97;1:3", 'u')]);
    }
}
