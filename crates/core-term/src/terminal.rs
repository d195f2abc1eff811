//! The terminal: parser events in, screen mutations and replies out.
//!
//! A terminal owns the primary screen, the optional alternate screen, and
//! every mode that is not grid content. It performs no I/O itself: replies
//! and host-bound requests accumulate on an outgoing queue the pane drains
//! after each batch of parser events.

use std::collections::VecDeque;

use core_events::{
    AlternateScrollMode, ApplicationCursorKeysMode, BracketedPasteMode, FocusEventMode,
    KeyReportingFlags, MouseEncoding, MouseProtocol, Size,
};
use core_vt::{ControlCharacter, Csi, Dcs, Escape, Osc, ParserEvent};

use crate::cursor::{CursorStyle, SavedCursor};
use crate::escapes::{
    Commands, CursorPositionReport, DecMode, ModeQueryReply, ModeSupport, OperatingStatusReport,
    Osc8, Osc66, Osc133, StatusStringResponse, TerminfoString, lookup_capability,
};
use crate::rendition::GraphicsRendition;
use crate::screen::{AutoWrapMode, OriginMode, Screen, ScrollBackEnabled, ScrollRegion};

/// Things the terminal wants the outside world to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// Bytes to write back to the child (query replies).
    Reply(Vec<u8>),
    /// OSC 52: the child set the clipboard.
    SetClipboard(Vec<u8>),
    /// APC payload to forward to the host terminal (kitty graphics).
    ApcPassthrough(String),
}

struct ScreenState {
    screen: Screen,
    saved_cursor: Option<SavedCursor>,
    cursor_style: CursorStyle,
}

impl ScreenState {
    fn new(size: Size, scroll_back: ScrollBackEnabled, max_scroll_back_cells: usize) -> Self {
        Self {
            screen: Screen::with_scroll_back_cap(size, scroll_back, max_scroll_back_cells),
            saved_cursor: None,
            cursor_style: CursorStyle::default(),
        }
    }
}

pub struct Terminal {
    primary: ScreenState,
    alternate: Option<Box<ScreenState>>,
    // Cursor state saved when entering the alternate screen.
    saved_for_alternate: Option<SavedCursor>,

    size: Size,
    available_size: Size,
    max_scroll_back_cells: usize,

    // 80/132 column state.
    col_mode_80: bool,
    col_mode_132: bool,
    allow_80_132: bool,

    // XTWINOPS forced sizing, for driving tests.
    allow_force_size: bool,
    force_size: bool,

    tab_stops: Vec<u32>,

    cursor_hidden: bool,
    disable_drawing: bool,
    reverse_video: bool,
    auto_wrap: AutoWrapMode,

    application_cursor_keys: ApplicationCursorKeysMode,
    key_flags: KeyReportingFlags,
    key_flags_stack: VecDeque<KeyReportingFlags>,

    alternate_scroll: AlternateScrollMode,
    mouse_protocol: MouseProtocol,
    mouse_encoding: MouseEncoding,
    focus_mode: FocusEventMode,
    bracketed_paste: BracketedPasteMode,
    in_band_size_reports: bool,

    // Last single-cell grapheme, for REP.
    last_grapheme: Option<String>,
    hyperlink_counter: u64,
    commands: Commands,

    outgoing: Vec<TerminalEvent>,
}

const KEY_FLAG_STACK_LIMIT: usize = 100;
const DEFAULT_TAB_WIDTH: u32 = 8;

impl Terminal {
    pub fn new(size: Size) -> Terminal {
        Self::with_scroll_back_cap(size, crate::scroll_back::DEFAULT_MAX_CELLS)
    }

    pub fn with_scroll_back_cap(size: Size, max_scroll_back_cells: usize) -> Terminal {
        Terminal {
            primary: ScreenState::new(size, ScrollBackEnabled::Yes, max_scroll_back_cells),
            alternate: None,
            saved_for_alternate: None,
            size,
            available_size: size,
            max_scroll_back_cells,
            col_mode_80: false,
            col_mode_132: false,
            allow_80_132: false,
            allow_force_size: false,
            force_size: false,
            tab_stops: default_tab_stops(size.cols),
            cursor_hidden: false,
            disable_drawing: false,
            reverse_video: false,
            auto_wrap: AutoWrapMode::Enabled,
            application_cursor_keys: ApplicationCursorKeysMode::Disabled,
            key_flags: KeyReportingFlags::empty(),
            key_flags_stack: VecDeque::new(),
            alternate_scroll: AlternateScrollMode::Disabled,
            mouse_protocol: MouseProtocol::None,
            mouse_encoding: MouseEncoding::X10,
            focus_mode: FocusEventMode::Disabled,
            bracketed_paste: BracketedPasteMode::Disabled,
            in_band_size_reports: false,
            last_grapheme: None,
            hyperlink_counter: 0,
            commands: Commands::default(),
            outgoing: Vec::new(),
        }
    }

    /// Permit XTWINOPS 4/8 to force the internal size.
    pub fn allow_force_size(&mut self, allow: bool) {
        self.allow_force_size = allow;
    }

    // -- Accessors -------------------------------------------------------

    pub fn screen(&self) -> &Screen {
        match &self.alternate {
            Some(state) => &state.screen,
            None => &self.primary.screen,
        }
    }

    pub fn screen_mut(&mut self) -> &mut Screen {
        match &mut self.alternate {
            Some(state) => &mut state.screen,
            None => &mut self.primary.screen,
        }
    }

    fn active_mut(&mut self) -> &mut ScreenState {
        match &mut self.alternate {
            Some(state) => state,
            None => &mut self.primary,
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn visible_size(&self) -> Size {
        self.available_size
    }

    pub fn in_alternate_screen_buffer(&self) -> bool {
        self.alternate.is_some()
    }

    pub fn cursor_hidden(&self) -> bool {
        self.cursor_hidden
    }

    pub fn cursor_style(&self) -> CursorStyle {
        match &self.alternate {
            Some(state) => state.cursor_style,
            None => self.primary.cursor_style,
        }
    }

    /// False while the child holds synchronized-output (DECSET 2026).
    pub fn allowed_to_draw(&self) -> bool {
        !self.disable_drawing
    }

    pub fn reverse_video(&self) -> bool {
        self.reverse_video
    }

    pub fn application_cursor_keys_mode(&self) -> ApplicationCursorKeysMode {
        self.application_cursor_keys
    }

    pub fn key_reporting_flags(&self) -> KeyReportingFlags {
        self.key_flags
    }

    pub fn alternate_scroll_mode(&self) -> AlternateScrollMode {
        self.alternate_scroll
    }

    pub fn mouse_protocol(&self) -> MouseProtocol {
        self.mouse_protocol
    }

    pub fn mouse_encoding(&self) -> MouseEncoding {
        self.mouse_encoding
    }

    pub fn focus_event_mode(&self) -> FocusEventMode {
        self.focus_mode
    }

    pub fn bracketed_paste_mode(&self) -> BracketedPasteMode {
        self.bracketed_paste
    }

    pub fn commands(&self) -> &Commands {
        &self.commands
    }

    pub fn invalidate_all(&mut self) {
        self.screen_mut().invalidate_all();
    }

    /// Drain the replies and requests produced since the last call.
    pub fn take_outgoing_events(&mut self) -> Vec<TerminalEvent> {
        std::mem::take(&mut self.outgoing)
    }

    fn reply(&mut self, text: String) {
        self.outgoing.push(TerminalEvent::Reply(text.into_bytes()));
    }

    // -- Sizing ----------------------------------------------------------

    /// The host-side size changed. The internal size follows unless a column
    /// mode or a forced size pins it.
    pub fn set_visible_size(&mut self, size: Size) {
        if self.available_size == size {
            return;
        }
        self.available_size = size;
        if !self.col_mode_80 && !self.col_mode_132 && !self.force_size {
            self.resize(size);
        }
    }

    fn resize(&mut self, size: Size) {
        if size.rows == 0 || size.cols == 0 || self.size == size {
            return;
        }
        self.size = size;
        self.primary.screen.resize(size);
        if let Some(alternate) = &mut self.alternate {
            alternate.screen.resize(size);
        }
        self.tab_stops = default_tab_stops(size.cols);
        if self.in_band_size_reports {
            self.send_in_band_size_report();
        }
    }

    fn send_in_band_size_report(&mut self) {
        let size = self.size;
        self.reply(format!(
            "\x1b[48;{};{};{};{}t",
            size.rows, size.cols, size.ypixels, size.xpixels
        ));
    }

    // -- Event dispatch ---------------------------------------------------

    pub fn on_parser_results(&mut self, events: &[ParserEvent]) {
        for event in events {
            self.on_parser_result(event);
        }
    }

    pub fn on_parser_result(&mut self, event: &ParserEvent) {
        match event {
            ParserEvent::Printable { code_point } => self.on_printable(*code_point),
            ParserEvent::Control(control) => self.on_control(control),
            ParserEvent::Csi(csi) => self.on_csi(csi),
            ParserEvent::Escape(escape) => self.on_escape(escape),
            ParserEvent::Osc(osc) => self.on_osc(osc),
            ParserEvent::Dcs(dcs) => self.on_dcs(dcs),
            ParserEvent::Apc { data } => {
                self.outgoing.push(TerminalEvent::ApcPassthrough(data.clone()));
            }
            // SS3 only exists when parsing host input.
            ParserEvent::Ss3 { .. } => {}
        }
    }

    fn on_printable(&mut self, cp: char) {
        let value = cp as u32;
        if (0x7F..=0x9F).contains(&value) {
            return;
        }
        let auto_wrap = self.auto_wrap;
        self.screen_mut().put_code_point(cp, auto_wrap);
        // Track the grapheme for REP: zero-width scalars extend it.
        if core_text::egc_width(cp.encode_utf8(&mut [0u8; 4])) == 0 {
            if let Some(last) = &mut self.last_grapheme {
                last.push(cp);
            }
        } else {
            self.last_grapheme = Some(cp.to_string());
        }
    }

    fn on_control(&mut self, control: &ControlCharacter) {
        match control.code_point {
            0x08 => self.c0_bs(),
            0x09 => self.c0_ht(),
            0x0A..=0x0C => self.c0_lf(),
            0x0D => self.c0_cr(),
            // BEL and everything else is ignored.
            _ => {}
        }
    }

    fn on_escape(&mut self, escape: &Escape) {
        if escape.intermediate == "#" {
            if escape.terminator == '8' {
                self.esc_decaln();
            }
            return;
        }
        if !escape.intermediate.is_empty() {
            return;
        }
        match escape.terminator {
            '7' => self.esc_decsc(),
            '8' => self.esc_decrc(),
            'D' => self.c1_ind(),
            'E' => self.c1_nel(),
            'H' => self.c1_hts(),
            'M' => self.c1_ri(),
            _ => {}
        }
    }

    fn on_csi(&mut self, csi: &Csi) {
        match csi.intermediate.as_str() {
            "?$" => {
                if csi.terminator == 'p' {
                    self.csi_decrqm(csi);
                }
            }
            "=" => match csi.terminator {
                'c' => self.csi_da3(csi),
                'u' => self.csi_set_key_reporting_flags(csi),
                _ => {}
            },
            ">" => match csi.terminator {
                'c' => self.csi_da2(csi),
                'u' => self.csi_push_key_reporting_flags(csi),
                _ => {}
            },
            "<" => {
                if csi.terminator == 'u' {
                    self.csi_pop_key_reporting_flags(csi);
                }
            }
            "?" => match csi.terminator {
                'h' => self.csi_decset(csi),
                'l' => self.csi_decrst(csi),
                'u' => self.csi_get_key_reporting_flags(),
                _ => {}
            },
            " " => {
                if csi.terminator == 'q' {
                    self.csi_decscusr(csi);
                }
            }
            "" => self.on_plain_csi(csi),
            _ => {}
        }
    }

    fn on_plain_csi(&mut self, csi: &Csi) {
        let params = &csi.params;
        match csi.terminator {
            '@' => {
                let count = params.get(0, 1).max(1);
                self.screen_mut().insert_blank_characters(count);
            }
            'A' => {
                let delta = params.get(0, 1).max(1);
                let row = self.screen().cursor().row.saturating_sub(delta);
                self.screen_mut().set_cursor_row(row);
            }
            'B' => {
                let delta = params.get(0, 1).max(1);
                let row = self.screen().cursor().row.saturating_add(delta);
                self.screen_mut().set_cursor_row(row);
            }
            'C' => {
                let delta = params.get(0, 1).max(1);
                let col = self.screen().cursor().col.saturating_add(delta);
                self.screen_mut().set_cursor_col(col);
            }
            'D' => {
                let delta = params.get(0, 1).max(1);
                let col = self.screen().cursor().col.saturating_sub(delta);
                self.screen_mut().set_cursor_col(col);
            }
            'G' => {
                let col = params.get(0, 1).max(1) - 1;
                self.screen_mut().set_cursor_col(col);
            }
            'H' | 'f' => {
                let row = params.get(0, 1).max(1) - 1;
                let col = params.get(1, 1).max(1) - 1;
                self.screen_mut().set_cursor_relative(row, col);
            }
            'J' => self.csi_ed(csi),
            'K' => self.csi_el(csi),
            'L' => {
                let count = params.get(0, 1).max(1);
                self.screen_mut().insert_blank_lines(count);
            }
            'M' => {
                let count = params.get(0, 1).max(1);
                self.screen_mut().delete_lines(count);
            }
            'P' => {
                let count = params.get(0, 1).max(1);
                self.screen_mut().delete_characters(count);
            }
            'S' => {
                let count = params.get(0, 1).max(1);
                for _ in 0..count {
                    self.screen_mut().scroll_down();
                }
            }
            'T' => {
                let count = params.get(0, 1).max(1);
                for _ in 0..count {
                    self.screen_mut().scroll_up();
                }
            }
            'X' => {
                let count = params.get(0, 1).max(1);
                self.screen_mut().erase_characters(count);
            }
            'b' => self.csi_rep(csi),
            'c' => self.csi_da1(csi),
            'd' => {
                let row = params.get(0, 1).max(1) - 1;
                self.screen_mut().set_cursor_row_relative(row);
            }
            'g' => self.csi_tbc(csi),
            'm' => self.csi_sgr(csi),
            'n' => self.csi_dsr(csi),
            'r' => self.csi_decstbm(csi),
            's' => self.esc_decsc(),
            't' => self.csi_xtwinops(csi),
            'u' => self.esc_decrc(),
            _ => {}
        }
    }

    // -- C0 controls ------------------------------------------------------

    fn c0_bs(&mut self) {
        let col = self.screen().cursor().col;
        if col > 0 {
            self.screen_mut().set_cursor_col(col - 1);
        }
    }

    fn c0_ht(&mut self) {
        let col = self.screen().cursor().col;
        let target = self
            .tab_stops
            .iter()
            .copied()
            .find(|&stop| stop > col)
            .unwrap_or(self.size.cols.saturating_sub(1));
        self.screen_mut().set_cursor_col(target);
    }

    fn c0_lf(&mut self) {
        let cursor = self.screen().cursor();
        let region = self.screen().scroll_region();
        if cursor.row + 1 == region.end_row {
            self.screen_mut().scroll_down();
        } else {
            self.screen_mut().set_cursor_row(cursor.row + 1);
        }
    }

    fn c0_cr(&mut self) {
        self.screen_mut().set_cursor_col(0);
    }

    // -- C1 / escapes ------------------------------------------------------

    fn c1_ind(&mut self) {
        self.c0_lf();
    }

    fn c1_nel(&mut self) {
        self.c0_cr();
        self.c0_lf();
    }

    fn c1_hts(&mut self) {
        let col = self.screen().cursor().col;
        if let Err(index) = self.tab_stops.binary_search(&col) {
            self.tab_stops.insert(index, col);
        }
    }

    fn c1_ri(&mut self) {
        let cursor = self.screen().cursor();
        let region = self.screen().scroll_region();
        if cursor.row == region.start_row {
            self.screen_mut().scroll_up();
        } else if cursor.row > 0 {
            self.screen_mut().set_cursor_row(cursor.row - 1);
        }
    }

    fn esc_decsc(&mut self) {
        let saved = self.screen().save_cursor();
        self.active_mut().saved_cursor = Some(saved);
    }

    fn esc_decrc(&mut self) {
        if let Some(saved) = self.active_mut().saved_cursor.take() {
            self.screen_mut().restore_cursor(&saved);
        }
    }

    fn esc_decaln(&mut self) {
        let size = self.size;
        let screen = self.screen_mut();
        screen.set_scroll_region(ScrollRegion::new(0, size.rows));
        screen.set_origin_mode(OriginMode::Disabled);
        screen.clear();
        for row in 0..size.rows {
            screen.set_cursor(row, 0);
            for _ in 0..size.cols {
                screen.put_code_point('E', AutoWrapMode::Disabled);
            }
        }
        screen.set_cursor(0, 0);
    }

    // -- CSI handlers ------------------------------------------------------

    fn csi_ed(&mut self, csi: &Csi) {
        match csi.params.get(0, 0) {
            0 => self.screen_mut().clear_after_cursor(),
            1 => self.screen_mut().clear_before_cursor(),
            2 => self.screen_mut().clear(),
            3 => {
                self.screen_mut().clear();
                self.screen_mut().clear_scroll_back();
            }
            _ => {}
        }
    }

    fn csi_el(&mut self, csi: &Csi) {
        match csi.params.get(0, 0) {
            0 => self.screen_mut().clear_row_after_cursor(),
            1 => self.screen_mut().clear_row_before_cursor(),
            2 => self.screen_mut().clear_row(),
            _ => {}
        }
    }

    fn csi_rep(&mut self, csi: &Csi) {
        let Some(grapheme) = self.last_grapheme.clone() else {
            return;
        };
        let count = csi.params.get(0, 1).max(1);
        let auto_wrap = self.auto_wrap;
        for _ in 0..count {
            for cp in grapheme.chars() {
                self.screen_mut().put_code_point(cp, auto_wrap);
            }
        }
    }

    fn csi_da1(&mut self, csi: &Csi) {
        if csi.params.get(0, 0) != 0 {
            return;
        }
        self.reply("\x1b[?1;0c".to_owned());
    }

    fn csi_da2(&mut self, csi: &Csi) {
        if csi.params.get(0, 0) != 0 {
            return;
        }
        self.reply("\x1b[>010;0c".to_owned());
    }

    fn csi_da3(&mut self, csi: &Csi) {
        if csi.params.get(0, 0) != 0 {
            return;
        }
        self.reply("\x1bP!|00000000\x1b\\".to_owned());
    }

    fn csi_tbc(&mut self, csi: &Csi) {
        match csi.params.get(0, 0) {
            0 => {
                let col = self.screen().cursor().col;
                self.tab_stops.retain(|&stop| stop != col);
            }
            3 => self.tab_stops.clear(),
            _ => {}
        }
    }

    fn csi_sgr(&mut self, csi: &Csi) {
        let mut rendition = self.screen().current_graphics_rendition();
        rendition.update_with_csi_params(&csi.params);
        self.screen_mut().set_current_graphics_rendition(&rendition);
    }

    fn csi_dsr(&mut self, csi: &Csi) {
        match csi.params.get(0, 0) {
            5 => {
                let report = OperatingStatusReport { malfunction: false };
                self.reply(report.serialize());
            }
            6 => {
                let cursor = self.screen().cursor();
                let report = CursorPositionReport {
                    row: cursor.row,
                    col: cursor.col,
                };
                self.reply(report.serialize());
            }
            _ => {}
        }
    }

    fn csi_decstbm(&mut self, csi: &Csi) {
        let rows = self.size.rows;
        let start = csi.params.get(0, 1).max(1) - 1;
        let end = csi.params.get(1, rows).min(rows);
        // The region must span at least two rows.
        if end < start + 2 {
            return;
        }
        self.screen_mut().set_scroll_region(ScrollRegion::new(start, end));
        self.screen_mut().set_cursor_relative(0, 0);
    }

    fn csi_decscusr(&mut self, csi: &Csi) {
        if let Some(style) = CursorStyle::from_u32(csi.params.get(0, 0)) {
            self.active_mut().cursor_style = style;
        }
    }

    fn csi_xtwinops(&mut self, csi: &Csi) {
        if !self.allow_force_size {
            return;
        }
        match csi.params.get(0, 0) {
            4 => {
                let height = csi.params.get(1, self.size.ypixels).min(100_000);
                let width = csi.params.get(2, self.size.xpixels).min(100_000);
                let mut size = self.size;
                size.ypixels = if height == 0 {
                    self.available_size.ypixels
                } else {
                    height
                };
                size.xpixels = if width == 0 {
                    self.available_size.xpixels
                } else {
                    width
                };
                self.resize(size);
            }
            8 => {
                let rows = csi.params.get(1, self.size.rows).min(1000);
                let cols = csi.params.get(2, self.size.cols).min(1000);
                self.force_size = rows != 0 || cols != 0;
                let mut size = self.size;
                size.rows = if rows == 0 {
                    self.available_size.rows
                } else {
                    rows
                };
                size.cols = if cols == 0 {
                    self.available_size.cols
                } else {
                    cols
                };
                self.resize(size);
                self.screen_mut().clear();
                let rows = self.size.rows;
                self.screen_mut().set_scroll_region(ScrollRegion::new(0, rows));
            }
            _ => {}
        }
    }

    // -- Kitty key reporting flags ----------------------------------------

    fn csi_set_key_reporting_flags(&mut self, csi: &Csi) {
        let flags = KeyReportingFlags::from_bits_truncate(csi.params.get(0, 0));
        match csi.params.get(1, 1) {
            1 => self.key_flags = flags,
            2 => self.key_flags |= flags,
            3 => self.key_flags &= !flags,
            _ => {}
        }
    }

    fn csi_get_key_reporting_flags(&mut self) {
        let report = crate::escapes::KittyKeyReport {
            flags: self.key_flags,
        };
        self.reply(report.serialize());
    }

    fn csi_push_key_reporting_flags(&mut self, csi: &Csi) {
        let flags = KeyReportingFlags::from_bits_truncate(csi.params.get(0, 0));
        if self.key_flags_stack.len() >= KEY_FLAG_STACK_LIMIT {
            self.key_flags_stack.pop_front();
        }
        self.key_flags_stack.push_back(self.key_flags);
        self.key_flags = flags;
    }

    fn csi_pop_key_reporting_flags(&mut self, csi: &Csi) {
        let count = csi.params.get(0, 1) as usize;
        if count == 0 {
            return;
        }
        if count > self.key_flags_stack.len() {
            self.key_flags_stack.clear();
            self.key_flags = KeyReportingFlags::empty();
            return;
        }
        let new_len = self.key_flags_stack.len() - count;
        self.key_flags = self.key_flags_stack[new_len];
        self.key_flags_stack.truncate(new_len);
    }

    // -- DEC private modes -------------------------------------------------

    fn csi_decset(&mut self, csi: &Csi) {
        for i in 0..csi.params.len().max(1) {
            if let Some(mode) = DecMode::from_u32(csi.params.get(i, 0)) {
                self.set_dec_mode(mode, true);
            }
        }
    }

    fn csi_decrst(&mut self, csi: &Csi) {
        for i in 0..csi.params.len().max(1) {
            if let Some(mode) = DecMode::from_u32(csi.params.get(i, 0)) {
                self.set_dec_mode(mode, false);
            }
        }
    }

    fn set_dec_mode(&mut self, mode: DecMode, set: bool) {
        match mode {
            DecMode::CursorKeys => {
                self.application_cursor_keys = if set {
                    ApplicationCursorKeysMode::Enabled
                } else {
                    ApplicationCursorKeysMode::Disabled
                };
            }
            DecMode::Select80Or132Columns => self.set_column_mode(set),
            DecMode::ReverseVideo => {
                self.reverse_video = set;
                self.invalidate_all();
            }
            DecMode::Origin => {
                let mode = if set {
                    OriginMode::Enabled
                } else {
                    OriginMode::Disabled
                };
                self.screen_mut().set_origin_mode(mode);
            }
            DecMode::AutoWrap => {
                self.auto_wrap = if set {
                    AutoWrapMode::Enabled
                } else {
                    AutoWrapMode::Disabled
                };
            }
            DecMode::X10Mouse => {
                // The legacy mode controls both protocol and encoding.
                self.mouse_protocol = if set {
                    MouseProtocol::X10
                } else {
                    MouseProtocol::None
                };
                self.mouse_encoding = MouseEncoding::X10;
            }
            DecMode::CursorEnable => self.cursor_hidden = !set,
            DecMode::Allow80Or132Columns => {
                self.allow_80_132 = set;
                if !set && (self.col_mode_80 || self.col_mode_132) {
                    self.col_mode_80 = false;
                    self.col_mode_132 = false;
                    self.resize(self.available_size);
                }
            }
            DecMode::VT200Mouse => {
                self.mouse_protocol = if set {
                    MouseProtocol::VT200
                } else {
                    MouseProtocol::None
                };
            }
            DecMode::CellMotionMouseTracking => {
                self.mouse_protocol = if set {
                    MouseProtocol::BtnEvent
                } else {
                    MouseProtocol::None
                };
            }
            DecMode::AllMotionMouseTracking => {
                self.mouse_protocol = if set {
                    MouseProtocol::AnyEvent
                } else {
                    MouseProtocol::None
                };
            }
            DecMode::FocusEvents => {
                self.focus_mode = if set {
                    FocusEventMode::Enabled
                } else {
                    FocusEventMode::Disabled
                };
            }
            DecMode::Utf8Mouse => {
                self.mouse_encoding = if set {
                    MouseEncoding::Utf8
                } else {
                    MouseEncoding::X10
                };
            }
            DecMode::SgrMouse => {
                self.mouse_encoding = if set {
                    MouseEncoding::Sgr
                } else {
                    MouseEncoding::X10
                };
            }
            DecMode::AlternateScroll => {
                self.alternate_scroll = if set {
                    AlternateScrollMode::Enabled
                } else {
                    AlternateScrollMode::Disabled
                };
            }
            DecMode::UrxvtMouse => {
                self.mouse_encoding = if set {
                    MouseEncoding::Urxvt
                } else {
                    MouseEncoding::X10
                };
            }
            DecMode::SgrPixelMouse => {
                self.mouse_encoding = if set {
                    MouseEncoding::SgrPixels
                } else {
                    MouseEncoding::X10
                };
            }
            DecMode::AlternateScreenBuffer => self.set_use_alternate_screen_buffer(set),
            DecMode::BracketedPaste => {
                self.bracketed_paste = if set {
                    BracketedPasteMode::Enabled
                } else {
                    BracketedPasteMode::Disabled
                };
            }
            DecMode::SynchronizedOutput => self.disable_drawing = set,
            // Grapheme clustering is how this terminal works; not optional.
            DecMode::GraphemeClustering => {}
            DecMode::ThemeDetection => {}
            DecMode::InBandSizeReports => {
                self.in_band_size_reports = set;
                if set {
                    self.send_in_band_size_report();
                }
            }
        }
    }

    fn set_column_mode(&mut self, wide: bool) {
        if !self.allow_80_132 {
            return;
        }
        self.col_mode_80 = !wide;
        self.col_mode_132 = wide;
        let cols = if wide { 132 } else { 80 };
        // Column switches clear the active screen and its scroll-back.
        self.screen_mut().clear_scroll_back();
        self.screen_mut().clear();
        let mut size = self.size;
        size.cols = cols;
        if self.available_size.cols != 0 {
            size.xpixels = self.available_size.xpixels * cols / self.available_size.cols;
        }
        self.resize(size);
        let rows = self.size.rows;
        self.screen_mut().set_scroll_region(ScrollRegion::new(0, rows));
        self.screen_mut().set_cursor(0, 0);
    }

    fn query_dec_mode(&self, mode: u32) -> ModeSupport {
        let Some(known) = DecMode::from_u32(mode) else {
            return ModeSupport::Unknown;
        };
        match known {
            DecMode::CursorKeys => ModeSupport::from_bool(
                self.application_cursor_keys == ApplicationCursorKeysMode::Enabled,
            ),
            DecMode::Select80Or132Columns => ModeSupport::from_bool(self.col_mode_132),
            DecMode::ReverseVideo => ModeSupport::from_bool(self.reverse_video),
            DecMode::Origin => {
                ModeSupport::from_bool(self.screen().origin_mode() == OriginMode::Enabled)
            }
            DecMode::AutoWrap => ModeSupport::from_bool(self.auto_wrap == AutoWrapMode::Enabled),
            DecMode::X10Mouse => ModeSupport::from_bool(self.mouse_protocol == MouseProtocol::X10),
            DecMode::CursorEnable => ModeSupport::from_bool(!self.cursor_hidden),
            DecMode::Allow80Or132Columns => ModeSupport::from_bool(self.allow_80_132),
            DecMode::VT200Mouse => {
                ModeSupport::from_bool(self.mouse_protocol == MouseProtocol::VT200)
            }
            DecMode::CellMotionMouseTracking => {
                ModeSupport::from_bool(self.mouse_protocol == MouseProtocol::BtnEvent)
            }
            DecMode::AllMotionMouseTracking => {
                ModeSupport::from_bool(self.mouse_protocol == MouseProtocol::AnyEvent)
            }
            DecMode::FocusEvents => {
                ModeSupport::from_bool(self.focus_mode == FocusEventMode::Enabled)
            }
            DecMode::Utf8Mouse => {
                ModeSupport::from_bool(self.mouse_encoding == MouseEncoding::Utf8)
            }
            DecMode::SgrMouse => ModeSupport::from_bool(self.mouse_encoding == MouseEncoding::Sgr),
            DecMode::AlternateScroll => {
                ModeSupport::from_bool(self.alternate_scroll == AlternateScrollMode::Enabled)
            }
            DecMode::UrxvtMouse => {
                ModeSupport::from_bool(self.mouse_encoding == MouseEncoding::Urxvt)
            }
            DecMode::SgrPixelMouse => {
                ModeSupport::from_bool(self.mouse_encoding == MouseEncoding::SgrPixels)
            }
            DecMode::AlternateScreenBuffer => ModeSupport::from_bool(self.alternate.is_some()),
            DecMode::BracketedPaste => {
                ModeSupport::from_bool(self.bracketed_paste == BracketedPasteMode::Enabled)
            }
            DecMode::SynchronizedOutput => ModeSupport::from_bool(self.disable_drawing),
            DecMode::GraphemeClustering => ModeSupport::AlwaysSet,
            DecMode::ThemeDetection => ModeSupport::Unknown,
            DecMode::InBandSizeReports => ModeSupport::from_bool(self.in_band_size_reports),
        }
    }

    fn csi_decrqm(&mut self, csi: &Csi) {
        let mode = csi.params.get(0, 0);
        let reply = ModeQueryReply {
            mode,
            support: self.query_dec_mode(mode),
        };
        self.reply(reply.serialize());
    }

    fn set_use_alternate_screen_buffer(&mut self, enter: bool) {
        if enter == self.alternate.is_some() {
            return;
        }
        if enter {
            self.saved_for_alternate = Some(self.primary.screen.save_cursor());
            self.alternate = Some(Box::new(ScreenState::new(
                self.size,
                ScrollBackEnabled::No,
                self.max_scroll_back_cells,
            )));
        } else {
            self.alternate = None;
            if let Some(saved) = self.saved_for_alternate.take() {
                self.primary.screen.restore_cursor(&saved);
            }
        }
        self.invalidate_all();
    }

    // -- OSC ---------------------------------------------------------------

    fn on_osc(&mut self, osc: &Osc) {
        let Some((selector, payload)) = osc.data.split_once(';') else {
            return;
        };
        match selector {
            "8" => self.osc_8(payload),
            "52" => self.osc_52(payload),
            "66" => self.osc_66(payload),
            "133" => self.osc_133(payload),
            _ => {}
        }
    }

    fn osc_8(&mut self, payload: &str) {
        let Some(osc) = Osc8::parse(payload) else {
            return;
        };
        let counter = &mut self.hyperlink_counter;
        let hyperlink = osc.to_hyperlink(|id| match id {
            Some(id) => id.to_owned(),
            None => {
                *counter += 1;
                format!("ttx-{counter}")
            }
        });
        self.screen_mut().set_current_hyperlink(hyperlink.as_ref());
    }

    fn osc_52(&mut self, payload: &str) {
        use base64::Engine as _;

        // Payload is `Pc ; Pd`; the selection field is ignored.
        let Some((_, data)) = payload.split_once(';') else {
            return;
        };
        if data == "?" {
            // Reading the clipboard is not supported.
            return;
        }
        let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(data) else {
            return;
        };
        self.outgoing.push(TerminalEvent::SetClipboard(decoded));
    }

    fn osc_66(&mut self, payload: &str) {
        let Some(osc) = Osc66::parse(payload) else {
            return;
        };
        let auto_wrap = self.auto_wrap;
        self.screen_mut().put_sized_text(osc.info, &osc.text, auto_wrap);
        // REP after sized text is not defined; drop the repeat state.
        self.last_grapheme = None;
    }

    fn osc_133(&mut self, payload: &str) {
        let Some(event) = Osc133::parse(payload) else {
            return;
        };
        let row = self.screen().absolute_row_screen_start() + u64::from(self.screen().cursor().row);
        self.commands.apply(event, row);
    }

    // -- DCS ---------------------------------------------------------------

    fn on_dcs(&mut self, dcs: &Dcs) {
        match dcs.intermediate.as_str() {
            "$q" => self.dcs_decrqss(dcs),
            "+q" => self.dcs_xtgettcap(dcs),
            _ => {}
        }
    }

    fn dcs_decrqss(&mut self, dcs: &Dcs) {
        let response = match dcs.data.as_str() {
            "m" => {
                let rendition = self.screen().current_graphics_rendition();
                Some(format!("{}m", rendition.as_csi_params()))
            }
            "r" => {
                let region = self.screen().scroll_region();
                Some(format!("{};{}r", region.start_row + 1, region.end_row))
            }
            " q" => Some(format!("{} q", self.cursor_style() as u32)),
            _ => None,
        };
        self.reply(StatusStringResponse { response }.serialize());
    }

    fn dcs_xtgettcap(&mut self, dcs: &Dcs) {
        for name_hex in dcs.data.split(';') {
            let reply = TerminfoString::unhex(name_hex)
                .and_then(|name| {
                    lookup_capability(&name)
                        .map(|capability| TerminfoString::from_capability(&name, capability))
                })
                .unwrap_or_default();
            self.reply(reply.serialize());
        }
    }

    // -- State serialization ----------------------------------------------

    /// Serialize the active screen plus the mode bits needed to replay it.
    pub fn state_as_escape_sequences(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.screen().state_as_escape_sequences());
        if self.application_cursor_keys == ApplicationCursorKeysMode::Enabled {
            out.push_str("\x1b[?1h");
        }
        if self.auto_wrap == AutoWrapMode::Disabled {
            out.push_str("\x1b[?7l");
        }
        if self.cursor_hidden {
            out.push_str("\x1b[?25l");
        }
        if self.bracketed_paste == BracketedPasteMode::Enabled {
            out.push_str("\x1b[?2004h");
        }
        out.push_str(&format!("\x1b[{} q", self.cursor_style() as u32));
        out
    }

    /// DECSTR-flavored soft reset: modes back to defaults, screens kept.
    pub fn soft_reset(&mut self) {
        self.cursor_hidden = false;
        self.disable_drawing = false;
        self.reverse_video = false;
        self.auto_wrap = AutoWrapMode::Enabled;
        self.application_cursor_keys = ApplicationCursorKeysMode::Disabled;
        self.key_flags = KeyReportingFlags::empty();
        self.key_flags_stack.clear();
        self.mouse_protocol = MouseProtocol::None;
        self.mouse_encoding = MouseEncoding::X10;
        self.focus_mode = FocusEventMode::Disabled;
        self.bracketed_paste = BracketedPasteMode::Disabled;
        self.alternate_scroll = AlternateScrollMode::Disabled;
        let rows = self.size.rows;
        let screen = self.screen_mut();
        screen.set_origin_mode(OriginMode::Disabled);
        screen.set_scroll_region(ScrollRegion::new(0, rows));
        screen.set_current_graphics_rendition(&GraphicsRendition::default());
    }
}

fn default_tab_stops(cols: u32) -> Vec<u32> {
    (DEFAULT_TAB_WIDTH..cols).step_by(DEFAULT_TAB_WIDTH as usize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_vt::{EscapeSequenceParser, ParserMode};
    use pretty_assertions::assert_eq;

    fn terminal(rows: u32, cols: u32) -> Terminal {
        Terminal::new(Size::new(rows, cols))
    }

    fn feed(terminal: &mut Terminal, input: &str) {
        let mut parser = EscapeSequenceParser::new(ParserMode::Application);
        let events = parser.parse(input);
        terminal.on_parser_results(&events);
    }

    fn replies(terminal: &mut Terminal) -> String {
        terminal
            .take_outgoing_events()
            .into_iter()
            .filter_map(|event| match event {
                TerminalEvent::Reply(bytes) => Some(String::from_utf8(bytes).unwrap()),
                _ => None,
            })
            .collect()
    }

    fn row_text(terminal: &Terminal, row: u32) -> String {
        terminal
            .screen()
            .row(row)
            .map(|row| row.text.clone())
            .unwrap_or_default()
    }

    #[test]
    fn cursor_movement() {
        let mut terminal = terminal(10, 20);
        feed(&mut terminal, "\x1b[5;7H");
        let cursor = terminal.screen().cursor();
        assert_eq!((cursor.row, cursor.col), (4, 6));

        feed(&mut terminal, "\x1b[2A\x1b[3C");
        let cursor = terminal.screen().cursor();
        assert_eq!((cursor.row, cursor.col), (2, 9));

        // Missing or zero parameters mean one.
        feed(&mut terminal, "\x1b[0B\x1b[D");
        let cursor = terminal.screen().cursor();
        assert_eq!((cursor.row, cursor.col), (3, 8));
    }

    #[test]
    fn tabs() {
        let mut terminal = terminal(5, 40);
        feed(&mut terminal, "\t");
        assert_eq!(terminal.screen().cursor().col, 8);
        feed(&mut terminal, "\t\t");
        assert_eq!(terminal.screen().cursor().col, 24);

        // HTS adds a stop, TBC 3 clears them all.
        feed(&mut terminal, "\r\x1b[4C\x1bH\r\t");
        assert_eq!(terminal.screen().cursor().col, 4);
        feed(&mut terminal, "\x1b[3g\r\t");
        assert_eq!(terminal.screen().cursor().col, 39);
    }

    #[test]
    fn scroll_region_with_newlines() {
        let mut terminal = terminal(5, 5);
        feed(&mut terminal, "\x1b[2;4r");
        // DECSTBM homes the cursor.
        assert_eq!(terminal.screen().cursor().row, 0);
        feed(&mut terminal, "\x1b[2;1H");
        feed(&mut terminal, "A\r\nB\r\nC\r\nD");
        assert_eq!(row_text(&terminal, 0), "");
        assert_eq!(row_text(&terminal, 1), "B");
        assert_eq!(row_text(&terminal, 2), "C");
        assert_eq!(row_text(&terminal, 3), "D");
        let cursor = terminal.screen().cursor();
        assert_eq!((cursor.row, cursor.col), (3, 1));

        // One more newline rotates the region again; rows outside stay.
        feed(&mut terminal, "\r\n");
        assert_eq!(row_text(&terminal, 1), "C");
        assert_eq!(row_text(&terminal, 2), "D");
        assert_eq!(row_text(&terminal, 3), "");
        assert_eq!(terminal.screen().cursor().row, 3);
        assert_eq!(terminal.screen().cursor().col, 0);
        // A partial region never feeds scroll-back.
        assert_eq!(terminal.screen().scroll_back_rows(), 0);
    }

    #[test]
    fn alternate_screen_round_trip() {
        let mut terminal = terminal(4, 10);
        feed(&mut terminal, "X");
        assert!(!terminal.in_alternate_screen_buffer());

        feed(&mut terminal, "\x1b[?1049h");
        assert!(terminal.in_alternate_screen_buffer());
        feed(&mut terminal, "Y");
        assert_eq!(row_text(&terminal, 0), "Y");

        feed(&mut terminal, "\x1b[?1049l");
        assert!(!terminal.in_alternate_screen_buffer());
        assert_eq!(row_text(&terminal, 0), "X");
        let cursor = terminal.screen().cursor();
        assert_eq!((cursor.row, cursor.col), (0, 1));
    }

    #[test]
    fn sgr_and_decrqss_round_trip() {
        let mut terminal = terminal(4, 10);
        feed(
            &mut terminal,
            "\x1b[1;3;38:2::10:20:30;48:5:9;58:2::4:5:6m",
        );
        feed(&mut terminal, "\x1bP$qm\x1b\\");
        let reply = replies(&mut terminal);
        assert!(reply.starts_with("\x1bP1$r"), "reply {reply:?}");
        assert!(reply.ends_with("m\x1b\\"));

        // The replied SGR reproduces the rendition.
        let params_text = reply
            .strip_prefix("\x1bP1$r")
            .unwrap()
            .strip_suffix("m\x1b\\")
            .unwrap();
        let rendition = GraphicsRendition::from_csi_params(&params_text.parse().unwrap());
        assert_eq!(rendition, terminal.screen().current_graphics_rendition());
        assert_eq!(
            rendition.fg,
            crate::rendition::Color::Rgb(10, 20, 30)
        );
        assert_eq!(rendition.bg, crate::rendition::Color::Palette(9));
        assert_eq!(
            rendition.underline_color,
            crate::rendition::Color::Rgb(4, 5, 6)
        );
    }

    #[test]
    fn decrqss_unknown_is_invalid() {
        let mut terminal = terminal(4, 10);
        feed(&mut terminal, "\x1bP$qz\x1b\\");
        assert_eq!(replies(&mut terminal), "\x1bP0$r\x1b\\");
    }

    #[test]
    fn device_attribute_replies() {
        let mut terminal = terminal(4, 10);
        feed(&mut terminal, "\x1b[c\x1b[>c\x1b[=c");
        assert_eq!(
            replies(&mut terminal),
            "\x1b[?1;0c\x1b[>010;0c\x1bP!|00000000\x1b\\"
        );
    }

    #[test]
    fn device_status_reports() {
        let mut terminal = terminal(4, 10);
        feed(&mut terminal, "\x1b[5n");
        assert_eq!(replies(&mut terminal), "\x1b[0n");
        feed(&mut terminal, "\x1b[3;2H\x1b[6n");
        assert_eq!(replies(&mut terminal), "\x1b[3;2R");
    }

    #[test]
    fn decrqm_replies() {
        let mut terminal = terminal(4, 10);
        feed(&mut terminal, "\x1b[?2026$p");
        assert_eq!(replies(&mut terminal), "\x1b[?2026;2$y");
        feed(&mut terminal, "\x1b[?2026h\x1b[?2026$p");
        assert_eq!(replies(&mut terminal), "\x1b[?2026;1$y");
        assert!(!terminal.allowed_to_draw());
        feed(&mut terminal, "\x1b[?2027$p");
        assert_eq!(replies(&mut terminal), "\x1b[?2027;3$y");
        feed(&mut terminal, "\x1b[?2031$p");
        assert_eq!(replies(&mut terminal), "\x1b[?2031;0$y");
    }

    #[test]
    fn mouse_and_paste_modes() {
        let mut terminal = terminal(4, 10);
        feed(&mut terminal, "\x1b[?1003h\x1b[?1006h\x1b[?2004h\x1b[?1004h");
        assert_eq!(terminal.mouse_protocol(), MouseProtocol::AnyEvent);
        assert_eq!(terminal.mouse_encoding(), MouseEncoding::Sgr);
        assert_eq!(terminal.bracketed_paste_mode(), BracketedPasteMode::Enabled);
        assert_eq!(terminal.focus_event_mode(), FocusEventMode::Enabled);

        feed(&mut terminal, "\x1b[?1006l\x1b[?1003l");
        assert_eq!(terminal.mouse_protocol(), MouseProtocol::None);
        assert_eq!(terminal.mouse_encoding(), MouseEncoding::X10);
    }

    #[test]
    fn kitty_flags_stack() {
        let mut terminal = terminal(4, 10);
        feed(&mut terminal, "\x1b[=5;1u");
        assert_eq!(
            terminal.key_reporting_flags(),
            KeyReportingFlags::DISAMBIGUATE | KeyReportingFlags::REPORT_ALTERNATE_KEYS
        );

        feed(&mut terminal, "\x1b[>31u");
        assert_eq!(terminal.key_reporting_flags().bits(), 31);
        feed(&mut terminal, "\x1b[?u");
        assert_eq!(replies(&mut terminal), "\x1b[?31u");

        feed(&mut terminal, "\x1b[<u");
        assert_eq!(terminal.key_reporting_flags().bits(), 5);
        feed(&mut terminal, "\x1b[<99u");
        assert_eq!(terminal.key_reporting_flags(), KeyReportingFlags::empty());
    }

    #[test]
    fn rep_repeats_last_grapheme() {
        let mut terminal = terminal(2, 10);
        feed(&mut terminal, "ab\x1b[3b");
        assert_eq!(row_text(&terminal, 0), "abbbb");
    }

    #[test]
    fn osc52_sets_clipboard() {
        let mut terminal = terminal(2, 10);
        feed(&mut terminal, "\x1b]52;c;aGVsbG8=\x07");
        let events = terminal.take_outgoing_events();
        assert_eq!(events, vec![TerminalEvent::SetClipboard(b"hello".to_vec())]);
    }

    #[test]
    fn osc8_hyperlinks_cells() {
        let mut terminal = terminal(2, 20);
        feed(&mut terminal, "\x1b]8;id=x;http://e.com\x1b\\link\x1b]8;;\x1b\\y");
        let screen = terminal.screen();
        let row = screen.row(0).unwrap();
        let link_id = row.cells[0].hyperlink_id;
        assert_ne!(link_id, 0);
        assert_eq!(
            screen.ids().hyperlink(link_id).map(|h| h.uri.as_str()),
            Some("http://e.com")
        );
        // After the reset, new cells carry no hyperlink.
        assert_eq!(row.cells[4].hyperlink_id, 0);
    }

    #[test]
    fn osc133_tracks_commands() {
        let mut terminal = terminal(4, 20);
        feed(&mut terminal, "\x1b]133;A\x07$ \x1b]133;B\x07ls\r\n\x1b]133;C\x07out\r\n\x1b]133;D;0\x07");
        let entries = terminal.commands().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].exit_code, Some(0));
    }

    #[test]
    fn xtgettcap_known_and_unknown() {
        let mut terminal = terminal(2, 10);
        // "Co" in hex.
        feed(&mut terminal, "\x1bP+q436F\x1b\\");
        let reply = replies(&mut terminal);
        assert_eq!(reply, format!("\x1bP1+r436F={}\x1b\\", TerminfoString::hex("256")));

        // Unknown capability.
        feed(&mut terminal, "\x1bP+q5858\x1b\\");
        assert_eq!(replies(&mut terminal), "\x1bP0+r\x1b\\");
    }

    #[test]
    fn column_mode_gated_by_allow() {
        let mut terminal = terminal(10, 40);
        feed(&mut terminal, "\x1b[?3h");
        assert_eq!(terminal.size().cols, 40);

        feed(&mut terminal, "\x1b[?40h\x1b[?3h");
        assert_eq!(terminal.size().cols, 132);
        feed(&mut terminal, "\x1b[?3l");
        assert_eq!(terminal.size().cols, 80);
        // Releasing the gate restores the visible size.
        feed(&mut terminal, "\x1b[?40l");
        assert_eq!(terminal.size().cols, 40);
    }

    #[test]
    fn decaln_fills_screen() {
        let mut terminal = terminal(3, 4);
        feed(&mut terminal, "\x1b#8");
        for row in 0..3 {
            assert_eq!(row_text(&terminal, row), "EEEE");
        }
        assert_eq!(terminal.screen().cursor().row, 0);
    }

    #[test]
    fn save_restore_cursor() {
        let mut terminal = terminal(4, 10);
        feed(&mut terminal, "\x1b[2;3H\x1b7\x1b[H\x1b8");
        let cursor = terminal.screen().cursor();
        assert_eq!((cursor.row, cursor.col), (1, 2));
        // SCOSC/SCORC behave the same.
        feed(&mut terminal, "\x1b[3;4H\x1b[s\x1b[H\x1b[u");
        let cursor = terminal.screen().cursor();
        assert_eq!((cursor.row, cursor.col), (2, 3));
    }

    #[test]
    fn in_band_size_reports() {
        let mut terminal = terminal(10, 20);
        feed(&mut terminal, "\x1b[?2048h");
        assert_eq!(replies(&mut terminal), "\x1b[48;10;20;0;0t");
    }
}
