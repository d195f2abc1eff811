//! Rendering: a double-buffered cell grid diffed into minimal escape
//! sequences, and the render thread that drives it.
//!
//! Panes paint into the *desired* buffer through a bound rectangle; `finish`
//! walks desired against *current* row by row and emits a cursor move only
//! at the start of each dirty run, an SGR only when the rendition changes,
//! and a hyperlink OSC only when the link changes. Frames are wrapped in
//! synchronized-output so the host presents them atomically.

mod render_thread;

pub use render_thread::{RenderThread, StatusContext};

use std::io::Write;

use core_events::Size;
use core_term::{CursorStyle, GraphicsRendition, Hyperlink};

/// Cursor state for the frame being presented.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedCursor {
    pub row: u32,
    pub col: u32,
    pub style: CursorStyle,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RenderCell {
    /// One grapheme cluster; empty renders as a blank.
    cluster: String,
    /// Visual width; 0 marks the continuation of a wide cluster.
    width: u8,
    rendition: GraphicsRendition,
    hyperlink: Option<Hyperlink>,
}

impl Default for RenderCell {
    fn default() -> Self {
        Self {
            cluster: String::new(),
            width: 1,
            rendition: GraphicsRendition::default(),
            hyperlink: None,
        }
    }
}

pub struct Renderer {
    size: Size,
    current: Vec<RenderCell>,
    desired: Vec<RenderCell>,
    size_changed: bool,

    bound_row: u32,
    bound_col: u32,
    bound_width: u32,
    bound_height: u32,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Renderer {
        Renderer {
            size: Size::default(),
            current: Vec::new(),
            desired: Vec::new(),
            size_changed: true,
            bound_row: 0,
            bound_col: 0,
            bound_width: 0,
            bound_height: 0,
        }
    }

    /// One-time host terminal setup, in the order the teardown reverses.
    pub fn setup(&self, output: &mut dyn Write) -> std::io::Result<()> {
        output.write_all(
            b"\x1b[?1049h\x1b[?7l\x1b[>31u\x1b[?1003h\x1b[?1006h\x1b[?1004h\x1b[?2004h",
        )?;
        output.flush()
    }

    /// Undo `setup`, leaving the host terminal as found.
    pub fn cleanup(&self, output: &mut dyn Write) -> std::io::Result<()> {
        output.write_all(
            b"\x1b[m\x1b[?25h\x1b[?2004l\x1b[?1004l\x1b[?1006l\x1b[?1003l\x1b[<u\x1b[?7h\x1b[?1049l",
        )?;
        output.flush()
    }

    /// Begin a frame. A size change resets both buffers and forces a full
    /// repaint.
    pub fn start(&mut self, size: Size) {
        if self.size != size {
            self.size = size;
            let cells = (size.rows as usize) * (size.cols as usize);
            self.current = vec![RenderCell::default(); cells];
            self.desired = vec![RenderCell::default(); cells];
            // Nothing is known about the host's contents anymore.
            for cell in &mut self.current {
                cell.cluster = "\u{0}".to_owned();
            }
            self.size_changed = true;
        }
        self.bound_row = 0;
        self.bound_col = 0;
        self.bound_width = size.cols;
        self.bound_height = size.rows;
    }

    /// Whether the last `start` discarded the previous frame; panes must
    /// repaint fully when it did.
    pub fn size_changed(&self) -> bool {
        self.size_changed
    }

    /// Restrict subsequent puts to a rectangle; coordinates passed to the
    /// put calls become relative to it.
    pub fn set_bound(&mut self, row: u32, col: u32, width: u32, height: u32) {
        self.bound_row = row;
        self.bound_col = col;
        self.bound_width = width;
        self.bound_height = height;
    }

    fn index(&self, row: u32, col: u32) -> Option<usize> {
        if row >= self.size.rows || col >= self.size.cols {
            return None;
        }
        Some(row as usize * self.size.cols as usize + col as usize)
    }

    /// Paint one cell (bound-relative coordinates).
    pub fn put_cell(
        &mut self,
        cluster: &str,
        width: u16,
        row: u32,
        col: u32,
        rendition: &GraphicsRendition,
        hyperlink: Option<&Hyperlink>,
    ) {
        if row >= self.bound_height || col >= self.bound_width {
            return;
        }
        let width = (width.clamp(1, 2)) as u8;
        let absolute_row = row + self.bound_row;
        let absolute_col = col + self.bound_col;
        let Some(index) = self.index(absolute_row, absolute_col) else {
            return;
        };
        self.desired[index] = RenderCell {
            cluster: cluster.to_owned(),
            width,
            rendition: rendition.clone(),
            hyperlink: hyperlink.cloned(),
        };
        // Continuation slot of a wide cluster.
        if width == 2 && col + 1 < self.bound_width {
            if let Some(next) = self.index(absolute_row, absolute_col + 1) {
                self.desired[next] = RenderCell {
                    cluster: String::new(),
                    width: 0,
                    rendition: rendition.clone(),
                    hyperlink: hyperlink.cloned(),
                };
            }
        }
    }

    /// Paint a string cluster-by-cluster (status bar, borders).
    pub fn put_text(&mut self, text: &str, row: u32, col: u32, rendition: &GraphicsRendition) {
        let mut col = col;
        for cluster in core_text::graphemes(text) {
            let width = core_text::egc_width(cluster);
            if width == 0 {
                continue;
            }
            self.put_cell(cluster, width, row, col, rendition, None);
            col += u32::from(width);
        }
    }

    pub fn clear_row(&mut self, row: u32, rendition: &GraphicsRendition) {
        for col in 0..self.bound_width {
            self.put_cell("", 1, row, col, rendition, None);
        }
    }

    /// Diff desired against current, emit the reconciliation, and make
    /// desired the new current.
    pub fn finish(
        &mut self,
        output: &mut dyn Write,
        cursor: &RenderedCursor,
    ) -> std::io::Result<()> {
        let mut frame = String::new();
        frame.push_str("\x1b[?2026h\x1b[?25l");

        let mut last_rendition = GraphicsRendition::default();
        let mut last_hyperlink: Option<Hyperlink> = None;
        let mut cursor_at: Option<(u32, u32)> = None;
        frame.push_str("\x1b[m");

        for row in 0..self.size.rows {
            let mut col = 0;
            while col < self.size.cols {
                let index = row as usize * self.size.cols as usize + col as usize;
                let desired = &self.desired[index];
                if desired.width == 0 {
                    // Covered by the wide cluster to the left.
                    col += 1;
                    continue;
                }
                if *desired == self.current[index] {
                    col += 1;
                    continue;
                }

                if cursor_at != Some((row, col)) {
                    frame.push_str(&format!("\x1b[{};{}H", row + 1, col + 1));
                }
                if desired.rendition != last_rendition {
                    frame.push_str(&format!("\x1b[{}m", desired.rendition.as_csi_params()));
                    last_rendition = desired.rendition.clone();
                }
                if desired.hyperlink != last_hyperlink {
                    frame.push_str(&hyperlink_osc(desired.hyperlink.as_ref()));
                    last_hyperlink = desired.hyperlink.clone();
                }
                if desired.cluster.is_empty() {
                    frame.push(' ');
                } else {
                    frame.push_str(&desired.cluster);
                }
                let advance = u32::from(desired.width.max(1));
                cursor_at = Some((row, col + advance));
                col += advance;
            }
        }

        if last_hyperlink.is_some() {
            frame.push_str(&hyperlink_osc(None));
        }
        frame.push_str("\x1b[m");
        if cursor.hidden {
            frame.push_str("\x1b[?25l");
        } else {
            frame.push_str(&format!(
                "\x1b[{};{}H\x1b[{} q\x1b[?25h",
                cursor.row + 1,
                cursor.col + 1,
                cursor.style as u32
            ));
        }
        frame.push_str("\x1b[?2026l");

        self.current.clone_from(&self.desired);
        self.size_changed = false;

        output.write_all(frame.as_bytes())?;
        output.flush()
    }
}

fn hyperlink_osc(hyperlink: Option<&Hyperlink>) -> String {
    match hyperlink {
        Some(hyperlink) => format!("\x1b]8;id={};{}\x1b\\", hyperlink.id, hyperlink.uri),
        None => "\x1b]8;;\x1b\\".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame_to_string(renderer: &mut Renderer, cursor: &RenderedCursor) -> String {
        let mut output = Vec::new();
        renderer.finish(&mut output, cursor).unwrap();
        String::from_utf8(output).unwrap()
    }

    fn plain() -> GraphicsRendition {
        GraphicsRendition::default()
    }

    #[test]
    fn first_frame_paints_content_once() {
        let mut renderer = Renderer::new();
        renderer.start(Size::new(2, 10));
        renderer.put_text("hi", 0, 0, &plain());
        let frame = frame_to_string(&mut renderer, &RenderedCursor::default());
        assert!(frame.contains("hi"), "frame {frame:?}");
        assert!(frame.starts_with("\x1b[?2026h"));
        assert!(frame.ends_with("\x1b[?2026l"));

        // An identical second frame emits no cell writes.
        renderer.start(Size::new(2, 10));
        renderer.put_text("hi", 0, 0, &plain());
        let frame = frame_to_string(&mut renderer, &RenderedCursor::default());
        assert!(!frame.contains("hi"), "frame {frame:?}");
    }

    #[test]
    fn only_changed_cells_are_rewritten() {
        let mut renderer = Renderer::new();
        renderer.start(Size::new(1, 10));
        renderer.put_text("aaaa", 0, 0, &plain());
        frame_to_string(&mut renderer, &RenderedCursor::default());

        renderer.start(Size::new(1, 10));
        renderer.put_text("aaba", 0, 0, &plain());
        let frame = frame_to_string(&mut renderer, &RenderedCursor::default());
        // One cursor move to column 3, one character.
        assert!(frame.contains("\x1b[1;3H"), "frame {frame:?}");
        assert!(frame.contains('b'));
        assert!(!frame.contains('a'), "unchanged cells rewritten: {frame:?}");
    }

    #[test]
    fn sgr_emitted_only_on_change() {
        let mut renderer = Renderer::new();
        renderer.start(Size::new(1, 10));
        let bold = GraphicsRendition {
            font_weight: core_term::FontWeight::Bold,
            ..Default::default()
        };
        renderer.put_text("ab", 0, 0, &bold);
        let frame = frame_to_string(&mut renderer, &RenderedCursor::default());
        // One SGR for the run, not one per cell.
        assert_eq!(frame.matches("\x1b[0;1m").count(), 1, "frame {frame:?}");
    }

    #[test]
    fn bound_clips_puts() {
        let mut renderer = Renderer::new();
        renderer.start(Size::new(4, 10));
        renderer.set_bound(1, 2, 3, 1);
        renderer.put_text("abcdef", 0, 0, &plain());
        let frame = frame_to_string(&mut renderer, &RenderedCursor::default());
        assert!(frame.contains("abc"), "frame {frame:?}");
        assert!(!frame.contains('d'));
        // Content lands at the bound's offset.
        assert!(frame.contains("\x1b[2;3H"), "frame {frame:?}");
    }

    #[test]
    fn wide_cluster_occupies_two_cells() {
        let mut renderer = Renderer::new();
        renderer.start(Size::new(1, 4));
        renderer.put_cell("日", 2, 0, 0, &plain(), None);
        renderer.put_cell("x", 1, 0, 2, &plain(), None);
        let frame = frame_to_string(&mut renderer, &RenderedCursor::default());
        assert!(frame.contains("日x"), "frame {frame:?}");
    }

    #[test]
    fn cursor_position_and_style() {
        let mut renderer = Renderer::new();
        renderer.start(Size::new(2, 4));
        let cursor = RenderedCursor {
            row: 1,
            col: 2,
            style: CursorStyle::SteadyBar,
            hidden: false,
        };
        let frame = frame_to_string(&mut renderer, &cursor);
        assert!(frame.contains("\x1b[2;3H\x1b[6 q\x1b[?25h"), "frame {frame:?}");

        let hidden = RenderedCursor {
            hidden: true,
            ..cursor
        };
        let frame = frame_to_string(&mut renderer, &hidden);
        assert!(!frame.contains("\x1b[?25h"));
    }

    #[test]
    fn hyperlink_emitted_on_change_and_closed() {
        let mut renderer = Renderer::new();
        renderer.start(Size::new(1, 10));
        let link = Hyperlink {
            uri: "http://e".to_owned(),
            id: "k".to_owned(),
        };
        renderer.put_cell("a", 1, 0, 0, &plain(), Some(&link));
        renderer.put_cell("b", 1, 0, 1, &plain(), Some(&link));
        let frame = frame_to_string(&mut renderer, &RenderedCursor::default());
        assert_eq!(frame.matches("\x1b]8;id=k;http://e\x1b\\").count(), 1);
        // The trailing reset keeps the link from bleeding into the cursor.
        assert!(frame.contains("\x1b]8;;\x1b\\"));
    }
}
