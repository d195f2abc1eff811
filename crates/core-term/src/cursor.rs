//! Cursor state.

use crate::rendition::GraphicsRendition;
use crate::screen::OriginMode;

/// The live cursor. The byte offset of the cursor's cell within its row's
/// text is cached so single-cell writes need no scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub row: u32,
    pub col: u32,
    /// Byte offset of the cell's text within the row text.
    pub text_offset: usize,
    /// Set when output reached the right edge; the next printable triggers
    /// the deferred wrap.
    pub overflow_pending: bool,
}

/// State captured by DECSC and restored by DECRC.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SavedCursor {
    pub row: u32,
    pub col: u32,
    pub overflow_pending: bool,
    pub graphics_rendition: GraphicsRendition,
    pub origin_mode: OriginMode,
}

/// DECSCUSR cursor styles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CursorStyle {
    BlinkingBlock = 1,
    #[default]
    SteadyBlock = 2,
    BlinkingUnderline = 3,
    SteadyUnderline = 4,
    BlinkingBar = 5,
    SteadyBar = 6,
}

impl CursorStyle {
    pub fn from_u32(value: u32) -> Option<CursorStyle> {
        Some(match value {
            // 0 selects the default style.
            0 | 1 => CursorStyle::BlinkingBlock,
            2 => CursorStyle::SteadyBlock,
            3 => CursorStyle::BlinkingUnderline,
            4 => CursorStyle::SteadyUnderline,
            5 => CursorStyle::BlinkingBar,
            6 => CursorStyle::SteadyBar,
            _ => return None,
        })
    }
}
