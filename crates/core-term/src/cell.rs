//! Terminal cells and the shared values they reference by id.

use crate::id_map::IdMapValue;
use crate::rendition::GraphicsRendition;

/// Cell text is capped at 15 bits so the size and the dirty bit pack into
/// one word.
pub const MAX_TEXT_SIZE: u16 = u16::MAX / 2;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct CellFlags: u8 {
        /// Leftmost cell of a multi-cell.
        const LEFT_BOUNDARY = 1 << 0;
        /// Topmost cell of a multi-cell.
        const TOP_BOUNDARY = 1 << 1;
        /// Content was erased but the host terminal may still show stale
        /// output here.
        const STALE = 1 << 2;
    }
}

/// One grid position. Cells carry no text of their own: the text lives in
/// the row and is located by summing the `text_size` of preceding cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub graphics_id: u16,
    pub hyperlink_id: u16,
    pub multi_cell_id: u16,
    // 15-bit text size plus the dirty bit.
    size_and_dirty: u16,
    pub flags: CellFlags,
}

impl Default for Cell {
    fn default() -> Self {
        // Cells start dirty so new rows are painted.
        Self {
            graphics_id: 0,
            hyperlink_id: 0,
            multi_cell_id: 0,
            size_and_dirty: DIRTY_BIT,
            flags: CellFlags::empty(),
        }
    }
}

const DIRTY_BIT: u16 = 1 << 15;

impl Cell {
    pub fn text_size(&self) -> u16 {
        self.size_and_dirty & !DIRTY_BIT
    }

    pub fn set_text_size(&mut self, size: u16) {
        debug_assert!(size <= MAX_TEXT_SIZE);
        self.size_and_dirty = (self.size_and_dirty & DIRTY_BIT) | (size & !DIRTY_BIT);
    }

    pub fn dirty(&self) -> bool {
        self.size_and_dirty & DIRTY_BIT != 0
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        if dirty {
            self.size_and_dirty |= DIRTY_BIT;
        } else {
            self.size_and_dirty &= !DIRTY_BIT;
        }
    }

    /// Empty means carrying nothing at all: no attributes, no text.
    pub fn is_empty(&self) -> bool {
        self.graphics_id == 0
            && self.hyperlink_id == 0
            && self.multi_cell_id == 0
            && self.text_size() == 0
    }

    pub fn is_multi_cell(&self) -> bool {
        self.multi_cell_id != 0
    }

    /// The primary cell of a multi-cell holds the text; every other cell in
    /// the span is a continuation.
    pub fn is_primary_in_multi_cell(&self) -> bool {
        self.is_multi_cell()
            && self
                .flags
                .contains(CellFlags::LEFT_BOUNDARY | CellFlags::TOP_BOUNDARY)
    }

    pub fn is_nonprimary_in_multi_cell(&self) -> bool {
        self.is_multi_cell() && !self.is_primary_in_multi_cell()
    }
}

/// Shared metadata for cells linked by the text sizing protocol (OSC 66) or
/// by plain double-width characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MultiCellInfo {
    /// Vertical scale; multiplies the width.
    pub scale: u8,
    /// Width in cells; 0 in an OSC 66 request means inferred from the text.
    pub width: u8,
    pub fractional_scale_numerator: u8,
    pub fractional_scale_denominator: u8,
    pub vertical_alignment: u8,
    pub horizontal_alignment: u8,
}

impl Default for MultiCellInfo {
    fn default() -> Self {
        Self {
            scale: 1,
            width: 0,
            fractional_scale_numerator: 0,
            fractional_scale_denominator: 0,
            vertical_alignment: 0,
            horizontal_alignment: 0,
        }
    }
}

impl MultiCellInfo {
    /// Implicit id 0: a plain narrow cell.
    pub const NARROW: MultiCellInfo = MultiCellInfo::plain(1);
    /// Implicit id 1: a plain double-width character.
    pub const WIDE: MultiCellInfo = MultiCellInfo::plain(2);

    const fn plain(width: u8) -> MultiCellInfo {
        MultiCellInfo {
            scale: 1,
            width,
            fractional_scale_numerator: 0,
            fractional_scale_denominator: 0,
            vertical_alignment: 0,
            horizontal_alignment: 0,
        }
    }

    pub fn compute_width(&self) -> u8 {
        self.scale.saturating_mul(self.width)
    }
}

impl IdMapValue for MultiCellInfo {
    type Key = MultiCellInfo;

    fn id_map_key(&self) -> MultiCellInfo {
        *self
    }
}

impl IdMapValue for GraphicsRendition {
    type Key = GraphicsRendition;

    fn id_map_key(&self) -> GraphicsRendition {
        self.clone()
    }
}

/// A hyperlink set via OSC 8. Cells sharing an id belong to one link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hyperlink {
    pub uri: String,
    pub id: String,
}

impl Hyperlink {
    /// Per the OSC 8 spec, URIs beyond this length must be ignored.
    pub const MAX_URI_LENGTH: usize = 2083;

    /// Chosen below the common 250-byte implementation limit so a prefix can
    /// be added when forwarding without overflowing it.
    pub const MAX_ID_LENGTH: usize = 230;
}

impl IdMapValue for Hyperlink {
    type Key = String;

    fn id_map_key(&self) -> String {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_size_and_dirty_pack() {
        let mut cell = Cell::default();
        assert!(cell.dirty());
        assert_eq!(cell.text_size(), 0);

        cell.set_text_size(123);
        cell.set_dirty(false);
        assert_eq!(cell.text_size(), 123);
        assert!(!cell.dirty());

        cell.set_dirty(true);
        assert_eq!(cell.text_size(), 123);
    }

    #[test]
    fn emptiness_ignores_dirty() {
        let mut cell = Cell::default();
        assert!(cell.is_empty());
        cell.set_dirty(false);
        assert!(cell.is_empty());
        cell.graphics_id = 3;
        assert!(!cell.is_empty());
    }

    #[test]
    fn implicit_widths() {
        assert_eq!(MultiCellInfo::NARROW.compute_width(), 1);
        assert_eq!(MultiCellInfo::WIDE.compute_width(), 2);
    }
}
