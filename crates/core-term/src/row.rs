//! A row of cells plus the text they index into.

use crate::cell::Cell;

/// Invariant: the sum of the cells' `text_size` equals `text.len()`, and
/// `text` is valid UTF-8 with every cell boundary on a character boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub cells: Vec<Cell>,
    pub text: String,
    /// Set when the cursor wrapped past the right edge of this row; resize
    /// re-wrapping and selection joining depend on it.
    pub overflow: bool,
}

impl Row {
    pub fn with_width(width: usize) -> Row {
        Row {
            cells: vec![Cell::default(); width],
            text: String::new(),
            overflow: false,
        }
    }

    /// Byte offset of the given column's text.
    pub fn text_offset_of_col(&self, col: usize) -> usize {
        self.cells
            .iter()
            .take(col)
            .map(|cell| usize::from(cell.text_size()))
            .sum()
    }

    /// Text of a single cell.
    pub fn cell_text(&self, col: usize) -> &str {
        let start = self.text_offset_of_col(col);
        let size = self
            .cells
            .get(col)
            .map(|cell| usize::from(cell.text_size()))
            .unwrap_or(0);
        &self.text[start..start + size]
    }

    /// Mark every cell dirty.
    pub fn invalidate(&mut self) {
        for cell in &mut self.cells {
            cell.set_dirty(true);
        }
    }

    #[cfg(debug_assertions)]
    pub fn assert_text_invariant(&self) {
        let total: usize = self
            .cells
            .iter()
            .map(|cell| usize::from(cell.text_size()))
            .sum();
        debug_assert_eq!(total, self.text.len(), "cell sizes out of sync with text");
    }
}
