//! Row groups: rows plus the id maps their cells reference.
//!
//! A screen has one active row group; scroll-back holds a chain of further
//! groups. Attribute ids are only meaningful within their owning group, so
//! moving rows between groups re-resolves every id against the destination.

use std::collections::VecDeque;

use crate::cell::{Cell, Hyperlink, MultiCellInfo};
use crate::id_map::IdMap;
use crate::rendition::GraphicsRendition;
use crate::row::Row;

/// The three id maps of a row group, separate from the rows so both can be
/// borrowed mutably at once.
pub struct IdMaps {
    graphics: IdMap<GraphicsRendition>,
    hyperlinks: IdMap<Hyperlink>,
    multi_cells: IdMap<MultiCellInfo>,
    default_rendition: GraphicsRendition,
}

impl Default for IdMaps {
    fn default() -> Self {
        let mut multi_cells = IdMap::new();
        // Id 1 means "plain wide" implicitly and must never be handed out.
        multi_cells.reserve(1);
        Self {
            graphics: IdMap::new(),
            hyperlinks: IdMap::new(),
            multi_cells,
            default_rendition: GraphicsRendition::default(),
        }
    }
}

impl IdMaps {
    pub fn graphics_rendition(&self, id: u16) -> &GraphicsRendition {
        if id == 0 {
            return &self.default_rendition;
        }
        self.graphics.lookup_id(id).unwrap_or(&self.default_rendition)
    }

    pub fn hyperlink(&self, id: u16) -> Option<&Hyperlink> {
        if id == 0 {
            return None;
        }
        self.hyperlinks.lookup_id(id)
    }

    pub fn multi_cell_info(&self, id: u16) -> MultiCellInfo {
        match id {
            0 => MultiCellInfo::NARROW,
            1 => MultiCellInfo::WIDE,
            _ => self
                .multi_cells
                .lookup_id(id)
                .copied()
                .unwrap_or(MultiCellInfo::NARROW),
        }
    }

    /// Resolve or allocate an id for a rendition, taking a reference.
    /// Exhaustion degrades to the default id; the rendition is lost for that
    /// cell.
    pub fn maybe_allocate_graphics_id(&mut self, rendition: &GraphicsRendition) -> u16 {
        if *rendition == GraphicsRendition::default() {
            return 0;
        }
        if let Some(id) = self.graphics.lookup_key(rendition) {
            return self.graphics.use_id(id);
        }
        self.graphics.allocate(rendition.clone()).unwrap_or_else(|| {
            tracing::warn!(target: "term", "graphics id space exhausted");
            0
        })
    }

    pub fn maybe_allocate_hyperlink_id(&mut self, hyperlink: &Hyperlink) -> u16 {
        if let Some(id) = self.hyperlinks.lookup_key(&hyperlink.id) {
            return self.hyperlinks.use_id(id);
        }
        self.hyperlinks.allocate(hyperlink.clone()).unwrap_or_else(|| {
            tracing::warn!(target: "term", "hyperlink id space exhausted");
            0
        })
    }

    /// Multi-cell ids 0 and 1 are implicit and never counted.
    pub fn maybe_allocate_multi_cell_id(&mut self, info: &MultiCellInfo) -> u16 {
        if *info == MultiCellInfo::NARROW {
            return 0;
        }
        if *info == MultiCellInfo::WIDE {
            return 1;
        }
        if let Some(id) = self.multi_cells.lookup_key(info) {
            return self.multi_cells.use_id(id);
        }
        self.multi_cells.allocate(*info).unwrap_or_else(|| {
            tracing::warn!(target: "term", "multi-cell id space exhausted");
            0
        })
    }

    pub fn use_graphics_id(&mut self, id: u16) -> u16 {
        if id == 0 {
            return 0;
        }
        self.graphics.use_id(id)
    }

    pub fn use_hyperlink_id(&mut self, id: u16) -> u16 {
        if id == 0 {
            return 0;
        }
        self.hyperlinks.use_id(id)
    }

    pub fn use_multi_cell_id(&mut self, id: u16) -> u16 {
        if id <= 1 {
            return id;
        }
        self.multi_cells.use_id(id)
    }

    pub fn drop_graphics_id(&mut self, id: &mut u16) {
        if *id != 0 {
            self.graphics.drop_id(*id);
            *id = 0;
        }
    }

    pub fn drop_hyperlink_id(&mut self, id: &mut u16) {
        if *id != 0 {
            self.hyperlinks.drop_id(*id);
            *id = 0;
        }
    }

    pub fn drop_multi_cell_id(&mut self, id: &mut u16) {
        if *id > 1 {
            self.multi_cells.drop_id(*id);
        }
        *id = 0;
    }

    /// Release everything a cell references. The caller removes the cell's
    /// text, since it usually erases several cells at once.
    pub fn drop_cell(&mut self, cell: &mut Cell) {
        let was_empty = cell.is_empty();
        let mut graphics_id = cell.graphics_id;
        let mut hyperlink_id = cell.hyperlink_id;
        let mut multi_cell_id = cell.multi_cell_id;
        self.drop_graphics_id(&mut graphics_id);
        self.drop_hyperlink_id(&mut hyperlink_id);
        self.drop_multi_cell_id(&mut multi_cell_id);
        cell.graphics_id = 0;
        cell.hyperlink_id = 0;
        cell.multi_cell_id = 0;
        cell.set_text_size(0);
        cell.flags = crate::cell::CellFlags::empty();
        if !was_empty {
            cell.flags |= crate::cell::CellFlags::STALE;
            cell.set_dirty(true);
        }
    }

    pub fn graphics_ref_count(&self, id: u16) -> u32 {
        self.graphics.ref_count(id)
    }

    pub fn live_graphics_ids(&self) -> usize {
        self.graphics.len()
    }
}

/// Rows and their id maps.
#[derive(Default)]
pub struct RowGroup {
    rows: VecDeque<Row>,
    ids: IdMaps,
}

impl RowGroup {
    pub fn rows(&self) -> &VecDeque<Row> {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut VecDeque<Row> {
        &mut self.rows
    }

    pub fn ids(&self) -> &IdMaps {
        &self.ids
    }

    pub fn ids_mut(&mut self) -> &mut IdMaps {
        &mut self.ids
    }

    /// Both halves at once, for code that rewrites cells in place.
    pub fn parts_mut(&mut self) -> (&mut VecDeque<Row>, &mut IdMaps) {
        (&mut self.rows, &mut self.ids)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    /// Move `row_count` rows out of `from` (starting at `from_index`) into
    /// this group before `to_index`, re-resolving ids. With `desired_cols`
    /// the rows are truncated or padded; truncation retreats over a split
    /// multi-cell. Returns the number of cells transferred.
    pub fn transfer_from(
        &mut self,
        from: &mut RowGroup,
        from_index: usize,
        to_index: usize,
        row_count: usize,
        desired_cols: Option<u32>,
    ) -> usize {
        debug_assert!(from_index + row_count <= from.total_rows());
        debug_assert!(to_index <= self.total_rows());

        let (from_rows, from_ids) = from.parts_mut();
        let (to_rows, to_ids) = (&mut self.rows, &mut self.ids);

        let mut total_cells = 0usize;
        for i in 0..row_count {
            // Rows are removed front-to-back from the same index.
            let mut from_row = from_rows.remove(from_index).expect("row index in range");
            let cols_to_take = desired_cols
                .map(|cols| cols as usize)
                .unwrap_or(from_row.cells.len());
            total_cells += cols_to_take;

            let mut to_row = Row {
                cells: vec![Cell::default(); cols_to_take],
                text: String::new(),
                overflow: from_row.overflow,
            };

            // Avoid splitting a multi-cell at the truncation point.
            let mut from_cells_to_take = cols_to_take.min(from_row.cells.len());
            if from_cells_to_take > 0 && from_cells_to_take < from_row.cells.len() {
                let boundary_breaks = from_row.cells[from_cells_to_take - 1].is_multi_cell()
                    && from_row.cells[from_cells_to_take].is_nonprimary_in_multi_cell();
                if boundary_breaks {
                    while from_cells_to_take > 0
                        && from_row.cells[from_cells_to_take - 1].is_nonprimary_in_multi_cell()
                    {
                        from_cells_to_take -= 1;
                    }
                    if from_cells_to_take > 0 {
                        from_cells_to_take -= 1;
                    }
                }
            }

            let mut kept_text_size = 0usize;
            for (index, from_cell) in from_row.cells.iter_mut().enumerate() {
                if index < from_cells_to_take {
                    let to_cell = &mut to_row.cells[index];
                    if from_cell.graphics_id != 0 {
                        let rendition = from_ids.graphics_rendition(from_cell.graphics_id).clone();
                        to_cell.graphics_id = to_ids.maybe_allocate_graphics_id(&rendition);
                    }
                    if from_cell.hyperlink_id != 0 {
                        if let Some(hyperlink) = from_ids.hyperlink(from_cell.hyperlink_id) {
                            let hyperlink = hyperlink.clone();
                            to_cell.hyperlink_id = to_ids.maybe_allocate_hyperlink_id(&hyperlink);
                        }
                    }
                    if from_cell.multi_cell_id != 0 {
                        let info = from_ids.multi_cell_info(from_cell.multi_cell_id);
                        to_cell.multi_cell_id = to_ids.maybe_allocate_multi_cell_id(&info);
                    }
                    to_cell.flags = from_cell.flags;
                    to_cell.set_text_size(from_cell.text_size());
                    kept_text_size += usize::from(from_cell.text_size());
                }
                from_ids.drop_cell(from_cell);
            }

            // The text is moved, then truncated to the kept cells.
            to_row.text = std::mem::take(&mut from_row.text);
            to_row.text.truncate(kept_text_size);

            to_rows.insert(to_index + i, to_row);
        }

        total_cells
    }

    /// Trim trailing empty cells (keeping at least one) so scroll-back
    /// memory tracks content, not capture-time window width. Overflowed rows
    /// keep their width, which is meaningful for re-wrapping.
    pub fn strip_trailing_empty_cells(&mut self, row_index: usize) -> usize {
        let row = &mut self.rows[row_index];
        if row.overflow {
            return row.cells.len();
        }
        while row.cells.len() > 1 {
            if row.cells.last().is_some_and(Cell::is_empty) {
                row.cells.pop();
            } else {
                break;
            }
        }
        row.cells.len()
    }

    /// Total cells across all rows.
    pub fn cell_count(&self) -> usize {
        self.rows.iter().map(|row| row.cells.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendition::{Color, GraphicsRendition};

    fn red() -> GraphicsRendition {
        GraphicsRendition {
            fg: Color::Palette(1),
            ..Default::default()
        }
    }

    fn make_row(group: &mut RowGroup, text: &str) {
        let mut row = Row::with_width(8);
        let graphics_id = group.ids_mut().maybe_allocate_graphics_id(&red());
        for (i, c) in text.chars().enumerate() {
            let cell = &mut row.cells[i];
            cell.graphics_id = group.ids_mut().use_graphics_id(graphics_id);
            cell.set_text_size(c.len_utf8() as u16);
            row.text.push(c);
        }
        // Release the temporary reference used for allocation.
        let mut id = graphics_id;
        group.ids_mut().drop_graphics_id(&mut id);
        group.rows_mut().push_back(row);
    }

    #[test]
    fn transfer_re_resolves_ids_and_moves_text() {
        let mut from = RowGroup::default();
        make_row(&mut from, "hi");
        let mut to = RowGroup::default();

        let cells = to.transfer_from(&mut from, 0, 0, 1, None);
        assert_eq!(cells, 8);
        assert_eq!(from.total_rows(), 0);
        assert_eq!(to.total_rows(), 1);
        assert_eq!(to.rows()[0].text, "hi");
        assert_eq!(from.ids().live_graphics_ids(), 0);

        let id = to.rows()[0].cells[0].graphics_id;
        assert_ne!(id, 0);
        assert_eq!(to.ids().graphics_rendition(id), &red());
        assert_eq!(to.ids().graphics_ref_count(id), 2);
    }

    #[test]
    fn transfer_truncates_to_desired_cols() {
        let mut from = RowGroup::default();
        make_row(&mut from, "abcdefgh");
        let mut to = RowGroup::default();

        to.transfer_from(&mut from, 0, 0, 1, Some(3));
        assert_eq!(to.rows()[0].cells.len(), 3);
        assert_eq!(to.rows()[0].text, "abc");
    }

    #[test]
    fn strip_trailing_empty_cells_keeps_one() {
        let mut group = RowGroup::default();
        make_row(&mut group, "x");
        assert_eq!(group.strip_trailing_empty_cells(0), 1);

        let mut group = RowGroup::default();
        make_row(&mut group, "");
        assert_eq!(group.strip_trailing_empty_cells(0), 1);

        // Overflowed rows keep their full width.
        let mut group = RowGroup::default();
        make_row(&mut group, "y");
        group.rows_mut()[0].overflow = true;
        assert_eq!(group.strip_trailing_empty_cells(0), 8);
    }
}
