//! The visible grid.
//!
//! The screen owns the active row group, the scroll-back, the cursor, the
//! scroll region, and the selection. Rows are materialized lazily: a fresh
//! screen holds no rows until something writes to them, and rows may hold
//! fewer cells than the width until touched.
//!
//! Coordinates: `row`/`col` are 0-based screen positions. "Absolute" rows
//! number every row ever retained, starting at the oldest scroll-back row;
//! they are what selections and the visual scroll offset are expressed in.

use core_events::Size;
use core_text::egc_width;

use crate::cell::{Cell, CellFlags, Hyperlink, MultiCellInfo, MAX_TEXT_SIZE};
use crate::cursor::{Cursor, SavedCursor};
use crate::rendition::GraphicsRendition;
use crate::row::Row;
use crate::row_group::{IdMaps, RowGroup};
use crate::scroll_back::ScrollBack;
use crate::selection::{Selection, SelectionPoint};

const ZWJ: char = '\u{200D}';

/// DEC mode 7.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AutoWrapMode {
    Disabled,
    #[default]
    Enabled,
}

/// DEC mode 6. When enabled the cursor is confined to the scroll region and
/// absolute positions are relative to its top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OriginMode {
    #[default]
    Disabled,
    Enabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBackEnabled {
    No,
    Yes,
}

/// Vertical scroll region; `end_row` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollRegion {
    pub start_row: u32,
    pub end_row: u32,
}

impl ScrollRegion {
    pub fn new(start_row: u32, end_row: u32) -> Self {
        Self { start_row, end_row }
    }

    pub fn contains(&self, row: u32) -> bool {
        row >= self.start_row && row < self.end_row
    }
}

pub struct Screen {
    active: RowGroup,
    scroll_back: ScrollBack,
    scroll_back_enabled: bool,

    cursor: Cursor,
    origin_mode: OriginMode,
    graphics_id: u16,
    hyperlink_id: u16,

    selection: Option<Selection>,
    visual_scroll_offset: u64,

    size: Size,
    scroll_region: ScrollRegion,
    whole_screen_dirty: bool,
}

impl Screen {
    pub fn new(size: Size, scroll_back_enabled: ScrollBackEnabled) -> Self {
        Self::with_scroll_back_cap(size, scroll_back_enabled, crate::scroll_back::DEFAULT_MAX_CELLS)
    }

    /// A screen whose scroll-back keeps at most `max_cells` cells.
    pub fn with_scroll_back_cap(
        size: Size,
        scroll_back_enabled: ScrollBackEnabled,
        max_cells: usize,
    ) -> Self {
        debug_assert!(size.rows > 0 && size.cols > 0);
        Self {
            active: RowGroup::default(),
            scroll_back: ScrollBack::with_max_cells(max_cells),
            scroll_back_enabled: scroll_back_enabled == ScrollBackEnabled::Yes,
            cursor: Cursor::default(),
            origin_mode: OriginMode::default(),
            graphics_id: 0,
            hyperlink_id: 0,
            selection: None,
            visual_scroll_offset: 0,
            size,
            scroll_region: ScrollRegion::new(0, size.rows),
            whole_screen_dirty: true,
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn max_width(&self) -> u32 {
        self.size.cols
    }

    pub fn max_height(&self) -> u32 {
        self.size.rows
    }

    pub fn scroll_region(&self) -> ScrollRegion {
        self.scroll_region
    }

    pub fn set_scroll_region(&mut self, region: ScrollRegion) {
        let end = region.end_row.min(self.size.rows);
        let start = region.start_row.min(end.saturating_sub(1));
        self.scroll_region = ScrollRegion::new(start, end);
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn origin_mode(&self) -> OriginMode {
        self.origin_mode
    }

    pub fn set_origin_mode(&mut self, mode: OriginMode) {
        self.origin_mode = mode;
        // Entering or leaving origin mode homes the cursor.
        self.set_cursor_relative(0, 0);
    }

    pub fn ids(&self) -> &IdMaps {
        self.active.ids()
    }

    // -- Current attributes ---------------------------------------------

    pub fn current_graphics_rendition(&self) -> GraphicsRendition {
        self.active.ids().graphics_rendition(self.graphics_id).clone()
    }

    pub fn set_current_graphics_rendition(&mut self, rendition: &GraphicsRendition) {
        let ids = self.active.ids_mut();
        let new_id = ids.maybe_allocate_graphics_id(rendition);
        let mut old = self.graphics_id;
        ids.drop_graphics_id(&mut old);
        self.graphics_id = new_id;
    }

    pub fn current_hyperlink(&self) -> Option<&Hyperlink> {
        self.active.ids().hyperlink(self.hyperlink_id)
    }

    pub fn set_current_hyperlink(&mut self, hyperlink: Option<&Hyperlink>) {
        let ids = self.active.ids_mut();
        let new_id = match hyperlink {
            Some(hyperlink) => ids.maybe_allocate_hyperlink_id(hyperlink),
            None => 0,
        };
        let mut old = self.hyperlink_id;
        ids.drop_hyperlink_id(&mut old);
        self.hyperlink_id = new_id;
    }

    // -- Cursor movement ------------------------------------------------

    fn min_row(&self) -> u32 {
        match self.origin_mode {
            OriginMode::Enabled => self.scroll_region.start_row,
            OriginMode::Disabled => 0,
        }
    }

    fn max_row_exclusive(&self) -> u32 {
        match self.origin_mode {
            OriginMode::Enabled => self.scroll_region.end_row,
            OriginMode::Disabled => self.size.rows,
        }
    }

    /// Move the cursor to an absolute screen position, clamped to the
    /// origin-mode bounds. Always clears the pending-wrap flag.
    pub fn set_cursor(&mut self, row: u32, col: u32) {
        self.cursor.overflow_pending = false;
        let row = row.clamp(self.min_row(), self.max_row_exclusive().saturating_sub(1));
        let col = col.min(self.size.cols - 1);

        if self.cursor.row == row {
            self.set_cursor_col(col);
            return;
        }
        self.cursor.row = row;
        self.cursor.col = col;
        self.sync_cursor_text_offset();
    }

    /// Position relative to the origin (the scroll region's top-left when
    /// origin mode is on).
    pub fn set_cursor_relative(&mut self, row: u32, col: u32) {
        self.set_cursor(row.saturating_add(self.min_row()), col);
    }

    pub fn set_cursor_row(&mut self, row: u32) {
        self.set_cursor(row, self.cursor.col);
    }

    pub fn set_cursor_row_relative(&mut self, row: u32) {
        self.set_cursor_relative(row, self.cursor.col);
    }

    /// Column moves adjust the cached text offset incrementally by walking
    /// only the cells between the old and new columns.
    pub fn set_cursor_col(&mut self, col: u32) {
        self.cursor.overflow_pending = false;
        let col = col.min(self.size.cols - 1);
        if self.cursor.col == col {
            return;
        }
        if col == 0 {
            self.cursor.col = 0;
            self.cursor.text_offset = 0;
            return;
        }
        if self.cursor.row as usize >= self.active.total_rows() {
            self.cursor.col = col;
            self.cursor.text_offset = 0;
            return;
        }

        let row = &self.active.rows()[self.cursor.row as usize];
        let (old, new) = (self.cursor.col as usize, col as usize);
        if old < new {
            for cell in row.cells.iter().skip(old).take(new - old) {
                self.cursor.text_offset += usize::from(cell.text_size());
            }
        } else {
            for cell in row.cells.iter().skip(new).take(old - new) {
                self.cursor.text_offset -= usize::from(cell.text_size());
            }
        }
        self.cursor.col = col;
    }

    fn sync_cursor_text_offset(&mut self) {
        if self.cursor.row as usize >= self.active.total_rows() {
            self.cursor.text_offset = 0;
            return;
        }
        let row = &self.active.rows()[self.cursor.row as usize];
        self.cursor.text_offset = row.text_offset_of_col(self.cursor.col as usize);
    }

    pub fn save_cursor(&self) -> SavedCursor {
        SavedCursor {
            row: self.cursor.row,
            col: self.cursor.col,
            overflow_pending: self.cursor.overflow_pending,
            graphics_rendition: self.current_graphics_rendition(),
            origin_mode: self.origin_mode,
        }
    }

    pub fn restore_cursor(&mut self, saved: &SavedCursor) {
        self.origin_mode = saved.origin_mode;
        self.set_cursor(saved.row, saved.col);
        self.cursor.overflow_pending = saved.overflow_pending;
        let rendition = saved.graphics_rendition.clone();
        self.set_current_graphics_rendition(&rendition);
    }

    // -- Row access ------------------------------------------------------

    fn ensure_rows(&mut self, count: u32) {
        let width = self.size.cols as usize;
        let rows = self.active.rows_mut();
        while rows.len() < count as usize {
            rows.push_back(Row::with_width(width));
        }
        for row in rows.iter_mut().take(count as usize) {
            if row.cells.len() < width {
                row.cells.resize(width, Cell::default());
            }
        }
    }

    fn row_mut(&mut self, row: u32) -> &mut Row {
        debug_assert!(row < self.size.rows);
        self.ensure_rows(row + 1);
        &mut self.active.rows_mut()[row as usize]
    }

    /// The visible row at screen position `row`, if it was ever written.
    pub fn row(&self, row: u32) -> Option<&Row> {
        self.active.rows().get(row as usize)
    }

    // -- Absolute row accounting ----------------------------------------

    pub fn absolute_row_start(&self) -> u64 {
        self.scroll_back.absolute_row_start()
    }

    /// Absolute row of the first on-screen row.
    pub fn absolute_row_screen_start(&self) -> u64 {
        self.scroll_back.absolute_row_end()
    }

    pub fn absolute_row_end(&self) -> u64 {
        self.absolute_row_screen_start() + u64::from(self.size.rows)
    }

    /// Find a row by absolute number, in scroll-back or on screen.
    pub fn find_row(&self, absolute_row: u64) -> Option<(&Row, &IdMaps)> {
        if absolute_row < self.absolute_row_screen_start() {
            let (index, group) = self.scroll_back.find_row(absolute_row)?;
            return Some((&group.rows()[index], group.ids()));
        }
        let index = (absolute_row - self.absolute_row_screen_start()) as usize;
        self.active
            .rows()
            .get(index)
            .map(|row| (row, self.active.ids()))
    }

    /// The row shown at window line `r`, honoring the visual scroll offset.
    pub fn visible_row(&self, r: u32) -> Option<(&Row, &IdMaps)> {
        self.find_row(self.visual_scroll_offset() + u64::from(r))
    }

    pub fn scroll_back_rows(&self) -> usize {
        self.scroll_back.total_rows()
    }

    pub fn scroll_back_cells(&self) -> usize {
        self.scroll_back.total_cells()
    }

    pub fn clear_scroll_back(&mut self) {
        self.scroll_back.clear();
        self.clamp_visual_scroll();
        self.clamp_selection();
    }

    // -- Visual scrolling -------------------------------------------------

    /// Absolute row currently shown at the top of the window.
    pub fn visual_scroll_offset(&self) -> u64 {
        self.visual_scroll_offset.max(self.absolute_row_start())
    }

    pub fn visual_scroll_at_bottom(&self) -> bool {
        self.visual_scroll_offset() >= self.absolute_row_screen_start()
    }

    pub fn visual_scroll_up(&mut self, amount: u64) {
        let current = self.visual_scroll_offset();
        self.visual_scroll_offset = current
            .saturating_sub(amount)
            .max(self.absolute_row_start());
        self.whole_screen_dirty = true;
    }

    pub fn visual_scroll_down(&mut self, amount: u64) {
        let current = self.visual_scroll_offset();
        self.visual_scroll_offset = (current + amount).min(self.absolute_row_screen_start());
        self.whole_screen_dirty = true;
    }

    pub fn visual_scroll_to_bottom(&mut self) {
        if !self.visual_scroll_at_bottom() {
            self.whole_screen_dirty = true;
        }
        self.visual_scroll_offset = self.absolute_row_screen_start();
    }

    fn clamp_visual_scroll(&mut self) {
        self.visual_scroll_offset = self
            .visual_scroll_offset
            .clamp(self.absolute_row_start(), self.absolute_row_screen_start());
    }

    // -- Writing text ----------------------------------------------------

    /// Write one code point at the cursor. The hottest path in the program.
    pub fn put_code_point(&mut self, cp: char, auto_wrap: AutoWrapMode) {
        self.visual_scroll_to_bottom();

        let mut buffer = [0u8; 4];
        let text = cp.encode_utf8(&mut buffer);
        let width = u32::from(egc_width(text));

        // Zero-width scalars join the preceding cell's grapheme cluster, as
        // does anything following a zero-width joiner.
        if width == 0 {
            self.attach_to_previous_cell(text);
            return;
        }
        if self.previous_cell_ends_with_zwj() {
            self.attach_to_previous_cell(text);
            return;
        }

        self.put_single_cell(text, width.min(2), None, auto_wrap);
    }

    /// Write explicitly sized text (OSC 66). `info.width == 0` infers the
    /// width from the text.
    pub fn put_sized_text(&mut self, mut info: MultiCellInfo, text: &str, auto_wrap: AutoWrapMode) {
        self.visual_scroll_to_bottom();
        if info.width == 0 {
            info.width = core_text::text_width(text).clamp(1, 7) as u8;
        }
        let width = u32::from(info.compute_width()).min(self.size.cols);
        let multi_cell = if info == MultiCellInfo::NARROW {
            None
        } else {
            Some(info)
        };
        self.put_single_cell(text, width.max(1), multi_cell, auto_wrap);
    }

    fn previous_cell_ends_with_zwj(&self) -> bool {
        let Some(row) = self.active.rows().get(self.cursor.row as usize) else {
            return false;
        };
        let target = if self.cursor.overflow_pending {
            self.cursor.col as usize
        } else if self.cursor.col > 0 {
            self.cursor.col as usize - 1
        } else {
            return false;
        };
        if target >= row.cells.len() {
            return false;
        }
        row.cell_text(target).ends_with(ZWJ)
    }

    /// Append text to the cell the cursor last wrote (combining marks).
    fn attach_to_previous_cell(&mut self, text: &str) {
        let (row_index, mut col) = if self.cursor.overflow_pending {
            (self.cursor.row, self.cursor.col)
        } else if self.cursor.col > 0 {
            (self.cursor.row, self.cursor.col - 1)
        } else {
            // Nothing before the home position to attach to.
            return;
        };

        self.ensure_rows(row_index + 1);
        let row = &mut self.active.rows_mut()[row_index as usize];
        // Walk left over continuation cells of a wide character.
        while col > 0 && row.cells[col as usize].is_nonprimary_in_multi_cell() {
            col -= 1;
        }
        let offset_end = row.text_offset_of_col(col as usize)
            + usize::from(row.cells[col as usize].text_size());
        let new_size = usize::from(row.cells[col as usize].text_size()) + text.len();
        if new_size > usize::from(MAX_TEXT_SIZE) {
            return;
        }
        row.text.insert_str(offset_end, text);
        row.cells[col as usize].set_text_size(new_size as u16);
        row.cells[col as usize].set_dirty(true);
        self.sync_cursor_text_offset();
    }

    fn put_single_cell(
        &mut self,
        text: &str,
        width: u32,
        multi_cell: Option<MultiCellInfo>,
        auto_wrap: AutoWrapMode,
    ) {
        if text.len() > usize::from(MAX_TEXT_SIZE) / 2 {
            return;
        }

        // Deferred wrap from the previous write.
        if self.cursor.overflow_pending {
            match auto_wrap {
                AutoWrapMode::Enabled => {
                    self.row_mut(self.cursor.row).overflow = true;
                    self.advance_row_for_wrap();
                }
                AutoWrapMode::Disabled => {
                    self.cursor.overflow_pending = false;
                }
            }
        }

        // A wide cell that no longer fits wraps (or is dropped).
        if self.cursor.col + width > self.size.cols {
            match auto_wrap {
                AutoWrapMode::Enabled => {
                    self.row_mut(self.cursor.row).overflow = true;
                    self.advance_row_for_wrap();
                }
                AutoWrapMode::Disabled => return,
            }
            if self.cursor.col + width > self.size.cols {
                return;
            }
        }

        let graphics_id = self.graphics_id;
        let hyperlink_id = self.hyperlink_id;
        let cursor_col = self.cursor.col as usize;
        let cursor_row = self.cursor.row;
        let text_offset = self.cursor.text_offset;

        self.ensure_rows(cursor_row + 1);
        let (rows, ids) = self.active.parts_mut();
        let row = &mut rows[cursor_row as usize];

        // Release everything currently under the new cell and remove the old
        // text in one splice.
        let covered = (cursor_col..cursor_col + width as usize).collect::<Vec<_>>();
        let mut old_text_size = 0usize;
        for &col in &covered {
            old_text_size += usize::from(row.cells[col].text_size());
            ids.drop_cell(&mut row.cells[col]);
        }
        row.text
            .replace_range(text_offset..text_offset + old_text_size, "");

        // Write the primary cell.
        let multi_cell_id = match multi_cell {
            Some(info) => ids.maybe_allocate_multi_cell_id(&info),
            None if width == 2 => 1,
            None => 0,
        };
        row.text.insert_str(text_offset, text);
        let primary = &mut row.cells[cursor_col];
        primary.graphics_id = ids.use_graphics_id(graphics_id);
        primary.hyperlink_id = ids.use_hyperlink_id(hyperlink_id);
        primary.multi_cell_id = multi_cell_id;
        primary.set_text_size(text.len() as u16);
        primary.set_dirty(true);
        if multi_cell_id != 0 {
            primary.flags |= CellFlags::LEFT_BOUNDARY | CellFlags::TOP_BOUNDARY;
        }

        // Continuation cells reference the same attributes but no text.
        for &col in covered.iter().skip(1) {
            let cell = &mut row.cells[col];
            cell.graphics_id = ids.use_graphics_id(graphics_id);
            cell.hyperlink_id = ids.use_hyperlink_id(hyperlink_id);
            cell.multi_cell_id = ids.use_multi_cell_id(multi_cell_id);
            cell.set_text_size(0);
            cell.set_dirty(true);
        }

        #[cfg(debug_assertions)]
        row.assert_text_invariant();

        // Advance; reaching the right edge arms the deferred wrap instead of
        // wrapping eagerly.
        if self.cursor.col + width < self.size.cols {
            self.cursor.col += width;
            self.cursor.text_offset = text_offset + text.len();
        } else {
            self.cursor.col = self.size.cols - 1;
            self.cursor.overflow_pending = true;
            self.sync_cursor_text_offset();
        }
    }

    /// Cursor motion part of an auto-wrap: down one row, scrolling the
    /// region if the cursor sits on its last row, then to column zero.
    fn advance_row_for_wrap(&mut self) {
        if self.cursor.row + 1 == self.scroll_region.end_row {
            self.scroll_down();
        } else if self.cursor.row + 1 < self.size.rows {
            self.cursor.row += 1;
        }
        self.cursor.col = 0;
        self.cursor.text_offset = 0;
        self.cursor.overflow_pending = false;
    }

    // -- Scrolling -------------------------------------------------------

    /// Scroll the region's content up one row (the viewport "moves down").
    /// The top row migrates to scroll-back when the region spans the whole
    /// screen and scroll-back is on.
    pub fn scroll_down(&mut self) {
        let region = self.scroll_region;
        self.ensure_rows(region.end_row);

        let whole_screen = region.start_row == 0 && region.end_row == self.size.rows;
        if whole_screen && self.scroll_back_enabled {
            let follow = self.visual_scroll_at_bottom();
            self.active.strip_trailing_empty_cells(0);
            let mut detached = RowGroup::default();
            // Move row 0 out, re-homing its ids in a scratch group first is
            // unnecessary: scroll-back takes it directly.
            std::mem::swap(&mut detached, &mut self.active);
            self.scroll_back.add_rows(&mut detached, 0, 1);
            std::mem::swap(&mut detached, &mut self.active);
            self.active
                .rows_mut()
                .push_back(Row::with_width(self.size.cols as usize));
            if follow {
                self.visual_scroll_offset = self.absolute_row_screen_start();
            }
        } else {
            let (rows, ids) = self.active.parts_mut();
            let mut removed = rows.remove(region.start_row as usize).expect("row exists");
            drop_row(ids, &mut removed);
            removed.cells.resize(self.size.cols as usize, Cell::default());
            rows.insert(region.end_row as usize - 1, removed);
        }

        self.whole_screen_dirty = true;
        self.sync_cursor_text_offset();
        self.clamp_selection();
    }

    /// Scroll the region's content down one row (blank row appears on top).
    pub fn scroll_up(&mut self) {
        let region = self.scroll_region;
        self.ensure_rows(region.end_row);
        let (rows, ids) = self.active.parts_mut();
        let mut removed = rows.remove(region.end_row as usize - 1).expect("row exists");
        drop_row(ids, &mut removed);
        removed.cells.resize(self.size.cols as usize, Cell::default());
        rows.insert(region.start_row as usize, removed);

        self.whole_screen_dirty = true;
        self.sync_cursor_text_offset();
    }

    /// Insert blank lines at the cursor, pushing rows out of the bottom of
    /// the region. Outside the region this is a no-op.
    pub fn insert_blank_lines(&mut self, count: u32) {
        let region = self.scroll_region;
        if !region.contains(self.cursor.row) {
            return;
        }
        let count = count.max(1).min(region.end_row - self.cursor.row);
        self.ensure_rows(region.end_row);
        let (rows, ids) = self.active.parts_mut();
        for _ in 0..count {
            let mut removed = rows.remove(region.end_row as usize - 1).expect("row exists");
            drop_row(ids, &mut removed);
            removed.cells.resize(self.size.cols as usize, Cell::default());
            rows.insert(self.cursor.row as usize, removed);
        }
        self.whole_screen_dirty = true;
        self.set_cursor_col(0);
        self.sync_cursor_text_offset();
    }

    /// Delete lines at the cursor, pulling blank rows in from the bottom of
    /// the region.
    pub fn delete_lines(&mut self, count: u32) {
        let region = self.scroll_region;
        if !region.contains(self.cursor.row) {
            return;
        }
        let count = count.max(1).min(region.end_row - self.cursor.row);
        self.ensure_rows(region.end_row);
        let (rows, ids) = self.active.parts_mut();
        for _ in 0..count {
            let mut removed = rows.remove(self.cursor.row as usize).expect("row exists");
            drop_row(ids, &mut removed);
            removed.cells.resize(self.size.cols as usize, Cell::default());
            rows.insert(region.end_row as usize - 1, removed);
        }
        self.whole_screen_dirty = true;
        self.set_cursor_col(0);
        self.sync_cursor_text_offset();
    }

    // -- Cell-level editing ----------------------------------------------

    /// Remove the cells' attributes and text in `[start_col, end_col)`.
    fn erase_cells(&mut self, row_index: u32, start_col: u32, end_col: u32) {
        let end_col = end_col.min(self.size.cols);
        if start_col >= end_col || row_index as usize >= self.active.total_rows() {
            return;
        }
        self.ensure_rows(row_index + 1);
        let (rows, ids) = self.active.parts_mut();
        let row = &mut rows[row_index as usize];

        let offset_start = row.text_offset_of_col(start_col as usize);
        let mut erased = 0usize;
        for col in start_col..end_col {
            let cell = &mut row.cells[col as usize];
            erased += usize::from(cell.text_size());
            ids.drop_cell(cell);
        }
        row.text.replace_range(offset_start..offset_start + erased, "");

        #[cfg(debug_assertions)]
        row.assert_text_invariant();

        self.sync_cursor_text_offset();
    }

    pub fn clear(&mut self) {
        for index in 0..self.active.total_rows() as u32 {
            self.erase_cells(index, 0, self.size.cols);
            self.active.rows_mut()[index as usize].overflow = false;
        }
        self.whole_screen_dirty = true;
    }

    pub fn clear_after_cursor(&mut self) {
        self.clear_row_after_cursor();
        for index in self.cursor.row + 1..self.active.total_rows() as u32 {
            self.erase_cells(index, 0, self.size.cols);
            self.active.rows_mut()[index as usize].overflow = false;
        }
        self.whole_screen_dirty = true;
    }

    pub fn clear_before_cursor(&mut self) {
        for index in 0..self.cursor.row.min(self.active.total_rows() as u32) {
            self.erase_cells(index, 0, self.size.cols);
            self.active.rows_mut()[index as usize].overflow = false;
        }
        self.clear_row_before_cursor();
        self.whole_screen_dirty = true;
    }

    pub fn clear_row(&mut self) {
        self.erase_cells(self.cursor.row, 0, self.size.cols);
    }

    pub fn clear_row_after_cursor(&mut self) {
        self.erase_cells(self.cursor.row, self.cursor.col, self.size.cols);
    }

    pub fn clear_row_before_cursor(&mut self) {
        self.erase_cells(self.cursor.row, 0, self.cursor.col + 1);
    }

    /// ECH: blank `count` cells in place, no shifting.
    pub fn erase_characters(&mut self, count: u32) {
        let count = count.max(1);
        self.erase_cells(self.cursor.row, self.cursor.col, self.cursor.col + count);
    }

    /// ICH: shift cells right from the cursor, dropping what falls off.
    pub fn insert_blank_characters(&mut self, count: u32) {
        let count = count.max(1).min(self.size.cols - self.cursor.col);
        self.ensure_rows(self.cursor.row + 1);
        // Drop the cells pushed off the right edge first.
        let width = self.size.cols;
        self.erase_cells(self.cursor.row, width - count, width);

        let cursor_col = self.cursor.col as usize;
        let row = &mut self.active.rows_mut()[self.cursor.row as usize];
        for _ in 0..count {
            row.cells.pop();
            row.cells.insert(cursor_col, Cell::default());
        }
        for cell in row.cells.iter_mut().skip(cursor_col) {
            cell.set_dirty(true);
        }

        #[cfg(debug_assertions)]
        row.assert_text_invariant();

        self.sync_cursor_text_offset();
    }

    /// DCH: delete cells at the cursor, pulling blanks in from the right.
    pub fn delete_characters(&mut self, count: u32) {
        let count = count.max(1).min(self.size.cols - self.cursor.col);
        self.ensure_rows(self.cursor.row + 1);
        self.erase_cells(self.cursor.row, self.cursor.col, self.cursor.col + count);

        let cursor_col = self.cursor.col as usize;
        let row = &mut self.active.rows_mut()[self.cursor.row as usize];
        for _ in 0..count {
            row.cells.remove(cursor_col);
            row.cells.push(Cell::default());
        }
        for cell in row.cells.iter_mut().skip(cursor_col) {
            cell.set_dirty(true);
        }

        #[cfg(debug_assertions)]
        row.assert_text_invariant();

        self.sync_cursor_text_offset();
    }

    // -- Selection --------------------------------------------------------

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn clear_selection(&mut self) {
        if self.selection.take().is_some() {
            self.whole_screen_dirty = true;
        }
    }

    pub fn begin_selection(&mut self, point: SelectionPoint) {
        self.selection = Some(Selection::new(point, point));
        self.whole_screen_dirty = true;
    }

    pub fn update_selection(&mut self, point: SelectionPoint) {
        if let Some(selection) = &mut self.selection {
            selection.end = point;
            self.whole_screen_dirty = true;
        }
    }

    pub fn in_selection(&self, point: SelectionPoint) -> bool {
        self.selection
            .is_some_and(|selection| selection.contains(point))
    }

    /// The selected text, rows joined by newlines except across soft-wrapped
    /// rows, trailing blanks stripped per row.
    pub fn selected_text(&self) -> String {
        let Some(selection) = self.selection.map(|selection| selection.normalized()) else {
            return String::new();
        };

        let mut result = String::new();
        for absolute_row in selection.start.row..=selection.end.row {
            let Some((row, _)) = self.find_row(absolute_row) else {
                continue;
            };
            let start_col = if absolute_row == selection.start.row {
                selection.start.col as usize
            } else {
                0
            };
            let end_col = if absolute_row == selection.end.row {
                (selection.end.col as usize + 1).min(row.cells.len())
            } else {
                row.cells.len()
            };

            // Trailing blank cells are noise; keep interior blanks.
            let mut last_content = start_col;
            for col in start_col..end_col {
                if !row.cells[col].is_empty() {
                    last_content = col + 1;
                }
            }
            for col in start_col..last_content {
                let text = row.cell_text(col);
                if text.is_empty() && !row.cells[col].is_nonprimary_in_multi_cell() {
                    result.push(' ');
                } else {
                    result.push_str(text);
                }
            }
            if absolute_row != selection.end.row && !row.overflow {
                result.push('\n');
            }
        }
        result
    }

    fn clamp_selection(&mut self) {
        let start = self.absolute_row_start();
        if let Some(selection) = &mut self.selection {
            if selection.normalized().end.row < start {
                self.selection = None;
                return;
            }
            selection.start.row = selection.start.row.max(start);
            selection.end.row = selection.end.row.max(start);
        }
    }

    // -- Damage tracking --------------------------------------------------

    pub fn invalidate_all(&mut self) {
        self.whole_screen_dirty = true;
    }

    pub fn whole_screen_dirty(&self) -> bool {
        self.whole_screen_dirty
    }

    /// Clear all damage state after a frame was drawn.
    pub fn clear_damage(&mut self) {
        self.whole_screen_dirty = false;
        for row in self.active.rows_mut().iter_mut() {
            for cell in &mut row.cells {
                cell.set_dirty(false);
                cell.flags.remove(CellFlags::STALE);
            }
        }
    }

    // -- Resize -----------------------------------------------------------

    pub fn resize(&mut self, size: Size) {
        debug_assert!(size.rows > 0 && size.cols > 0);
        if size == self.size {
            return;
        }

        // Width first: truncate or extend every active row.
        if size.cols != self.size.cols {
            let width = size.cols as usize;
            let (rows, ids) = self.active.parts_mut();
            for row in rows.iter_mut() {
                if row.cells.len() > width {
                    // Never leave a dangling multi-cell tail at the edge.
                    let mut keep = width;
                    while keep > 0 && row.cells[keep - 1].is_nonprimary_in_multi_cell() {
                        keep -= 1;
                    }
                    if keep > 0 && row.cells[keep - 1].is_multi_cell() && keep < row.cells.len() {
                        // Primary whose continuation was cut.
                        if row.cells[keep].is_nonprimary_in_multi_cell() {
                            keep -= 1;
                        }
                    }
                    let kept_text: usize = row
                        .cells
                        .iter()
                        .take(keep)
                        .map(|cell| usize::from(cell.text_size()))
                        .sum();
                    for cell in row.cells.iter_mut().skip(keep) {
                        ids.drop_cell(cell);
                    }
                    row.cells.truncate(width);
                    for cell in row.cells.iter_mut().skip(keep) {
                        *cell = Cell::default();
                    }
                    row.text.truncate(kept_text);
                    row.overflow = false;
                } else {
                    row.cells.resize(width, Cell::default());
                }
            }
        }

        // Height: shed empty bottom rows, spill the rest to scroll-back, or
        // pull history back in when growing.
        let new_height = size.rows;
        while self.active.total_rows() > new_height as usize {
            let last_is_blank = self
                .active
                .rows()
                .back()
                .is_some_and(|row| row.cells.iter().all(Cell::is_empty))
                && (self.cursor.row as usize) < self.active.total_rows() - 1;
            if last_is_blank {
                let (rows, ids) = self.active.parts_mut();
                let mut removed = rows.pop_back().expect("row exists");
                drop_row(ids, &mut removed);
            } else if self.scroll_back_enabled {
                self.active.strip_trailing_empty_cells(0);
                let mut detached = RowGroup::default();
                std::mem::swap(&mut detached, &mut self.active);
                self.scroll_back.add_rows(&mut detached, 0, 1);
                std::mem::swap(&mut detached, &mut self.active);
                self.cursor.row = self.cursor.row.saturating_sub(1);
            } else {
                let (rows, ids) = self.active.parts_mut();
                let mut removed = rows.pop_front().expect("row exists");
                drop_row(ids, &mut removed);
                self.cursor.row = self.cursor.row.saturating_sub(1);
            }
        }
        if new_height > self.size.rows && self.scroll_back_enabled {
            let available = new_height as usize - self.active.total_rows();
            let take = available.min(self.scroll_back.total_rows());
            if take > 0 {
                self.scroll_back.take_rows(&mut self.active, size.cols, 0, take);
                self.cursor.row += take as u32;
            }
        }

        self.size = size;
        self.scroll_region = ScrollRegion::new(0, size.rows);
        self.cursor.row = self.cursor.row.min(size.rows - 1);
        self.cursor.col = self.cursor.col.min(size.cols - 1);
        self.cursor.overflow_pending = false;
        self.sync_cursor_text_offset();
        self.clamp_visual_scroll();
        self.clamp_selection();
        self.whole_screen_dirty = true;
    }

    // -- Serialization ----------------------------------------------------

    /// Replay the visible grid as escape sequences: enough to reconstruct
    /// the cell contents, the current rendition, and the cursor position.
    pub fn state_as_escape_sequences(&self) -> String {
        let mut out = String::new();
        out.push_str("\x1b[2J\x1b[H");
        let mut last_rendition = GraphicsRendition::default();
        for (index, row) in self.active.rows().iter().enumerate() {
            out.push_str(&format!("\x1b[{};1H", index + 1));
            for (col, cell) in row.cells.iter().enumerate() {
                let rendition = self.active.ids().graphics_rendition(cell.graphics_id);
                if *rendition != last_rendition {
                    out.push_str(&format!("\x1b[{}m", rendition.as_csi_params()));
                    last_rendition = rendition.clone();
                }
                if cell.is_nonprimary_in_multi_cell() {
                    continue;
                }
                let text = row.cell_text(col);
                if text.is_empty() {
                    out.push(' ');
                } else {
                    out.push_str(text);
                }
            }
        }
        out.push_str(&format!("\x1b[{}m", self.current_graphics_rendition().as_csi_params()));
        out.push_str(&format!(
            "\x1b[{};{}H",
            self.cursor.row + 1,
            self.cursor.col + 1
        ));
        out
    }

    /// Invariant check used by tests: every live id's reference count equals
    /// the number of cells referencing it, plus one for the current
    /// attribute holders.
    #[doc(hidden)]
    pub fn check_graphics_ref_counts(&self) -> bool {
        use std::collections::HashMap;
        let mut counts: HashMap<u16, u32> = HashMap::new();
        for row in self.active.rows() {
            for cell in &row.cells {
                if cell.graphics_id != 0 {
                    *counts.entry(cell.graphics_id).or_default() += 1;
                }
            }
        }
        if self.graphics_id != 0 {
            *counts.entry(self.graphics_id).or_default() += 1;
        }
        counts
            .iter()
            .all(|(id, count)| self.active.ids().graphics_ref_count(*id) == *count)
            && self.active.ids().live_graphics_ids() == counts.len()
    }
}

fn drop_row(ids: &mut IdMaps, row: &mut Row) {
    for cell in &mut row.cells {
        ids.drop_cell(cell);
    }
    row.text.clear();
    row.overflow = false;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn screen(rows: u32, cols: u32) -> Screen {
        Screen::new(Size::new(rows, cols), ScrollBackEnabled::Yes)
    }

    fn write(screen: &mut Screen, text: &str) {
        for cp in text.chars() {
            screen.put_code_point(cp, AutoWrapMode::Enabled);
        }
    }

    fn row_text(screen: &Screen, row: u32) -> String {
        let Some(row) = screen.row(row) else {
            return String::new();
        };
        row.text.clone()
    }

    #[test]
    fn basic_wrap() {
        let mut screen = screen(2, 5);
        write(&mut screen, "HELLOWORLD");

        assert_eq!(row_text(&screen, 0), "HELLO");
        assert!(screen.row(0).unwrap().overflow);
        assert_eq!(row_text(&screen, 1), "WORLD");
        let cursor = screen.cursor();
        assert_eq!((cursor.row, cursor.col), (1, 4));
        assert!(cursor.overflow_pending);
    }

    #[test]
    fn text_offset_tracks_cursor() {
        let mut screen = screen(3, 10);
        write(&mut screen, "abc");
        assert_eq!(screen.cursor().text_offset, 3);
        screen.set_cursor_col(1);
        assert_eq!(screen.cursor().text_offset, 1);
        screen.set_cursor_col(7);
        assert_eq!(screen.cursor().text_offset, 3);
        screen.set_cursor_col(0);
        assert_eq!(screen.cursor().text_offset, 0);
    }

    #[test]
    fn overwrite_replaces_text() {
        let mut screen = screen(2, 10);
        write(&mut screen, "abc");
        screen.set_cursor(0, 1);
        write(&mut screen, "X");
        assert_eq!(row_text(&screen, 0), "aXc");
        assert!(screen.check_graphics_ref_counts());
    }

    #[test]
    fn wide_character_occupies_two_cells() {
        let mut screen = screen(2, 10);
        write(&mut screen, "a日b");
        let row = screen.row(0).unwrap();
        assert_eq!(row.text, "a日b");
        assert_eq!(screen.cursor().col, 4);
        assert!(row.cells[1].is_primary_in_multi_cell());
        assert!(row.cells[2].is_nonprimary_in_multi_cell());
        assert_eq!(row.cells[2].text_size(), 0);
    }

    #[test]
    fn combining_mark_attaches_to_previous_cell() {
        let mut screen = screen(2, 10);
        write(&mut screen, "e\u{301}x");
        let row = screen.row(0).unwrap();
        assert_eq!(row.cell_text(0), "e\u{301}");
        assert_eq!(row.cell_text(1), "x");
        assert_eq!(screen.cursor().col, 2);
    }

    #[test]
    fn zwj_sequence_stays_in_one_cell() {
        let mut screen = screen(2, 10);
        write(&mut screen, "👩\u{200D}🚀x");
        let row = screen.row(0).unwrap();
        assert_eq!(row.cell_text(0), "👩\u{200D}🚀");
        assert_eq!(row.cell_text(2), "x");
    }

    #[test]
    fn scroll_to_scrollback() {
        let mut screen = screen(2, 5);
        write(&mut screen, "aaaaabbbbbccccc");
        // Three rows of output on a two-row screen: one scrolled off.
        assert_eq!(screen.scroll_back_rows(), 1);
        assert_eq!(screen.absolute_row_screen_start(), 1);
        let (row, _) = screen.find_row(0).unwrap();
        assert_eq!(row.text, "aaaaa");
        assert_eq!(row_text(&screen, 0), "bbbbb");
    }

    #[test]
    fn scroll_region_rotation() {
        let mut screen = screen(5, 5);
        for r in 0..5 {
            screen.set_cursor(r, 0);
            write(&mut screen, &format!("r{r}"));
        }
        screen.set_scroll_region(ScrollRegion::new(1, 4));
        screen.set_cursor(1, 0);
        screen.scroll_down();

        assert_eq!(row_text(&screen, 0), "r0");
        assert_eq!(row_text(&screen, 1), "r2");
        assert_eq!(row_text(&screen, 2), "r3");
        assert_eq!(row_text(&screen, 3), "");
        assert_eq!(row_text(&screen, 4), "r4");
        // Nothing went to scroll-back: the region is partial.
        assert_eq!(screen.scroll_back_rows(), 0);
    }

    #[test]
    fn insert_and_delete_lines_respect_region() {
        let mut screen = screen(4, 4);
        for r in 0..4 {
            screen.set_cursor(r, 0);
            write(&mut screen, &format!("{r}"));
        }
        screen.set_scroll_region(ScrollRegion::new(0, 3));
        screen.set_cursor(1, 0);
        screen.insert_blank_lines(1);
        assert_eq!(row_text(&screen, 0), "0");
        assert_eq!(row_text(&screen, 1), "");
        assert_eq!(row_text(&screen, 2), "1");
        assert_eq!(row_text(&screen, 3), "3");

        screen.set_cursor(1, 0);
        screen.delete_lines(1);
        assert_eq!(row_text(&screen, 1), "1");
        assert_eq!(row_text(&screen, 2), "");
        assert_eq!(row_text(&screen, 3), "3");
    }

    #[test]
    fn erase_and_edit_cells() {
        let mut screen = screen(2, 8);
        write(&mut screen, "abcdef");

        screen.set_cursor(0, 2);
        screen.erase_characters(2);
        assert_eq!(row_text(&screen, 0), "abef");

        screen.set_cursor(0, 0);
        screen.delete_characters(2);
        // Cells shifted left; text keeps only what survived.
        assert_eq!(row_text(&screen, 0), "ef");

        screen.insert_blank_characters(1);
        assert_eq!(row_text(&screen, 0), "ef");
        assert_eq!(screen.row(0).unwrap().cell_text(1), "e");
        assert!(screen.check_graphics_ref_counts());
    }

    #[test]
    fn selection_text() {
        let mut screen = screen(3, 8);
        write(&mut screen, "hello");
        screen.set_cursor(1, 0);
        write(&mut screen, "world");

        let base = screen.absolute_row_screen_start();
        screen.begin_selection(SelectionPoint::new(base, 0));
        screen.update_selection(SelectionPoint::new(base + 1, 4));
        assert_eq!(screen.selected_text(), "hello\nworld");
    }

    #[test]
    fn selection_joins_wrapped_rows() {
        let mut screen = screen(3, 5);
        write(&mut screen, "HELLOWORLD");
        let base = screen.absolute_row_screen_start();
        screen.begin_selection(SelectionPoint::new(base, 0));
        screen.update_selection(SelectionPoint::new(base + 1, 4));
        // Overflowed rows join without a newline.
        assert_eq!(screen.selected_text(), "HELLOWORLD");
    }

    #[test]
    fn visual_scroll_bounds() {
        let mut screen = screen(2, 4);
        write(&mut screen, "aaaabbbbccccdddd");
        assert!(screen.visual_scroll_at_bottom());
        screen.visual_scroll_up(100);
        assert_eq!(screen.visual_scroll_offset(), screen.absolute_row_start());
        screen.visual_scroll_down(1);
        assert_eq!(screen.visual_scroll_offset(), screen.absolute_row_start() + 1);
        // Writing snaps back to the bottom.
        write(&mut screen, "x");
        assert!(screen.visual_scroll_at_bottom());
    }

    #[test]
    fn resize_narrower_truncates() {
        let mut screen = screen(2, 8);
        write(&mut screen, "abcdef");
        screen.resize(Size::new(2, 3));
        assert_eq!(row_text(&screen, 0), "abc");
        assert_eq!(screen.cursor().col, 2);
        assert!(screen.check_graphics_ref_counts());
    }

    #[test]
    fn resize_shorter_spills_to_scrollback() {
        let mut screen = screen(4, 4);
        for r in 0..4 {
            screen.set_cursor(r, 0);
            write(&mut screen, &format!("{r}"));
        }
        screen.resize(Size::new(2, 4));
        assert_eq!(screen.scroll_back_rows(), 2);
        assert_eq!(row_text(&screen, 0), "2");
        assert_eq!(screen.cursor().row, 1);

        // Growing pulls the history back in.
        screen.resize(Size::new(4, 4));
        assert_eq!(screen.scroll_back_rows(), 0);
        assert_eq!(row_text(&screen, 0), "0");
        assert_eq!(screen.cursor().row, 3);
    }

    #[test]
    fn origin_mode_confines_cursor() {
        let mut screen = screen(6, 10);
        screen.set_scroll_region(ScrollRegion::new(2, 5));
        screen.set_origin_mode(OriginMode::Enabled);
        assert_eq!(screen.cursor().row, 2);
        screen.set_cursor_relative(0, 0);
        assert_eq!(screen.cursor().row, 2);
        screen.set_cursor_relative(99, 0);
        assert_eq!(screen.cursor().row, 4);
    }

    #[test]
    fn no_wrap_when_disabled() {
        let mut screen = screen(2, 4);
        for cp in "abcdXY".chars() {
            screen.put_code_point(cp, AutoWrapMode::Disabled);
        }
        // Everything past the edge overwrites the last column.
        assert_eq!(row_text(&screen, 0), "abcY");
        assert_eq!(screen.cursor().row, 0);
    }
}
