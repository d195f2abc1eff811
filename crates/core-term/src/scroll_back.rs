//! Scroll-back: rows that scrolled off the top, chunked into row groups.
//!
//! Each chunk targets a fixed cell count; the whole buffer is bounded by a
//! total cell budget. When the budget is exceeded the oldest chunk is
//! discarded whole and the absolute row numbering advances past it, which is
//! what keeps selections and the visual scroll offset stable across
//! trimming.

use crate::row_group::RowGroup;

/// Cells per chunk.
pub const CELLS_PER_GROUP: usize = (u16::MAX / 2) as usize;

/// Default total cell budget.
pub const DEFAULT_MAX_CELLS: usize = CELLS_PER_GROUP * 100;

struct Group {
    group: RowGroup,
    cell_count: usize,
}

pub struct ScrollBack {
    groups: std::collections::VecDeque<Group>,
    total_rows: usize,
    absolute_row_start: u64,
    max_cells: usize,
}

impl Default for ScrollBack {
    fn default() -> Self {
        Self::with_max_cells(DEFAULT_MAX_CELLS)
    }
}

impl ScrollBack {
    /// A scroll-back with a custom cell budget. The budget is rounded up to
    /// at least one chunk.
    pub fn with_max_cells(max_cells: usize) -> Self {
        Self {
            groups: std::collections::VecDeque::new(),
            total_rows: 0,
            absolute_row_start: 0,
            max_cells: max_cells.max(1),
        }
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn total_cells(&self) -> usize {
        self.groups.iter().map(|group| group.cell_count).sum()
    }

    /// Absolute row number of the oldest retained row.
    pub fn absolute_row_start(&self) -> u64 {
        self.absolute_row_start
    }

    /// Absolute row number one past the newest scroll-back row; the first
    /// row of the visible screen.
    pub fn absolute_row_end(&self) -> u64 {
        self.absolute_row_start + self.total_rows as u64
    }

    fn cells_per_group(&self) -> usize {
        CELLS_PER_GROUP.min(self.max_cells)
    }

    fn max_groups(&self) -> usize {
        self.max_cells.div_ceil(self.cells_per_group())
    }

    /// Move `row_count` rows starting at `row_index` out of `from` into the
    /// scroll-back. Trailing empty cells are stripped as rows cross over.
    pub fn add_rows(&mut self, from: &mut RowGroup, row_index: usize, mut row_count: usize) {
        debug_assert!(row_index + row_count <= from.total_rows());

        // Transfers remove rows from `from`, so the source index never
        // advances.
        while row_count > 0 {
            if self.is_last_group_full() {
                self.add_group();
            }

            let cells_per_group = self.cells_per_group();
            let to = self.groups.back_mut().expect("group just ensured");
            let mut rows_to_take = 0usize;
            let mut cells_to_take = 0usize;
            while rows_to_take < row_count && to.cell_count + cells_to_take < cells_per_group {
                cells_to_take += from.strip_trailing_empty_cells(row_index + rows_to_take);
                rows_to_take += 1;
            }

            let insert_at = to.group.total_rows();
            let cells_taken = to
                .group
                .transfer_from(from, row_index, insert_at, rows_to_take, None);

            row_count -= rows_to_take;
            self.total_rows += rows_to_take;
            to.cell_count += cells_taken;
        }

        self.enforce_cell_budget();
    }

    /// Move `row_count` rows from the newest end of the scroll-back into
    /// `to` at `row_index`, forcing `desired_cols` cells per row. Used when
    /// growing the screen reveals history.
    pub fn take_rows(
        &mut self,
        to: &mut RowGroup,
        desired_cols: u32,
        row_index: usize,
        mut row_count: usize,
    ) {
        debug_assert!(row_count <= self.total_rows());
        debug_assert!(row_index <= to.total_rows());

        while row_count > 0 {
            let from = self.groups.back_mut().expect("rows remain");
            let rows_to_take = row_count.min(from.group.total_rows());
            let from_index = from.group.total_rows() - rows_to_take;

            let mut cells_taken = 0usize;
            for i in from_index..from.group.total_rows() {
                cells_taken += from.group.rows()[i].cells.len();
            }
            to.transfer_from(
                &mut from.group,
                from_index,
                row_index,
                rows_to_take,
                Some(desired_cols),
            );

            row_count -= rows_to_take;
            self.total_rows -= rows_to_take;
            from.cell_count = from.cell_count.saturating_sub(cells_taken);

            if from.group.is_empty() {
                self.groups.pop_back();
            }
        }
    }

    /// Locate an absolute row: returns the index within the owning group and
    /// the group itself.
    pub fn find_row(&self, absolute_row: u64) -> Option<(usize, &RowGroup)> {
        if absolute_row < self.absolute_row_start || absolute_row >= self.absolute_row_end() {
            return None;
        }
        let mut offset = (absolute_row - self.absolute_row_start) as usize;
        for group in &self.groups {
            if offset < group.group.total_rows() {
                return Some((offset, &group.group));
            }
            offset -= group.group.total_rows();
        }
        None
    }

    /// Drop the entire history. Row numbering advances past it.
    pub fn clear(&mut self) {
        while let Some(group) = self.groups.pop_front() {
            self.absolute_row_start += group.group.total_rows() as u64;
        }
        self.total_rows = 0;
    }

    fn is_last_group_full(&self) -> bool {
        match self.groups.back() {
            Some(group) => group.cell_count >= self.cells_per_group(),
            None => true,
        }
    }

    fn add_group(&mut self) {
        if self.groups.len() >= self.max_groups() {
            self.drop_oldest_group();
        }
        self.groups.push_back(Group {
            group: RowGroup::default(),
            cell_count: 0,
        });
    }

    fn enforce_cell_budget(&mut self) {
        while self.total_cells() > self.max_cells && self.groups.len() > 1 {
            self.drop_oldest_group();
        }
    }

    fn drop_oldest_group(&mut self) {
        if let Some(group) = self.groups.pop_front() {
            let deleted_rows = group.group.total_rows();
            self.absolute_row_start += deleted_rows as u64;
            self.total_rows -= deleted_rows;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Row;

    fn push_row(group: &mut RowGroup, width: usize, fill: char) {
        let mut row = Row::with_width(width);
        for cell in &mut row.cells {
            cell.set_text_size(fill.len_utf8() as u16);
            row.text.push(fill);
        }
        group.rows_mut().push_back(row);
    }

    #[test]
    fn rows_accumulate_and_absolute_rows_advance() {
        let mut scroll_back = ScrollBack::default();
        let mut active = RowGroup::default();
        push_row(&mut active, 10, 'a');
        push_row(&mut active, 10, 'b');

        scroll_back.add_rows(&mut active, 0, 2);
        assert_eq!(scroll_back.total_rows(), 2);
        assert_eq!(scroll_back.absolute_row_start(), 0);
        assert_eq!(scroll_back.absolute_row_end(), 2);
        assert_eq!(active.total_rows(), 0);

        let (index, group) = scroll_back.find_row(1).unwrap();
        assert_eq!(group.rows()[index].text, "bbbbbbbbbb");
    }

    #[test]
    fn cap_discards_oldest_whole_rows() {
        // Budget of 100 cells; rows of 10 non-empty cells.
        let mut scroll_back = ScrollBack::with_max_cells(100);
        let mut active = RowGroup::default();
        for _ in 0..200 {
            push_row(&mut active, 10, 'x');
        }
        scroll_back.add_rows(&mut active, 0, 200);

        assert_eq!(scroll_back.total_rows(), 10);
        assert_eq!(scroll_back.absolute_row_start(), 190);
        assert!(scroll_back.total_cells() <= 100);
    }

    #[test]
    fn take_rows_returns_newest_first() {
        let mut scroll_back = ScrollBack::default();
        let mut active = RowGroup::default();
        push_row(&mut active, 4, 'a');
        push_row(&mut active, 4, 'b');
        scroll_back.add_rows(&mut active, 0, 2);

        let mut to = RowGroup::default();
        scroll_back.take_rows(&mut to, 6, 0, 1);
        assert_eq!(scroll_back.total_rows(), 1);
        assert_eq!(to.total_rows(), 1);
        assert_eq!(to.rows()[0].cells.len(), 6);
        assert_eq!(to.rows()[0].text, "bbbb");
    }

    #[test]
    fn clear_advances_row_start() {
        let mut scroll_back = ScrollBack::default();
        let mut active = RowGroup::default();
        push_row(&mut active, 4, 'a');
        scroll_back.add_rows(&mut active, 0, 1);
        scroll_back.clear();
        assert_eq!(scroll_back.total_rows(), 0);
        assert_eq!(scroll_back.absolute_row_start(), 1);
    }
}
