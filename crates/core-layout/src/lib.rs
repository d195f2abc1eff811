//! The layout engine: a recursive split tree mapping panes to absolute
//! rectangles.
//!
//! A [`LayoutGroup`] is the mutable tree: groups hold either panes or
//! sub-groups, each with a relative share of the parent's space. Calling
//! [`LayoutGroup::layout`] produces an immutable [`LayoutNode`] tree of
//! absolute rectangles used for hit testing, navigation, and rendering.
//!
//! Invariants, restored by the simplification pass after every removal:
//! - `direction == None` iff a group has at most one child.
//! - A group never contains a child group of the same direction (absorbed).
//! - A group is never the sole child of its parent (collapsed).
//! - Child shares sum to [`MAX_LAYOUT_PRECISION`].

mod tree;

pub use tree::{ChildOwned, ChildRef, LayoutGroup, LayoutPane};

use core_events::Size;

/// Denominator of all relative sizes.
pub const MAX_LAYOUT_PRECISION: i64 = 100_000;

/// Direction of a split. `Horizontal` lays children out side by side
/// (splitting columns); `Vertical` stacks them (splitting rows).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    None,
    Horizontal,
    Vertical,
}

/// Direction of pane-relative navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigateDirection {
    Left,
    Right,
    Up,
    Down,
}

/// Which border of a pane a resize drags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeDirection {
    Left,
    Right,
    Top,
    Bottom,
}

impl ResizeDirection {
    /// The split axis the resize operates on.
    pub fn axis(&self) -> Direction {
        match self {
            ResizeDirection::Left | ResizeDirection::Right => Direction::Horizontal,
            ResizeDirection::Top | ResizeDirection::Bottom => Direction::Vertical,
        }
    }
}

/// The rectangle assigned to one pane. Coordinates are absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutEntry {
    pub row: u32,
    pub col: u32,
    pub size: Size,
    pub pane_id: u64,
}

impl LayoutEntry {
    pub fn contains(&self, row: u32, col: u32) -> bool {
        row >= self.row
            && row < self.row + self.size.rows
            && col >= self.col
            && col < self.col + self.size.cols
    }
}

/// An immutable layout result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutNode {
    pub row: u32,
    pub col: u32,
    pub size: Size,
    pub direction: Direction,
    pub children: Vec<LayoutChild>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutChild {
    Node(LayoutNode),
    Entry(LayoutEntry),
}

impl LayoutNode {
    pub fn empty(size: Size) -> LayoutNode {
        LayoutNode {
            row: 0,
            col: 0,
            size,
            direction: Direction::None,
            children: Vec::new(),
        }
    }

    /// A synthesized single-leaf tree (full-screen pane, popup).
    pub fn single(row: u32, col: u32, size: Size, pane_id: u64) -> LayoutNode {
        LayoutNode {
            row,
            col,
            size,
            direction: Direction::None,
            children: vec![LayoutChild::Entry(LayoutEntry {
                row,
                col,
                size,
                pane_id,
            })],
        }
    }

    pub fn find_pane(&self, pane_id: u64) -> Option<&LayoutEntry> {
        for child in &self.children {
            match child {
                LayoutChild::Entry(entry) if entry.pane_id == pane_id => return Some(entry),
                LayoutChild::Entry(_) => {}
                LayoutChild::Node(node) => {
                    if let Some(entry) = node.find_pane(pane_id) {
                        return Some(entry);
                    }
                }
            }
        }
        None
    }

    pub fn entries(&self) -> Vec<&LayoutEntry> {
        let mut result = Vec::new();
        self.collect_entries(&mut result);
        result
    }

    fn collect_entries<'a>(&'a self, into: &mut Vec<&'a LayoutEntry>) {
        for child in &self.children {
            match child {
                LayoutChild::Entry(entry) => into.push(entry),
                LayoutChild::Node(node) => node.collect_entries(into),
            }
        }
    }

    pub fn hit_test(&self, row: u32, col: u32) -> Option<&LayoutEntry> {
        if row >= self.row + self.size.rows || col >= self.col + self.size.cols {
            return None;
        }
        for child in &self.children {
            let hit = match child {
                LayoutChild::Entry(entry) => entry.contains(row, col).then_some(entry),
                LayoutChild::Node(node) => node.hit_test(row, col),
            };
            if hit.is_some() {
                return hit;
            }
        }
        None
    }

    /// All panes a vertical line at `col` crosses between `row_start` and
    /// `row_end` (inclusive of touching edges), for navigation.
    pub fn hit_test_vertical_line(
        &self,
        col: u32,
        row_start: u32,
        row_end: u32,
    ) -> Vec<&LayoutEntry> {
        let mut result = Vec::new();
        self.collect_vertical_line(col, row_start, row_end, &mut result);
        result
    }

    fn collect_vertical_line<'a>(
        &'a self,
        col: u32,
        row_start: u32,
        row_end: u32,
        into: &mut Vec<&'a LayoutEntry>,
    ) {
        for child in &self.children {
            match child {
                LayoutChild::Entry(entry) => {
                    let line_intersects =
                        row_end >= entry.row && row_start < entry.row + entry.size.rows;
                    if line_intersects
                        && col >= entry.col
                        && col < entry.col + entry.size.cols
                    {
                        into.push(entry);
                    }
                }
                LayoutChild::Node(node) => {
                    node.collect_vertical_line(col, row_start, row_end, into);
                }
            }
        }
    }

    /// All panes a horizontal line at `row` crosses between `col_start` and
    /// `col_end`.
    pub fn hit_test_horizontal_line(
        &self,
        row: u32,
        col_start: u32,
        col_end: u32,
    ) -> Vec<&LayoutEntry> {
        let mut result = Vec::new();
        self.collect_horizontal_line(row, col_start, col_end, &mut result);
        result
    }

    fn collect_horizontal_line<'a>(
        &'a self,
        row: u32,
        col_start: u32,
        col_end: u32,
        into: &mut Vec<&'a LayoutEntry>,
    ) {
        for child in &self.children {
            match child {
                LayoutChild::Entry(entry) => {
                    let line_intersects =
                        col_end >= entry.col && col_start < entry.col + entry.size.cols;
                    if line_intersects
                        && row >= entry.row
                        && row < entry.row + entry.size.rows
                    {
                        into.push(entry);
                    }
                }
                LayoutChild::Node(node) => {
                    node.collect_horizontal_line(row, col_start, col_end, into);
                }
            }
        }
    }
}
