//! A tab: one pane layout, a recency order, and an optional popup.

use std::collections::VecDeque;

use core_events::{FocusEvent, Size};
use core_layout::{Direction, LayoutEntry, LayoutGroup, LayoutNode, NavigateDirection};
use core_pane::Pane;

use crate::popup::{Popup, PopupLayout};

pub struct Tab {
    id: u64,
    name: String,
    size: Size,
    row_offset: u32,
    col_offset: u32,
    layout_root: LayoutGroup<Pane>,
    layout_tree: LayoutNode,
    panes_by_recency: VecDeque<u64>,
    is_active: bool,
    active_pane: Option<u64>,
    full_screen_pane: Option<u64>,
    popup: Option<Popup>,
    popup_entry: Option<LayoutEntry>,
}

impl Tab {
    pub fn new(id: u64, name: impl Into<String>) -> Tab {
        Tab {
            id,
            name: name.into(),
            size: Size::default(),
            row_offset: 0,
            col_offset: 0,
            layout_root: LayoutGroup::new(),
            layout_tree: LayoutNode::empty(Size::default()),
            panes_by_recency: VecDeque::new(),
            is_active: false,
            active_pane: None,
            full_screen_pane: None,
            popup: None,
            popup_entry: None,
        }
    }

    /// Rebuild a tab from snapshot parts. Ids that no longer resolve to a
    /// pane are dropped from the recency and activation state.
    pub(crate) fn restore(
        id: u64,
        name: String,
        layout_root: LayoutGroup<Pane>,
        mut panes_by_recency: VecDeque<u64>,
        active_pane: Option<u64>,
        full_screen_pane: Option<u64>,
    ) -> Tab {
        panes_by_recency.retain(|&pane_id| layout_root.contains_pane(pane_id));
        let mut seen: Vec<u64> = panes_by_recency.iter().copied().collect();
        layout_root.for_each_pane(&mut |pane| {
            if !seen.contains(&pane.id()) {
                seen.push(pane.id());
                panes_by_recency.push_back(pane.id());
            }
        });
        let active_pane = active_pane
            .filter(|&pane_id| layout_root.contains_pane(pane_id))
            .or_else(|| panes_by_recency.front().copied());
        let full_screen_pane =
            full_screen_pane.filter(|&pane_id| layout_root.contains_pane(pane_id));
        Tab {
            id,
            name,
            size: Size::default(),
            row_offset: 0,
            col_offset: 0,
            layout_root,
            layout_tree: LayoutNode::empty(Size::default()),
            panes_by_recency,
            is_active: false,
            active_pane,
            full_screen_pane,
            popup: None,
            popup_entry: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn is_empty(&self) -> bool {
        self.layout_root.is_empty() && self.popup.is_none()
    }

    pub fn layout_tree(&self) -> &LayoutNode {
        &self.layout_tree
    }

    pub fn layout_root(&self) -> &LayoutGroup<Pane> {
        &self.layout_root
    }

    pub fn layout_root_mut(&mut self) -> &mut LayoutGroup<Pane> {
        &mut self.layout_root
    }

    pub fn active_pane_id(&self) -> Option<u64> {
        self.active_pane
    }

    pub fn full_screen_pane_id(&self) -> Option<u64> {
        self.full_screen_pane
    }

    pub fn panes_by_recency(&self) -> &VecDeque<u64> {
        &self.panes_by_recency
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn popup_entry(&self) -> Option<LayoutEntry> {
        self.popup_entry
    }

    pub fn pane(&self, pane_id: u64) -> Option<&Pane> {
        if let Some(popup) = &self.popup {
            if popup.pane.id() == pane_id {
                return Some(&popup.pane);
            }
        }
        self.layout_root.pane(pane_id)
    }

    pub fn pane_mut(&mut self, pane_id: u64) -> Option<&mut Pane> {
        if let Some(popup) = &mut self.popup {
            if popup.pane.id() == pane_id {
                return Some(&mut popup.pane);
            }
        }
        self.layout_root.pane_mut(pane_id)
    }

    pub fn active_pane_mut(&mut self) -> Option<&mut Pane> {
        let id = self.active_pane?;
        self.pane_mut(id)
    }

    /// Recompute the layout for the given area. A full-screen pane bypasses
    /// the split tree entirely.
    pub fn layout(&mut self, size: Size, row_offset: u32, col_offset: u32) {
        self.size = size;
        self.row_offset = row_offset;
        self.col_offset = col_offset;

        if let (Some(popup), true) = (&self.popup, size.rows > 0 && size.cols > 0) {
            let entry = popup
                .layout_config
                .resolve(size, row_offset, col_offset, popup.pane.id());
            self.popup_entry = Some(entry);
        }
        if let (Some(popup), Some(entry)) = (&mut self.popup, self.popup_entry) {
            popup.pane.resize_to(entry.size);
        }

        if let Some(full_screen) = self.full_screen_pane {
            if let Some(pane) = self.layout_root.pane_mut(full_screen) {
                pane.resize_to(size);
            }
            self.layout_tree = LayoutNode::single(row_offset, col_offset, size, full_screen);
        } else {
            self.layout_tree = self.layout_root.layout(size, row_offset, col_offset);
        }
        self.invalidate_all();
    }

    pub fn invalidate_all(&mut self) {
        self.layout_root.for_each_pane_mut(&mut |pane| pane.invalidate_all());
        if let Some(popup) = &mut self.popup {
            popup.pane.invalidate_all();
        }
    }

    /// Insert a pane next to the active one. On failure the pane is handed
    /// back to the caller.
    pub fn insert_pane(&mut self, pane: Pane, direction: Direction) -> Result<(), Pane> {
        let pane_id = pane.id();
        self.layout_root.split(self.active_pane, direction, pane)?;
        self.layout_tree = self
            .layout_root
            .layout(self.size, self.row_offset, self.col_offset);
        if self.layout_tree.find_pane(pane_id).is_none() {
            // The area is too small to fit another pane; undo.
            let removed = self.layout_root.remove_pane(pane_id);
            self.layout_tree = self
                .layout_root
                .layout(self.size, self.row_offset, self.col_offset);
            return Err(*removed.expect("pane was just inserted"));
        }
        self.set_active(Some(pane_id));
        Ok(())
    }

    /// Install a popup pane. An existing popup is returned to be dropped.
    pub fn open_popup(&mut self, pane: Pane, layout_config: PopupLayout) -> Option<Box<Pane>> {
        let previous = self.close_popup();
        let pane_id = pane.id();
        self.popup = Some(Popup {
            pane: Box::new(pane),
            layout_config,
        });
        self.layout(self.size, self.row_offset, self.col_offset);
        self.set_active(Some(pane_id));
        previous
    }

    fn close_popup(&mut self) -> Option<Box<Pane>> {
        self.popup_entry = None;
        let popup = self.popup.take()?;
        let id = popup.pane.id();
        self.forget_pane(id);
        Some(popup.pane)
    }

    /// Remove a pane, returning it for disposal outside the lock.
    pub fn remove_pane(&mut self, pane_id: u64) -> Option<Box<Pane>> {
        if self.full_screen_pane == Some(pane_id) {
            self.full_screen_pane = None;
        }

        let removed = if self
            .popup
            .as_ref()
            .is_some_and(|popup| popup.pane.id() == pane_id)
        {
            self.close_popup()
        } else {
            let removed = self.layout_root.remove_pane(pane_id);
            if removed.is_some() {
                self.forget_pane(pane_id);
            }
            removed
        };

        if removed.is_some() {
            self.layout(self.size, self.row_offset, self.col_offset);
        }
        removed
    }

    fn forget_pane(&mut self, pane_id: u64) {
        self.panes_by_recency.retain(|&id| id != pane_id);
        if self.active_pane == Some(pane_id) {
            let next = self
                .panes_by_recency
                .front()
                .copied()
                .or_else(|| self.any_pane_id());
            self.active_pane = None;
            self.set_active(next);
        }
    }

    fn any_pane_id(&self) -> Option<u64> {
        let mut found = None;
        self.layout_root.for_each_pane(&mut |pane| {
            if found.is_none() {
                found = Some(pane.id());
            }
        });
        found
    }

    /// Focus a pane, updating recency and focus events. Returns whether the
    /// active pane changed.
    pub fn set_active(&mut self, pane_id: Option<u64>) -> bool {
        if self.active_pane == pane_id {
            return false;
        }

        // Leaving full-screen when focus moves elsewhere.
        if let Some(full_screen) = self.full_screen_pane {
            if pane_id != Some(full_screen) {
                self.full_screen_pane = None;
                self.layout(self.size, self.row_offset, self.col_offset);
            }
        }

        if self.is_active {
            if let Some(previous) = self.active_pane {
                if let Some(pane) = self.pane_mut(previous) {
                    pane.focus_event(FocusEvent::Out);
                }
            }
        }
        self.active_pane = pane_id;
        if let Some(id) = pane_id {
            self.panes_by_recency.retain(|&existing| existing != id);
            self.panes_by_recency.push_front(id);
        }
        if self.is_active {
            if let Some(id) = pane_id {
                if let Some(pane) = self.pane_mut(id) {
                    pane.focus_event(FocusEvent::In);
                }
            }
        }
        true
    }

    /// Whether this tab is the session's visible tab; drives focus events.
    pub fn set_is_active(&mut self, active: bool) -> bool {
        if self.is_active == active {
            return false;
        }
        if self.is_active {
            if let Some(id) = self.active_pane {
                if let Some(pane) = self.pane_mut(id) {
                    pane.focus_event(FocusEvent::Out);
                }
            }
        }
        self.is_active = active;
        if self.is_active {
            if let Some(id) = self.active_pane {
                if let Some(pane) = self.pane_mut(id) {
                    pane.focus_event(FocusEvent::In);
                }
            }
        }
        true
    }

    /// Toggle the full-screen pane. Passing `None` restores the layout.
    pub fn set_full_screen(&mut self, pane_id: Option<u64>) -> bool {
        if self.full_screen_pane == pane_id {
            return false;
        }
        self.full_screen_pane = pane_id;
        if let Some(id) = pane_id {
            self.set_active(Some(id));
        }
        self.layout(self.size, self.row_offset, self.col_offset);
        true
    }

    /// Move focus to the nearest pane in a direction, wrapping at the
    /// edges. Among panes touching the probe line, the most recently active
    /// one wins; that makes motion across unaligned splits predictable.
    pub fn navigate(&mut self, direction: NavigateDirection) {
        let Some(active) = self.active_pane else {
            return;
        };
        let Some(entry) = self.layout_tree.find_pane(active).copied() else {
            return;
        };

        let row_span = (entry.row, entry.row + entry.size.rows);
        let col_span = (entry.col, entry.col + entry.size.cols);
        let area_rows = self.size.rows;
        let area_cols = self.size.cols;

        let candidates: Vec<u64> = match direction {
            NavigateDirection::Left => {
                let col = if entry.col >= self.col_offset + 2 {
                    entry.col - 2
                } else {
                    self.col_offset + area_cols.saturating_sub(1)
                };
                self.layout_tree
                    .hit_test_vertical_line(col, row_span.0, row_span.1)
                    .into_iter()
                    .map(|entry| entry.pane_id)
                    .collect()
            }
            NavigateDirection::Right => {
                let edge = entry.col + entry.size.cols;
                let col = if area_cols < 2 || edge + 1 >= self.col_offset + area_cols {
                    self.col_offset
                } else {
                    edge + 1
                };
                self.layout_tree
                    .hit_test_vertical_line(col, row_span.0, row_span.1)
                    .into_iter()
                    .map(|entry| entry.pane_id)
                    .collect()
            }
            NavigateDirection::Up => {
                let row = if entry.row >= self.row_offset + 2 {
                    entry.row - 2
                } else {
                    self.row_offset + area_rows.saturating_sub(1)
                };
                self.layout_tree
                    .hit_test_horizontal_line(row, col_span.0, col_span.1)
                    .into_iter()
                    .map(|entry| entry.pane_id)
                    .collect()
            }
            NavigateDirection::Down => {
                let edge = entry.row + entry.size.rows;
                let row = if area_rows < 2 || edge + 1 >= self.row_offset + area_rows {
                    self.row_offset
                } else {
                    edge + 1
                };
                self.layout_tree
                    .hit_test_horizontal_line(row, col_span.0, col_span.1)
                    .into_iter()
                    .map(|entry| entry.pane_id)
                    .collect()
            }
        };

        let recency = self.panes_by_recency.clone();
        for candidate in recency {
            if candidate != active && candidates.contains(&candidate) {
                self.set_active(Some(candidate));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mock(id: u64) -> Pane {
        Pane::create_mock(id, Size::new(5, 10))
    }

    fn tab_with_grid() -> Tab {
        // A 2x2 grid: 1 | 2 on top, 3 | 4 below.
        let mut tab = Tab::new(1, "grid");
        tab.layout(Size::new(21, 21), 0, 0);
        tab.insert_pane(mock(1), Direction::None).unwrap();
        tab.insert_pane(mock(2), Direction::Horizontal).unwrap();
        tab.set_active(Some(1));
        tab.insert_pane(mock(3), Direction::Vertical).unwrap();
        tab.set_active(Some(2));
        tab.insert_pane(mock(4), Direction::Vertical).unwrap();
        tab
    }

    #[test]
    fn grid_layout_positions() {
        let mut tab = tab_with_grid();
        tab.layout(Size::new(21, 21), 0, 0);
        let one = tab.layout_tree().find_pane(1).unwrap();
        let two = tab.layout_tree().find_pane(2).unwrap();
        let three = tab.layout_tree().find_pane(3).unwrap();
        let four = tab.layout_tree().find_pane(4).unwrap();
        assert!(one.row < three.row && one.col < two.col);
        assert!(four.row > two.row && four.col == two.col);
        assert_eq!(one.col, three.col);
    }

    #[test]
    fn navigation_with_wrap() {
        let mut tab = tab_with_grid();
        tab.layout(Size::new(21, 21), 0, 0);
        tab.set_active(Some(1));

        // Left from the left edge wraps to the right column.
        tab.navigate(NavigateDirection::Left);
        assert_eq!(tab.active_pane_id(), Some(2));

        tab.set_active(Some(1));
        tab.navigate(NavigateDirection::Down);
        assert_eq!(tab.active_pane_id(), Some(3));

        // Down from the bottom wraps to the top.
        tab.navigate(NavigateDirection::Down);
        assert_eq!(tab.active_pane_id(), Some(1));

        tab.navigate(NavigateDirection::Right);
        assert_eq!(tab.active_pane_id(), Some(2));
    }

    #[test]
    fn removal_prefers_recency() {
        let mut tab = tab_with_grid();
        tab.set_active(Some(3));
        tab.set_active(Some(1));
        let removed = tab.remove_pane(1).unwrap();
        assert_eq!(removed.id(), 1);
        // Pane 3 was the most recently active of the remainder.
        assert_eq!(tab.active_pane_id(), Some(3));
        assert!(!tab.is_empty());
    }

    #[test]
    fn tab_empties_when_last_pane_leaves() {
        let mut tab = Tab::new(1, "solo");
        tab.layout(Size::new(10, 10), 0, 0);
        tab.insert_pane(mock(1), Direction::None).unwrap();
        tab.remove_pane(1).unwrap();
        assert!(tab.is_empty());
        assert_eq!(tab.active_pane_id(), None);
    }

    #[test]
    fn full_screen_synthesizes_single_leaf() {
        let mut tab = tab_with_grid();
        tab.layout(Size::new(21, 21), 0, 0);
        tab.set_full_screen(Some(3));
        let entries = tab.layout_tree().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].pane_id, 3);
        assert_eq!(entries[0].size, Size::new(21, 21));

        // Focusing another pane drops full-screen.
        tab.set_active(Some(1));
        assert_eq!(tab.full_screen_pane_id(), None);
        assert!(tab.layout_tree().entries().len() > 1);
    }

    #[test]
    fn popup_layout_and_removal() {
        let mut tab = tab_with_grid();
        tab.layout(Size::new(21, 21), 0, 0);
        let previous = tab.open_popup(mock(9), PopupLayout::default());
        assert!(previous.is_none());
        assert_eq!(tab.active_pane_id(), Some(9));
        let entry = tab.popup_entry().unwrap();
        assert_eq!(entry.pane_id, 9);

        let removed = tab.remove_pane(9).unwrap();
        assert_eq!(removed.id(), 9);
        assert!(tab.popup_entry().is_none());
        assert!(tab.active_pane_id().is_some());
    }

    #[test]
    fn insert_fails_when_too_small() {
        let mut tab = Tab::new(1, "tiny");
        tab.layout(Size::new(2, 2), 0, 0);
        tab.insert_pane(mock(1), Direction::None).unwrap();
        let result = tab.insert_pane(mock(2), Direction::Horizontal);
        assert!(result.is_err());
        assert_eq!(tab.layout_root().pane_count(), 1);
    }
}
