//! A session: an ordered collection of tabs with one active.

use core_events::Size;
use core_pane::Pane;

use crate::tab::Tab;

pub struct Session {
    id: u64,
    name: String,
    tabs: Vec<Tab>,
    active_tab: Option<u64>,
    size: Size,
    row_offset: u32,
    is_active: bool,
}

impl Session {
    pub fn new(id: u64, name: impl Into<String>) -> Session {
        Session {
            id,
            name: name.into(),
            tabs: Vec::new(),
            active_tab: None,
            size: Size::default(),
            row_offset: 0,
            is_active: false,
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
        self.tabs.is_empty()
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn tabs_mut(&mut self) -> &mut [Tab] {
        &mut self.tabs
    }

    pub fn tab(&self, tab_id: u64) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.id() == tab_id)
    }

    pub fn tab_mut(&mut self, tab_id: u64) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|tab| tab.id() == tab_id)
    }

    pub fn active_tab_id(&self) -> Option<u64> {
        self.active_tab
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.tab(self.active_tab?)
    }

    pub fn active_tab_mut(&mut self) -> Option<&mut Tab> {
        let id = self.active_tab?;
        self.tab_mut(id)
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn set_is_active(&mut self, active: bool) -> bool {
        if self.is_active == active {
            return false;
        }
        self.is_active = active;
        if let Some(tab) = self.active_tab_mut() {
            tab.set_is_active(active);
        }
        true
    }

    /// Lay out the active tab; inactive tabs are refreshed when they become
    /// active, since only the active tab sees size changes.
    pub fn layout(&mut self, size: Size, row_offset: u32) {
        self.size = size;
        self.row_offset = row_offset;
        if let Some(tab) = self.active_tab_mut() {
            tab.layout(size, row_offset, 0);
        }
    }

    pub fn add_tab(&mut self, tab: Tab) {
        let id = tab.id();
        self.tabs.push(tab);
        self.set_active_tab(Some(id));
    }

    pub fn set_active_tab(&mut self, tab_id: Option<u64>) -> bool {
        if self.active_tab == tab_id {
            return false;
        }
        let was_active = self.is_active;
        if was_active {
            if let Some(tab) = self.active_tab_mut() {
                tab.set_is_active(false);
            }
        }
        self.active_tab = tab_id;
        if let Some(tab) = self.active_tab_mut() {
            if was_active {
                tab.set_is_active(true);
            }
        }
        // Sizes only flow to the visible tab, so the newcomer's layout may
        // be stale.
        self.layout(self.size, self.row_offset);
        true
    }

    /// Switch to the next tab in order, wrapping.
    pub fn next_tab(&mut self) {
        self.step_tab(1);
    }

    pub fn previous_tab(&mut self) {
        self.step_tab(-1);
    }

    fn step_tab(&mut self, step: isize) {
        if self.tabs.is_empty() {
            return;
        }
        let current = self
            .active_tab
            .and_then(|id| self.tabs.iter().position(|tab| tab.id() == id))
            .unwrap_or(0);
        let count = self.tabs.len() as isize;
        let next = (current as isize + step).rem_euclid(count) as usize;
        let id = self.tabs[next].id();
        self.set_active_tab(Some(id));
    }

    /// Remove a tab (which must already be empty of panes). Activation moves
    /// to a neighbor.
    pub fn remove_tab(&mut self, tab_id: u64) {
        let Some(index) = self.tabs.iter().position(|tab| tab.id() == tab_id) else {
            return;
        };
        if self.active_tab == Some(tab_id) {
            let next = if self.tabs.len() == 1 {
                None
            } else if index + 1 < self.tabs.len() {
                Some(self.tabs[index + 1].id())
            } else {
                Some(self.tabs[index - 1].id())
            };
            self.set_active_tab(next);
        }
        self.tabs.retain(|tab| tab.id() != tab_id);
    }

    /// Remove a pane from a tab; an emptied tab is removed too. Returns the
    /// pane for disposal outside the lock.
    pub fn remove_pane(&mut self, tab_id: u64, pane_id: u64) -> Option<Box<Pane>> {
        let tab = self.tab_mut(tab_id)?;
        let removed = tab.remove_pane(pane_id);
        if removed.is_some() && self.tab(tab_id).is_some_and(Tab::is_empty) {
            self.remove_tab(tab_id);
        }
        removed
    }

    pub fn active_pane_mut(&mut self) -> Option<&mut Pane> {
        self.active_tab_mut()?.active_pane_mut()
    }
}
