//! The root of the tree: sessions, the active session, and pane lifecycle.

use base64::Engine as _;
use core_events::{RenderEvent, RenderHandle, Size};
use core_layout::Direction;
use core_pane::{CreatePaneArgs, Pane, PaneError, PaneHooks};

use crate::popup::PopupLayout;
use crate::session::Session;
use crate::tab::Tab;

/// A pane removed from the tree. Dropping it joins the pane's threads, so
/// callers should drop it only after releasing the state lock.
pub struct RemovedPane(pub Box<Pane>);

pub struct LayoutState {
    sessions: Vec<Session>,
    active_session: Option<u64>,
    size: Size,
    show_status_bar: bool,

    next_pane_id: u64,
    next_tab_id: u64,
    next_session_id: u64,
}

impl LayoutState {
    pub fn new(size: Size, show_status_bar: bool) -> LayoutState {
        LayoutState {
            sessions: Vec::new(),
            active_session: None,
            size,
            show_status_bar,
            next_pane_id: 1,
            next_tab_id: 1,
            next_session_id: 1,
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn show_status_bar(&self) -> bool {
        self.show_status_bar
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut [Session] {
        &mut self.sessions
    }

    pub fn active_session_id(&self) -> Option<u64> {
        self.active_session
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.sessions
            .iter()
            .find(|session| Some(session.id()) == self.active_session)
    }

    pub fn active_session_mut(&mut self) -> Option<&mut Session> {
        let id = self.active_session?;
        self.sessions.iter_mut().find(|session| session.id() == id)
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.active_session()?.active_tab()
    }

    pub fn active_tab_mut(&mut self) -> Option<&mut Tab> {
        self.active_session_mut()?.active_tab_mut()
    }

    pub fn active_pane_mut(&mut self) -> Option<&mut Pane> {
        self.active_session_mut()?.active_pane_mut()
    }

    /// The area tabs lay out in: everything below the status bar.
    fn tab_area(&self) -> (Size, u32) {
        if self.show_status_bar {
            (self.size.rows_shrinked(1), 1)
        } else {
            (self.size, 0)
        }
    }

    /// Re-run layout, optionally with a new total size.
    pub fn layout(&mut self, size: Option<Size>) {
        if let Some(size) = size {
            self.size = size;
        }
        let (area, row_offset) = self.tab_area();
        if let Some(session) = self.active_session_mut() {
            session.layout(area, row_offset);
        }
    }

    pub fn set_active_session(&mut self, session_id: Option<u64>) -> bool {
        if self.active_session == session_id {
            return false;
        }
        if let Some(session) = self.active_session_mut() {
            session.set_is_active(false);
        }
        self.active_session = session_id;
        if let Some(session) = self.active_session_mut() {
            session.set_is_active(true);
        }
        self.layout(None);
        true
    }

    fn allocate_pane_id(&mut self) -> u64 {
        let id = self.next_pane_id;
        self.next_pane_id += 1;
        id
    }

    fn allocate_tab_id(&mut self) -> u64 {
        let id = self.next_tab_id;
        self.next_tab_id += 1;
        id
    }

    fn allocate_session_id(&mut self) -> u64 {
        let id = self.next_session_id;
        self.next_session_id += 1;
        id
    }

    /// Hooks wiring a pane's threads to the render queue.
    pub(crate) fn make_hooks(
        session_id: u64,
        tab_id: u64,
        pane_id: u64,
        render: &RenderHandle,
    ) -> PaneHooks {
        let on_exit = render.clone();
        let on_update = render.clone();
        let on_selection = render.clone();
        let on_apc = render.clone();
        PaneHooks {
            did_exit: Box::new(move |_| {
                on_exit.push(RenderEvent::PaneExited {
                    session_id,
                    tab_id,
                    pane_id,
                });
            }),
            did_update: Box::new(move |_| on_update.request_render()),
            did_selection: Box::new(move |bytes| {
                let payload = base64::engine::general_purpose::STANDARD.encode(&bytes);
                on_selection.push(RenderEvent::WriteString(format!(
                    "\x1b]52;c;{payload}\x1b\\"
                )));
            }),
            apc_passthrough: Box::new(move |data| {
                on_apc.push(RenderEvent::WriteString(format!("\x1b_{data}\x1b\\")));
            }),
        }
    }

    /// Create a session holding one tab with one pane.
    pub fn add_session(
        &mut self,
        name: impl Into<String>,
        args: CreatePaneArgs,
        render: &RenderHandle,
    ) -> Result<u64, PaneError> {
        let session_id = self.allocate_session_id();
        let session = Session::new(session_id, name);
        self.sessions.push(session);
        self.set_active_session(Some(session_id));
        match self.add_tab(args, render) {
            Ok(_) => Ok(session_id),
            Err(error) => {
                self.sessions.retain(|session| session.id() != session_id);
                self.active_session = self.sessions.last().map(Session::id);
                Err(error)
            }
        }
    }

    /// Create a tab in the active session, running `args` in its first pane.
    pub fn add_tab(&mut self, args: CreatePaneArgs, render: &RenderHandle) -> Result<u64, PaneError> {
        let (area, row_offset) = self.tab_area();
        let tab_id = self.allocate_tab_id();
        let pane_id = self.allocate_pane_id();
        let Some(session) = self.active_session_mut() else {
            return Err(PaneError::Spawn {
                command: args.command.join(" "),
                source: anyhow::anyhow!("no active session"),
            });
        };
        let session_id = session.id();

        let name = args
            .command
            .first()
            .map(|command| {
                command
                    .rsplit('/')
                    .next()
                    .unwrap_or(command.as_str())
                    .to_owned()
            })
            .unwrap_or_default();
        let hooks = Self::make_hooks(session_id, tab_id, pane_id, render);
        let pane = Pane::create(pane_id, args, area, hooks)?;

        let mut tab = Tab::new(tab_id, name);
        tab.layout(area, row_offset, 0);
        if let Err(pane) = tab.insert_pane(pane, Direction::None) {
            drop(pane);
            return Err(PaneError::Spawn {
                command: String::new(),
                source: anyhow::anyhow!("tab area too small"),
            });
        }
        session.add_tab(tab);
        Ok(tab_id)
    }

    /// Split the active pane of the active tab.
    pub fn add_pane(
        &mut self,
        args: CreatePaneArgs,
        direction: Direction,
        render: &RenderHandle,
    ) -> Result<u64, PaneError> {
        let pane_id = self.allocate_pane_id();
        let Some(session_id) = self.active_session_id() else {
            return Err(PaneError::Spawn {
                command: args.command.join(" "),
                source: anyhow::anyhow!("no active session"),
            });
        };
        let fallback_size = self.size;
        let Some(tab) = self.active_tab_mut() else {
            return Err(PaneError::Spawn {
                command: args.command.join(" "),
                source: anyhow::anyhow!("no active tab"),
            });
        };
        let tab_id = tab.id();

        // Provisional size: the reference pane's current area. Layout
        // assigns the real rectangle right after insertion.
        let size = tab
            .active_pane_id()
            .and_then(|id| tab.layout_tree().find_pane(id))
            .map(|entry| entry.size)
            .unwrap_or(fallback_size);

        let hooks = Self::make_hooks(session_id, tab_id, pane_id, render);
        let pane = Pane::create(pane_id, args, size, hooks)?;
        let Some(tab) = self.active_tab_mut() else {
            unreachable!("active tab checked above");
        };
        match tab.insert_pane(pane, direction) {
            Ok(()) => Ok(pane_id),
            Err(pane) => {
                drop(pane);
                Err(PaneError::Spawn {
                    command: String::new(),
                    source: anyhow::anyhow!("no room for another pane"),
                })
            }
        }
    }

    /// Open a popup over the active tab.
    pub fn open_popup(
        &mut self,
        args: CreatePaneArgs,
        layout: PopupLayout,
        render: &RenderHandle,
    ) -> Result<u64, PaneError> {
        let pane_id = self.allocate_pane_id();
        let (area, row_offset) = self.tab_area();
        let Some(session_id) = self.active_session_id() else {
            return Err(PaneError::Spawn {
                command: args.command.join(" "),
                source: anyhow::anyhow!("no active session"),
            });
        };
        let Some(tab) = self.active_tab_mut() else {
            return Err(PaneError::Spawn {
                command: args.command.join(" "),
                source: anyhow::anyhow!("no active tab"),
            });
        };
        let tab_id = tab.id();
        let entry = layout.resolve(area, row_offset, 0, pane_id);

        let hooks = Self::make_hooks(session_id, tab_id, pane_id, render);
        let pane = Pane::create(pane_id, args, entry.size, hooks)?;
        let Some(tab) = self.active_tab_mut() else {
            unreachable!("active tab checked above");
        };
        let previous = tab.open_popup(pane, layout);
        drop(previous);
        Ok(pane_id)
    }

    /// Remove a pane; cascades through emptied tab, session, and state.
    /// Returns the pane to drop outside the lock.
    pub fn remove_pane(
        &mut self,
        session_id: u64,
        tab_id: u64,
        pane_id: u64,
    ) -> Option<RemovedPane> {
        let session = self
            .sessions
            .iter_mut()
            .find(|session| session.id() == session_id)?;
        let removed = session.remove_pane(tab_id, pane_id)?;
        if session.is_empty() {
            self.remove_session(session_id);
        } else if Some(session_id) == self.active_session {
            self.layout(None);
        }
        Some(RemovedPane(removed))
    }

    fn remove_session(&mut self, session_id: u64) {
        let Some(index) = self
            .sessions
            .iter()
            .position(|session| session.id() == session_id)
        else {
            return;
        };
        if self.active_session == Some(session_id) {
            let next = if self.sessions.len() == 1 {
                None
            } else if index + 1 < self.sessions.len() {
                Some(self.sessions[index + 1].id())
            } else {
                Some(self.sessions[index - 1].id())
            };
            self.set_active_session(next);
        }
        self.sessions.retain(|session| session.id() != session_id);
    }

    /// Record the highest ids seen in a snapshot so restored ids never
    /// collide with fresh ones.
    pub(crate) fn bump_ids(&mut self, pane_id: u64, tab_id: u64, session_id: u64) {
        self.next_pane_id = self.next_pane_id.max(pane_id + 1);
        self.next_tab_id = self.next_tab_id.max(tab_id + 1);
        self.next_session_id = self.next_session_id.max(session_id + 1);
    }

    pub(crate) fn insert_restored_session(&mut self, session: Session) {
        let id = session.id();
        self.sessions.push(session);
        if self.active_session.is_none() {
            self.set_active_session(Some(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::render_channel;
    use pretty_assertions::assert_eq;

    // Tests drive the state with mock panes via the tab layer; spawning
    // real processes is exercised by the binary.

    fn state_with_mock_tab() -> LayoutState {
        let mut state = LayoutState::new(Size::new(25, 80), true);
        let session_id = state.allocate_session_id();
        let mut session = Session::new(session_id, "main");
        let tab_id = state.allocate_tab_id();
        let mut tab = Tab::new(tab_id, "shell");
        tab.layout(Size::new(24, 80), 1, 0);
        let pane_id = state.allocate_pane_id();
        tab.insert_pane(Pane::create_mock(pane_id, Size::new(24, 80)), Direction::None)
            .unwrap();
        session.add_tab(tab);
        state.sessions.push(session);
        state.set_active_session(Some(session_id));
        state
    }

    #[test]
    fn status_bar_reserves_top_row() {
        let state = state_with_mock_tab();
        let tab = state.active_tab().unwrap();
        let entry = tab.layout_tree().entries()[0];
        assert_eq!(entry.row, 1);
        assert_eq!(entry.size.rows, 24);
    }

    #[test]
    fn removing_last_pane_cascades_to_exit() {
        let mut state = state_with_mock_tab();
        let session_id = state.active_session_id().unwrap();
        let tab_id = state.active_tab().unwrap().id();
        let pane_id = state.active_tab().unwrap().active_pane_id().unwrap();

        let removed = state.remove_pane(session_id, tab_id, pane_id);
        assert!(removed.is_some());
        assert!(state.is_empty());
        assert_eq!(state.active_session_id(), None);
    }

    #[test]
    fn hooks_translate_to_render_events() {
        let (handle, receiver) = render_channel();
        let hooks = LayoutState::make_hooks(1, 2, 3, &handle);
        (hooks.did_update)(3);
        (hooks.did_exit)(3);
        (hooks.did_selection)(b"hi".to_vec());

        assert_eq!(receiver.recv().unwrap(), RenderEvent::DoRender);
        assert_eq!(
            receiver.recv().unwrap(),
            RenderEvent::PaneExited {
                session_id: 1,
                tab_id: 2,
                pane_id: 3
            }
        );
        match receiver.recv().unwrap() {
            RenderEvent::WriteString(text) => {
                assert_eq!(text, "\x1b]52;c;aGk=\x1b\\");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
