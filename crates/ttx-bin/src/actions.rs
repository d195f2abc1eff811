//! Actions: everything a key binding can do to the multiplexer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use core_events::{KeyEvent, RenderHandle};
use core_layout::{Direction, NavigateDirection, ResizeDirection};
use core_pane::CreatePaneArgs;
use core_state::{LayoutState, SaveLayoutThread};

/// Everything an action may touch. Actions run on the input thread and take
/// the state lock themselves.
pub struct ActionContext<'a> {
    pub key_event: &'a KeyEvent,
    pub state: &'a Arc<Mutex<LayoutState>>,
    pub render: &'a RenderHandle,
    pub save_layout: Option<&'a SaveLayoutThread>,
    pub command: &'a [String],
    pub done: &'a AtomicBool,
}

impl ActionContext<'_> {
    fn args(&self) -> CreatePaneArgs {
        CreatePaneArgs {
            command: self.command.to_vec(),
            cwd: None,
        }
    }

    fn layout_changed(&self) {
        if let Some(save) = self.save_layout {
            save.request_save();
        }
        self.render.request_render();
    }
}

type Apply = Box<dyn Fn(&ActionContext<'_>) + Send + Sync>;

pub struct Action {
    pub description: String,
    apply: Apply,
}

impl Action {
    fn new(description: impl Into<String>, apply: impl Fn(&ActionContext<'_>) + Send + Sync + 'static) -> Action {
        Action {
            description: description.into(),
            apply: Box::new(apply),
        }
    }

    pub fn apply(&self, context: &ActionContext<'_>) {
        (self.apply)(context);
    }
}

pub fn enter_normal_mode() -> Action {
    Action::new("Enter normal mode, enabling the other key bindings", |_| {})
}

pub fn reset_mode() -> Action {
    Action::new(
        "Return to insert mode; keys are forwarded to the application again",
        |_| {},
    )
}

pub fn send_to_pane() -> Action {
    // The state lock is held across the write so the pane cannot be
    // destroyed under us.
    Action::new("Forward the key press to the active pane", |context| {
        let mut state = context.state.lock().unwrap();
        if let Some(pane) = state.active_pane_mut() {
            pane.key_event(context.key_event);
        }
    })
}

pub fn navigate(direction: NavigateDirection) -> Action {
    Action::new(
        format!("Focus the nearest pane {direction:?} of the active one"),
        move |context| {
            let mut state = context.state.lock().unwrap();
            if let Some(tab) = state.active_tab_mut() {
                tab.navigate(direction);
            }
            drop(state);
            context.render.request_render();
        },
    )
}

pub fn resize(direction: ResizeDirection, amount: i32) -> Action {
    let verb = if amount > 0 { "Grow" } else { "Shrink" };
    Action::new(
        format!("{verb} the active pane's {direction:?} border by {} cells", amount.abs()),
        move |context| {
            let mut state = context.state.lock().unwrap();
            if let Some(tab) = state.active_tab_mut() {
                let Some(pane_id) = tab.active_pane_id() else {
                    return;
                };
                let tree = tab.layout_tree().clone();
                let needs_layout = tab.layout_root_mut().resize(&tree, pane_id, direction, amount);
                if needs_layout {
                    state.layout(None);
                }
            }
            drop(state);
            context.layout_changed();
        },
    )
}

pub fn add_pane(direction: Direction) -> Action {
    Action::new(
        format!("Split the active pane, placing the new pane {direction:?}"),
        move |context| {
            let result = {
                let mut state = context.state.lock().unwrap();
                state.add_pane(context.args(), direction, context.render)
            };
            if let Err(error) = result {
                tracing::warn!(target: "action", ?error, "failed to add pane");
            }
            context.layout_changed();
        },
    )
}

pub fn create_tab() -> Action {
    Action::new("Create a new tab", |context| {
        let result = {
            let mut state = context.state.lock().unwrap();
            state.add_tab(context.args(), context.render)
        };
        if let Err(error) = result {
            tracing::warn!(target: "action", ?error, "failed to create tab");
        }
        context.layout_changed();
    })
}

pub fn switch_tab(index: usize) -> Action {
    debug_assert!(index > 0);
    Action::new(format!("Switch to tab {index}"), move |context| {
        let mut state = context.state.lock().unwrap();
        if let Some(session) = state.active_session_mut() {
            if let Some(tab) = session.tabs().get(index - 1) {
                let id = tab.id();
                session.set_active_tab(Some(id));
            }
        }
        drop(state);
        context.render.request_render();
    })
}

pub fn next_tab() -> Action {
    Action::new("Switch to the next tab", |context| {
        let mut state = context.state.lock().unwrap();
        if let Some(session) = state.active_session_mut() {
            session.next_tab();
        }
        drop(state);
        context.render.request_render();
    })
}

pub fn previous_tab() -> Action {
    Action::new("Switch to the previous tab", |context| {
        let mut state = context.state.lock().unwrap();
        if let Some(session) = state.active_session_mut() {
            session.previous_tab();
        }
        drop(state);
        context.render.request_render();
    })
}

pub fn toggle_full_screen_pane() -> Action {
    Action::new("Toggle the active pane between full screen and tiled", |context| {
        let mut state = context.state.lock().unwrap();
        if let Some(tab) = state.active_tab_mut() {
            let target = if tab.full_screen_pane_id().is_some() {
                None
            } else {
                tab.active_pane_id()
            };
            tab.set_full_screen(target);
        }
        drop(state);
        context.render.request_render();
    })
}

pub fn exit_pane() -> Action {
    Action::new("Ask the active pane's process to exit", |context| {
        let state = context.state.lock().unwrap();
        if let Some(pane) = state
            .active_tab()
            .and_then(|tab| tab.active_pane_id().and_then(|id| tab.pane(id)))
        {
            pane.exit();
        }
        drop(state);
        context.render.request_render();
    })
}

pub fn scroll(rows: i32) -> Action {
    let direction = if rows < 0 { "up" } else { "down" };
    Action::new(
        format!("Scroll the active pane {direction} by {} rows", rows.abs()),
        move |context| {
            let mut state = context.state.lock().unwrap();
            if let Some(pane) = state.active_pane_mut() {
                pane.scroll_by(rows);
            }
            drop(state);
            context.render.request_render();
        },
    )
}

pub fn scroll_horizontal(cols: i32) -> Action {
    let direction = if cols < 0 { "left" } else { "right" };
    Action::new(
        format!("Scroll the active pane {direction} by {} columns", cols.abs()),
        move |context| {
            let mut state = context.state.lock().unwrap();
            if let Some(pane) = state.active_pane_mut() {
                pane.scroll_horizontal(cols);
            }
            drop(state);
            context.render.request_render();
        },
    )
}

pub fn save_layout() -> Action {
    Action::new("Write the layout snapshot now", |context| {
        if let Some(save) = context.save_layout {
            save.request_save();
        }
    })
}

pub fn save_pane_state(path: std::path::PathBuf) -> Action {
    Action::new(
        format!("Save the active pane's screen to {}", path.display()),
        move |context| {
            let contents = {
                let state = context.state.lock().unwrap();
                state
                    .active_tab()
                    .and_then(|tab| tab.active_pane_id().and_then(|id| tab.pane(id)))
                    .map(|pane| pane.state_as_escape_sequences())
            };
            if let Some(contents) = contents {
                if let Err(error) = std::fs::write(&path, contents) {
                    tracing::warn!(target: "action", ?error, "failed to save pane state");
                }
            }
        },
    )
}

pub fn quit() -> Action {
    Action::new("Quit", |context| {
        context.done.store(true, Ordering::Release);
        context.render.request_exit();
    })
}
