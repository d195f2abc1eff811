//! The input thread: host-terminal bytes to key-bind dispatch.
//!
//! One thread blocks on stdin. Decoded key events consult the binding table
//! for the current input mode; mouse events are routed by hit testing the
//! active tab's layout; focus and paste events go to the active pane.
//!
//! Shutdown is cooperative: whoever flips `done` also writes a DA1 query to
//! the host terminal, whose reply unblocks the read.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use core_events::{
    InputMode, KeyEvent, KeyEventType, MouseEvent, MouseEventType, PasteEvent, RenderEvent,
    RenderHandle,
};
use core_input::{InputEvent, TerminalInputParser};
use core_state::{LayoutState, SaveLayoutThread};

use crate::actions::ActionContext;
use crate::key_bind::KeyBind;

pub struct InputThreadArgs {
    pub state: Arc<Mutex<LayoutState>>,
    pub render: RenderHandle,
    pub save_layout: Option<Arc<SaveLayoutThread>>,
    pub binds: Vec<KeyBind>,
    pub command: Vec<String>,
    pub done: Arc<AtomicBool>,
}

pub fn spawn(args: InputThreadArgs) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("input".to_owned())
        .spawn(move || input_thread(args))
}

fn input_thread(args: InputThreadArgs) {
    let InputThreadArgs {
        state,
        render,
        save_layout,
        binds,
        command,
        done,
    } = args;

    let mut parser = TerminalInputParser::new();
    let mut mode = InputMode::Insert;
    let mut stdin = std::io::stdin().lock();
    let mut buffer = vec![0u8; 4096];

    while !done.load(Ordering::Acquire) {
        let nread = match stdin.read(&mut buffer) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        if done.load(Ordering::Acquire) {
            break;
        }

        for event in parser.parse(&buffer[..nread]) {
            if done.load(Ordering::Acquire) {
                break;
            }
            match event {
                InputEvent::Key(key) => {
                    handle_key(
                        &key,
                        &mut mode,
                        &binds,
                        &state,
                        &render,
                        save_layout.as_deref(),
                        &command,
                        &done,
                    );
                }
                InputEvent::Mouse(mouse) => handle_mouse(&mouse, &state, &render),
                InputEvent::Focus(focus) => {
                    let mut state = state.lock().unwrap();
                    if let Some(pane) = state.active_pane_mut() {
                        pane.focus_event(focus);
                    }
                }
                InputEvent::Paste(paste) => handle_paste(&paste, &state, &render),
            }
        }
    }

    render.request_exit();
    done.store(true, Ordering::Release);
    tracing::info!(target: "input", "input thread exiting");
}

#[allow(clippy::too_many_arguments)]
fn handle_key(
    event: &KeyEvent,
    mode: &mut InputMode,
    binds: &[KeyBind],
    state: &Arc<Mutex<LayoutState>>,
    render: &RenderHandle,
    save_layout: Option<&SaveLayoutThread>,
    command: &[String],
    done: &AtomicBool,
) {
    // Outside insert mode, releases and bare modifiers neither fire binds
    // nor change modes.
    if *mode != InputMode::Insert
        && (event.kind == KeyEventType::Release || event.key.is_modifier_key())
    {
        return;
    }

    for bind in binds {
        if !bind.matches(event, *mode) {
            continue;
        }
        let context = ActionContext {
            key_event: event,
            state,
            render,
            save_layout,
            command,
            done,
        };
        bind.action.apply(&context);
        if *mode != bind.next_mode {
            *mode = bind.next_mode;
            render.push(RenderEvent::InputStatus(*mode));
        }
        return;
    }
}

fn handle_mouse(event: &MouseEvent, state: &Arc<Mutex<LayoutState>>, render: &RenderHandle) {
    let mut state = state.lock().unwrap();
    let size = state.size();
    let Some(tab) = state.active_tab_mut() else {
        return;
    };

    let row = event.position.in_cells().y();
    let col = event.position.in_cells().x();

    // The popup floats above the layout and swallows events inside it;
    // clicking outside it asks the popup's process to leave.
    if let Some(entry) = tab.popup_entry() {
        if entry.contains(row, col) {
            if event.kind != MouseEventType::Move {
                tab.set_active(Some(entry.pane_id));
            }
            let translated = event_in_pane(event, entry.row, entry.col, &size);
            if let Some(pane) = tab.pane_mut(entry.pane_id) {
                if pane.mouse_event(&translated) {
                    render.request_render();
                }
            }
            return;
        }
        if event.kind == MouseEventType::Press {
            if let Some(pane) = tab.pane_mut(entry.pane_id) {
                pane.exit();
            }
        }
    }

    let Some(entry) = tab.layout_tree().hit_test(row, col).copied() else {
        return;
    };
    if event.kind != MouseEventType::Move {
        tab.set_active(Some(entry.pane_id));
    }
    if tab.active_pane_id() == Some(entry.pane_id) {
        let translated = event_in_pane(event, entry.row, entry.col, &size);
        if let Some(pane) = tab.pane_mut(entry.pane_id) {
            if pane.mouse_event(&translated) {
                render.request_render();
            }
        }
    }
}

fn event_in_pane(
    event: &MouseEvent,
    row_offset: u32,
    col_offset: u32,
    size: &core_events::Size,
) -> MouseEvent {
    let mut translated = *event;
    translated.position =
        event
            .position
            .translate(-i64::from(col_offset), -i64::from(row_offset), size);
    translated
}

fn handle_paste(event: &PasteEvent, state: &Arc<Mutex<LayoutState>>, render: &RenderHandle) {
    let mut state = state.lock().unwrap();
    if let Some(pane) = state.active_pane_mut() {
        pane.paste_event(event);
        drop(state);
        render.request_render();
    }
}
