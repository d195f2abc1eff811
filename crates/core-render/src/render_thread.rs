//! The render thread: drains the event queue, coalesces, and paints frames
//! at a bounded rate.
//!
//! Lock discipline: the thread takes the layout-state lock first, then each
//! pane's terminal lock one at a time while compositing. Panes removed on
//! `PaneExited` are dropped after the state lock is released, because
//! dropping a pane joins its threads.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use core_events::{InputMode, RenderEvent};
use core_layout::{Direction, LayoutChild, LayoutEntry, LayoutNode};
use core_pane::Pane;
use core_state::{LayoutState, Tab};
use core_term::{CellFlags, FontWeight, GraphicsRendition, SelectionPoint};

use crate::{RenderedCursor, Renderer};

/// 25 ms per frame.
const FRAME_INTERVAL: Duration = Duration::from_millis(25);

/// Everything the status bar shows besides the tabs themselves.
#[derive(Debug, Clone, Default)]
pub struct StatusContext {
    pub input_mode: InputMode,
}

pub struct RenderThread {
    thread: Option<JoinHandle<()>>,
}

impl RenderThread {
    /// Spawn the thread. `done` is set when the thread exits for any reason
    /// (explicit `Exit`, or the last pane going away).
    pub fn spawn(
        state: Arc<Mutex<LayoutState>>,
        events: Receiver<RenderEvent>,
        output: Box<dyn Write + Send>,
        done: Arc<AtomicBool>,
    ) -> std::io::Result<RenderThread> {
        let thread = std::thread::Builder::new()
            .name("render".to_owned())
            .spawn(move || {
                render_thread(state, events, output, Arc::clone(&done));
                done.store(true, Ordering::Release);
            })?;
        Ok(RenderThread {
            thread: Some(thread),
        })
    }

    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn render_thread(
    state: Arc<Mutex<LayoutState>>,
    events: Receiver<RenderEvent>,
    mut output: Box<dyn Write + Send>,
    done: Arc<AtomicBool>,
) {
    let mut renderer = Renderer::new();
    let mut status = StatusContext::default();
    let mut deadline = Instant::now();

    let mut process = |event: RenderEvent,
                       output: &mut Box<dyn Write + Send>,
                       status: &mut StatusContext,
                       removed: &mut Vec<core_state::RemovedPane>|
     -> bool {
        match event {
            RenderEvent::Size(size) => {
                state.lock().unwrap().layout(Some(size));
            }
            RenderEvent::PaneExited {
                session_id,
                tab_id,
                pane_id,
            } => {
                let mut state = state.lock().unwrap();
                if let Some(pane) = state.remove_pane(session_id, tab_id, pane_id) {
                    removed.push(pane);
                }
                if state.is_empty() {
                    return true;
                }
            }
            RenderEvent::InputStatus(mode) => status.input_mode = mode,
            RenderEvent::WriteString(text) => {
                let _ = output.write_all(text.as_bytes()).and_then(|_| output.flush());
            }
            RenderEvent::DoRender => {}
            RenderEvent::Exit => return true,
        }
        false
    };

    'main: loop {
        // Block for the first event, then drain and coalesce the rest.
        let first = match events.recv() {
            Ok(event) => event,
            Err(_) => break,
        };

        // Panes removed here are dropped after the state lock is released,
        // at the end of the batch.
        let mut removed = Vec::new();
        let mut exit = process(first, &mut output, &mut status, &mut removed);
        while let Ok(event) = events.try_recv() {
            exit |= process(event, &mut output, &mut status, &mut removed);
        }
        drop(removed);
        if exit || done.load(Ordering::Acquire) {
            break;
        }

        // Frame pacing: catch the deadline up rather than accumulating debt
        // when a frame overruns.
        let now = Instant::now();
        while deadline < now {
            deadline += FRAME_INTERVAL;
        }
        std::thread::sleep(deadline.saturating_duration_since(Instant::now()));

        // Coalesce anything that arrived while we slept.
        let mut removed = Vec::new();
        let mut exit = false;
        loop {
            match events.recv_timeout(Duration::ZERO) {
                Ok(event) => exit |= process(event, &mut output, &mut status, &mut removed),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    exit = true;
                    break;
                }
            }
        }
        drop(removed);
        if exit {
            break 'main;
        }

        render_frame(&state, &mut renderer, &mut output, &status);
    }
    tracing::info!(target: "render", "render thread exiting");
}

/// Composite one frame under the state lock.
pub fn render_frame(
    state: &Arc<Mutex<LayoutState>>,
    renderer: &mut Renderer,
    output: &mut dyn Write,
    status: &StatusContext,
) {
    let state = state.lock().unwrap();
    let Some(tab) = state.active_tab() else {
        return;
    };

    renderer.start(state.size());

    if state.show_status_bar() {
        draw_status_bar(renderer, &state, status);
    }

    let mut cursor = None;
    draw_node(renderer, tab, tab.layout_tree(), &state, &mut cursor);

    if let Some(entry) = tab.popup_entry() {
        if let Some(pane) = tab.pane(entry.pane_id) {
            // Overlapping panes have no damage tracking; repaint fully.
            pane.terminal().lock().unwrap().invalidate_all();
            draw_pane(renderer, tab, &entry, pane, &mut cursor);
        }
    }

    let cursor = cursor.unwrap_or(RenderedCursor {
        hidden: true,
        ..Default::default()
    });
    if let Err(error) = renderer.finish(output, &cursor) {
        tracing::warn!(target: "render", ?error, "failed to write frame");
    }
}

fn draw_status_bar(renderer: &mut Renderer, state: &LayoutState, status: &StatusContext) {
    let plain = GraphicsRendition::default();
    let bold = GraphicsRendition {
        font_weight: FontWeight::Bold,
        ..Default::default()
    };

    renderer.set_bound(0, 0, state.size().cols, 1);
    renderer.clear_row(0, &plain);
    renderer.put_text(status.input_mode.as_str(), 0, 0, &bold);

    let Some(session) = state.active_session() else {
        return;
    };
    let mut text = String::new();
    for (index, tab) in session.tabs().iter().enumerate() {
        if !text.is_empty() {
            text.push(' ');
        }
        let sign = if Some(tab.id()) == session.active_tab_id() {
            if tab.full_screen_pane_id().is_some() {
                '+'
            } else {
                '*'
            }
        } else {
            ' '
        };
        text.push_str(&format!("[{}{} {}]", sign, index + 1, tab.name()));
    }
    renderer.put_text(&text, 0, 8, &plain);
}

fn draw_node(
    renderer: &mut Renderer,
    tab: &Tab,
    node: &LayoutNode,
    state: &LayoutState,
    cursor: &mut Option<RenderedCursor>,
) {
    let mut first = true;
    for child in &node.children {
        if !first {
            draw_border(renderer, state, node.direction, child);
        }
        first = false;
        match child {
            LayoutChild::Node(inner) => draw_node(renderer, tab, inner, state, cursor),
            LayoutChild::Entry(entry) => {
                if let Some(pane) = tab.pane(entry.pane_id) {
                    draw_pane(renderer, tab, entry, pane, cursor);
                }
            }
        }
    }
}

fn draw_border(
    renderer: &mut Renderer,
    state: &LayoutState,
    direction: Direction,
    child: &LayoutChild,
) {
    let (row, col, size) = match child {
        LayoutChild::Node(node) => (node.row, node.col, node.size),
        LayoutChild::Entry(entry) => (entry.row, entry.col, entry.size),
    };
    let plain = GraphicsRendition::default();
    renderer.set_bound(0, 0, state.size().cols, state.size().rows);
    match direction {
        Direction::Horizontal => {
            for r in row..row + size.rows {
                renderer.put_text("│", r, col - 1, &plain);
            }
        }
        Direction::Vertical => {
            for c in col..col + size.cols {
                renderer.put_text("─", row - 1, c, &plain);
            }
        }
        Direction::None => {}
    }
}

fn draw_pane(
    renderer: &mut Renderer,
    tab: &Tab,
    entry: &LayoutEntry,
    pane: &Pane,
    cursor: &mut Option<RenderedCursor>,
) {
    renderer.set_bound(entry.row, entry.col, entry.size.cols, entry.size.rows);

    let mut terminal = pane.terminal().lock().unwrap();
    if terminal.allowed_to_draw() {
        let repaint_all = terminal.screen().whole_screen_dirty() || renderer.size_changed();
        let reverse_video = terminal.reverse_video();
        let col_offset = pane.horizontal_scroll_offset();
        let screen = terminal.screen();
        let selection_base = screen.visual_scroll_offset();

        let blank = GraphicsRendition {
            inverted: reverse_video,
            ..Default::default()
        };

        for r in 0..entry.size.rows {
            let Some((row, ids)) = screen.visible_row(r) else {
                // Nothing was ever written here; erase whatever a previous
                // layout left behind.
                if repaint_all {
                    renderer.clear_row(r, &blank);
                }
                continue;
            };
            let mut visual_col = 0u32;
            let mut col = col_offset as usize;
            while (visual_col as usize) < entry.size.cols as usize && col < row.cells.len() {
                let cell = &row.cells[col];
                if cell.is_nonprimary_in_multi_cell() {
                    col += 1;
                    continue;
                }
                let dirty = repaint_all || cell.dirty() || cell.flags.contains(CellFlags::STALE);
                let info = ids.multi_cell_info(cell.multi_cell_id);
                let width = u16::from(info.compute_width()).max(1);
                if dirty {
                    let mut rendition = ids.graphics_rendition(cell.graphics_id).clone();
                    if reverse_video {
                        rendition.inverted = !rendition.inverted;
                    }
                    let selected = screen.in_selection(SelectionPoint::new(
                        selection_base + u64::from(r),
                        visual_col,
                    ));
                    if selected {
                        rendition.inverted = !rendition.inverted;
                    }
                    let hyperlink = ids.hyperlink(cell.hyperlink_id);
                    renderer.put_cell(
                        row.cell_text(col),
                        width,
                        r,
                        visual_col,
                        &rendition,
                        hyperlink,
                    );
                }
                visual_col += u32::from(width);
                col += width as usize;
            }
            // Blank the stretch past the row's stored cells.
            if repaint_all {
                while visual_col < entry.size.cols {
                    renderer.put_cell("", 1, r, visual_col, &blank, None);
                    visual_col += 1;
                }
            }
        }
    }

    let screen = terminal.screen();
    let terminal_cursor = screen.cursor();
    let pane_cursor = RenderedCursor {
        row: entry.row + terminal_cursor.row,
        col: entry.col + terminal_cursor.col,
        style: terminal.cursor_style(),
        hidden: terminal.cursor_hidden() || !screen.visual_scroll_at_bottom(),
    };
    if terminal.allowed_to_draw() {
        terminal.screen_mut().clear_damage();
    }
    drop(terminal);

    if tab.active_pane_id() == Some(entry.pane_id) {
        *cursor = Some(pane_cursor);
    }
}
