//! A pane: one pseudo-terminal, one child process, one terminal emulator.
//!
//! Two threads serve each pane. The *reader* drains the pty, decodes and
//! parses the byte stream, and applies it to the terminal under the pane's
//! terminal mutex. The *waiter* blocks on the child process and raises
//! `did_exit` when it is reaped. Everything else happens on the caller's
//! thread under the layout-state lock.
//!
//! Lock ordering: the pane's terminal mutex is the innermost lock in the
//! program; nothing is acquired while holding it.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

use portable_pty::{
    Child as _, CommandBuilder, MasterPty, PtySize, PtySystem as _, SlavePty as _,
    native_pty_system,
};

use core_events::{
    FocusEvent, KeyEvent, MouseButton, MouseClickTracker, MouseEvent, MouseEventType,
    MouseScrollProtocol, PasteEvent, Size, serialize_focus_event, serialize_key_event,
    serialize_mouse_event, serialize_paste_event,
};
use core_layout::LayoutPane;
use core_term::{SelectionPoint, Terminal, TerminalEvent};
use core_vt::{EscapeSequenceParser, ParserMode, Utf8StreamDecoder};

/// How a new pane's child process is launched.
#[derive(Debug, Clone, Default)]
pub struct CreatePaneArgs {
    pub command: Vec<String>,
    pub cwd: Option<PathBuf>,
}

/// Callbacks a pane raises from its own threads. All receive the pane id;
/// none may take locks ordered above the terminal mutex.
pub struct PaneHooks {
    pub did_exit: Box<dyn Fn(u64) + Send + Sync>,
    pub did_update: Box<dyn Fn(u64) + Send + Sync>,
    /// Selected text (or an OSC 52 payload from the child) to publish to the
    /// host clipboard.
    pub did_selection: Box<dyn Fn(Vec<u8>) + Send + Sync>,
    /// APC payload to forward to the host terminal.
    pub apc_passthrough: Box<dyn Fn(String) + Send + Sync>,
}

impl PaneHooks {
    /// Hooks that do nothing, for tests.
    pub fn noop() -> PaneHooks {
        PaneHooks {
            did_exit: Box::new(|_| {}),
            did_update: Box::new(|_| {}),
            did_selection: Box::new(|_| {}),
            apc_passthrough: Box::new(|_| {}),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PaneError {
    #[error("failed to open pseudo terminal")]
    OpenPty(#[source] anyhow::Error),
    #[error("failed to spawn `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to set up pty plumbing")]
    Plumbing(#[source] anyhow::Error),
}

const READ_BUFFER_SIZE: usize = 16 * 1024;

pub struct Pane {
    id: u64,
    command: Vec<String>,
    cwd: Option<PathBuf>,

    terminal: Arc<Mutex<Terminal>>,
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    master: Option<Box<dyn MasterPty + Send>>,
    child_pid: Option<u32>,
    done: Arc<AtomicBool>,

    size: Size,
    horizontal_scroll_offset: u32,
    last_mouse_position: Option<core_events::MousePosition>,
    click_tracker: MouseClickTracker,
    selecting: bool,

    hooks: Arc<PaneHooks>,
    reader_thread: Option<JoinHandle<()>>,
    waiter_thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Pane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pane")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("cwd", &self.cwd)
            .field("child_pid", &self.child_pid)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl Pane {
    /// Open a pty, spawn the command in a new session on its subordinate
    /// side, and start the reader and waiter threads.
    pub fn create(
        id: u64,
        args: CreatePaneArgs,
        size: Size,
        hooks: PaneHooks,
    ) -> Result<Pane, PaneError> {
        let Some((program, arguments)) = args.command.split_first() else {
            return Err(PaneError::Spawn {
                command: String::new(),
                source: anyhow::anyhow!("empty command"),
            });
        };
        let pty_size = PtySize {
            rows: size.rows.min(u16::MAX as u32) as u16,
            cols: size.cols.min(u16::MAX as u32) as u16,
            pixel_width: size.xpixels.min(u16::MAX as u32) as u16,
            pixel_height: size.ypixels.min(u16::MAX as u32) as u16,
        };
        let pair = native_pty_system()
            .openpty(pty_size)
            .map_err(PaneError::OpenPty)?;

        let mut builder = CommandBuilder::new(program);
        builder.args(arguments);
        if let Some(cwd) = &args.cwd {
            builder.cwd(cwd);
        }
        builder.env("TERM", "xterm-256color");

        let mut child = pair
            .slave
            .spawn_command(builder)
            .map_err(|source| PaneError::Spawn {
                command: args.command.join(" "),
                source,
            })?;
        // The subordinate side lives on in the child.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(PaneError::Plumbing)?;
        let writer = pair.master.take_writer().map_err(PaneError::Plumbing)?;

        let hooks = Arc::new(hooks);
        let terminal = Arc::new(Mutex::new(Terminal::new(size)));
        let writer = Arc::new(Mutex::new(writer));
        let done = Arc::new(AtomicBool::new(false));
        let child_pid = child.process_id();

        let reader_thread = {
            let terminal = Arc::clone(&terminal);
            let writer = Arc::clone(&writer);
            let hooks = Arc::clone(&hooks);
            let done = Arc::clone(&done);
            std::thread::Builder::new()
                .name(format!("pane-{id}-reader"))
                .spawn(move || reader_thread(id, reader, terminal, writer, hooks, done))
                .map_err(|error| PaneError::Plumbing(error.into()))?
        };

        let waiter_thread = {
            let hooks = Arc::clone(&hooks);
            let done = Arc::clone(&done);
            std::thread::Builder::new()
                .name(format!("pane-{id}-waiter"))
                .spawn(move || {
                    if let Err(error) = child.wait() {
                        tracing::debug!(target: "pane", pane = id, ?error, "child wait failed");
                    }
                    done.store(true, Ordering::Release);
                    (hooks.did_exit)(id);
                })
                .map_err(|error| PaneError::Plumbing(error.into()))?
        };

        tracing::info!(target: "pane", pane = id, command = ?args.command, "pane created");
        Ok(Pane {
            id,
            command: args.command,
            cwd: args.cwd,
            terminal,
            writer,
            master: Some(pair.master),
            child_pid,
            done,
            size,
            horizontal_scroll_offset: 0,
            last_mouse_position: None,
            click_tracker: MouseClickTracker::default(),
            selecting: false,
            hooks,
            reader_thread: Some(reader_thread),
            waiter_thread: Some(waiter_thread),
        })
    }

    /// A pane with no pty and no threads, for tests and layout plumbing.
    pub fn create_mock(id: u64, size: Size) -> Pane {
        Pane {
            id,
            command: Vec::new(),
            cwd: None,
            terminal: Arc::new(Mutex::new(Terminal::new(size))),
            writer: Arc::new(Mutex::new(Box::new(std::io::sink()))),
            master: None,
            child_pid: None,
            done: Arc::new(AtomicBool::new(false)),
            size,
            horizontal_scroll_offset: 0,
            last_mouse_position: None,
            click_tracker: MouseClickTracker::default(),
            selecting: false,
            hooks: Arc::new(PaneHooks::noop()),
            reader_thread: None,
            waiter_thread: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn cwd(&self) -> Option<&PathBuf> {
        self.cwd.as_ref()
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn horizontal_scroll_offset(&self) -> u32 {
        self.horizontal_scroll_offset
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// The terminal mutex; the render thread locks this per frame.
    pub fn terminal(&self) -> &Arc<Mutex<Terminal>> {
        &self.terminal
    }

    fn write_to_child(&self, bytes: &[u8]) {
        let mut writer = self.writer.lock().unwrap();
        if let Err(error) = writer.write_all(bytes).and_then(|_| writer.flush()) {
            tracing::debug!(target: "pane", pane = self.id, ?error, "pty write failed");
        }
    }

    /// Forward a key event, encoded per the child's reporting modes.
    /// Returns whether anything was sent.
    pub fn key_event(&mut self, event: &KeyEvent) -> bool {
        let (cursor_keys, flags) = {
            let terminal = self.terminal.lock().unwrap();
            (
                terminal.application_cursor_keys_mode(),
                terminal.key_reporting_flags(),
            )
        };
        match serialize_key_event(event, cursor_keys, flags) {
            Some(encoded) => {
                self.write_to_child(encoded.as_bytes());
                true
            }
            None => false,
        }
    }

    /// Forward a mouse event. Events the child does not subscribe to drive
    /// selection and visual scrolling instead.
    pub fn mouse_event(&mut self, event: &MouseEvent) -> bool {
        let (protocol, encoding, scroll_protocol, size) = {
            let terminal = self.terminal.lock().unwrap();
            (
                terminal.mouse_protocol(),
                terminal.mouse_encoding(),
                MouseScrollProtocol {
                    alternate_scroll_mode: terminal.alternate_scroll_mode(),
                    application_cursor_keys_mode: terminal.application_cursor_keys_mode(),
                    in_alternate_screen_buffer: terminal.in_alternate_screen_buffer(),
                },
                terminal.size(),
            )
        };

        let encoded = serialize_mouse_event(
            event,
            protocol,
            encoding,
            &self.last_mouse_position,
            &scroll_protocol,
            &size,
        );
        self.last_mouse_position = Some(event.position);
        if let Some(encoded) = encoded {
            self.write_to_child(&encoded);
            return true;
        }

        // Wheel scrolling of our own scroll-back.
        if event.kind == MouseEventType::Press {
            if event.button == MouseButton::SCROLL_UP {
                self.scroll_by(-1);
                return true;
            }
            if event.button == MouseButton::SCROLL_DOWN {
                self.scroll_by(1);
                return true;
            }
        }

        self.handle_selection_event(event)
    }

    fn handle_selection_event(&mut self, event: &MouseEvent) -> bool {
        let clicks = self.click_tracker.track(event, Instant::now());
        let col = event.position.in_cells().x();
        let row = event.position.in_cells().y();

        match event.kind {
            MouseEventType::Press if event.button == MouseButton::LEFT => {
                let mut terminal = self.terminal.lock().unwrap();
                let screen = terminal.screen_mut();
                let absolute = screen.visual_scroll_offset() + u64::from(row);
                match clicks {
                    2 => select_word(screen, absolute, col),
                    3 => select_line(screen, absolute),
                    _ => screen.begin_selection(SelectionPoint::new(absolute, col)),
                }
                self.selecting = true;
                true
            }
            MouseEventType::Move if self.selecting => {
                let mut terminal = self.terminal.lock().unwrap();
                let screen = terminal.screen_mut();
                let absolute = screen.visual_scroll_offset() + u64::from(row);
                screen.update_selection(SelectionPoint::new(absolute, col));
                true
            }
            MouseEventType::Release if self.selecting => {
                self.selecting = false;
                let text = {
                    let terminal = self.terminal.lock().unwrap();
                    terminal.screen().selected_text()
                };
                if !text.is_empty() {
                    (self.hooks.did_selection)(text.into_bytes());
                }
                true
            }
            _ => false,
        }
    }

    pub fn focus_event(&mut self, event: FocusEvent) -> bool {
        let mode = self.terminal.lock().unwrap().focus_event_mode();
        match serialize_focus_event(event, mode) {
            Some(encoded) => {
                self.write_to_child(encoded.as_bytes());
                true
            }
            None => false,
        }
    }

    pub fn paste_event(&mut self, event: &PasteEvent) -> bool {
        let mode = self.terminal.lock().unwrap().bracketed_paste_mode();
        let encoded = serialize_paste_event(event, mode);
        self.write_to_child(encoded.as_bytes());
        true
    }

    /// Scroll the view: positive rows go toward the bottom.
    pub fn scroll_by(&mut self, rows: i32) {
        let mut terminal = self.terminal.lock().unwrap();
        let screen = terminal.screen_mut();
        if rows < 0 {
            screen.visual_scroll_up(rows.unsigned_abs() as u64);
        } else {
            screen.visual_scroll_down(rows as u64);
        }
    }

    pub fn scroll_horizontal(&mut self, cols: i32) {
        let max = {
            let terminal = self.terminal.lock().unwrap();
            terminal.size().cols.saturating_sub(self.size.cols)
        };
        self.horizontal_scroll_offset = self
            .horizontal_scroll_offset
            .saturating_add_signed(cols)
            .min(max);
    }

    pub fn clear_selection(&mut self) {
        self.terminal.lock().unwrap().screen_mut().clear_selection();
        self.selecting = false;
    }

    pub fn invalidate_all(&mut self) {
        self.terminal.lock().unwrap().invalidate_all();
    }

    /// The active screen's full state as escape sequences, for save-state.
    pub fn state_as_escape_sequences(&self) -> String {
        self.terminal.lock().unwrap().state_as_escape_sequences()
    }

    /// Resize the terminal and the pty. On shrink the emulator clamps its
    /// cursor; the kernel delivers SIGWINCH to the child.
    pub fn resize_to(&mut self, size: Size) {
        if size.rows == 0 || size.cols == 0 {
            return;
        }
        self.size = size;
        self.terminal.lock().unwrap().set_visible_size(size);
        if let Some(master) = &self.master {
            let result = master.resize(PtySize {
                rows: size.rows.min(u16::MAX as u32) as u16,
                cols: size.cols.min(u16::MAX as u32) as u16,
                pixel_width: size.xpixels.min(u16::MAX as u32) as u16,
                pixel_height: size.ypixels.min(u16::MAX as u32) as u16,
            });
            if let Err(error) = result {
                tracing::debug!(target: "pane", pane = self.id, ?error, "pty resize failed");
            }
        }
    }

    /// Ask the child to leave by hanging up its controlling terminal.
    pub fn exit(&self) {
        if let Some(pid) = self.child_pid {
            // SAFETY: plain signal delivery to a process we spawned.
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGHUP);
            }
        }
    }
}

impl Drop for Pane {
    fn drop(&mut self) {
        self.exit();
        // Closing the master wakes the reader with EOF.
        self.master.take();
        if let Some(thread) = self.reader_thread.take() {
            let _ = thread.join();
        }
        if let Some(thread) = self.waiter_thread.take() {
            let _ = thread.join();
        }
        tracing::info!(target: "pane", pane = self.id, "pane dropped");
    }
}

impl LayoutPane for Pane {
    fn id(&self) -> u64 {
        self.id
    }

    fn resize(&mut self, size: Size) {
        if self.size != size {
            self.resize_to(size);
        }
    }
}

fn reader_thread(
    id: u64,
    mut reader: Box<dyn Read + Send>,
    terminal: Arc<Mutex<Terminal>>,
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    hooks: Arc<PaneHooks>,
    done: Arc<AtomicBool>,
) {
    let mut decoder = Utf8StreamDecoder::new();
    let mut parser = EscapeSequenceParser::new(ParserMode::Application);
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let nread = match reader.read(&mut buffer) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        if done.load(Ordering::Acquire) {
            break;
        }

        let text = decoder.decode(&buffer[..nread]);
        let events = parser.parse(&text);
        if events.is_empty() {
            continue;
        }

        let outgoing = {
            let mut terminal = terminal.lock().unwrap();
            terminal.on_parser_results(&events);
            terminal.take_outgoing_events()
        };
        for event in outgoing {
            match event {
                TerminalEvent::Reply(bytes) => {
                    let mut writer = writer.lock().unwrap();
                    let _ = writer.write_all(&bytes).and_then(|_| writer.flush());
                }
                TerminalEvent::SetClipboard(bytes) => (hooks.did_selection)(bytes),
                TerminalEvent::ApcPassthrough(data) => (hooks.apc_passthrough)(data),
            }
        }
        (hooks.did_update)(id);
    }
    tracing::debug!(target: "pane", pane = id, "reader finished");
}

/// Expand a double-click to the run of non-blank cells around `col`.
fn select_word(screen: &mut core_term::Screen, absolute_row: u64, col: u32) {
    let (start, end) = {
        let Some((row, _)) = screen.find_row(absolute_row) else {
            return;
        };
        let cols = row.cells.len() as u32;
        let col = col.min(cols.saturating_sub(1));
        let is_blank = |c: u32| {
            let text = row.cell_text(c as usize);
            text.is_empty() || text == " "
        };
        if is_blank(col) {
            (col, col)
        } else {
            let mut start = col;
            while start > 0 && !is_blank(start - 1) {
                start -= 1;
            }
            let mut end = col;
            while end + 1 < cols && !is_blank(end + 1) {
                end += 1;
            }
            (start, end)
        }
    };
    screen.begin_selection(SelectionPoint::new(absolute_row, start));
    screen.update_selection(SelectionPoint::new(absolute_row, end));
}

/// Expand a triple-click to the whole row.
fn select_line(screen: &mut core_term::Screen, absolute_row: u64) {
    let cols = screen
        .find_row(absolute_row)
        .map(|(row, _)| row.cells.len() as u32)
        .unwrap_or(1);
    screen.begin_selection(SelectionPoint::new(absolute_row, 0));
    screen.update_selection(SelectionPoint::new(absolute_row, cols.saturating_sub(1)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::{Key, Modifiers, MouseCoordinate, MousePosition};

    fn feed(pane: &Pane, input: &str) {
        let mut parser = EscapeSequenceParser::new(ParserMode::Application);
        let events = parser.parse(input);
        pane.terminal().lock().unwrap().on_parser_results(&events);
    }

    #[test]
    fn mock_pane_key_events_do_not_panic() {
        let mut pane = Pane::create_mock(1, Size::new(5, 10));
        let event = KeyEvent::key_down(Key::A).with_text("a");
        assert!(pane.key_event(&event));

        // Release without event-type reporting encodes to nothing.
        let release = KeyEvent::key_down(Key::A).with_kind(core_events::KeyEventType::Release);
        assert!(!pane.key_event(&release));
    }

    #[test]
    fn wheel_scrolls_scrollback_when_unsubscribed() {
        let mut pane = Pane::create_mock(1, Size::new(2, 4));
        feed(&pane, "aaaa bbbb cccc dddd");
        assert!(pane.terminal().lock().unwrap().screen().scroll_back_rows() > 0);

        let wheel_up = MouseEvent::press(
            MouseButton::SCROLL_UP,
            MousePosition::new(MouseCoordinate::new(0, 0), None),
        );
        assert!(pane.mouse_event(&wheel_up));
        let offset = pane.terminal().lock().unwrap().screen().visual_scroll_offset();
        let bottom = pane
            .terminal()
            .lock()
            .unwrap()
            .screen()
            .absolute_row_screen_start();
        assert_eq!(offset, bottom - 1);
    }

    #[test]
    fn selection_via_mouse_press_and_drag() {
        let mut pane = Pane::create_mock(1, Size::new(2, 10));
        feed(&pane, "hello");

        let press = MouseEvent {
            kind: MouseEventType::Press,
            button: MouseButton::LEFT,
            position: MousePosition::new(MouseCoordinate::new(0, 0), None),
            modifiers: Modifiers::empty(),
        };
        let drag = MouseEvent {
            kind: MouseEventType::Move,
            button: MouseButton::LEFT,
            position: MousePosition::new(MouseCoordinate::new(4, 0), None),
            modifiers: Modifiers::empty(),
        };
        pane.mouse_event(&press);
        pane.mouse_event(&drag);
        assert_eq!(
            pane.terminal().lock().unwrap().screen().selected_text(),
            "hello"
        );
    }

    #[test]
    fn resize_updates_terminal() {
        let mut pane = Pane::create_mock(1, Size::new(5, 10));
        pane.resize_to(Size::new(6, 12));
        assert_eq!(pane.terminal().lock().unwrap().size(), Size::new(6, 12));
        assert_eq!(pane.size(), Size::new(6, 12));
    }
}
