//! Event vocabulary and wire codecs.
//!
//! Key, mouse, focus and paste events are the currency between the input
//! thread, the panes, and the child terminals. Each event type has a
//! bidirectional codec over the host-terminal byte alphabet: encoding targets
//! a child pty honoring that terminal's reporting modes, decoding interprets
//! what the host terminal sends us. The same types flow in both directions
//! because a multiplexer is a terminal on one side and an application on the
//! other.
//!
//! This crate also defines the render-thread event queue. The channel is
//! bounded; producers block rather than drop, because losing a `PaneExited`
//! would leak a pane. Redundant `DoRender` wakeups are coalesced by the
//! consumer.

mod focus;
mod key;
mod key_event;
mod key_io;
mod mouse;
mod mouse_io;
mod paste;
mod size;

pub use focus::{FocusEvent, FocusEventMode, focus_event_from_csi, serialize_focus_event};
pub use key::{Key, Modifiers};
pub use key_event::{KeyEvent, KeyEventType};
pub use key_io::{
    ApplicationCursorKeysMode, KeyReportingFlags, key_event_from_csi,
    key_event_from_legacy_code_point, key_event_from_ss3, serialize_key_event,
};
pub use mouse::{
    AlternateScrollMode, MouseButton, MouseClickTracker, MouseCoordinate, MouseEncoding,
    MouseEvent, MouseEventType, MousePosition, MouseProtocol,
};
pub use mouse_io::{MouseScrollProtocol, mouse_event_from_csi, serialize_mouse_event};
pub use paste::{
    BracketedPasteMode, PasteEvent, is_bracketed_paste_begin, is_bracketed_paste_end,
    serialize_paste_event,
};
pub use size::Size;

use crossbeam_channel::{Receiver, Sender};

/// Input dispatch mode of the multiplexer itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputMode {
    /// Default: keys are forwarded to the active pane.
    #[default]
    Insert,
    /// After the prefix key: most bindings are live.
    Normal,
    /// Only navigation bindings are handled.
    Switch,
    /// Only resize bindings are handled.
    Resize,
}

impl InputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputMode::Insert => "INSERT",
            InputMode::Normal => "NORMAL",
            InputMode::Switch => "SWITCH",
            InputMode::Resize => "RESIZE",
        }
    }
}

/// Events consumed by the render thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    /// The host terminal was resized.
    Size(Size),
    /// A pane's child process exited; identified by ids so no live pointers
    /// cross the thread boundary.
    PaneExited {
        session_id: u64,
        tab_id: u64,
        pane_id: u64,
    },
    /// The input thread changed modes (status bar content).
    InputStatus(InputMode),
    /// Write a string straight to the host terminal (clipboard, APC
    /// passthrough).
    WriteString(String),
    /// Wake up and paint a frame.
    DoRender,
    /// Shut down the render thread.
    Exit,
}

/// Bounded capacity of the render queue. Events are tiny and coalesced, the
/// bound exists to surface a stuck consumer instead of growing without limit.
pub const RENDER_QUEUE_CAP: usize = 1024;

/// Sending half of the render queue, cloned into every producer.
#[derive(Debug, Clone)]
pub struct RenderHandle {
    sender: Sender<RenderEvent>,
}

impl RenderHandle {
    pub fn push(&self, event: RenderEvent) {
        // A full queue means the render thread is wedged; blocking the
        // producer is the correct backpressure. A disconnected queue means
        // we're shutting down and the event no longer matters.
        if let Err(error) = self.sender.send(event) {
            tracing::debug!(target: "events", ?error, "render queue closed");
        }
    }

    pub fn request_render(&self) {
        self.push(RenderEvent::DoRender);
    }

    pub fn request_exit(&self) {
        self.push(RenderEvent::Exit);
    }
}

/// Create the render queue pair.
pub fn render_channel() -> (RenderHandle, Receiver<RenderEvent>) {
    let (sender, receiver) = crossbeam_channel::bounded(RENDER_QUEUE_CAP);
    (RenderHandle { sender }, receiver)
}
