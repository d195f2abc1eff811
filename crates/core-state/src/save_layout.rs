//! The layout saver: coalesces save requests and writes the snapshot at
//! most once per second.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::layout_json::LayoutSnapshot;
use crate::state::LayoutState;

enum SaveLayoutEvent {
    Save,
    Exit,
}

/// A thread that snapshots the layout state on request. Requests arriving
/// faster than once per second collapse into one write.
pub struct SaveLayoutThread {
    sender: Sender<SaveLayoutEvent>,
    thread: Option<JoinHandle<()>>,
}

impl SaveLayoutThread {
    pub fn spawn(state: Arc<Mutex<LayoutState>>, path: PathBuf) -> std::io::Result<SaveLayoutThread> {
        let (sender, receiver) = crossbeam_channel::bounded(16);
        let thread = std::thread::Builder::new()
            .name("save-layout".to_owned())
            .spawn(move || save_layout_thread(state, path, receiver))?;
        Ok(SaveLayoutThread {
            sender,
            thread: Some(thread),
        })
    }

    pub fn request_save(&self) {
        // A full queue already guarantees a pending save.
        let _ = self.sender.try_send(SaveLayoutEvent::Save);
    }

    pub fn request_exit(&self) {
        let _ = self.sender.send(SaveLayoutEvent::Exit);
    }
}

impl Drop for SaveLayoutThread {
    fn drop(&mut self) {
        self.request_exit();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

const SAVE_INTERVAL: Duration = Duration::from_secs(1);

fn save_layout_thread(
    state: Arc<Mutex<LayoutState>>,
    path: PathBuf,
    receiver: Receiver<SaveLayoutEvent>,
) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let mut last_save: Option<Instant> = None;
    let mut pending = false;
    loop {
        // Wait for a request, or for the rate limit to let a pending one
        // through.
        let event = if pending {
            let wakeup = last_save
                .map(|at| (at + SAVE_INTERVAL).saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::ZERO);
            match receiver.recv_timeout(wakeup) {
                Ok(event) => Some(event),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        } else {
            match receiver.recv() {
                Ok(event) => Some(event),
                Err(_) => return,
            }
        };

        match event {
            Some(SaveLayoutEvent::Exit) => {
                if pending {
                    save(&state, &path);
                }
                return;
            }
            Some(SaveLayoutEvent::Save) => pending = true,
            None => {}
        }

        let rate_limited = last_save
            .is_some_and(|at| at.elapsed() < SAVE_INTERVAL);
        if pending && !rate_limited {
            save(&state, &path);
            last_save = Some(Instant::now());
            pending = false;
        }
    }
}

fn save(state: &Arc<Mutex<LayoutState>>, path: &PathBuf) {
    let snapshot = {
        let state = state.lock().unwrap();
        LayoutSnapshot::capture(&state)
    };
    let json = match snapshot.to_json() {
        Ok(json) => json,
        Err(error) => {
            tracing::warn!(target: "state", ?error, "failed to serialize layout");
            return;
        }
    };

    // Write-then-rename so a crash mid-write never corrupts the snapshot.
    let temp = path.with_extension("json.tmp");
    let result = std::fs::write(&temp, json).and_then(|_| std::fs::rename(&temp, path));
    match result {
        Ok(()) => tracing::debug!(target: "state", path = %path.display(), "layout saved"),
        Err(error) => {
            tracing::warn!(target: "state", ?error, "failed to write layout snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::Size;

    #[test]
    fn saves_on_request_and_exit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        let state = Arc::new(Mutex::new(LayoutState::new(Size::new(24, 80), true)));

        let thread = SaveLayoutThread::spawn(Arc::clone(&state), path.clone()).unwrap();
        thread.request_save();
        drop(thread);

        let contents = std::fs::read_to_string(&path).unwrap();
        let snapshot = LayoutSnapshot::from_json(&contents).unwrap();
        let LayoutSnapshot::V1(state) = snapshot;
        assert!(state.sessions.is_empty());
    }
}
