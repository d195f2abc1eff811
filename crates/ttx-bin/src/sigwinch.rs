//! SIGWINCH plumbing.
//!
//! The signal is blocked process-wide before any thread spawns, and one
//! watcher thread collects it with `sigwait`, translating size changes into
//! render events. Shutdown raises the signal at ourselves to unblock the
//! watcher.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use core_events::{RenderEvent, RenderHandle, Size};

/// Block SIGWINCH for the calling thread (and everything it spawns).
/// Call before starting any other thread.
pub fn block_sigwinch() {
    // SAFETY: standard signal-mask setup with a locally owned set.
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGWINCH);
        libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut());
    }
}

/// Raise SIGWINCH at ourselves; used to unblock the watcher on shutdown.
pub fn notify_self() {
    // SAFETY: raising a blocked-and-waited signal at our own process.
    unsafe {
        libc::kill(libc::getpid(), libc::SIGWINCH);
    }
}

/// The current host terminal size, in cells and pixels where available.
pub fn host_size() -> Size {
    if let Ok(size) = crossterm::terminal::window_size() {
        return Size::with_pixels(
            u32::from(size.rows),
            u32::from(size.columns),
            u32::from(size.width),
            u32::from(size.height),
        );
    }
    match crossterm::terminal::size() {
        Ok((cols, rows)) => Size::new(u32::from(rows), u32::from(cols)),
        Err(_) => Size::new(24, 80),
    }
}

pub fn spawn_watcher(render: RenderHandle, done: Arc<AtomicBool>) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("sigwinch".to_owned())
        .spawn(move || {
            // SAFETY: waiting on the set blocked in `block_sigwinch`.
            let mut set: libc::sigset_t = unsafe { std::mem::zeroed() };
            unsafe {
                libc::sigemptyset(&mut set);
                libc::sigaddset(&mut set, libc::SIGWINCH);
            }
            loop {
                let mut signal: libc::c_int = 0;
                let result = unsafe { libc::sigwait(&set, &mut signal) };
                if result != 0 || done.load(Ordering::Acquire) {
                    break;
                }
                render.push(RenderEvent::Size(host_size()));
            }
            tracing::debug!(target: "input", "sigwinch watcher exiting");
        })
}
