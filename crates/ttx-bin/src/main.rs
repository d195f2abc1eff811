//! ttx entrypoint: argument parsing, logging, terminal setup, and thread
//! wiring.
//!
//! Thread set: this (main) thread parks until the render thread exits; the
//! input thread owns stdin; the render thread owns frame composition; each
//! pane brings a reader and a waiter; SIGWINCH has a dedicated watcher; the
//! layout saver runs when configured. Teardown order: render, then input,
//! then the watcher, then the terminal guard restores the host.

mod actions;
mod input_thread;
mod key_bind;
mod sigwinch;

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use core_config::Config;
use core_events::render_channel;
use core_pane::CreatePaneArgs;
use core_render::{RenderThread, Renderer};
use core_state::{LayoutSnapshot, LayoutState, SaveLayoutThread};

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "ttx", version, about = "Terminal multiplexer")]
struct Args {
    /// Program to run in new panes; defaults to $SHELL.
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,

    /// Configuration file (overrides discovery of `ttx.toml`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Continuously save the layout to this file.
    #[arg(long)]
    save_layout: Option<PathBuf>,

    /// Restore a previously saved layout instead of starting fresh.
    #[arg(long)]
    restore: Option<PathBuf>,

    /// Path the save-pane-state binding writes to.
    #[arg(long)]
    save_state: Option<PathBuf>,

    /// Hide the status bar.
    #[arg(long)]
    no_status_bar: bool,
}

/// Puts the host terminal into raw mode and our feature set; restores both
/// on drop, even on panic.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<TerminalGuard> {
        crossterm::terminal::enable_raw_mode().context("entering raw mode")?;
        let mut stdout = std::io::stdout();
        Renderer::new()
            .setup(&mut stdout)
            .context("writing terminal setup")?;
        Ok(TerminalGuard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut stdout = std::io::stdout();
        let _ = Renderer::new().cleanup(&mut stdout);
        let _ = stdout.flush();
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

fn configure_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // The multiplexer owns the terminal; logs must go to a file.
    let directory = std::env::temp_dir();
    let appender = tracing_appender::rolling::never(directory, "ttx.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let result = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    result.ok().map(|_| guard)
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        // Give the user their terminal back before printing the panic.
        let mut stdout = std::io::stdout();
        let _ = Renderer::new().cleanup(&mut stdout);
        let _ = crossterm::terminal::disable_raw_mode();
        default_hook(info);
    }));
}

fn default_command() -> Vec<String> {
    vec![std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_owned())]
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging();
    let config = Config::load(args.config.as_deref())?;

    let command = if args.command.is_empty() {
        default_command()
    } else {
        args.command.clone()
    };
    let show_status_bar = !args.no_status_bar && config.show_status_bar;
    let save_layout_path = args.save_layout.clone().or(config.save_layout_path.clone());

    // Signal routing must be decided before any thread exists.
    sigwinch::block_sigwinch();
    let guard = TerminalGuard::enter()?;
    install_panic_hook();
    info!(target: "runtime", ?command, "startup");

    let size = sigwinch::host_size();
    let (render_handle, render_receiver) = render_channel();
    let done = Arc::new(AtomicBool::new(false));

    // Build the initial state: restored from a snapshot, or one session
    // with one tab running the command.
    let state = match &args.restore {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading snapshot {}", path.display()))?;
            let snapshot = LayoutSnapshot::from_json(&text)?;
            snapshot.restore(size, show_status_bar, &command, &render_handle)?
        }
        None => {
            let mut state = LayoutState::new(size, show_status_bar);
            state.add_session(
                "main",
                CreatePaneArgs {
                    command: command.clone(),
                    cwd: None,
                },
                &render_handle,
            )?;
            state
        }
    };
    if state.is_empty() {
        drop(guard);
        anyhow::bail!("no panes could be started");
    }
    let state = Arc::new(Mutex::new(state));

    let save_layout = match save_layout_path {
        Some(path) => Some(Arc::new(
            SaveLayoutThread::spawn(Arc::clone(&state), path).context("starting layout saver")?,
        )),
        None => None,
    };

    let render_thread = RenderThread::spawn(
        Arc::clone(&state),
        render_receiver,
        Box::new(std::io::stdout()),
        Arc::clone(&done),
    )
    .context("starting render thread")?;

    let binds = key_bind::make_key_binds(config.prefix, args.save_state.clone());
    let input_thread = input_thread::spawn(input_thread::InputThreadArgs {
        state: Arc::clone(&state),
        render: render_handle.clone(),
        save_layout: save_layout.clone(),
        binds,
        command: command.clone(),
        done: Arc::clone(&done),
    })
    .context("starting input thread")?;

    let winch_watcher = sigwinch::spawn_watcher(render_handle.clone(), Arc::clone(&done))
        .context("starting resize watcher")?;

    // First frame.
    render_handle.push(core_events::RenderEvent::Size(size));
    render_handle.request_render();

    // The render thread decides when the program is over: explicit quit or
    // the last pane exiting.
    render_thread.join();
    done.store(true, Ordering::Release);

    // Unblock the input thread: the host answers the attribute query on
    // stdin.
    {
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(b"\x1b[c");
        let _ = stdout.flush();
    }
    sigwinch::notify_self();
    let _ = input_thread.join();
    let _ = winch_watcher.join();

    if let Some(save_layout) = &save_layout {
        save_layout.request_exit();
    }
    drop(save_layout);

    // Dropping the state joins every remaining pane's threads.
    drop(state);
    drop(guard);
    info!(target: "runtime", "shutdown complete");
    Ok(())
}
