//! Event definitions for the application event loop.
//!
//! Watchers, signal handlers and the input listener report through this enum.
//! Only the main loop mutates menu state.

use std::path::PathBuf;

use crossterm::event::KeyEvent;

/// Represents an event in the application's main event loop.
#[derive(Debug, Clone)]
pub enum Event {
    /// A watcher from arm cycle `generation` saw a change to `path`.
    WatchFired { generation: u64, path: PathBuf },
    /// A keyboard event received from the user.
    Key(KeyEvent),
    /// The terminal window was resized.
    Resize { width: u16, height: u16 },
    /// SIGINT/SIGTERM or an exit request.
    Shutdown,
}
