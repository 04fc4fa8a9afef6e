//! ytaudio - stream YouTube audio in your terminal
//!
//! Resolves a link with yt-dlp, plays it through mpv (or rodio when mpv is
//! missing) and drives playback from the keyboard.
//!
//! # Modules
//!
//! - `models` - Stream metadata, playback state, volume, notices
//! - `stream` - yt-dlp resolver and downloader, helper binaries
//! - `backend` - mpv and rodio playback engines
//! - `player` - Failure-absorbing facade over the active backend
//! - `controls` - Keymap, key listener, session control handler
//! - `monitor` - Progress polling and end-of-stream announcements
//! - `ui` - Theme, rendering, terminal ownership
//! - `app` - The prompt → resolve → play → session loop

pub mod app;
pub mod backend;
pub mod cli;
pub mod config;
pub mod controls;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod player;
pub mod stream;
pub mod ui;

// Re-export commonly used types
pub use models::{
    ControlEvent, Notice, NoticeLevel, PlaybackState, ProgressSnapshot, StreamDescriptor, Volume,
};

pub use app::{App, AppState, Console, PlayError, PlaybackSettings, SessionEnd};
pub use backend::{Backend, BackendChoice, BackendError, BackendKind};
pub use player::Player;
pub use stream::{ResolveError, Resolver, YtDlpResolver};
