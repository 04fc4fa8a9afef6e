//! Playback backends
//!
//! Two interchangeable engines behind one trait:
//! - `mpv`: the native player, driven over its JSON IPC socket
//! - `rodio`: download-then-play through a software mixer
//!
//! Which one runs is decided once at startup by [`select`].

pub mod clock;
pub mod ipc;
pub mod mpv;
pub mod rodio;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::models::{PlaybackState, StreamDescriptor, Volume};
use crate::stream::{DownloadError, Tool, ToolKind};

pub use self::mpv::MpvBackend;
pub use self::rodio::RodioBackend;
pub use clock::PlaybackClock;
pub use ipc::IpcError;

/// Errors from playback backends
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Nothing loaded")]
    NotLoaded,
    #[error("Player '{0}' not found. Install it first.")]
    NotFound(String),
    #[error("Failed to start player: {0}")]
    StartFailed(String),
    #[error("Player exited unexpectedly")]
    Exited,
    #[error("Player IPC error: {0}")]
    Ipc(#[from] IpcError),
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error("Audio output error: {0}")]
    Audio(String),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Which engine a backend drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Mpv,
    Rodio,
}

impl BackendKind {
    /// Get a display name for this backend
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::Mpv => "mpv",
            BackendKind::Rodio => "rodio",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Transport controls and state queries of one playback engine.
///
/// Implementations own the authoritative playback state; callers only read
/// it. All methods take `&self` and synchronize internally.
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Prepare media for playback (does not start it)
    async fn load(&self, stream: &StreamDescriptor) -> Result<(), BackendError>;

    /// Start or resume playback
    async fn play(&self) -> Result<(), BackendError>;

    /// Toggle between playing and paused
    async fn pause(&self) -> Result<(), BackendError>;

    /// Halt playback, release the loaded media, state becomes `Stopped`
    async fn stop(&self) -> Result<(), BackendError>;

    async fn set_volume(&self, volume: Volume) -> Result<(), BackendError>;

    async fn volume(&self) -> Result<Volume, BackendError>;

    async fn state(&self) -> PlaybackState;

    /// Fraction played, 0.0 - 1.0
    async fn position(&self) -> f64;

    /// Elapsed playback time
    async fn time(&self) -> Duration;

    /// Total length (zero when unknown)
    async fn length(&self) -> Duration;

    /// Stop and release every resource; safe to call repeatedly
    async fn cleanup(&self);
}

/// Backend preference from the command line / environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendChoice {
    /// mpv when installed, rodio otherwise
    #[default]
    Auto,
    Mpv,
    Rodio,
}

/// Pick the backend kind for a preference.
///
/// `Auto` does a single availability check for the mpv binary.
pub async fn resolve_kind(choice: BackendChoice, mpv: &Tool) -> BackendKind {
    match choice {
        BackendChoice::Mpv => BackendKind::Mpv,
        BackendChoice::Rodio => BackendKind::Rodio,
        BackendChoice::Auto => {
            if mpv.is_available().await {
                BackendKind::Mpv
            } else {
                info!("{} not available, using rodio backend", mpv.program());
                BackendKind::Rodio
            }
        }
    }
}

/// Construct the backend for a preference
pub async fn select(
    choice: BackendChoice,
    mpv: Tool,
    ytdlp: Tool,
) -> Result<Arc<dyn Backend>, BackendError> {
    debug_assert_eq!(mpv.kind(), ToolKind::Mpv);
    let kind = resolve_kind(choice, &mpv).await;
    info!(backend = %kind, "selected playback backend");

    Ok(match kind {
        BackendKind::Mpv => Arc::new(MpvBackend::new(mpv)),
        BackendKind::Rodio => Arc::new(RodioBackend::open(ytdlp)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_explicit_choice_skips_probe() {
        let missing = Tool::with_path(ToolKind::Mpv, "/nonexistent/mpv");
        assert_eq!(
            resolve_kind(BackendChoice::Mpv, &missing).await,
            BackendKind::Mpv
        );
        assert_eq!(
            resolve_kind(BackendChoice::Rodio, &missing).await,
            BackendKind::Rodio
        );
    }

    #[tokio::test]
    async fn test_auto_falls_back_without_mpv() {
        let missing = Tool::with_path(ToolKind::Mpv, "/nonexistent/mpv");
        assert_eq!(
            resolve_kind(BackendChoice::Auto, &missing).await,
            BackendKind::Rodio
        );
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(BackendKind::Mpv.to_string(), "mpv");
        assert_eq!(BackendKind::Rodio.to_string(), "rodio");
    }
}
