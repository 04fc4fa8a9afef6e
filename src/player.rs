//! Player facade
//!
//! The contract the rest of the program uses to drive playback. Wraps the
//! selected [`Backend`] and never lets its errors escape: failures are
//! logged and turned into `false` or a default value.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendKind};
use crate::models::{PlaybackState, ProgressSnapshot, StreamDescriptor, Volume};

/// Poll interval for [`Player::wait_for_ready`]
pub const READY_POLL: Duration = Duration::from_millis(100);

pub struct Player {
    backend: Arc<dyn Backend>,
    /// Volume before mute, `Some` while muted
    muted_from: Mutex<Option<Volume>>,
}

impl Player {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            muted_from: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Prepare a stream; `false` when the backend could not load it
    pub async fn load(&self, stream: &StreamDescriptor) -> bool {
        info!(title = %stream.title, backend = %self.kind(), "loading stream");
        match self.backend.load(stream).await {
            Ok(()) => true,
            Err(e) => {
                warn!("load failed: {}", e);
                false
            }
        }
    }

    pub async fn play(&self) -> bool {
        match self.backend.play().await {
            Ok(()) => true,
            Err(e) => {
                warn!("play failed: {}", e);
                false
            }
        }
    }

    /// Toggle pause
    pub async fn pause(&self) {
        if let Err(e) = self.backend.pause().await {
            warn!("pause failed: {}", e);
        }
    }

    pub async fn stop(&self) {
        if let Err(e) = self.backend.stop().await {
            warn!("stop failed: {}", e);
        }
    }

    /// Set the output volume; out of range levels are clamped.
    ///
    /// Any audible level ends a mute, so a later toggle mutes again.
    pub async fn set_volume(&self, level: i64) {
        let volume = Volume::new(level);
        if !volume.is_muted() {
            self.lock_mute().take();
        }
        if let Err(e) = self.backend.set_volume(volume).await {
            warn!("set volume failed: {}", e);
        }
    }

    pub async fn volume(&self) -> Volume {
        match self.backend.volume().await {
            Ok(volume) => volume,
            Err(e) => {
                warn!("volume query failed: {}", e);
                Volume::default()
            }
        }
    }

    /// Mute, or restore the exact level from before the mute
    pub async fn toggle_mute(&self) -> Volume {
        let restore = self.lock_mute().take();
        let target = match restore {
            Some(previous) => previous,
            None => {
                let current = self.volume().await;
                *self.lock_mute() = Some(current);
                Volume::MIN
            }
        };
        self.set_volume(target.get() as i64).await;
        debug!(volume = %target, "mute toggled");
        target
    }

    pub fn is_muted(&self) -> bool {
        self.lock_mute().is_some()
    }

    pub async fn state(&self) -> PlaybackState {
        self.backend.state().await
    }

    /// Fraction played, 0.0 - 1.0
    pub async fn position(&self) -> f64 {
        self.backend.position().await.clamp(0.0, 1.0)
    }

    pub async fn time_ms(&self) -> i64 {
        self.backend.time().await.as_millis() as i64
    }

    pub async fn length_ms(&self) -> i64 {
        self.backend.length().await.as_millis() as i64
    }

    /// Everything the progress view needs, read in one go
    pub async fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            state: self.state().await,
            elapsed: self.backend.time().await,
            length: self.backend.length().await,
            position: self.position().await,
            volume: self.volume().await,
        }
    }

    /// Wait until the backend leaves {Idle, Opening, Error}.
    ///
    /// Returns `false` once `timeout` has elapsed; never waits longer than
    /// `timeout` plus one poll interval.
    pub async fn wait_for_ready(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            let state = self.state().await;
            if state.is_ready() {
                debug!(%state, elapsed = ?start.elapsed(), "player ready");
                return true;
            }
            if start.elapsed() >= timeout {
                warn!(%state, "player not ready after {:?}", timeout);
                return false;
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }

    /// Release the backend; safe to call more than once
    pub async fn cleanup(&self) {
        self.backend.cleanup().await;
    }

    fn lock_mute(&self) -> std::sync::MutexGuard<'_, Option<Volume>> {
        self.muted_from.lock().unwrap_or_else(|e| e.into_inner())
    }
}
