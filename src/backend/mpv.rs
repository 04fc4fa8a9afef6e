//! mpv backend
//!
//! Runs one long-lived `mpv --idle` process per backend and drives it over
//! the JSON IPC socket. State, position and volume are read back from mpv's
//! own properties, so they reflect the real decoder position.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Child;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ipc::{IpcError, MpvIpc};
use super::{Backend, BackendError, BackendKind};
use crate::models::{PlaybackState, StreamDescriptor, Volume};
use crate::stream::Tool;

/// How long mpv gets to create its IPC socket
const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `quit` gets before the process is killed
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Properties that decide the playback state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MpvStatus {
    pub eof_reached: bool,
    pub idle_active: bool,
    pub paused_for_cache: bool,
    pub seeking: bool,
    pub pause: bool,
    pub core_idle: bool,
}

impl MpvStatus {
    /// Map mpv properties to a playback state
    pub fn state(&self) -> PlaybackState {
        if self.eof_reached {
            PlaybackState::Ended
        } else if self.idle_active {
            PlaybackState::Opening
        } else if self.paused_for_cache || self.seeking {
            PlaybackState::Buffering
        } else if self.pause {
            PlaybackState::Paused
        } else if self.core_idle {
            PlaybackState::Buffering
        } else {
            PlaybackState::Playing
        }
    }
}

/// The running mpv process and its IPC session
struct MpvProcess {
    child: Child,
    ipc: MpvIpc,
    socket: PathBuf,
}

impl MpvProcess {
    fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    async fn flag(&mut self, name: &str) -> Result<bool, IpcError> {
        Ok(self.ipc.get_property::<bool>(name).await?.unwrap_or(false))
    }

    async fn status(&mut self) -> Result<MpvStatus, IpcError> {
        Ok(MpvStatus {
            eof_reached: self.flag("eof-reached").await?,
            idle_active: self.flag("idle-active").await?,
            paused_for_cache: self.flag("paused-for-cache").await?,
            seeking: self.flag("seeking").await?,
            pause: self.flag("pause").await?,
            core_idle: self.flag("core-idle").await?,
        })
    }

    async fn seconds(&mut self, name: &str) -> Option<f64> {
        match self.ipc.get_property::<f64>(name).await {
            Ok(v) => v.filter(|s| s.is_finite() && *s >= 0.0),
            Err(e) => {
                debug!(property = name, error = %e, "mpv property read failed");
                None
            }
        }
    }
}

impl Drop for MpvProcess {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket);
    }
}

#[derive(Default)]
struct Inner {
    process: Option<MpvProcess>,
    loaded: Option<StreamDescriptor>,
    stopped: bool,
    load_failed: bool,
    volume: Volume,
}

impl Inner {
    fn absorb_events(&mut self) {
        let Some(process) = self.process.as_mut() else {
            return;
        };
        for event in process.ipc.drain_events() {
            if event.is_load_error() {
                warn!(error = ?event.file_error, "mpv failed to open stream");
                self.load_failed = true;
            }
        }
    }

    fn process(&mut self) -> Result<&mut MpvProcess, BackendError> {
        match self.process.as_mut() {
            Some(p) => {
                if p.has_exited() {
                    Err(BackendError::Exited)
                } else {
                    Ok(p)
                }
            }
            None => Err(BackendError::NotLoaded),
        }
    }
}

/// Playback through an mpv subprocess
pub struct MpvBackend {
    tool: Tool,
    inner: Mutex<Inner>,
}

impl MpvBackend {
    pub fn new(tool: Tool) -> Self {
        Self {
            tool,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn socket_path() -> PathBuf {
        let id = Uuid::new_v4().simple().to_string();
        std::env::temp_dir().join(format!("ytaudio-{}.sock", &id[..12]))
    }

    async fn spawn(&self, volume: Volume) -> Result<MpvProcess, BackendError> {
        let socket = Self::socket_path();
        let mut cmd = self.tool.command();
        cmd.arg("--idle=yes")
            .arg("--no-video")
            .arg("--no-terminal")
            .arg("--keep-open=yes")
            .arg("--volume-max=100")
            .arg(format!("--volume={}", volume.get()))
            .arg(format!("--input-ipc-server={}", socket.display()))
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BackendError::NotFound(self.tool.program().to_string())
            } else {
                BackendError::StartFailed(e.to_string())
            }
        })?;

        let ipc = match MpvIpc::connect(&socket, STARTUP_TIMEOUT).await {
            Ok(ipc) => ipc,
            Err(e) => {
                let _ = child.kill().await;
                let _ = std::fs::remove_file(&socket);
                return Err(BackendError::StartFailed(e.to_string()));
            }
        };

        info!(socket = %socket.display(), "mpv started");
        Ok(MpvProcess { child, ipc, socket })
    }
}

#[async_trait]
impl Backend for MpvBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Mpv
    }

    async fn load(&self, stream: &StreamDescriptor) -> Result<(), BackendError> {
        let mut inner = self.inner.lock().await;

        let needs_spawn = match inner.process.as_mut() {
            Some(p) => p.has_exited(),
            None => true,
        };
        if needs_spawn {
            inner.process = None;
            let process = self.spawn(inner.volume).await?;
            inner.process = Some(process);
        }

        inner.loaded = None;
        inner.stopped = false;
        inner.load_failed = false;

        let process = inner.process()?;
        // Open paused; play() starts it
        process.ipc.set_property("pause", json!(true)).await?;
        process
            .ipc
            .command(&[json!("loadfile"), json!(stream.stream_url), json!("replace")])
            .await?;

        debug!(title = %stream.title, "mpv loading stream");
        inner.loaded = Some(stream.clone());
        Ok(())
    }

    async fn play(&self) -> Result<(), BackendError> {
        let mut inner = self.inner.lock().await;
        if inner.loaded.is_none() {
            return Err(BackendError::NotLoaded);
        }
        inner.process()?.ipc.set_property("pause", json!(false)).await?;
        Ok(())
    }

    async fn pause(&self) -> Result<(), BackendError> {
        let mut inner = self.inner.lock().await;
        if inner.loaded.is_none() {
            return Err(BackendError::NotLoaded);
        }
        inner
            .process()?
            .ipc
            .command(&[json!("cycle"), json!("pause")])
            .await?;
        Ok(())
    }

    async fn stop(&self) -> Result<(), BackendError> {
        let mut inner = self.inner.lock().await;
        inner.stopped = true;
        inner.loaded = None;
        if let Some(process) = inner.process.as_mut() {
            if !process.has_exited() {
                process.ipc.command(&[json!("stop")]).await?;
            }
        }
        Ok(())
    }

    async fn set_volume(&self, volume: Volume) -> Result<(), BackendError> {
        let mut inner = self.inner.lock().await;
        inner.volume = volume;
        if let Some(process) = inner.process.as_mut() {
            if !process.has_exited() {
                process
                    .ipc
                    .set_property("volume", json!(volume.get()))
                    .await?;
            }
        }
        Ok(())
    }

    async fn volume(&self) -> Result<Volume, BackendError> {
        Ok(self.inner.lock().await.volume)
    }

    async fn state(&self) -> PlaybackState {
        let mut inner = self.inner.lock().await;
        if inner.stopped {
            return PlaybackState::Stopped;
        }
        if inner.loaded.is_none() {
            return PlaybackState::Idle;
        }

        let status = match inner.process() {
            Ok(process) => process.status().await,
            Err(e) => {
                warn!(error = %e, "mpv unavailable");
                return PlaybackState::Error;
            }
        };
        inner.absorb_events();
        if inner.load_failed {
            return PlaybackState::Error;
        }

        match status {
            Ok(status) => status.state(),
            Err(e) => {
                warn!(error = %e, "mpv status query failed");
                PlaybackState::Error
            }
        }
    }

    async fn position(&self) -> f64 {
        let mut inner = self.inner.lock().await;
        if inner.loaded.is_none() {
            return 0.0;
        }
        match inner.process() {
            Ok(process) => process
                .seconds("percent-pos")
                .await
                .map(|p| (p / 100.0).clamp(0.0, 1.0))
                .unwrap_or(0.0),
            Err(_) => 0.0,
        }
    }

    async fn time(&self) -> Duration {
        let mut inner = self.inner.lock().await;
        if inner.loaded.is_none() {
            return Duration::ZERO;
        }
        match inner.process() {
            Ok(process) => process
                .seconds("time-pos")
                .await
                .map(Duration::from_secs_f64)
                .unwrap_or_default(),
            Err(_) => Duration::ZERO,
        }
    }

    async fn length(&self) -> Duration {
        let mut inner = self.inner.lock().await;
        let fallback = inner
            .loaded
            .as_ref()
            .map(StreamDescriptor::length)
            .unwrap_or_default();
        if inner.loaded.is_none() {
            return Duration::ZERO;
        }
        match inner.process() {
            Ok(process) => process
                .seconds("duration")
                .await
                .map(Duration::from_secs_f64)
                .unwrap_or(fallback),
            Err(_) => fallback,
        }
    }

    async fn cleanup(&self) {
        let mut inner = self.inner.lock().await;
        inner.loaded = None;
        inner.stopped = true;

        let Some(mut process) = inner.process.take() else {
            return;
        };
        if !process.has_exited() {
            let quit_args = [Value::from("quit")];
            let quit = process.ipc.command(&quit_args);
            if let Err(e) = tokio::time::timeout(SHUTDOWN_GRACE, quit).await {
                debug!(error = %e, "mpv did not answer quit");
            }
            match tokio::time::timeout(SHUTDOWN_GRACE, process.child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    let _ = process.child.kill().await;
                }
            }
        }
        info!("mpv released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ToolKind;

    #[test]
    fn test_status_mapping() {
        let base = MpvStatus::default();
        assert_eq!(base.state(), PlaybackState::Playing);

        let opening = MpvStatus {
            idle_active: true,
            ..base
        };
        assert_eq!(opening.state(), PlaybackState::Opening);

        let paused = MpvStatus { pause: true, ..base };
        assert_eq!(paused.state(), PlaybackState::Paused);

        let caching = MpvStatus {
            pause: true,
            paused_for_cache: true,
            ..base
        };
        assert_eq!(caching.state(), PlaybackState::Buffering);

        let idle_core = MpvStatus {
            core_idle: true,
            ..base
        };
        assert_eq!(idle_core.state(), PlaybackState::Buffering);

        // keep-open pauses at the end; eof wins
        let ended = MpvStatus {
            eof_reached: true,
            pause: true,
            ..base
        };
        assert_eq!(ended.state(), PlaybackState::Ended);
    }

    #[tokio::test]
    async fn test_fresh_backend_is_idle() {
        let backend = MpvBackend::new(Tool::with_path(ToolKind::Mpv, "/nonexistent/mpv"));
        assert_eq!(backend.state().await, PlaybackState::Idle);
        assert_eq!(backend.position().await, 0.0);
        assert_eq!(backend.length().await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_stop_without_process_is_stopped_and_idempotent() {
        let backend = MpvBackend::new(Tool::with_path(ToolKind::Mpv, "/nonexistent/mpv"));
        backend.stop().await.unwrap();
        backend.stop().await.unwrap();
        assert_eq!(backend.state().await, PlaybackState::Stopped);
        backend.cleanup().await;
        backend.cleanup().await;
    }

    #[tokio::test]
    async fn test_load_with_missing_binary_fails() {
        let backend = MpvBackend::new(Tool::with_path(ToolKind::Mpv, "/nonexistent/mpv"));
        let stream = StreamDescriptor {
            stream_url: "https://example.invalid/a".into(),
            webpage_url: "https://youtu.be/abc".into(),
            title: "t".into(),
            uploader: "u".into(),
            duration: 1.0,
            thumbnail: None,
        };
        assert!(matches!(
            backend.load(&stream).await,
            Err(BackendError::NotFound(_))
        ));
        assert_eq!(backend.state().await, PlaybackState::Idle);
    }

    #[tokio::test]
    async fn test_volume_cached_without_process() {
        let backend = MpvBackend::new(Tool::with_path(ToolKind::Mpv, "/nonexistent/mpv"));
        backend.set_volume(Volume::new(35)).await.unwrap();
        assert_eq!(backend.volume().await.unwrap(), Volume::new(35));
    }
}
