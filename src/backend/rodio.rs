//! rodio backend (download-then-play)
//!
//! Used when mpv isn't installed. Audio is downloaded by yt-dlp into a
//! temporary directory, decoded with rodio and mixed into the default output
//! device. The output stream lives on its own thread for the lifetime of the
//! backend; sinks connect to its mixer.
//!
//! Elapsed time comes from a wall-clock [`PlaybackClock`], not the decoder,
//! see that type for the drift caveats.

use std::fs::File;
use std::io::BufReader;
use std::sync::mpsc;
use std::sync::{Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use ::rodio::mixer::Mixer;
use ::rodio::{Decoder, OutputStreamBuilder, Sink, Source};
use async_trait::async_trait;
use tracing::{debug, info};

use super::clock::PlaybackClock;
use super::{Backend, BackendError, BackendKind};
use crate::models::{PlaybackState, StreamDescriptor, Volume};
use crate::stream::{Download, Downloader, Tool};

/// The default output device, kept open on a dedicated thread
struct AudioOutput {
    mixer: Mixer,
    shutdown: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl AudioOutput {
    fn open() -> Result<Self, BackendError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<Mixer, String>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("ytaudio-output".into())
            .spawn(move || match OutputStreamBuilder::open_default_stream() {
                Ok(mut stream) => {
                    stream.log_on_drop(false);
                    let _ = ready_tx.send(Ok(stream.mixer().clone()));
                    // Keep the stream alive until the sender is dropped
                    let _ = shutdown_rx.recv();
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                }
            })?;

        let mixer = ready_rx
            .recv()
            .map_err(|_| BackendError::Audio("output thread exited".into()))?
            .map_err(BackendError::Audio)?;

        info!("audio output opened");
        Ok(Self {
            mixer,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// A mixer someone else drives
    fn detached(mixer: Mixer) -> Self {
        Self {
            mixer,
            shutdown: None,
            thread: None,
        }
    }

    fn close(&mut self) {
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.close();
    }
}

/// A decoded download queued on a sink
struct LoadedMedia {
    sink: Sink,
    length: Duration,
    // Removes the temporary file when dropped
    _download: Option<Download>,
}

struct Inner {
    output: Option<AudioOutput>,
    media: Option<LoadedMedia>,
    clock: PlaybackClock,
    started: bool,
    stopped: bool,
    volume: Volume,
}

impl Inner {
    fn media(&self) -> Result<&LoadedMedia, BackendError> {
        self.media.as_ref().ok_or(BackendError::NotLoaded)
    }

    fn release_media(&mut self) {
        if let Some(media) = self.media.take() {
            media.sink.stop();
            debug!("released downloaded media");
        }
        self.clock.reset();
        self.started = false;
    }

    fn elapsed(&self) -> Duration {
        let Some(media) = self.media.as_ref() else {
            return Duration::ZERO;
        };
        if !self.started {
            return Duration::ZERO;
        }
        let elapsed = self.clock.elapsed();
        if media.length.is_zero() {
            elapsed
        } else {
            elapsed.min(media.length)
        }
    }
}

/// Download-then-play backend over the system mixer
pub struct RodioBackend {
    downloader: Downloader,
    inner: Mutex<Inner>,
}

impl RodioBackend {
    /// Open the default audio device
    pub fn open(ytdlp: Tool) -> Result<Self, BackendError> {
        Ok(Self::with_output(ytdlp, AudioOutput::open()?))
    }

    /// Mix into `mixer` instead of the default device
    pub fn with_mixer(ytdlp: Tool, mixer: Mixer) -> Self {
        Self::with_output(ytdlp, AudioOutput::detached(mixer))
    }

    fn with_output(ytdlp: Tool, output: AudioOutput) -> Self {
        Self {
            downloader: Downloader::with_tool(ytdlp),
            inner: Mutex::new(Inner {
                output: Some(output),
                media: None,
                clock: PlaybackClock::new(),
                started: false,
                stopped: false,
                volume: Volume::default(),
            }),
        }
    }

    /// Put `source` on a fresh paused sink, replacing whatever was loaded
    fn queue<S>(
        &self,
        source: S,
        length: Duration,
        download: Option<Download>,
    ) -> Result<(), BackendError>
    where
        S: Source + Send + 'static,
    {
        let mut inner = self.lock();
        inner.release_media();
        inner.stopped = false;
        let output = inner
            .output
            .as_ref()
            .ok_or_else(|| BackendError::Audio("output closed".into()))?;

        let sink = Sink::connect_new(&output.mixer);
        sink.pause();
        sink.set_volume(inner.volume.gain());
        sink.append(source);

        inner.media = Some(LoadedMedia {
            sink,
            length,
            _download: download,
        });
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Backend for RodioBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Rodio
    }

    async fn load(&self, stream: &StreamDescriptor) -> Result<(), BackendError> {
        {
            let mut inner = self.lock();
            inner.release_media();
            inner.stopped = false;
        }

        let download = self.downloader.fetch(&stream.webpage_url).await?;
        info!(path = %download.path().display(), "download complete");

        let file = File::open(download.path())?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        self.queue(source, stream.length(), Some(download))
    }

    async fn play(&self) -> Result<(), BackendError> {
        let mut inner = self.lock();
        inner.media()?.sink.play();
        if inner.started {
            inner.clock.resume();
        } else {
            inner.clock.start();
            inner.started = true;
        }
        Ok(())
    }

    async fn pause(&self) -> Result<(), BackendError> {
        let mut inner = self.lock();
        if !inner.started {
            return Err(BackendError::NotLoaded);
        }
        let media = inner.media()?;
        if media.sink.is_paused() {
            media.sink.play();
            inner.clock.resume();
        } else {
            media.sink.pause();
            inner.clock.pause();
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), BackendError> {
        let mut inner = self.lock();
        inner.release_media();
        inner.stopped = true;
        Ok(())
    }

    async fn set_volume(&self, volume: Volume) -> Result<(), BackendError> {
        let mut inner = self.lock();
        inner.volume = volume;
        if let Some(media) = inner.media.as_ref() {
            media.sink.set_volume(volume.gain());
        }
        Ok(())
    }

    async fn volume(&self) -> Result<Volume, BackendError> {
        Ok(self.lock().volume)
    }

    async fn state(&self) -> PlaybackState {
        let inner = self.lock();
        if inner.stopped {
            return PlaybackState::Stopped;
        }
        let Some(media) = inner.media.as_ref() else {
            return PlaybackState::Idle;
        };
        if inner.started && media.sink.empty() {
            PlaybackState::Ended
        } else if media.sink.is_paused() {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        }
    }

    async fn position(&self) -> f64 {
        let inner = self.lock();
        let length = inner.media.as_ref().map(|m| m.length).unwrap_or_default();
        if length.is_zero() {
            return 0.0;
        }
        (inner.elapsed().as_secs_f64() / length.as_secs_f64()).min(1.0)
    }

    async fn time(&self) -> Duration {
        self.lock().elapsed()
    }

    async fn length(&self) -> Duration {
        self.lock()
            .media
            .as_ref()
            .map(|m| m.length)
            .unwrap_or_default()
    }

    async fn cleanup(&self) {
        let mut inner = self.lock();
        inner.release_media();
        inner.stopped = true;
        if let Some(mut output) = inner.output.take() {
            output.close();
            info!("audio output closed");
        } else {
            debug!("audio output already closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ToolKind;
    use ::rodio::mixer::{self, MixerSource};
    use ::rodio::source::SineWave;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Pulls samples out of the mixer faster than real time
    struct Drain {
        done: Arc<AtomicBool>,
        thread: Option<JoinHandle<()>>,
    }

    impl Drain {
        fn start(mut source: MixerSource) -> Self {
            let done = Arc::new(AtomicBool::new(false));
            let flag = done.clone();
            let thread = std::thread::spawn(move || {
                while !flag.load(Ordering::Relaxed) {
                    for _ in 0..1024 {
                        source.next();
                    }
                    std::thread::yield_now();
                }
            });
            Self {
                done,
                thread: Some(thread),
            }
        }
    }

    impl Drop for Drain {
        fn drop(&mut self) {
            self.done.store(true, Ordering::Relaxed);
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }

    fn backend() -> (RodioBackend, Drain) {
        let (mixer, source) = mixer::mixer(2, 44_100);
        let tool = Tool::with_path(ToolKind::YtDlp, "/nonexistent/yt-dlp");
        (RodioBackend::with_mixer(tool, mixer), Drain::start(source))
    }

    fn tone(length: Duration) -> impl Source + Send + 'static {
        SineWave::new(440.0).take_duration(length)
    }

    async fn wait_for(backend: &RodioBackend, wanted: PlaybackState) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while backend.state().await != wanted {
            assert!(
                std::time::Instant::now() < deadline,
                "stuck in {} waiting for {}",
                backend.state().await,
                wanted
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_controls_need_media() {
        let (backend, _drain) = backend();
        assert_eq!(backend.kind(), BackendKind::Rodio);
        assert_eq!(backend.state().await, PlaybackState::Idle);
        assert!(matches!(backend.play().await, Err(BackendError::NotLoaded)));
        assert!(matches!(backend.pause().await, Err(BackendError::NotLoaded)));
        assert_eq!(backend.time().await, Duration::ZERO);
        assert_eq!(backend.position().await, 0.0);
    }

    #[tokio::test]
    async fn test_volume_survives_reload() {
        let (backend, _drain) = backend();
        backend.set_volume(Volume::new(35)).await.unwrap();
        backend
            .queue(tone(Duration::from_secs(10)), Duration::from_secs(10), None)
            .unwrap();

        assert_eq!(backend.volume().await.unwrap(), Volume::new(35));
        let inner = backend.lock();
        let sink = &inner.media.as_ref().unwrap().sink;
        assert!((sink.volume() - 0.35).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_queued_media_waits_for_play() {
        let (backend, _drain) = backend();
        backend
            .queue(tone(Duration::from_secs(10)), Duration::from_secs(10), None)
            .unwrap();
        assert_eq!(backend.state().await, PlaybackState::Paused);
        assert_eq!(backend.length().await, Duration::from_secs(10));
        // Pause before play is rejected
        assert!(matches!(backend.pause().await, Err(BackendError::NotLoaded)));

        backend.play().await.unwrap();
        assert_eq!(backend.state().await, PlaybackState::Playing);
    }

    #[tokio::test]
    async fn test_pause_toggles_sink_and_clock() {
        let (backend, _drain) = backend();
        backend
            .queue(tone(Duration::from_secs(30)), Duration::from_secs(30), None)
            .unwrap();
        backend.play().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        backend.pause().await.unwrap();
        assert_eq!(backend.state().await, PlaybackState::Paused);
        let frozen = backend.time().await;
        assert!(frozen >= Duration::from_millis(30));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(backend.time().await, frozen);

        backend.pause().await.unwrap();
        assert_eq!(backend.state().await, PlaybackState::Playing);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(backend.time().await > frozen);
    }

    #[tokio::test]
    async fn test_drained_sink_reports_ended() {
        let (backend, _drain) = backend();
        backend
            .queue(tone(Duration::from_millis(50)), Duration::from_millis(50), None)
            .unwrap();
        backend.play().await.unwrap();

        wait_for(&backend, PlaybackState::Ended).await;
        assert!(backend.position().await <= 1.0);
    }

    #[tokio::test]
    async fn test_stop_twice() {
        let (backend, _drain) = backend();
        backend
            .queue(tone(Duration::from_secs(10)), Duration::from_secs(10), None)
            .unwrap();
        backend.play().await.unwrap();

        backend.stop().await.unwrap();
        assert_eq!(backend.state().await, PlaybackState::Stopped);
        assert_eq!(backend.time().await, Duration::ZERO);
        assert_eq!(backend.length().await, Duration::ZERO);

        backend.stop().await.unwrap();
        assert_eq!(backend.state().await, PlaybackState::Stopped);
        assert!(matches!(backend.play().await, Err(BackendError::NotLoaded)));
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent_and_closes_output() {
        let (backend, _drain) = backend();
        backend
            .queue(tone(Duration::from_secs(10)), Duration::from_secs(10), None)
            .unwrap();

        backend.cleanup().await;
        backend.cleanup().await;
        assert_eq!(backend.state().await, PlaybackState::Stopped);

        let again = backend.queue(tone(Duration::from_secs(1)), Duration::from_secs(1), None);
        assert!(matches!(again, Err(BackendError::Audio(_))));
    }
}
