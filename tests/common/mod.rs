//! Shared fakes for integration tests
//!
//! - `FakeBackend`: scriptable playback engine
//! - `FakeResolver`: canned stream descriptors
//! - `ScriptedKeys`: key presses fed to the listener
//! - `FakeConsole`: scripted prompt answers, records what was shown

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio_util::sync::CancellationToken;

use ytaudio::app::Console;
use ytaudio::backend::{Backend, BackendError, BackendKind};
use ytaudio::controls::KeySource;
use ytaudio::stream::{is_valid_url, ResolveError, Resolver};
use ytaudio::ui::SessionView;
use ytaudio::{Notice, PlaybackState, StreamDescriptor, Volume};

pub const URL: &str = "https://www.youtube.com/watch?v=abc123";

pub fn descriptor() -> StreamDescriptor {
    StreamDescriptor {
        stream_url: "https://rr1.example/audio.m4a".into(),
        webpage_url: URL.into(),
        title: "Never Gonna Give You Up".into(),
        uploader: "Rick Astley".into(),
        duration: 213.0,
        thumbnail: None,
    }
}

// =============================================================================
// Backend
// =============================================================================

#[derive(Debug)]
struct FakeState {
    state: PlaybackState,
    volume: Volume,
    loaded: bool,
    started: Option<Instant>,
    calls: Vec<&'static str>,
}

/// Playback engine driven entirely from the test
#[derive(Debug)]
pub struct FakeBackend {
    inner: Mutex<FakeState>,
    fail_load: bool,
    fail_play: bool,
    fail_volume: bool,
    /// State after a successful `play`
    play_state: PlaybackState,
    /// Reaches `Ended` this long after `play`
    ends_after: Option<Duration>,
    cleanups: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FakeState {
                state: PlaybackState::Idle,
                volume: Volume::default(),
                loaded: false,
                started: None,
                calls: Vec::new(),
            }),
            fail_load: false,
            fail_play: false,
            fail_volume: false,
            play_state: PlaybackState::Playing,
            ends_after: None,
            cleanups: AtomicUsize::new(0),
        }
    }

    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn failing_play(mut self) -> Self {
        self.fail_play = true;
        self
    }

    pub fn failing_volume(mut self) -> Self {
        self.fail_volume = true;
        self
    }

    /// Never leaves `Opening` after play
    pub fn stuck_opening(mut self) -> Self {
        self.play_state = PlaybackState::Opening;
        self
    }

    pub fn ending_after(mut self, after: Duration) -> Self {
        self.ends_after = Some(after);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Force a state, as the engine itself would
    pub fn set_state(&self, state: PlaybackState) {
        self.lock().state = state;
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.lock().calls.iter().filter(|c| **c == call).count()
    }

    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap()
    }

    fn elapsed(&self, inner: &FakeState) -> Duration {
        inner.started.map(|t| t.elapsed()).unwrap_or_default()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Mpv
    }

    async fn load(&self, _stream: &StreamDescriptor) -> Result<(), BackendError> {
        let mut inner = self.lock();
        inner.calls.push("load");
        if self.fail_load {
            inner.state = PlaybackState::Error;
            return Err(BackendError::StartFailed("fake load failure".into()));
        }
        inner.loaded = true;
        inner.state = PlaybackState::Opening;
        Ok(())
    }

    async fn play(&self) -> Result<(), BackendError> {
        let mut inner = self.lock();
        inner.calls.push("play");
        if self.fail_play || !inner.loaded {
            return Err(BackendError::NotLoaded);
        }
        inner.state = self.play_state;
        inner.started = Some(Instant::now());
        Ok(())
    }

    async fn pause(&self) -> Result<(), BackendError> {
        let mut inner = self.lock();
        inner.calls.push("pause");
        inner.state = match inner.state {
            PlaybackState::Playing => PlaybackState::Paused,
            PlaybackState::Paused => PlaybackState::Playing,
            _ => return Err(BackendError::NotLoaded),
        };
        Ok(())
    }

    async fn stop(&self) -> Result<(), BackendError> {
        let mut inner = self.lock();
        inner.calls.push("stop");
        inner.loaded = false;
        inner.started = None;
        inner.state = PlaybackState::Stopped;
        Ok(())
    }

    async fn set_volume(&self, volume: Volume) -> Result<(), BackendError> {
        let mut inner = self.lock();
        inner.calls.push("set_volume");
        if self.fail_volume {
            return Err(BackendError::Exited);
        }
        inner.volume = volume;
        Ok(())
    }

    async fn volume(&self) -> Result<Volume, BackendError> {
        if self.fail_volume {
            return Err(BackendError::Exited);
        }
        Ok(self.lock().volume)
    }

    async fn state(&self) -> PlaybackState {
        let mut inner = self.lock();
        if let (Some(after), PlaybackState::Playing) = (self.ends_after, inner.state) {
            if self.elapsed(&inner) >= after {
                inner.state = PlaybackState::Ended;
            }
        }
        inner.state
    }

    async fn position(&self) -> f64 {
        let inner = self.lock();
        (self.elapsed(&inner).as_secs_f64() / 213.0).min(1.0)
    }

    async fn time(&self) -> Duration {
        let inner = self.lock();
        self.elapsed(&inner)
    }

    async fn length(&self) -> Duration {
        Duration::from_secs(213)
    }

    async fn cleanup(&self) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.lock();
        inner.calls.push("cleanup");
        inner.state = PlaybackState::Stopped;
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolves every valid URL to [`descriptor`]; the call counter is shared
/// so it can be read after the resolver moves into the app
#[derive(Debug, Default, Clone)]
pub struct FakeResolver {
    pub fail: bool,
    pub delay: Option<Duration>,
    pub calls: Arc<AtomicUsize>,
}

impl FakeResolver {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Takes `delay` before answering
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for FakeResolver {
    async fn resolve(&self, url: &str) -> Result<StreamDescriptor, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if !is_valid_url(url) {
            return Err(ResolveError::InvalidUrl(url.to_string()));
        }
        if self.fail {
            return Err(ResolveError::Extraction("Video unavailable".into()));
        }
        Ok(descriptor())
    }
}

// =============================================================================
// Keys
// =============================================================================

pub fn key(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
}

/// Plays back a fixed list of keys, one per poll, optionally after a delay
pub struct ScriptedKeys {
    keys: VecDeque<KeyEvent>,
    delay: Duration,
    started: Instant,
}

impl ScriptedKeys {
    pub fn new(keys: impl IntoIterator<Item = KeyEvent>) -> Self {
        Self::delayed(keys, Duration::ZERO)
    }

    /// Hold the keys back until `delay` has passed
    pub fn delayed(keys: impl IntoIterator<Item = KeyEvent>, delay: Duration) -> Self {
        Self {
            keys: keys.into_iter().collect(),
            delay,
            started: Instant::now(),
        }
    }
}

impl KeySource for ScriptedKeys {
    fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>> {
        if self.started.elapsed() >= self.delay {
            if let Some(key) = self.keys.pop_front() {
                return Ok(Some(key));
            }
        }
        std::thread::sleep(timeout.min(Duration::from_millis(5)));
        Ok(None)
    }
}

// =============================================================================
// Console
// =============================================================================

/// What the orchestrator showed, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Shown {
    Prompt(Option<String>),
    Loading(String),
    Error(String),
    Session(PlaybackState),
    Continue(Vec<String>),
    Goodbye,
}

#[derive(Default)]
pub struct FakeConsole {
    pub urls: VecDeque<Option<String>>,
    pub answers: VecDeque<bool>,
    /// Keys for each session, in session order
    pub session_keys: VecDeque<(Vec<KeyEvent>, Duration)>,
    pub shown: Vec<Shown>,
    pub key_sources: usize,
}

impl FakeConsole {
    pub fn with_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(|u| Some(u.into())).collect(),
            ..Self::default()
        }
    }

    pub fn answers(mut self, answers: impl IntoIterator<Item = bool>) -> Self {
        self.answers = answers.into_iter().collect();
        self
    }

    pub fn keys(mut self, keys: Vec<KeyEvent>, delay: Duration) -> Self {
        self.session_keys.push_back((keys, delay));
        self
    }

    pub fn errors(&self) -> Vec<&str> {
        self.shown
            .iter()
            .filter_map(|s| match s {
                Shown::Error(msg) => Some(msg.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn sessions_rendered(&self) -> usize {
        self.shown
            .iter()
            .filter(|s| matches!(s, Shown::Session(_)))
            .count()
    }

    pub fn continues(&self) -> Vec<&Vec<String>> {
        self.shown
            .iter()
            .filter_map(|s| match s {
                Shown::Continue(notices) => Some(notices),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Console for FakeConsole {
    async fn read_url(
        &mut self,
        message: Option<&Notice>,
        _token: &CancellationToken,
    ) -> anyhow::Result<Option<String>> {
        self.shown.push(Shown::Prompt(message.map(|m| m.text.clone())));
        Ok(self.urls.pop_front().flatten())
    }

    async fn show_loading(&mut self, message: &str) -> anyhow::Result<()> {
        self.shown.push(Shown::Loading(message.to_string()));
        Ok(())
    }

    async fn show_error(&mut self, message: &str, _token: &CancellationToken) -> anyhow::Result<()> {
        self.shown.push(Shown::Error(message.to_string()));
        Ok(())
    }

    async fn render_session(&mut self, view: &SessionView<'_>) -> anyhow::Result<()> {
        self.shown.push(Shown::Session(view.snapshot.state));
        Ok(())
    }

    async fn ask_continue(
        &mut self,
        notices: &[Notice],
        _token: &CancellationToken,
    ) -> anyhow::Result<bool> {
        self.shown
            .push(Shown::Continue(notices.iter().map(|n| n.text.clone()).collect()));
        Ok(self.answers.pop_front().unwrap_or(false))
    }

    async fn goodbye(&mut self) -> anyhow::Result<()> {
        self.shown.push(Shown::Goodbye);
        Ok(())
    }

    fn key_source(&mut self) -> Box<dyn KeySource> {
        self.key_sources += 1;
        let (keys, delay) = self.session_keys.pop_front().unwrap_or_default();
        Box::new(ScriptedKeys::delayed(keys, delay))
    }
}
