//! Application orchestrator
//!
//! Drives one or more playback rounds:
//! `Prompting → Resolving → Loading → Session → (Prompting | Exiting)`.
//!
//! Terminal I/O goes through the [`Console`] trait and extraction through
//! [`Resolver`], so the whole flow runs against fakes in tests.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controls::{KeyListener, KeySource, Keymap, PlayerControls};
use crate::monitor::{MonitorOutcome, ProgressMonitor, MONITOR_INTERVAL};
use crate::models::{Notice, PlaybackState, ProgressSnapshot, StreamDescriptor, Volume};
use crate::player::Player;
use crate::stream::{ResolveError, Resolver};
use crate::ui::SessionView;

/// Inputs that end the interactive loop
pub const QUIT_COMMANDS: [&str; 3] = ["quit", "exit", "q"];

/// Default session poll interval
pub const SESSION_POLL: Duration = Duration::from_millis(250);

/// Default time allowed for a stream to become playable
pub const READY_TIMEOUT: Duration = Duration::from_secs(10);

pub fn is_quit_command(input: &str) -> bool {
    let input = input.trim();
    QUIT_COMMANDS.iter().any(|q| input.eq_ignore_ascii_case(q))
}

// =============================================================================
// Seams
// =============================================================================

/// Everything the orchestrator shows to or reads from the user
#[async_trait]
pub trait Console: Send {
    /// Ask for a URL. `None` when the user cancels or `token` fires.
    async fn read_url(
        &mut self,
        message: Option<&Notice>,
        token: &CancellationToken,
    ) -> anyhow::Result<Option<String>>;

    async fn show_loading(&mut self, message: &str) -> anyhow::Result<()>;

    async fn show_error(&mut self, message: &str, token: &CancellationToken) -> anyhow::Result<()>;

    async fn render_session(&mut self, view: &SessionView<'_>) -> anyhow::Result<()>;

    /// "Play another?" after a session, with the session's closing notices
    async fn ask_continue(
        &mut self,
        notices: &[Notice],
        token: &CancellationToken,
    ) -> anyhow::Result<bool>;

    async fn goodbye(&mut self) -> anyhow::Result<()>;

    /// Key presses for the session listener
    fn key_source(&mut self) -> Box<dyn KeySource>;
}

// =============================================================================
// State
// =============================================================================

/// Where the orchestrator is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    #[default]
    Prompting,
    Resolving,
    Loading,
    Session,
    Exiting,
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Played to the end
    Finished,
    /// Stopped by the user (stop / next)
    Stopped,
    /// Backend reported an error mid-stream
    Failed,
    /// Application is shutting down (quit key or signal)
    Quit,
}

/// Why a URL could not be played
#[derive(Debug, Error)]
pub enum PlayError {
    #[error("Invalid YouTube URL. Please try again.")]
    InvalidUrl(String),
    #[error("Failed to extract audio stream: {0}")]
    Resolve(#[from] ResolveError),
    #[error("Failed to load audio stream")]
    Load,
    #[error("Failed to start playback")]
    Play,
    #[error("Stream failed to load properly (not ready after {0:?})")]
    NotReady(Duration),
    #[error(transparent)]
    Console(#[from] anyhow::Error),
}

/// Timing and defaults for playback rounds
#[derive(Debug, Clone)]
pub struct PlaybackSettings {
    pub initial_volume: Volume,
    pub ready_timeout: Duration,
    pub monitor_interval: Duration,
    pub poll_interval: Duration,
    pub keymap: Keymap,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            initial_volume: Volume::default(),
            ready_timeout: READY_TIMEOUT,
            monitor_interval: MONITOR_INTERVAL,
            poll_interval: SESSION_POLL,
            keymap: Keymap::default(),
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct App<C: Console, R: Resolver> {
    console: C,
    resolver: R,
    player: Arc<Player>,
    settings: PlaybackSettings,
    /// Cancelled by the quit key or a signal
    token: CancellationToken,
    state: AppState,
    /// Shown on the next prompt
    message: Option<Notice>,
    /// Notices from the last session, shown with the continue prompt
    closing: Vec<Notice>,
    sessions: usize,
}

impl<C: Console, R: Resolver> App<C, R> {
    pub fn new(
        console: C,
        resolver: R,
        player: Arc<Player>,
        settings: PlaybackSettings,
        token: CancellationToken,
    ) -> Self {
        Self {
            console,
            resolver,
            player,
            settings,
            token,
            state: AppState::default(),
            message: None,
            closing: Vec::new(),
            sessions: 0,
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn into_console(self) -> C {
        self.console
    }

    /// Number of sessions started so far
    pub fn sessions(&self) -> usize {
        self.sessions
    }

    /// Interactive mode: prompt for URLs until the user quits
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let result = self.prompt_loop().await;
        self.shutdown().await;
        result
    }

    /// Direct mode: play exactly one URL, then shut down
    pub async fn run_once(&mut self, url: &str) -> Result<SessionEnd, PlayError> {
        let result = self.play_url(url).await;
        if let Err(e) = &result {
            warn!("playback of {} failed: {}", url, e);
            if !matches!(e, PlayError::Console(_)) {
                let _ = self.console.show_error(&e.to_string(), &self.token).await;
            }
        }
        self.shutdown().await;
        result
    }

    async fn prompt_loop(&mut self) -> anyhow::Result<()> {
        loop {
            if self.token.is_cancelled() {
                break;
            }
            self.state = AppState::Prompting;
            let message = self.message.take();
            let Some(input) = self.console.read_url(message.as_ref(), &self.token).await? else {
                debug!("prompt cancelled");
                break;
            };
            let input = input.trim();
            if input.is_empty() {
                continue;
            }
            if is_quit_command(input) {
                info!("quit requested at prompt");
                break;
            }

            let url = input.to_string();
            match self.play_url(&url).await {
                Ok(SessionEnd::Quit) => break,
                Ok(end) => {
                    debug!(?end, "session over");
                    self.state = AppState::Prompting;
                    let notices = std::mem::take(&mut self.closing);
                    if !self.console.ask_continue(&notices, &self.token).await? {
                        break;
                    }
                }
                Err(PlayError::Console(e)) => return Err(e),
                Err(e) => {
                    warn!("playback of {} failed: {}", url, e);
                    let text = e.to_string();
                    self.console.show_error(&text, &self.token).await?;
                    self.message = Some(Notice::error(text));
                }
            }
        }
        Ok(())
    }

    /// Resolve, load and play one URL through a full session
    pub async fn play_url(&mut self, url: &str) -> Result<SessionEnd, PlayError> {
        self.state = AppState::Resolving;
        if !self.resolver.is_valid_url(url) {
            return Err(PlayError::InvalidUrl(url.to_string()));
        }

        self.console.show_loading("Extracting audio stream...").await?;
        let token = self.token.clone();
        let stream = tokio::select! {
            _ = token.cancelled() => {
                info!("shutdown requested while resolving");
                return Ok(SessionEnd::Quit);
            }
            resolved = self.resolver.resolve(url) => resolved?,
        };
        info!(title = %stream.title, uploader = %stream.uploader, "resolved stream");

        // Downloads and the ready wait can be long; a signal abandons them
        let started = tokio::select! {
            _ = token.cancelled() => None,
            started = self.start_playback(&stream) => Some(started),
        };
        match started {
            Some(started) => started?,
            None => {
                info!("shutdown requested while loading");
                self.player.stop().await;
                return Ok(SessionEnd::Quit);
            }
        }
        Ok(self.run_session(&stream).await?)
    }

    /// Load → volume → play → wait for ready. No session is started on failure.
    async fn start_playback(&mut self, stream: &StreamDescriptor) -> Result<(), PlayError> {
        self.state = AppState::Loading;

        self.console.show_loading("Loading stream...").await?;
        if !self.player.load(stream).await {
            return Err(PlayError::Load);
        }

        self.player
            .set_volume(self.settings.initial_volume.get() as i64)
            .await;

        self.console.show_loading("Starting playback...").await?;
        if !self.player.play().await {
            self.player.stop().await;
            return Err(PlayError::Play);
        }

        let timeout = self.settings.ready_timeout;
        if !self.player.wait_for_ready(timeout).await {
            self.player.stop().await;
            return Err(PlayError::NotReady(timeout));
        }
        Ok(())
    }

    async fn run_session(&mut self, stream: &StreamDescriptor) -> anyhow::Result<SessionEnd> {
        self.state = AppState::Session;
        self.sessions += 1;
        info!(session = self.sessions, title = %stream.title, "session started");

        let session = self.token.child_token();
        let (snapshot_tx, mut snapshot_rx) = watch::channel(self.player.snapshot().await);
        let (notice_tx, mut notice_rx) = mpsc::unbounded_channel::<Notice>();

        let controls = Arc::new(PlayerControls::new(
            self.player.clone(),
            notice_tx.clone(),
            self.token.clone(),
        ));
        let help = controls.help_flag();

        let mut monitor = ProgressMonitor::start(
            self.player.clone(),
            self.settings.monitor_interval,
            snapshot_tx,
            notice_tx.clone(),
            session.child_token(),
        );
        let mut listener = match KeyListener::start(
            self.console.key_source(),
            self.settings.keymap.clone(),
            controls,
            notice_tx,
            session.child_token(),
        ) {
            Ok(listener) => Some(listener),
            Err(e) => {
                warn!("could not start key listener: {}", e);
                None
            }
        };

        let mut notices = Vec::new();
        let result = self
            .session_loop(
                stream,
                &session,
                &mut snapshot_rx,
                &mut notice_rx,
                &mut notices,
                help.as_ref(),
            )
            .await;

        if let Some(listener) = listener.as_mut() {
            listener.stop().await;
        }
        let outcome = monitor.stop().await;
        session.cancel();
        while let Ok(notice) = notice_rx.try_recv() {
            notices.push(notice);
        }

        let end = match result? {
            _ if self.token.is_cancelled() => SessionEnd::Quit,
            PlaybackState::Ended => SessionEnd::Finished,
            PlaybackState::Error => SessionEnd::Failed,
            _ if outcome == MonitorOutcome::Finished => SessionEnd::Finished,
            _ => SessionEnd::Stopped,
        };

        // Carry the level into the next round
        let volume = self.player.volume().await;
        if !self.player.is_muted() {
            self.settings.initial_volume = volume;
        }

        info!(?end, ?outcome, "session ended");
        self.closing = notices;
        Ok(end)
    }

    /// Re-render until the backend reaches a terminal state or the session is cancelled
    async fn session_loop(
        &mut self,
        stream: &StreamDescriptor,
        session: &CancellationToken,
        snapshots: &mut watch::Receiver<ProgressSnapshot>,
        notice_rx: &mut mpsc::UnboundedReceiver<Notice>,
        notices: &mut Vec<Notice>,
        help: &std::sync::atomic::AtomicBool,
    ) -> anyhow::Result<PlaybackState> {
        let backend = self.player.kind();
        loop {
            while let Ok(notice) = notice_rx.try_recv() {
                notices.push(notice);
            }
            let mut snapshot = *snapshots.borrow_and_update();
            let state = self.player.state().await;
            snapshot.state = state;

            let view = SessionView {
                stream,
                snapshot: &snapshot,
                backend,
                notices: notices.as_slice(),
                show_help: help.load(Ordering::Relaxed),
                keymap: &self.settings.keymap,
            };
            self.console.render_session(&view).await?;

            if state.is_terminal() || session.is_cancelled() {
                return Ok(state);
            }

            tokio::select! {
                _ = session.cancelled() => {}
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }
    }

    /// Release the player and say goodbye; runs after partial failure too
    pub async fn shutdown(&mut self) {
        self.state = AppState::Exiting;
        self.player.cleanup().await;
        if let Err(e) = self.console.goodbye().await {
            warn!("goodbye screen failed: {}", e);
        }
        info!(sessions = self.sessions, "shut down");
    }
}
