//! Keyboard controls
//!
//! - [`Keymap`]: which key triggers which [`ControlEvent`]
//! - [`KeySource`]: where key presses come from (the terminal, or a script in tests)
//! - [`KeyListener`]: background reader thread plus a dispatcher task
//! - [`PlayerControls`]: the session's handler, drives the [`Player`]

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::{ControlEvent, Notice, PlaybackState, Volume};
use crate::player::Player;

/// How long the reader thread blocks waiting for a key
pub const KEY_POLL: Duration = Duration::from_millis(100);

// =============================================================================
// Key Bindings
// =============================================================================

/// A key plus the modifiers that matter for matching (Ctrl, Alt)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    pub fn key(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    pub fn ctrl(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    /// Normalized: letters lower-cased, Shift dropped
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        let code = match code {
            KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
            other => other,
        };
        Self {
            code,
            modifiers: modifiers & (KeyModifiers::CONTROL | KeyModifiers::ALT),
        }
    }

    /// Short label for help screens
    pub fn label(&self) -> String {
        let key = match self.code {
            KeyCode::Char(' ') => "Space".to_string(),
            KeyCode::Char(c) => c.to_string(),
            KeyCode::Enter => "Enter".to_string(),
            KeyCode::Esc => "Esc".to_string(),
            other => format!("{:?}", other),
        };
        if self.modifiers.contains(KeyModifiers::CONTROL) {
            format!("Ctrl+{}", key.to_uppercase())
        } else {
            key
        }
    }
}

impl From<&KeyEvent> for KeyBinding {
    fn from(key: &KeyEvent) -> Self {
        Self::new(key.code, key.modifiers)
    }
}

/// Registration table of key bindings
#[derive(Debug, Clone)]
pub struct Keymap {
    bindings: Vec<(KeyBinding, ControlEvent)>,
}

impl Keymap {
    /// An empty keymap
    pub fn empty() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Bind a key, replacing any existing binding for it
    pub fn register(&mut self, binding: KeyBinding, event: ControlEvent) {
        self.bindings.retain(|(b, _)| *b != binding);
        self.bindings.push((binding, event));
    }

    pub fn lookup(&self, key: &KeyEvent) -> Option<ControlEvent> {
        let binding = KeyBinding::from(key);
        self.bindings
            .iter()
            .find(|(b, _)| *b == binding)
            .map(|(_, event)| *event)
    }

    /// Every key bound to `event`, in registration order
    pub fn keys_for(&self, event: ControlEvent) -> Vec<KeyBinding> {
        self.bindings
            .iter()
            .filter(|(_, e)| *e == event)
            .map(|(b, _)| *b)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Default for Keymap {
    fn default() -> Self {
        let mut map = Self::empty();
        map.register(KeyBinding::key(' '), ControlEvent::TogglePlayPause);
        map.register(KeyBinding::key('p'), ControlEvent::TogglePlayPause);
        map.register(KeyBinding::key('q'), ControlEvent::Quit);
        map.register(KeyBinding::ctrl('c'), ControlEvent::Quit);
        map.register(KeyBinding::key('n'), ControlEvent::Next);
        map.register(KeyBinding::key('s'), ControlEvent::Stop);
        map.register(KeyBinding::key('+'), ControlEvent::VolumeUp);
        map.register(KeyBinding::key('='), ControlEvent::VolumeUp);
        map.register(KeyBinding::key('-'), ControlEvent::VolumeDown);
        map.register(KeyBinding::key('m'), ControlEvent::ToggleMute);
        map.register(KeyBinding::key('h'), ControlEvent::Help);
        map
    }
}

// =============================================================================
// Key Sources
// =============================================================================

/// Blocking source of key presses, polled from the reader thread
pub trait KeySource: Send + 'static {
    /// Wait up to `timeout` for the next key press
    fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>>;
}

/// Key presses from the terminal (requires raw mode)
#[derive(Debug, Default)]
pub struct TerminalKeys;

impl KeySource for TerminalKeys {
    fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            // Only key presses (ignore releases on Windows)
            Event::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(key)),
            _ => Ok(None),
        }
    }
}

impl KeySource for Box<dyn KeySource> {
    fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>> {
        (**self).poll_key(timeout)
    }
}

// =============================================================================
// Listener
// =============================================================================

/// Reacts to control events
#[async_trait]
pub trait ControlHandler: Send + Sync {
    async fn handle(&self, event: ControlEvent) -> anyhow::Result<()>;
}

/// Reads keys on a background thread and dispatches mapped events.
///
/// The reader never blocks longer than [`KEY_POLL`], so cancellation is
/// observed within one poll interval.
pub struct KeyListener {
    token: CancellationToken,
    reader: Option<JoinHandle<()>>,
    dispatcher: Option<tokio::task::JoinHandle<()>>,
}

impl KeyListener {
    /// Start listening; runs until `stop` or until `token` is cancelled
    pub fn start<S, H>(
        mut source: S,
        keymap: Keymap,
        handler: Arc<H>,
        notices: mpsc::UnboundedSender<Notice>,
        token: CancellationToken,
    ) -> io::Result<Self>
    where
        S: KeySource,
        H: ControlHandler + ?Sized + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<ControlEvent>();

        let reader_token = token.clone();
        let reader = std::thread::Builder::new()
            .name("ytaudio-keys".into())
            .spawn(move || {
                while !reader_token.is_cancelled() {
                    match source.poll_key(KEY_POLL) {
                        Ok(Some(key)) => {
                            let Some(event) = keymap.lookup(&key) else {
                                continue;
                            };
                            debug!(?event, "key mapped");
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!("key input failed: {}", e);
                            break;
                        }
                    }
                }
                debug!("key reader stopped");
            })?;

        let dispatch_token = token.clone();
        let dispatcher = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = dispatch_token.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                if let Err(e) = handler.handle(event).await {
                    warn!(?event, "control handler failed: {:#}", e);
                    let _ = notices.send(Notice::error(format!("{} failed: {}", event, e)));
                }
            }
        });

        info!("key listener started");
        Ok(Self {
            token,
            reader: Some(reader),
            dispatcher: Some(dispatcher),
        })
    }

    pub fn is_running(&self) -> bool {
        self.reader.is_some()
    }

    /// Cancel and join both halves; safe to call repeatedly
    pub async fn stop(&mut self) {
        self.token.cancel();
        if let Some(dispatcher) = self.dispatcher.take() {
            let _ = dispatcher.await;
        }
        if let Some(reader) = self.reader.take() {
            let _ = tokio::task::spawn_blocking(move || reader.join()).await;
            info!("key listener stopped");
        }
    }
}

impl Drop for KeyListener {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

// =============================================================================
// Session Handler
// =============================================================================

/// Drives the player from control events during a session
pub struct PlayerControls {
    player: Arc<Player>,
    notices: mpsc::UnboundedSender<Notice>,
    help: Arc<AtomicBool>,
    quit: CancellationToken,
}

impl PlayerControls {
    /// `quit` is cancelled when the user asks to leave the program
    pub fn new(
        player: Arc<Player>,
        notices: mpsc::UnboundedSender<Notice>,
        quit: CancellationToken,
    ) -> Self {
        Self {
            player,
            notices,
            help: Arc::new(AtomicBool::new(false)),
            quit,
        }
    }

    /// Shared flag for the help overlay
    pub fn help_flag(&self) -> Arc<AtomicBool> {
        self.help.clone()
    }

    fn notify(&self, notice: Notice) -> anyhow::Result<()> {
        self.notices.send(notice)?;
        Ok(())
    }

    async fn step_volume(&self, delta: i64) -> anyhow::Result<()> {
        let target: Volume = self.player.volume().await.step(delta);
        self.player.set_volume(target.get() as i64).await;
        self.notify(Notice::info(format!("Volume: {}", target)))
    }
}

#[async_trait]
impl ControlHandler for PlayerControls {
    async fn handle(&self, event: ControlEvent) -> anyhow::Result<()> {
        match event {
            ControlEvent::TogglePlayPause => {
                self.player.pause().await;
                let notice = match self.player.state().await {
                    PlaybackState::Paused => Notice::info("Paused"),
                    PlaybackState::Playing => Notice::info("Playing"),
                    other => Notice::warning(format!("Player is {}", other)),
                };
                self.notify(notice)
            }
            ControlEvent::Quit => {
                self.notify(Notice::info("Quitting..."))?;
                self.player.stop().await;
                self.quit.cancel();
                Ok(())
            }
            ControlEvent::Next => {
                self.notify(Notice::info("Next track"))?;
                self.player.stop().await;
                Ok(())
            }
            ControlEvent::Stop => {
                self.player.stop().await;
                self.notify(Notice::info("Stopped"))
            }
            ControlEvent::VolumeUp => self.step_volume(Volume::STEP).await,
            ControlEvent::VolumeDown => self.step_volume(-Volume::STEP).await,
            ControlEvent::ToggleMute => {
                let volume = self.player.toggle_mute().await;
                if self.player.is_muted() {
                    self.notify(Notice::info("Muted"))
                } else {
                    self.notify(Notice::info(format!("Unmuted ({})", volume)))
                }
            }
            ControlEvent::Help => {
                self.help.fetch_xor(true, Ordering::Relaxed);
                Ok(())
            }
        }
    }
}
