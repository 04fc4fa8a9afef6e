//! Terminal ownership
//!
//! [`TerminalGuard`] puts the terminal into raw mode on the alternate screen
//! and restores it on drop. A panic hook restores it too, so a crash never
//! leaves the shell unusable. [`Screen`] is the live [`Console`].

use std::io::{self, stdout, Stdout};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use crossterm::{
    cursor::{Hide, Show},
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::input::{InputOutcome, LineInput};
use super::view::{self, SessionView};
use crate::app::Console;
use crate::controls::{KeySource, TerminalKeys};
use crate::models::Notice;

/// Terminal type alias for convenience
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// How often prompts check for input while idle
const INPUT_TICK: Duration = Duration::from_millis(50);

/// How long an error stays up without a key press
const ERROR_LINGER: Duration = Duration::from_secs(2);

/// How long the farewell screen stays up
const GOODBYE_LINGER: Duration = Duration::from_millis(600);

/// Restore the terminal to normal state
pub fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(stdout(), LeaveAlternateScreen, Show)?;
    Ok(())
}

/// Restore the terminal before the default panic output
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore_terminal();
        previous(info);
    }));
}

/// Raw mode plus alternate screen for as long as it lives
pub struct TerminalGuard {
    active: bool,
}

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen, Hide)?;
        Ok(Self { active: true })
    }

    /// Restore now instead of on drop
    pub fn release(&mut self) -> io::Result<()> {
        if self.active {
            self.active = false;
            restore_terminal()?;
        }
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

/// The live terminal console
pub struct Screen {
    terminal: Tui,
    keys: TerminalKeys,
    input: LineInput,
    guard: TerminalGuard,
}

impl Screen {
    /// Take over the terminal
    pub fn new() -> Result<Self> {
        let guard = TerminalGuard::enter()?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
        terminal.clear()?;
        Ok(Self {
            terminal,
            keys: TerminalKeys,
            input: LineInput::new(),
            guard,
        })
    }

    /// Give the terminal back to the shell
    pub fn restore(mut self) -> Result<()> {
        self.guard.release()?;
        self.terminal.show_cursor()?;
        Ok(())
    }

    /// Next key press without blocking the runtime; `None` once `token` fires
    async fn next_key(&mut self, token: &CancellationToken) -> Result<Option<KeyEvent>> {
        loop {
            if let Some(key) = self.keys.poll_key(Duration::ZERO)? {
                return Ok(Some(key));
            }
            tokio::select! {
                _ = token.cancelled() => return Ok(None),
                _ = tokio::time::sleep(INPUT_TICK) => {}
            }
        }
    }
}

#[async_trait]
impl Console for Screen {
    async fn read_url(
        &mut self,
        message: Option<&Notice>,
        token: &CancellationToken,
    ) -> Result<Option<String>> {
        self.input.clear();
        loop {
            let input = &self.input;
            self.terminal
                .draw(|frame| view::render_prompt(frame, input, message))?;

            let Some(key) = self.next_key(token).await? else {
                return Ok(None);
            };
            match self.input.handle_key(key) {
                InputOutcome::Pending => {}
                InputOutcome::Submitted(text) => return Ok(Some(text)),
                InputOutcome::Cancelled => return Ok(None),
            }
        }
    }

    async fn show_loading(&mut self, message: &str) -> Result<()> {
        self.terminal
            .draw(|frame| view::render_loading(frame, message))?;
        Ok(())
    }

    async fn show_error(&mut self, message: &str, token: &CancellationToken) -> Result<()> {
        self.terminal.draw(|frame| view::render_error(frame, message))?;
        // Any key dismisses early
        let deadline = tokio::time::Instant::now() + ERROR_LINGER;
        loop {
            if self.keys.poll_key(Duration::ZERO)?.is_some() {
                break;
            }
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep_until(deadline) => break,
                _ = tokio::time::sleep(INPUT_TICK) => {}
            }
        }
        Ok(())
    }

    async fn render_session(&mut self, session: &SessionView<'_>) -> Result<()> {
        self.terminal
            .draw(|frame| view::render_session(frame, session))?;
        Ok(())
    }

    async fn ask_continue(&mut self, notices: &[Notice], token: &CancellationToken) -> Result<bool> {
        const QUESTION: &str = "Play another?";
        self.terminal
            .draw(|frame| view::render_confirm(frame, QUESTION, notices))?;
        loop {
            let Some(key) = self.next_key(token).await? else {
                return Ok(false);
            };
            let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') if !ctrl => return Ok(true),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Char('q') => return Ok(false),
                KeyCode::Char('c') if ctrl => return Ok(false),
                KeyCode::Enter | KeyCode::Esc => return Ok(false),
                other => debug!(?other, "ignored key at continue prompt"),
            }
        }
    }

    async fn goodbye(&mut self) -> Result<()> {
        self.terminal.draw(|frame| view::render_goodbye(frame))?;
        tokio::time::sleep(GOODBYE_LINGER).await;
        Ok(())
    }

    fn key_source(&mut self) -> Box<dyn KeySource> {
        Box::new(TerminalKeys)
    }
}
