//! CLI - Command Line Interface for ytaudio
//!
//! Run without arguments for the interactive prompt, or pass `--url` to play
//! one link and exit.
//!
//! # Examples
//!
//! ```bash
//! # Interactive prompt
//! ytaudio
//!
//! # Play one link at 40% volume
//! ytaudio --url "https://youtu.be/dQw4w9WgXcQ" --volume 40
//!
//! # List the audio formats of a video as JSON
//! ytaudio --url "https://youtu.be/dQw4w9WgXcQ" --formats --json
//! ```

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::app::PlayError;
use crate::backend::BackendChoice;
use crate::models::{AudioFormat, Volume};

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments or URL
    InvalidArgs = 2,
    /// yt-dlp could not resolve the link
    ExtractionFailed = 3,
    /// The player could not load or start the stream
    PlaybackFailed = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

impl From<&PlayError> for ExitCode {
    fn from(err: &PlayError) -> Self {
        match err {
            PlayError::InvalidUrl(_) => ExitCode::InvalidArgs,
            PlayError::Resolve(_) => ExitCode::ExtractionFailed,
            PlayError::Load | PlayError::Play | PlayError::NotReady(_) => ExitCode::PlaybackFailed,
            PlayError::Console(_) => ExitCode::Error,
        }
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// ytaudio - stream YouTube audio in your terminal
///
/// Run without arguments for the interactive prompt.
#[derive(Parser, Debug)]
#[command(
    name = "ytaudio",
    version,
    about = "Stream YouTube audio in your terminal",
    long_about = "Resolves a YouTube link with yt-dlp and plays its audio with \
                  keyboard controls.\n\n\
                  Run without arguments for the interactive prompt.\n\
                  Pass --url to play a single link and exit.",
    after_help = "CONTROLS:\n\
                  Space/p  Play/Pause      s  Stop        n  Next\n\
                  +/=      Volume up       -  Volume down  m  Mute\n\
                  h        Help            q  Quit\n\n\
                  EXAMPLES:\n\
                  ytaudio                                   Interactive prompt\n\
                  ytaudio -u https://youtu.be/<id> -v 40    Play one link\n\
                  ytaudio -u https://youtu.be/<id> --formats --json"
)]
pub struct Cli {
    /// YouTube URL to play directly
    #[arg(long, short = 'u')]
    pub url: Option<String>,

    /// Initial volume (0-100, out of range values are clamped)
    #[arg(long, short = 'v', default_value_t = 70, allow_negative_numbers = true)]
    pub volume: i64,

    /// Playback backend
    #[arg(long, short = 'b', value_enum, default_value_t = BackendArg::Auto, env = "YTAUDIO_BACKEND")]
    pub backend: BackendArg,

    /// Seconds to wait for the stream to become playable
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// List the audio-only formats of --url and exit
    #[arg(long, requires = "url")]
    pub formats: bool,

    /// Output format as JSON (default for non-TTY, with --formats)
    #[arg(long, short = 'j')]
    pub json: bool,

    /// Write logs here instead of the cache directory
    #[arg(long, env = "YTAUDIO_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Whether a single URL is played instead of prompting
    pub fn is_direct_mode(&self) -> bool {
        self.url.is_some()
    }

    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }

    pub fn initial_volume(&self) -> Volume {
        Volume::new(self.volume)
    }
}

/// Backend choice on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum BackendArg {
    /// mpv when installed, rodio otherwise
    #[default]
    Auto,
    /// mpv over its IPC socket
    Mpv,
    /// Download, then play through the system mixer
    Rodio,
}

impl From<BackendArg> for BackendChoice {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => BackendChoice::Auto,
            BackendArg::Mpv => BackendChoice::Mpv,
            BackendArg::Rodio => BackendChoice::Rodio,
        }
    }
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

/// `--formats` response
#[derive(Debug, Serialize, Deserialize)]
pub struct FormatsResponse {
    pub url: String,
    pub formats: Vec<AudioFormat>,
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
        }
    }

    /// Print success data wrapped in the JSON envelope
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        let output = JsonOutput::success(data);
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    /// Print the format table, or JSON
    pub fn formats(&self, response: FormatsResponse) -> anyhow::Result<()> {
        if self.json {
            return self.print(response);
        }
        if response.formats.is_empty() {
            println!("No audio-only formats for {}", response.url);
            return Ok(());
        }
        println!("{:>6}  {:<5} {:<10} {:>7} SIZE", "ID", "EXT", "CODEC", "BITRATE");
        for format in &response.formats {
            println!("{}", format);
        }
        Ok(())
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed for JSON)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
