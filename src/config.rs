//! Configuration for ytaudio
//!
//! Resolved once at startup from command-line flags, with environment
//! fallbacks for the helper binaries. Nothing is read from or written to disk.

use std::path::PathBuf;
use std::time::Duration;

use crate::app::{PlaybackSettings, READY_TIMEOUT, SESSION_POLL};
use crate::backend::BackendChoice;
use crate::cli::Cli;
use crate::controls::Keymap;
use crate::models::Volume;
use crate::monitor::MONITOR_INTERVAL;
use crate::stream::{Tool, ToolKind};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// yt-dlp binary (`YTAUDIO_YTDLP`)
    pub ytdlp: Tool,
    /// mpv binary (`YTAUDIO_MPV`)
    pub mpv: Tool,
    pub backend: BackendChoice,
    pub initial_volume: Volume,
    pub ready_timeout: Duration,
    pub monitor_interval: Duration,
    pub poll_interval: Duration,
    /// Explicit log file; `None` uses [`Config::default_log_path`]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ytdlp: Tool::locate(ToolKind::YtDlp),
            mpv: Tool::locate(ToolKind::Mpv),
            backend: BackendChoice::default(),
            initial_volume: Volume::default(),
            ready_timeout: READY_TIMEOUT,
            monitor_interval: MONITOR_INTERVAL,
            poll_interval: SESSION_POLL,
            log_file: None,
        }
    }
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            backend: cli.backend.into(),
            initial_volume: cli.initial_volume(),
            ready_timeout: Duration::from_secs(cli.timeout),
            log_file: cli.log_file.clone(),
            ..Self::default()
        }
    }

    /// Default log location (~/.cache/ytaudio/ytaudio.log)
    pub fn default_log_path() -> Option<PathBuf> {
        dirs::cache_dir().map(|p| p.join("ytaudio").join("ytaudio.log"))
    }

    /// Where logs go: the explicit file, else the cache directory
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file.clone().or_else(Self::default_log_path)
    }

    /// Settings handed to the orchestrator
    pub fn playback(&self) -> PlaybackSettings {
        PlaybackSettings {
            initial_volume: self.initial_volume,
            ready_timeout: self.ready_timeout,
            monitor_interval: self.monitor_interval,
            poll_interval: self.poll_interval,
            keymap: Keymap::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_from_cli() {
        let cli = Cli::parse_from([
            "ytaudio",
            "--volume",
            "140",
            "--timeout",
            "3",
            "--backend",
            "rodio",
            "--log-file",
            "/tmp/yt.log",
        ]);
        let config = Config::from_cli(&cli);
        assert_eq!(config.initial_volume, Volume::MAX);
        assert_eq!(config.ready_timeout, Duration::from_secs(3));
        assert_eq!(config.backend, BackendChoice::Rodio);
        assert_eq!(config.log_path(), Some(PathBuf::from("/tmp/yt.log")));

        let settings = config.playback();
        assert_eq!(settings.initial_volume, Volume::MAX);
        assert_eq!(settings.poll_interval, SESSION_POLL);
    }

    #[test]
    fn test_default_log_path() {
        if let Some(path) = Config::default_log_path() {
            assert!(path.ends_with("ytaudio/ytaudio.log"));
        }
    }
}
