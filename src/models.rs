//! Data structures and types for ytaudio
//!
//! Shared models used across the application, organized by domain:
//! - **Stream**: resolved stream metadata from the extractor
//! - **Playback**: player state, volume, progress snapshots
//! - **Controls**: control events and user-visible notices

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// =============================================================================
// Stream Models
// =============================================================================

/// Resolved metadata plus playable address for one piece of media.
///
/// Produced by the resolver, never mutated afterwards. The orchestrator holds
/// it for the lifetime of one playback session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Direct audio stream address
    pub stream_url: String,
    /// Page the stream was resolved from
    pub webpage_url: String,
    pub title: String,
    pub uploader: String,
    /// Duration in seconds (0 when unknown)
    pub duration: f64,
    pub thumbnail: Option<String>,
}

impl StreamDescriptor {
    /// Total length as a `Duration`
    pub fn length(&self) -> Duration {
        Duration::try_from_secs_f64(self.duration).unwrap_or(Duration::ZERO)
    }

    /// Whether the uploader is known
    pub fn has_uploader(&self) -> bool {
        !self.uploader.is_empty() && self.uploader != UNKNOWN
    }
}

impl fmt::Display for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} [{}]",
            self.title,
            self.uploader,
            format_duration(self.length())
        )
    }
}

/// Placeholder for missing metadata fields
pub const UNKNOWN: &str = "Unknown";

/// An audio-only format offered for a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub format_id: String,
    pub ext: String,
    pub codec: Option<String>,
    /// Average bitrate in kbit/s
    pub bitrate: Option<f64>,
    pub sample_rate: Option<u32>,
    pub filesize: Option<u64>,
}

impl AudioFormat {
    /// Human readable size
    pub fn format_size(&self) -> String {
        match self.filesize {
            Some(bytes) if bytes >= 1024 * 1024 => {
                format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
            }
            Some(bytes) if bytes >= 1024 => format!("{:.0} KB", bytes as f64 / 1024.0),
            Some(bytes) => format!("{} B", bytes),
            None => "?".to_string(),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>6}  {:<5} {:<10} {:>7} {}",
            self.format_id,
            self.ext,
            self.codec.as_deref().unwrap_or("?"),
            self.bitrate
                .map(|b| format!("{:.0}k", b))
                .unwrap_or_else(|| "?".to_string()),
            self.format_size()
        )
    }
}

// =============================================================================
// Playback Models
// =============================================================================

/// Player state, mirrored from the active backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Idle,
    Opening,
    Buffering,
    Playing,
    Paused,
    Stopped,
    Ended,
    Error,
}

impl PlaybackState {
    /// States in which the stream is not (yet) playable
    pub fn is_ready(&self) -> bool {
        !matches!(
            self,
            PlaybackState::Idle | PlaybackState::Opening | PlaybackState::Error
        )
    }

    /// States that end a playback session
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlaybackState::Stopped | PlaybackState::Ended | PlaybackState::Error
        )
    }

    /// Upper-case label for status displays
    pub fn label(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "IDLE",
            PlaybackState::Opening => "OPENING",
            PlaybackState::Buffering => "BUFFERING",
            PlaybackState::Playing => "NOW PLAYING",
            PlaybackState::Paused => "PAUSED",
            PlaybackState::Stopped => "STOPPED",
            PlaybackState::Ended => "FINISHED",
            PlaybackState::Error => "ERROR",
        }
    }

    /// Status glyph
    pub fn icon(&self) -> &'static str {
        match self {
            PlaybackState::Playing => "▶",
            PlaybackState::Paused => "⏸",
            PlaybackState::Opening | PlaybackState::Buffering => "⏳",
            PlaybackState::Stopped | PlaybackState::Idle => "⏹",
            PlaybackState::Ended => "✔",
            PlaybackState::Error => "✗",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Opening => "opening",
            PlaybackState::Buffering => "buffering",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Stopped => "stopped",
            PlaybackState::Ended => "ended",
            PlaybackState::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Output volume, always within 0..=100
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Volume(u8);

impl Volume {
    pub const MIN: Volume = Volume(0);
    pub const MAX: Volume = Volume(100);
    /// Step used by the volume up/down controls
    pub const STEP: i64 = 10;

    /// Build a volume, clamping out of range input
    pub fn new(level: i64) -> Self {
        Volume(level.clamp(0, 100) as u8)
    }

    /// Build from a 0.0 - 1.0 gain
    pub fn from_gain(gain: f32) -> Self {
        Self::new((gain * 100.0).round() as i64)
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// Linear gain in 0.0 - 1.0
    pub fn gain(&self) -> f32 {
        self.0 as f32 / 100.0
    }

    pub fn is_muted(&self) -> bool {
        self.0 == 0
    }

    /// Move by `delta`, clamping at the bounds
    pub fn step(&self, delta: i64) -> Self {
        Self::new(self.0 as i64 + delta)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Volume(70)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// What the progress monitor publishes on each tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProgressSnapshot {
    pub state: PlaybackState,
    pub elapsed: Duration,
    pub length: Duration,
    /// Fraction played, 0.0 - 1.0
    pub position: f64,
    pub volume: Volume,
}

impl ProgressSnapshot {
    /// Percentage for display, 0 - 100
    pub fn percent(&self) -> u8 {
        (self.position.clamp(0.0, 1.0) * 100.0) as u8
    }
}

// =============================================================================
// Control Models
// =============================================================================

/// A user command derived from a keypress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlEvent {
    TogglePlayPause,
    Quit,
    Next,
    Stop,
    VolumeUp,
    VolumeDown,
    ToggleMute,
    Help,
}

impl fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControlEvent::TogglePlayPause => "Play/Pause",
            ControlEvent::Quit => "Quit",
            ControlEvent::Next => "Next track",
            ControlEvent::Stop => "Stop",
            ControlEvent::VolumeUp => "Volume up",
            ControlEvent::VolumeDown => "Volume down",
            ControlEvent::ToggleMute => "Mute/Unmute",
            ControlEvent::Help => "Help",
        };
        write!(f, "{}", s)
    }
}

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Short user-visible message from a background component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

// =============================================================================
// Formatting
// =============================================================================

/// Format a duration as MM:SS, or HH:MM:SS past an hour
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Format milliseconds as MM:SS; negative input shows as 00:00
pub fn format_millis(ms: i64) -> String {
    if ms < 0 {
        return "00:00".to_string();
    }
    format_duration(Duration::from_millis(ms as u64))
}
