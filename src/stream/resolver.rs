//! Stream resolution via yt-dlp
//!
//! Validates YouTube URLs and asks yt-dlp for a direct audio stream plus the
//! metadata shown while playing. yt-dlp runs as a subprocess with
//! `--dump-single-json`; nothing is downloaded here.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::tools::{Tool, ToolKind};
use crate::models::{AudioFormat, StreamDescriptor, UNKNOWN};

/// Format selector preferring audio-only m4a, then webm
pub const AUDIO_FORMAT_SELECTOR: &str = "bestaudio[ext=m4a]/bestaudio[ext=webm]/bestaudio";

/// Errors from stream resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Invalid YouTube URL: {0}")]
    InvalidUrl(String),
    #[error("{0} not found. Install it first.")]
    ToolNotFound(String),
    #[error("Extraction failed: {0}")]
    Extraction(String),
    #[error("No audio-only stream available")]
    NoAudioStream,
    #[error("Malformed metadata: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Failed to run extractor: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// URL Validation
// =============================================================================

fn url_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // Canonical watch page: youtube.com/watch?v=ID (v may follow other params)
            r"^(?:https?://)?(?:www\.|m\.|music\.)?youtube\.com/watch\?(?:[^#\s]*&)?v=[A-Za-z0-9_-]+",
            // Short link: youtu.be/ID
            r"^(?:https?://)?youtu\.be/[A-Za-z0-9_-]+",
            // Embedded player: youtube.com/embed/ID
            r"^(?:https?://)?(?:www\.)?youtube\.com/embed/[A-Za-z0-9_-]+",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Check if the URL is a YouTube video address we can resolve
pub fn is_valid_url(url: &str) -> bool {
    let url = url.trim();
    !url.is_empty() && url_patterns().iter().any(|re| re.is_match(url))
}

// =============================================================================
// yt-dlp JSON
// =============================================================================

/// The subset of yt-dlp's info JSON we use
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    url: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    format_id: Option<String>,
    ext: Option<String>,
    acodec: Option<String>,
    vcodec: Option<String>,
    abr: Option<f64>,
    asr: Option<u32>,
    filesize: Option<u64>,
    filesize_approx: Option<u64>,
}

impl YtDlpFormat {
    fn is_audio_only(&self) -> bool {
        let has_audio = self.acodec.as_deref().is_some_and(|c| c != "none");
        let no_video = self.vcodec.as_deref() == Some("none");
        has_audio && no_video
    }
}

/// Parse yt-dlp `--dump-single-json` output into a descriptor
pub fn parse_stream_info(json: &str, requested_url: &str) -> Result<StreamDescriptor, ResolveError> {
    let info: YtDlpInfo = serde_json::from_str(json)?;

    let stream_url = info
        .url
        .filter(|u| !u.is_empty())
        .ok_or(ResolveError::NoAudioStream)?;

    Ok(StreamDescriptor {
        stream_url,
        webpage_url: info
            .webpage_url
            .unwrap_or_else(|| requested_url.trim().to_string()),
        title: info.title.unwrap_or_else(|| UNKNOWN.to_string()),
        uploader: info
            .uploader
            .or(info.channel)
            .unwrap_or_else(|| UNKNOWN.to_string()),
        duration: info.duration.filter(|d| d.is_finite() && *d > 0.0).unwrap_or(0.0),
        thumbnail: info.thumbnail,
    })
}

/// Parse the audio-only formats out of yt-dlp info JSON
pub fn parse_audio_formats(json: &str) -> Result<Vec<AudioFormat>, ResolveError> {
    let info: YtDlpInfo = serde_json::from_str(json)?;

    Ok(info
        .formats
        .into_iter()
        .filter(YtDlpFormat::is_audio_only)
        .map(|f| AudioFormat {
            format_id: f.format_id.unwrap_or_default(),
            ext: f.ext.unwrap_or_default(),
            codec: f.acodec,
            bitrate: f.abr,
            sample_rate: f.asr,
            filesize: f.filesize.or(f.filesize_approx),
        })
        .collect())
}

// =============================================================================
// Resolver
// =============================================================================

/// Turns a URL into a playable stream
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Check the URL against the accepted patterns
    fn is_valid_url(&self, url: &str) -> bool {
        is_valid_url(url)
    }

    /// Resolve a URL to a stream descriptor
    async fn resolve(&self, url: &str) -> Result<StreamDescriptor, ResolveError>;
}

/// Resolver backed by the yt-dlp binary
#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    tool: Tool,
}

impl YtDlpResolver {
    /// Create a resolver using yt-dlp from PATH (or YTAUDIO_YTDLP)
    pub fn new() -> Self {
        Self::with_tool(Tool::locate(ToolKind::YtDlp))
    }

    pub fn with_tool(tool: Tool) -> Self {
        Self { tool }
    }

    /// Run yt-dlp and return its JSON output
    async fn dump_json(&self, url: &str, format: Option<&str>) -> Result<String, ResolveError> {
        let mut cmd = self.tool.command();
        cmd.arg("--dump-single-json")
            .arg("--no-playlist")
            .arg("--no-warnings");
        if let Some(format) = format {
            cmd.arg("-f").arg(format);
        }
        cmd.arg(url.trim());

        debug!(program = self.tool.program(), url, "running extractor");

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ResolveError::ToolNotFound(self.tool.program().to_string())
            } else {
                ResolveError::Io(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("yt-dlp exited with an error")
                .trim()
                .to_string();
            return Err(ResolveError::Extraction(reason));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// List audio-only formats available for a video
    pub async fn audio_formats(&self, url: &str) -> Result<Vec<AudioFormat>, ResolveError> {
        if !is_valid_url(url) {
            return Err(ResolveError::InvalidUrl(url.to_string()));
        }
        let json = self.dump_json(url, None).await?;
        parse_audio_formats(&json)
    }
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resolver for YtDlpResolver {
    async fn resolve(&self, url: &str) -> Result<StreamDescriptor, ResolveError> {
        if !is_valid_url(url) {
            return Err(ResolveError::InvalidUrl(url.to_string()));
        }

        let json = self
            .dump_json(url, Some(AUDIO_FORMAT_SELECTOR))
            .await
            .inspect_err(|e| warn!(url, error = %e, "extraction failed"))?;
        let descriptor = parse_stream_info(&json, url)?;

        info!(title = %descriptor.title, uploader = %descriptor.uploader, "resolved stream");
        Ok(descriptor)
    }
}
