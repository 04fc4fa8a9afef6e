//! Download-to-disk via yt-dlp
//!
//! Used by the fallback backend, which can only play local files. Audio is
//! fetched into a fresh temporary directory; dropping the returned
//! [`Download`] removes it.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::tools::{Tool, ToolKind};

/// Extensions yt-dlp may produce for audio downloads, in probe order
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "webm", "opus", "ogg"];

/// File stem for downloads inside the temporary directory
const FILE_STEM: &str = "audio";

/// Errors from downloading audio
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{0} not found. Install it first.")]
    ToolNotFound(String),
    #[error("Download failed: {0}")]
    Failed(String),
    #[error("Downloaded file not found")]
    Missing,
    #[error("Failed to prepare download directory: {0}")]
    Io(#[from] std::io::Error),
}

/// A downloaded audio file, removed from disk when dropped
#[derive(Debug)]
pub struct Download {
    path: PathBuf,
    // Held for its Drop
    _dir: TempDir,
}

impl Download {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Find the file yt-dlp actually wrote for `stem` inside `dir`
pub fn find_downloaded_file(dir: &Path, stem: &str) -> Option<PathBuf> {
    AUDIO_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", stem, ext)))
        .find(|p| p.is_file())
}

/// Downloads audio for a video page with yt-dlp
#[derive(Debug, Clone)]
pub struct Downloader {
    tool: Tool,
}

impl Downloader {
    pub fn new() -> Self {
        Self::with_tool(Tool::locate(ToolKind::YtDlp))
    }

    pub fn with_tool(tool: Tool) -> Self {
        Self { tool }
    }

    /// Arguments for the preferred attempt: extract and convert to mp3
    fn extract_args(output_template: &str) -> Vec<String> {
        vec![
            "--extract-audio".into(),
            "--audio-format".into(),
            "mp3".into(),
            "--audio-quality".into(),
            "0".into(),
            "--no-playlist".into(),
            "--no-warnings".into(),
            "-o".into(),
            output_template.into(),
        ]
    }

    /// Arguments for the alternative attempt: plain best-audio download,
    /// no ffmpeg needed
    fn plain_args(output_template: &str) -> Vec<String> {
        vec![
            "--format".into(),
            "bestaudio[ext=m4a]/bestaudio/best".into(),
            "--no-playlist".into(),
            "--no-warnings".into(),
            "-o".into(),
            output_template.into(),
        ]
    }

    async fn run(&self, args: &[String], url: &str) -> Result<(), DownloadError> {
        debug!(program = self.tool.program(), ?args, url, "running downloader");

        let output = self
            .tool
            .command()
            .args(args)
            .arg(url)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DownloadError::ToolNotFound(self.tool.program().to_string())
                } else {
                    DownloadError::Io(e)
                }
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(DownloadError::Failed(
                stderr
                    .lines()
                    .rev()
                    .find(|l| !l.trim().is_empty())
                    .unwrap_or("yt-dlp exited with an error")
                    .trim()
                    .to_string(),
            ))
        }
    }

    /// Download the audio of `url` into a new temporary directory
    pub async fn fetch(&self, url: &str) -> Result<Download, DownloadError> {
        let dir = tempfile::Builder::new().prefix("ytaudio-").tempdir()?;
        let template = dir
            .path()
            .join(format!("{}.%(ext)s", FILE_STEM))
            .to_string_lossy()
            .into_owned();

        info!(url, "downloading audio");

        let first = self.run(&Self::extract_args(&template), url).await;
        match first {
            Ok(()) => {
                if let Some(path) = find_downloaded_file(dir.path(), FILE_STEM) {
                    return Ok(Download { path, _dir: dir });
                }
                warn!("downloaded file not found, trying alternative download");
            }
            Err(DownloadError::ToolNotFound(p)) => return Err(DownloadError::ToolNotFound(p)),
            Err(e) => warn!(error = %e, "audio extraction failed, trying alternative download"),
        }

        self.run(&Self::plain_args(&template), url).await?;
        let path = find_downloaded_file(dir.path(), FILE_STEM).ok_or(DownloadError::Missing)?;
        Ok(Download { path, _dir: dir })
    }
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}
