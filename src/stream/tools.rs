//! External helper binaries (yt-dlp, mpv)
//!
//! Locates helper programs and builds commands for them. Helpers never see
//! the terminal: stdin is closed and, on unix, they run in their own session
//! so terminal signals aimed at us don't reach them.

use std::process::Stdio;
use tokio::process::Command;

/// Helper programs this application drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Stream extraction / download
    YtDlp,
    /// Native playback engine
    Mpv,
}

impl ToolKind {
    /// Default command name looked up in PATH
    pub fn default_command(&self) -> &'static str {
        match self {
            ToolKind::YtDlp => "yt-dlp",
            ToolKind::Mpv => {
                // On macOS, mpv may be an app bundle
                #[cfg(target_os = "macos")]
                if std::path::Path::new("/Applications/mpv.app").exists() {
                    return "/Applications/mpv.app/Contents/MacOS/mpv";
                }
                "mpv"
            }
        }
    }

    /// Environment variable that overrides the binary path
    pub fn env_var(&self) -> &'static str {
        match self {
            ToolKind::YtDlp => "YTAUDIO_YTDLP",
            ToolKind::Mpv => "YTAUDIO_MPV",
        }
    }

    /// Get a display name for this tool
    pub fn display_name(&self) -> &'static str {
        match self {
            ToolKind::YtDlp => "yt-dlp",
            ToolKind::Mpv => "mpv",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A resolved helper binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    kind: ToolKind,
    program: String,
}

impl Tool {
    /// Resolve a tool, honouring its environment override
    pub fn locate(kind: ToolKind) -> Self {
        let program = std::env::var(kind.env_var())
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| kind.default_command().to_string());
        Self { kind, program }
    }

    /// Create with a custom binary path
    pub fn with_path(kind: ToolKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            program: path.into(),
        }
    }

    pub fn kind(&self) -> ToolKind {
        self.kind
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Check if the tool is available on the system
    pub async fn is_available(&self) -> bool {
        // If it's a path, check if it exists
        if self.program.contains('/') {
            return std::path::Path::new(&self.program).exists();
        }

        // Otherwise use 'which' to find in PATH
        Command::new("which")
            .arg(&self.program)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Build a command for this tool, detached from our terminal
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);

        #[cfg(unix)]
        unsafe {
            // New session: no controlling TTY, no terminal-generated signals
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }

        cmd
    }
}
