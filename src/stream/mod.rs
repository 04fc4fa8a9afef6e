//! Stream infrastructure
//!
//! - Tools: locating and spawning helper binaries
//! - Resolver: yt-dlp URL validation and metadata extraction
//! - Download: yt-dlp download-to-disk for the fallback backend

pub mod download;
pub mod resolver;
pub mod tools;

pub use download::{Download, DownloadError, Downloader};
pub use resolver::{is_valid_url, ResolveError, Resolver, YtDlpResolver};
pub use tools::{Tool, ToolKind};
