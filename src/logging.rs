//! Log setup
//!
//! The terminal belongs to the UI, so logs go to a file. `RUST_LOG` filters
//! as usual; the default is `ytaudio=info`.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "ytaudio=info";

fn open_log(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber writing to `path`.
///
/// Returns the file in use, or `None` when logging is disabled because no
/// path is known or the file cannot be opened.
pub fn configure_logging(path: Option<PathBuf>) -> Option<PathBuf> {
    let path = path?;
    let file = open_log(&path).ok()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_line_number(true)
        .with_target(false)
        .try_init()
        .ok()?;

    Some(path)
}
