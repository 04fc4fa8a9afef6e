//! Integration tests for ytaudio
//!
//! Tests are organized by component:
//! - resolver_test: URL validation, yt-dlp extraction and download (fake yt-dlp scripts)
//! - player_test: Player facade over a fake backend
//! - controls_test: Key listener and session control handler
//! - monitor_test: Progress monitor ticks and end-of-stream notices
//! - app_test: Orchestrator flows against a scripted console
//! - ui_test: Rendering into a TestBackend
//! - cli_test: Argument parsing, exit codes, JSON output
//!
//! Shared fakes live in `common/`.

// Note: Each test file is a separate integration test crate
// Tests are run individually by cargo, not via mod.rs
