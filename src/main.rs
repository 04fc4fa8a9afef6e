//! ytaudio - stream YouTube audio in your terminal
//!
//! # Usage
//!
//! ```bash
//! # Interactive prompt
//! ytaudio
//!
//! # Play one link and exit
//! ytaudio --url "https://www.youtube.com/watch?v=dQw4w9WgXcQ" --volume 50
//!
//! # Audio formats of a link (for scripting)
//! ytaudio --url "https://youtu.be/dQw4w9WgXcQ" --formats --json
//! ```

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use ytaudio::app::{App, SessionEnd};
use ytaudio::backend;
use ytaudio::cli::{Cli, ExitCode, FormatsResponse, Output};
use ytaudio::config::Config;
use ytaudio::logging::configure_logging;
use ytaudio::player::Player;
use ytaudio::stream::{is_valid_url, YtDlpResolver};
use ytaudio::ui::{install_panic_hook, Screen};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let config = Config::from_cli(&cli);
    let log_path = configure_logging(config.log_path());
    info!(version = env!("CARGO_PKG_VERSION"), log = ?log_path, "ytaudio starting");

    let output = Output::new(&cli);
    let code = if cli.formats {
        list_formats(&cli, &config, &output).await
    } else {
        run_player(&cli, config, &output).await
    };
    info!(code = i32::from(code), "exiting");
    code.into()
}

// =============================================================================
// Formats Mode
// =============================================================================

/// `--formats`: print the audio-only formats of `--url`
async fn list_formats(cli: &Cli, config: &Config, output: &Output) -> ExitCode {
    let Some(url) = cli.url.as_deref() else {
        return output.error("--formats requires --url", ExitCode::InvalidArgs);
    };
    if !is_valid_url(url) {
        return output.error("Invalid YouTube URL", ExitCode::InvalidArgs);
    }

    let resolver = YtDlpResolver::with_tool(config.ytdlp.clone());
    match resolver.audio_formats(url).await {
        Ok(formats) => {
            let response = FormatsResponse {
                url: url.to_string(),
                formats,
            };
            match output.formats(response) {
                Ok(()) => ExitCode::Success,
                Err(e) => output.error(e.to_string(), ExitCode::Error),
            }
        }
        Err(e) => output.error(e.to_string(), ExitCode::ExtractionFailed),
    }
}

// =============================================================================
// Player Mode
// =============================================================================

/// Cancel `token` on SIGINT or SIGTERM
fn spawn_signal_handler(token: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        token.cancel();
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Interactive prompt, or a single `--url` session
async fn run_player(cli: &Cli, config: Config, output: &Output) -> ExitCode {
    // Reject a bad --url before taking over the terminal
    if let Some(url) = cli.url.as_deref() {
        if !is_valid_url(url) {
            return output.error("Invalid YouTube URL", ExitCode::InvalidArgs);
        }
    }

    if !config.ytdlp.is_available().await {
        return output.error(
            format!("{} not found. Install it first.", config.ytdlp.program()),
            ExitCode::Error,
        );
    }

    let backend = match backend::select(config.backend, config.mpv.clone(), config.ytdlp.clone()).await {
        Ok(backend) => backend,
        Err(e) => return output.error(e.to_string(), ExitCode::PlaybackFailed),
    };
    let player = Arc::new(Player::new(backend));

    let token = CancellationToken::new();
    spawn_signal_handler(token.clone());
    install_panic_hook();

    let screen = match Screen::new() {
        Ok(screen) => screen,
        Err(e) => {
            player.cleanup().await;
            return output.error(format!("Cannot open terminal: {}", e), ExitCode::Error);
        }
    };

    let resolver = YtDlpResolver::with_tool(config.ytdlp.clone());
    let mut app = App::new(screen, resolver, player, config.playback(), token);

    let result = match cli.url.as_deref() {
        Some(url) => match app.run_once(url).await {
            Ok(end) => {
                info!(?end, "direct session finished");
                if end == SessionEnd::Failed {
                    Err(("Playback error".to_string(), ExitCode::PlaybackFailed))
                } else {
                    Ok(())
                }
            }
            Err(e) => Err((e.to_string(), ExitCode::from(&e))),
        },
        None => app
            .run()
            .await
            .map_err(|e| (format!("{:#}", e), ExitCode::Error)),
    };

    // Terminal back to the shell before printing anything
    if let Err(e) = app.into_console().restore() {
        error!("terminal restore failed: {}", e);
    }

    match result {
        Ok(()) => {
            output.info("Thanks for listening. Goodbye!");
            ExitCode::Success
        }
        Err((msg, code)) => output.error(msg, code),
    }
}
