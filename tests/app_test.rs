//! Orchestrator tests against a scripted console
//!
//! Run with: cargo test --test app_test

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{key, FakeBackend, FakeConsole, FakeResolver, Shown, URL};
use tokio_util::sync::CancellationToken;
use ytaudio::cli::ExitCode;
use ytaudio::player::Player;
use ytaudio::{App, AppState, PlayError, PlaybackSettings, SessionEnd, Volume};

fn settings() -> PlaybackSettings {
    PlaybackSettings {
        ready_timeout: Duration::from_millis(300),
        monitor_interval: Duration::from_millis(30),
        poll_interval: Duration::from_millis(20),
        ..PlaybackSettings::default()
    }
}

fn app(
    console: FakeConsole,
    resolver: FakeResolver,
    backend: &Arc<FakeBackend>,
) -> App<FakeConsole, FakeResolver> {
    App::new(
        console,
        resolver,
        Arc::new(Player::new(backend.clone())),
        settings(),
        CancellationToken::new(),
    )
}

async fn run(app: &mut App<FakeConsole, FakeResolver>) {
    tokio::time::timeout(Duration::from_secs(5), app.run())
        .await
        .expect("app did not finish")
        .unwrap();
}

// =============================================================================
// Interactive mode
// =============================================================================

#[tokio::test]
async fn test_invalid_url_reprompts_with_message() {
    let backend = FakeBackend::new().into_arc();
    let resolver = FakeResolver::default();
    let mut app = app(
        FakeConsole::with_urls(["https://vimeo.com/123"]),
        resolver.clone(),
        &backend,
    );

    run(&mut app).await;

    assert_eq!(resolver.calls(), 0);
    assert_eq!(app.sessions(), 0);
    assert_eq!(app.state(), AppState::Exiting);

    let console = app.console();
    assert_eq!(console.errors(), vec!["Invalid YouTube URL. Please try again."]);
    assert!(console.shown.contains(&Shown::Prompt(Some(
        "Invalid YouTube URL. Please try again.".into()
    ))));
    assert_eq!(console.shown.last(), Some(&Shown::Goodbye));
}

#[tokio::test]
async fn test_load_failure_starts_no_session() {
    let backend = FakeBackend::new().failing_load().into_arc();
    let mut app = app(FakeConsole::with_urls([URL]), FakeResolver::default(), &backend);

    run(&mut app).await;

    assert_eq!(app.sessions(), 0);
    let console = app.console();
    assert_eq!(console.key_sources, 0);
    assert_eq!(console.sessions_rendered(), 0);
    assert_eq!(console.errors(), vec!["Failed to load audio stream"]);
    assert!(!backend.calls().contains(&"play"));
}

#[tokio::test]
async fn test_extraction_failure_shows_error() {
    let backend = FakeBackend::new().into_arc();
    let resolver = FakeResolver::failing();
    let mut app = app(FakeConsole::with_urls([URL]), resolver.clone(), &backend);

    run(&mut app).await;

    assert_eq!(resolver.calls(), 1);
    let errors = app.console().errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Failed to extract audio stream"));
    assert!(errors[0].contains("Video unavailable"));
    assert!(!backend.calls().contains(&"load"));
}

#[tokio::test]
async fn test_natural_end_asks_to_continue() {
    let backend = FakeBackend::new()
        .ending_after(Duration::from_millis(100))
        .into_arc();
    let mut app = app(FakeConsole::with_urls([URL]), FakeResolver::default(), &backend);

    run(&mut app).await;

    assert_eq!(app.sessions(), 1);
    let console = app.console();
    assert!(console.sessions_rendered() >= 1);
    assert_eq!(console.key_sources, 1);

    let continues = console.continues();
    assert_eq!(continues.len(), 1);
    assert!(continues[0].iter().any(|n| n == "Playback finished!"));

    assert_eq!(backend.cleanups(), 1);
    assert_eq!(console.shown.last(), Some(&Shown::Goodbye));
}

#[tokio::test]
async fn test_loading_messages_in_order() {
    let backend = FakeBackend::new()
        .ending_after(Duration::from_millis(50))
        .into_arc();
    let mut app = app(FakeConsole::with_urls([URL]), FakeResolver::default(), &backend);

    run(&mut app).await;

    let loading: Vec<&str> = app
        .console()
        .shown
        .iter()
        .filter_map(|s| match s {
            Shown::Loading(msg) => Some(msg.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        loading,
        vec![
            "Extracting audio stream...",
            "Loading stream...",
            "Starting playback...",
        ]
    );
}

#[tokio::test]
async fn test_blank_input_then_quit() {
    let backend = FakeBackend::new().into_arc();
    let resolver = FakeResolver::default();
    let mut app = app(
        FakeConsole::with_urls(["   ", "quit"]),
        resolver.clone(),
        &backend,
    );

    run(&mut app).await;

    assert_eq!(resolver.calls(), 0);
    let prompts = app
        .console()
        .shown
        .iter()
        .filter(|s| matches!(s, Shown::Prompt(_)))
        .count();
    assert_eq!(prompts, 2);
    assert_eq!(backend.cleanups(), 1);
}

#[tokio::test]
async fn test_quit_key_exits_without_asking() {
    let backend = FakeBackend::new().into_arc();
    let console = FakeConsole::with_urls([URL, URL]).keys(vec![key('q')], Duration::from_millis(80));
    let mut app = app(console, FakeResolver::default(), &backend);

    run(&mut app).await;

    let console = app.console();
    assert!(console.continues().is_empty());
    // The second URL is never asked for
    assert_eq!(
        console
            .shown
            .iter()
            .filter(|s| matches!(s, Shown::Prompt(_)))
            .count(),
        1
    );
    assert!(backend.count("stop") >= 1);
    assert_eq!(backend.cleanups(), 1);
}

#[tokio::test]
async fn test_continue_plays_another() {
    let backend = FakeBackend::new()
        .ending_after(Duration::from_millis(60))
        .into_arc();
    let console = FakeConsole::with_urls([URL, URL]).answers([true, false]);
    let mut app = app(console, FakeResolver::default(), &backend);

    run(&mut app).await;

    assert_eq!(app.sessions(), 2);
    assert_eq!(app.console().continues().len(), 2);
    assert_eq!(app.console().key_sources, 2);
    assert_eq!(backend.count("load"), 2);
}

#[tokio::test]
async fn test_next_key_ends_session_only() {
    let backend = FakeBackend::new().into_arc();
    let console = FakeConsole::with_urls([URL])
        .keys(vec![key('-'), key('n')], Duration::from_millis(50))
        .answers([false]);
    let mut app = app(console, FakeResolver::default(), &backend);

    run(&mut app).await;

    let continues = app.console().continues();
    assert_eq!(continues.len(), 1);
    assert!(continues[0].iter().any(|n| n == "Next track"));
    assert!(continues[0].iter().any(|n| n == "Volume: 60%"));
}

#[tokio::test]
async fn test_cancelled_token_skips_prompt() {
    let backend = FakeBackend::new().into_arc();
    let token = CancellationToken::new();
    token.cancel();
    let mut app = App::new(
        FakeConsole::with_urls([URL]),
        FakeResolver::default(),
        Arc::new(Player::new(backend.clone())),
        settings(),
        token,
    );

    run(&mut app).await;

    assert_eq!(app.console().shown, vec![Shown::Goodbye]);
    assert_eq!(backend.cleanups(), 1);
}

// =============================================================================
// Direct mode
// =============================================================================

#[tokio::test]
async fn test_run_once_resolver_failure() {
    let backend = FakeBackend::new().into_arc();
    let mut app = app(FakeConsole::default(), FakeResolver::failing(), &backend);

    let err = app.run_once(URL).await.unwrap_err();
    assert!(matches!(err, PlayError::Resolve(_)));
    assert_eq!(ExitCode::from(&err), ExitCode::ExtractionFailed);
    assert_eq!(i32::from(ExitCode::from(&err)), 3);
    assert_eq!(app.console().errors().len(), 1);
    assert_eq!(backend.cleanups(), 1);
}

#[tokio::test]
async fn test_run_once_invalid_url() {
    let backend = FakeBackend::new().into_arc();
    let mut app = app(FakeConsole::default(), FakeResolver::default(), &backend);

    let err = app.run_once("not a url").await.unwrap_err();
    assert!(matches!(err, PlayError::InvalidUrl(_)));
    assert_eq!(ExitCode::from(&err), ExitCode::InvalidArgs);
}

#[tokio::test]
async fn test_run_once_ready_timeout_stops_player() {
    let backend = FakeBackend::new().stuck_opening().into_arc();
    let mut app = app(FakeConsole::default(), FakeResolver::default(), &backend);

    let err = app.run_once(URL).await.unwrap_err();
    assert!(matches!(err, PlayError::NotReady(_)));
    assert_eq!(ExitCode::from(&err), ExitCode::PlaybackFailed);
    assert_eq!(backend.count("stop"), 1);
    assert_eq!(app.sessions(), 0);
}

#[tokio::test]
async fn test_run_once_play_failure() {
    let backend = FakeBackend::new().failing_play().into_arc();
    let mut app = app(FakeConsole::default(), FakeResolver::default(), &backend);

    let err = app.run_once(URL).await.unwrap_err();
    assert!(matches!(err, PlayError::Play));
    assert_eq!(backend.count("stop"), 1);
}

#[tokio::test]
async fn test_run_once_applies_initial_volume() {
    let backend = FakeBackend::new()
        .ending_after(Duration::from_millis(50))
        .into_arc();
    let player = Arc::new(Player::new(backend.clone()));
    let mut app = App::new(
        FakeConsole::default(),
        FakeResolver::default(),
        player.clone(),
        PlaybackSettings {
            initial_volume: Volume::new(40),
            ..settings()
        },
        CancellationToken::new(),
    );

    let end = tokio::time::timeout(Duration::from_secs(5), app.run_once(URL))
        .await
        .unwrap();
    assert_eq!(tokio_test::assert_ok!(end), SessionEnd::Finished);
    assert_eq!(player.volume().await, Volume::new(40));
    assert_eq!(app.sessions(), 1);
}

#[tokio::test]
async fn test_signal_during_resolve_shuts_down_promptly() {
    let backend = FakeBackend::new().into_arc();
    let token = CancellationToken::new();
    let mut app = App::new(
        FakeConsole::default(),
        FakeResolver::slow(Duration::from_secs(60)),
        Arc::new(Player::new(backend.clone())),
        settings(),
        token.clone(),
    );

    let signal = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        signal.cancel();
    });

    let end = tokio::time::timeout(Duration::from_secs(2), app.run_once(URL))
        .await
        .expect("resolve was not abandoned");
    assert_eq!(tokio_test::assert_ok!(end), SessionEnd::Quit);
    assert_eq!(backend.count("load"), 0);
    assert_eq!(backend.cleanups(), 1);
    assert_eq!(app.state(), AppState::Exiting);
}

#[tokio::test]
async fn test_signal_during_ready_wait_stops_player() {
    let backend = FakeBackend::new().stuck_opening().into_arc();
    let token = CancellationToken::new();
    let mut app = App::new(
        FakeConsole::default(),
        FakeResolver::default(),
        Arc::new(Player::new(backend.clone())),
        PlaybackSettings {
            ready_timeout: Duration::from_secs(60),
            ..settings()
        },
        token.clone(),
    );

    let signal = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        signal.cancel();
    });

    let end = tokio::time::timeout(Duration::from_secs(2), app.run_once(URL))
        .await
        .expect("ready wait was not abandoned");
    assert_eq!(tokio_test::assert_ok!(end), SessionEnd::Quit);
    assert_eq!(backend.count("stop"), 1);
    assert_eq!(app.sessions(), 0);
    assert!(app.console().errors().is_empty());
}
