//! Screen rendering
//!
//! Pure functions from view data to a frame. Nothing here owns state: the
//! caller passes the stream, the latest snapshot and pending notices on every
//! draw.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Gauge, Paragraph, Wrap},
    Frame,
};

use super::input::LineInput;
use super::theme::Theme;
use crate::backend::BackendKind;
use crate::controls::Keymap;
use crate::models::{
    format_duration, ControlEvent, Notice, ProgressSnapshot, StreamDescriptor, Volume,
};

/// Longest title shown before truncation
const MAX_TITLE: usize = 55;

/// Everything the now-playing screen shows
#[derive(Debug, Clone, Copy)]
pub struct SessionView<'a> {
    pub stream: &'a StreamDescriptor,
    pub snapshot: &'a ProgressSnapshot,
    pub backend: BackendKind,
    pub notices: &'a [Notice],
    pub show_help: bool,
    pub keymap: &'a Keymap,
}

// =============================================================================
// Frame Layout
// =============================================================================

/// Clear the frame and split it into header, content, status bar
fn frame_layout(frame: &mut Frame) -> (Rect, Rect, Rect) {
    let area = frame.area();
    frame.render_widget(Clear, area);
    frame.render_widget(
        Block::default().style(Style::default().bg(Theme::BACKGROUND)),
        area,
    );

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Header
            Constraint::Min(1),    // Content
            Constraint::Length(1), // Status bar
        ])
        .split(area);
    (chunks[0], chunks[1], chunks[2])
}

fn render_header(frame: &mut Frame, area: Rect) {
    let header = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("♪ YT", Theme::title()),
            Span::styled(
                "AUDIO",
                Style::default()
                    .fg(Theme::SECONDARY)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(Span::styled(
            "Stream YouTube audio from your terminal",
            Theme::dimmed(),
        )),
    ])
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Double)
            .border_style(Theme::border()),
    );
    frame.render_widget(header, area);
}

fn render_status_bar(frame: &mut Frame, area: Rect, left: Span, hints: &[(&str, &str)]) {
    let mut spans = vec![left, Span::raw(" │ ")];
    for (key, desc) in hints {
        spans.push(Span::styled(format!("{}:", key), Theme::keybind()));
        spans.push(Span::styled(format!("{}  ", desc), Theme::keybind_desc()));
    }
    let status = Paragraph::new(Line::from(spans)).style(Theme::status_bar());
    frame.render_widget(status, area);
}

/// Rect of `width` x `height` centered in `area`
pub fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

fn notice_lines(notices: &[Notice]) -> Vec<Line<'_>> {
    notices
        .iter()
        .map(|n| Line::from(Span::styled(n.text.as_str(), Theme::notice(n.level))))
        .collect()
}

// =============================================================================
// Prompt
// =============================================================================

/// URL prompt, optionally with a message from the previous round
pub fn render_prompt(frame: &mut Frame, input: &LineInput, message: Option<&Notice>) {
    let (header, content, status) = frame_layout(frame);
    render_header(frame, header);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(4),    // Welcome
            Constraint::Length(3), // Input box
            Constraint::Length(2), // Message
        ])
        .split(content);

    let welcome = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled("Enter a YouTube URL to stream its audio", Theme::text())),
        Line::from(""),
        Line::from(vec![
            Span::styled("youtube.com/watch?v=…", Theme::dimmed()),
            Span::raw("   "),
            Span::styled("youtu.be/…", Theme::dimmed()),
        ]),
    ])
    .alignment(Alignment::Center);
    frame.render_widget(welcome, chunks[0]);

    let (before, after) = input.split_at_cursor();
    let field = Paragraph::new(Line::from(vec![
        Span::styled("➤ ", Theme::success()),
        Span::styled(before, Theme::input()),
        Span::styled("│", Theme::input_cursor()),
        Span::styled(after, Theme::input()),
    ]))
    .style(Theme::input())
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Theme::border_focused())
            .title(Span::styled(" URL ", Theme::title())),
    );
    frame.render_widget(field, chunks[1]);

    if let Some(notice) = message {
        let line = Paragraph::new(Span::styled(notice.text.as_str(), Theme::notice(notice.level)))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(line, chunks[2]);
    }

    render_status_bar(
        frame,
        status,
        Span::styled(" INPUT ", Style::default().fg(Theme::BACKGROUND).bg(Theme::ACCENT)),
        &[("Enter", "play"), ("q", "quit"), ("Esc", "exit")],
    );
}

/// Yes/no question after a session
pub fn render_confirm(frame: &mut Frame, question: &str, notices: &[Notice]) {
    let (header, content, status) = frame_layout(frame);
    render_header(frame, header);

    let mut lines = notice_lines(notices);
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled(question, Theme::accent()),
        Span::styled("  [y/N]", Theme::dimmed()),
    ]));

    let para = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Theme::border_focused()),
    );
    frame.render_widget(para, centered(content, 60, (notices.len() as u16) + 4));

    render_status_bar(
        frame,
        status,
        Span::styled(" DONE ", Style::default().fg(Theme::BACKGROUND).bg(Theme::PRIMARY)),
        &[("y", "another"), ("n", "quit")],
    );
}

// =============================================================================
// Loading / Error / Goodbye
// =============================================================================

pub fn render_loading(frame: &mut Frame, message: &str) {
    let (header, content, status) = frame_layout(frame);
    render_header(frame, header);

    let panel = Paragraph::new(vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("⟳ ", Theme::loading()),
            Span::styled(message, Theme::text()),
        ]),
    ])
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Theme::border())
            .title(Span::styled(" LOADING ", Theme::title())),
    );
    frame.render_widget(panel, centered(content, 60, 5));

    render_status_bar(
        frame,
        status,
        Span::styled(" WAIT ", Style::default().fg(Theme::BACKGROUND).bg(Theme::PRIMARY)),
        &[],
    );
}

/// Error popup over an empty frame
pub fn render_error(frame: &mut Frame, message: &str) {
    let (header, content, status) = frame_layout(frame);
    render_header(frame, header);

    let popup = centered(content, 60.min(content.width.saturating_sub(4)), 6);
    frame.render_widget(Clear, popup);
    let error_block = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(message, Theme::error())),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Double)
            .border_style(Theme::error())
            .title(Span::styled(" ✗ ERROR ", Theme::error()))
            .style(Style::default().bg(Theme::BACKGROUND)),
    );
    frame.render_widget(error_block, popup);

    render_status_bar(
        frame,
        status,
        Span::styled(" ERROR ", Style::default().fg(Theme::BACKGROUND).bg(Theme::ERROR)),
        &[],
    );
}

pub fn render_goodbye(frame: &mut Frame) {
    let (header, content, _) = frame_layout(frame);
    render_header(frame, header);
    let para = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled("Thanks for listening. Goodbye!", Theme::title())),
    ])
    .alignment(Alignment::Center);
    frame.render_widget(para, centered(content, 50, 3));
}

// =============================================================================
// Now Playing
// =============================================================================

/// "███████░░░ 70%" or "MUTED"
pub fn volume_bar(volume: Volume) -> String {
    if volume.is_muted() {
        return "MUTED".to_string();
    }
    let filled = (volume.get() / 10) as usize;
    format!("{}{} {}", "█".repeat(filled), "░".repeat(10 - filled), volume)
}

/// "01:05 / 03:33", with "--:--" for an unknown length
pub fn time_label(snapshot: &ProgressSnapshot) -> String {
    let total = if snapshot.length.is_zero() {
        "--:--".to_string()
    } else {
        format_duration(snapshot.length)
    };
    format!("{} / {}", format_duration(snapshot.elapsed), total)
}

pub fn render_session(frame: &mut Frame, view: &SessionView) {
    let (header, content, status) = frame_layout(frame);
    render_header(frame, header);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7), // Track info
            Constraint::Length(3), // Progress
            Constraint::Min(1),    // Notices
        ])
        .split(content);

    render_track(frame, chunks[0], view);
    render_progress(frame, chunks[1], view.snapshot);
    render_notices(frame, chunks[2], view.notices);

    let state = view.snapshot.state;
    render_status_bar(
        frame,
        status,
        Span::styled(format!(" {} {} ", state.icon(), state.label()), Theme::state(state)),
        &[("Space", "pause"), ("+/-", "volume"), ("m", "mute"), ("h", "help"), ("q", "quit")],
    );

    if view.show_help {
        let area = frame.area();
        render_help(frame, area, view.keymap);
    }
}

fn render_track(frame: &mut Frame, area: Rect, view: &SessionView) {
    let stream = view.stream;
    let snapshot = view.snapshot;
    let state = snapshot.state;

    let mut lines = vec![Line::from(vec![
        Span::styled("♪ ", Theme::accent()),
        Span::styled(truncate(&stream.title, MAX_TITLE), Theme::title()),
    ])];
    if stream.has_uploader() {
        lines.push(Line::from(vec![
            Span::styled("by ", Theme::dimmed()),
            Span::styled(stream.uploader.as_str(), Theme::secondary()),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled(format!("{} {}", state.icon(), state.label()), Theme::state(state)),
        Span::styled(format!("   via {}", view.backend), Theme::dimmed()),
    ]));
    lines.push(Line::from(vec![
        Span::styled("Volume ", Theme::dimmed()),
        Span::styled(volume_bar(snapshot.volume), Theme::accent()),
    ]));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Theme::border_focused())
        .title(Span::styled(" ▶ NOW PLAYING ", Theme::success()));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_progress(frame: &mut Frame, area: Rect, snapshot: &ProgressSnapshot) {
    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Theme::border()),
        )
        .gauge_style(Theme::progress_bar())
        .ratio(snapshot.position.clamp(0.0, 1.0))
        .label(Span::styled(
            format!("{}  ({}%)", time_label(snapshot), snapshot.percent()),
            Theme::text(),
        ));
    frame.render_widget(gauge, area);
}

fn render_notices(frame: &mut Frame, area: Rect, notices: &[Notice]) {
    let visible = area.height.saturating_sub(2) as usize;
    let start = notices.len().saturating_sub(visible);
    let para = Paragraph::new(notice_lines(&notices[start..])).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Theme::border())
            .title(Span::styled(" LOG ", Theme::dimmed())),
    );
    frame.render_widget(para, area);
}

const HELP_ORDER: [ControlEvent; 8] = [
    ControlEvent::TogglePlayPause,
    ControlEvent::Stop,
    ControlEvent::Next,
    ControlEvent::VolumeUp,
    ControlEvent::VolumeDown,
    ControlEvent::ToggleMute,
    ControlEvent::Help,
    ControlEvent::Quit,
];

/// Keyboard shortcuts overlay, built from the active keymap
pub fn render_help(frame: &mut Frame, area: Rect, keymap: &Keymap) {
    let lines: Vec<Line> = HELP_ORDER
        .iter()
        .map(|event| {
            let keys: Vec<String> = keymap.keys_for(*event).iter().map(|k| k.label()).collect();
            Line::from(vec![
                Span::styled(format!("{:>14}  ", keys.join(" / ")), Theme::keybind()),
                Span::styled(event.to_string(), Theme::text()),
            ])
        })
        .collect();

    let popup = centered(area, 44, HELP_ORDER.len() as u16 + 2);
    frame.render_widget(Clear, popup);
    let help = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Theme::accent())
            .title(Span::styled(" ⌨ KEYBOARD SHORTCUTS ", Theme::accent()))
            .style(Style::default().bg(Theme::BACKGROUND)),
    );
    frame.render_widget(help, popup);
}
