//! Neon theme for ytaudio
//!
//! Color palette and style helpers shared by every screen.

use ratatui::style::{Color, Modifier, Style};

use crate::models::{NoticeLevel, PlaybackState};

/// Neon color palette
pub struct Theme;

impl Theme {
    // ═══════════════════════════════════════════════════════════════════════
    // CORE PALETTE
    // ═══════════════════════════════════════════════════════════════════════

    /// Background: #0a0a0f (deep black-blue)
    pub const BACKGROUND: Color = Color::Rgb(0x0a, 0x0a, 0x0f);

    /// Primary: #00fff2 (cyan neon)
    pub const PRIMARY: Color = Color::Rgb(0x00, 0xff, 0xf2);

    /// Secondary: #ff00ff (magenta)
    pub const SECONDARY: Color = Color::Rgb(0xff, 0x00, 0xff);

    /// Accent: #ffff00 (yellow)
    pub const ACCENT: Color = Color::Rgb(0xff, 0xff, 0x00);

    /// Text: #e0e0e0 (soft white)
    pub const TEXT: Color = Color::Rgb(0xe0, 0xe0, 0xe0);

    /// Dim: #808090 (muted, still readable on the background)
    pub const DIM: Color = Color::Rgb(0x80, 0x80, 0x90);

    /// Success: #00ff00 (green)
    pub const SUCCESS: Color = Color::Rgb(0x00, 0xff, 0x00);

    /// Warning: #ffaa00 (orange)
    pub const WARNING: Color = Color::Rgb(0xff, 0xaa, 0x00);

    /// Error: #ff0040 (red)
    pub const ERROR: Color = Color::Rgb(0xff, 0x00, 0x40);

    /// Panel background
    pub const BACKGROUND_LIGHT: Color = Color::Rgb(0x14, 0x14, 0x1e);

    /// Border color (dim cyan)
    pub const BORDER: Color = Color::Rgb(0x00, 0x80, 0x78);

    // ═══════════════════════════════════════════════════════════════════════
    // STYLE HELPERS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn text() -> Style {
        Style::default().fg(Self::TEXT)
    }

    pub fn dimmed() -> Style {
        Style::default().fg(Self::DIM)
    }

    pub fn title() -> Style {
        Style::default()
            .fg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    /// Uploader / secondary metadata (magenta)
    pub fn secondary() -> Style {
        Style::default().fg(Self::SECONDARY)
    }

    pub fn accent() -> Style {
        Style::default()
            .fg(Self::ACCENT)
            .add_modifier(Modifier::BOLD)
    }

    pub fn error() -> Style {
        Style::default()
            .fg(Self::ERROR)
            .add_modifier(Modifier::BOLD)
    }

    pub fn success() -> Style {
        Style::default()
            .fg(Self::SUCCESS)
            .add_modifier(Modifier::BOLD)
    }

    pub fn warning() -> Style {
        Style::default()
            .fg(Self::WARNING)
            .add_modifier(Modifier::BOLD)
    }

    pub fn border() -> Style {
        Style::default().fg(Self::BORDER)
    }

    /// Border of the active panel
    pub fn border_focused() -> Style {
        Style::default()
            .fg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    /// Filled part of the progress gauge
    pub fn progress_bar() -> Style {
        Style::default()
            .fg(Self::SUCCESS)
            .bg(Self::BACKGROUND_LIGHT)
    }

    pub fn input() -> Style {
        Style::default().fg(Self::TEXT).bg(Self::BACKGROUND_LIGHT)
    }

    pub fn input_cursor() -> Style {
        Style::default().fg(Self::BACKGROUND).bg(Self::PRIMARY)
    }

    pub fn keybind() -> Style {
        Style::default().fg(Self::ACCENT)
    }

    pub fn keybind_desc() -> Style {
        Style::default().fg(Self::DIM)
    }

    pub fn status_bar() -> Style {
        Style::default().fg(Self::TEXT).bg(Self::BACKGROUND_LIGHT)
    }

    pub fn loading() -> Style {
        Style::default()
            .fg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    /// Color of a playback state badge
    pub fn state(state: PlaybackState) -> Style {
        let color = match state {
            PlaybackState::Playing => Self::SUCCESS,
            PlaybackState::Paused => Self::ACCENT,
            PlaybackState::Opening | PlaybackState::Buffering => Self::PRIMARY,
            PlaybackState::Ended => Self::SECONDARY,
            PlaybackState::Error => Self::ERROR,
            PlaybackState::Idle | PlaybackState::Stopped => Self::DIM,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    pub fn notice(level: NoticeLevel) -> Style {
        match level {
            NoticeLevel::Info => Self::text(),
            NoticeLevel::Success => Self::success(),
            NoticeLevel::Warning => Self::warning(),
            NoticeLevel::Error => Self::error(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// COLOR UTILITIES
// ═══════════════════════════════════════════════════════════════════════════

/// Relative luminance of a color
/// Formula: https://www.w3.org/TR/WCAG20/#relativeluminancedef
#[cfg(test)]
fn relative_luminance(r: u8, g: u8, b: u8) -> f64 {
    fn channel(c: u8) -> f64 {
        let c = c as f64 / 255.0;
        if c <= 0.03928 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    }

    0.2126 * channel(r) + 0.7152 * channel(g) + 0.0722 * channel(b)
}

/// Contrast ratio between two colors, 1.0 (same) to 21.0 (black/white)
#[cfg(test)]
fn contrast_ratio(fg: (u8, u8, u8), bg: (u8, u8, u8)) -> f64 {
    let l1 = relative_luminance(fg.0, fg.1, fg.2);
    let l2 = relative_luminance(bg.0, bg.1, bg.2);
    let (lighter, darker) = if l1 > l2 { (l1, l2) } else { (l2, l1) };
    (lighter + 0.05) / (darker + 0.05)
}

/// WCAG AA for normal text (4.5:1)
#[cfg(test)]
fn meets_wcag_aa(fg: (u8, u8, u8), bg: (u8, u8, u8)) -> bool {
    contrast_ratio(fg, bg) >= 4.5
}

/// RGB tuple of a ratatui color (Rgb variant only)
#[cfg(test)]
fn color_to_rgb(color: Color) -> Option<(u8, u8, u8)> {
    match color {
        Color::Rgb(r, g, b) => Some((r, g, b)),
        _ => None,
    }
}
