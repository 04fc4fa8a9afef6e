//! Terminal UI
//!
//! Built with ratatui over crossterm. Rendering is pure (`view`); the
//! terminal itself is owned by `screen`.

pub mod input;
pub mod screen;
pub mod theme;
pub mod view;

pub use input::{InputOutcome, LineInput};
pub use screen::{install_panic_hook, restore_terminal, Screen, TerminalGuard};
pub use theme::Theme;
pub use view::SessionView;
