//! Single-line text input used by the URL and confirmation prompts

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// What a key press did to the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    /// Still editing
    Pending,
    /// Enter pressed; carries the trimmed text
    Submitted(String),
    /// Esc or Ctrl+C
    Cancelled,
}

/// Editable line with a cursor (cursor counts chars, not bytes)
#[derive(Debug, Clone, Default)]
pub struct LineInput {
    pub query: String,
    pub cursor: usize,
}

impl LineInput {
    pub fn new() -> Self {
        Self::default()
    }

    fn byte_index(&self, cursor: usize) -> usize {
        self.query
            .char_indices()
            .nth(cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.query.len())
    }

    fn char_len(&self) -> usize {
        self.query.chars().count()
    }

    /// Insert character at cursor
    pub fn insert(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.query.insert(at, c);
        self.cursor += 1;
    }

    /// Insert a pasted string at cursor
    pub fn insert_str(&mut self, s: &str) {
        for c in s.chars().filter(|c| !c.is_control()) {
            self.insert(c);
        }
    }

    /// Delete character before cursor
    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_index(self.cursor);
            self.query.remove(at);
        }
    }

    /// Delete character at cursor
    pub fn delete(&mut self) {
        if self.cursor < self.char_len() {
            let at = self.byte_index(self.cursor);
            self.query.remove(at);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        if self.cursor < self.char_len() {
            self.cursor += 1;
        }
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.char_len();
    }

    pub fn clear(&mut self) {
        self.query.clear();
        self.cursor = 0;
    }

    /// Text before and after the cursor, for rendering
    pub fn split_at_cursor(&self) -> (&str, &str) {
        self.query.split_at(self.byte_index(self.cursor))
    }

    /// Apply one key press
    pub fn handle_key(&mut self, key: KeyEvent) -> InputOutcome {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => return InputOutcome::Cancelled,
            KeyCode::Char('u') if ctrl => self.clear(),
            KeyCode::Char('a') if ctrl => self.cursor_home(),
            KeyCode::Char('e') if ctrl => self.cursor_end(),
            KeyCode::Char(c) if !ctrl => self.insert(c),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.cursor_left(),
            KeyCode::Right => self.cursor_right(),
            KeyCode::Home => self.cursor_home(),
            KeyCode::End => self.cursor_end(),
            KeyCode::Esc => return InputOutcome::Cancelled,
            KeyCode::Enter => {
                let text = self.query.trim().to_string();
                self.clear();
                return InputOutcome::Submitted(text);
            }
            _ => {}
        }
        InputOutcome::Pending
    }
}
