/// Multi-line input box under the message list. Grows with its content up
/// to a cap, then scrolls internally. While a send is outstanding the
/// composer is disabled and silently drops edits.
pub struct ComposerState {
    lines: Vec<String>,
    /// Cursor as (line index, char column).
    cursor: (usize, usize),
    scroll: usize,
    max_visible_lines: usize,
    enabled: bool,
}

pub const DEFAULT_MAX_VISIBLE_LINES: usize = 6;

impl Default for ComposerState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VISIBLE_LINES)
    }
}

impl ComposerState {
    pub fn new(max_visible_lines: usize) -> Self {
        Self {
            lines: vec![String::new()],
            cursor: (0, 0),
            scroll: 0,
            max_visible_lines: max_visible_lines.max(1),
            enabled: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disabled while a send is in flight.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_empty(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].is_empty()
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Rows the composer wants on screen: one per line, capped.
    pub fn height(&self) -> usize {
        self.lines.len().min(self.max_visible_lines)
    }

    /// First visible line after internal scrolling.
    pub fn scroll(&self) -> usize {
        self.scroll
    }

    /// Cursor position relative to the visible window, (row, col).
    pub fn cursor_screen_position(&self) -> (usize, usize) {
        (self.cursor.0.saturating_sub(self.scroll), self.cursor.1)
    }

    pub fn clear(&mut self) {
        self.lines = vec![String::new()];
        self.cursor = (0, 0);
        self.scroll = 0;
    }

    pub fn insert_char(&mut self, ch: char) {
        if !self.enabled {
            return;
        }
        if ch == '\n' {
            self.break_line();
            return;
        }
        let (row, col) = self.cursor;
        let byte = byte_index(&self.lines[row], col);
        self.lines[row].insert(byte, ch);
        self.cursor.1 += 1;
    }

    /// Insert a block of text at the cursor, newlines included. Pasted
    /// content lands here.
    pub fn insert_str(&mut self, text: &str) {
        if !self.enabled {
            return;
        }
        for ch in text.replace("\r\n", "\n").chars() {
            if ch == '\r' {
                self.break_line();
            } else {
                self.insert_char(ch);
            }
        }
        self.ensure_cursor_visible();
    }

    /// Shift+Enter / Ctrl+J: newline without submitting.
    pub fn break_line(&mut self) {
        if !self.enabled {
            return;
        }
        let (row, col) = self.cursor;
        let byte = byte_index(&self.lines[row], col);
        let rest = self.lines[row].split_off(byte);
        self.lines.insert(row + 1, rest);
        self.cursor = (row + 1, 0);
        self.ensure_cursor_visible();
    }

    pub fn backspace(&mut self) {
        if !self.enabled {
            return;
        }
        let (row, col) = self.cursor;
        if col > 0 {
            let byte = byte_index(&self.lines[row], col - 1);
            self.lines[row].remove(byte);
            self.cursor.1 -= 1;
        } else if row > 0 {
            let tail = self.lines.remove(row);
            let prev_len = self.lines[row - 1].chars().count();
            self.lines[row - 1].push_str(&tail);
            self.cursor = (row - 1, prev_len);
        }
        self.ensure_cursor_visible();
    }

    pub fn move_left(&mut self) {
        let (row, col) = self.cursor;
        if col > 0 {
            self.cursor.1 -= 1;
        } else if row > 0 {
            self.cursor = (row - 1, self.lines[row - 1].chars().count());
        }
        self.ensure_cursor_visible();
    }

    pub fn move_right(&mut self) {
        let (row, col) = self.cursor;
        let len = self.lines[row].chars().count();
        if col < len {
            self.cursor.1 += 1;
        } else if row + 1 < self.lines.len() {
            self.cursor = (row + 1, 0);
        }
        self.ensure_cursor_visible();
    }

    pub fn move_up(&mut self) {
        if self.cursor.0 > 0 {
            let row = self.cursor.0 - 1;
            self.cursor = (row, self.cursor.1.min(self.lines[row].chars().count()));
        }
        self.ensure_cursor_visible();
    }

    pub fn move_down(&mut self) {
        if self.cursor.0 + 1 < self.lines.len() {
            let row = self.cursor.0 + 1;
            self.cursor = (row, self.cursor.1.min(self.lines[row].chars().count()));
        }
        self.ensure_cursor_visible();
    }

    pub fn move_to_start(&mut self) {
        self.cursor.1 = 0;
    }

    pub fn move_to_end(&mut self) {
        self.cursor.1 = self.lines[self.cursor.0].chars().count();
    }

    fn ensure_cursor_visible(&mut self) {
        let height = self.height();
        if self.cursor.0 < self.scroll {
            self.scroll = self.cursor.0;
        } else if self.cursor.0 >= self.scroll + height {
            self.scroll = self.cursor.0 + 1 - height;
        }
    }
}

fn byte_index(line: &str, char_col: usize) -> usize {
    line.char_indices()
        .nth(char_col)
        .map(|(idx, _)| idx)
        .unwrap_or(line.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_builds_a_single_line() {
        let mut composer = ComposerState::default();
        for ch in "hello".chars() {
            composer.insert_char(ch);
        }
        assert_eq!(composer.text(), "hello");
        assert_eq!(composer.height(), 1);
    }

    #[test]
    fn break_line_grows_height_up_to_the_cap() {
        let mut composer = ComposerState::new(3);
        composer.insert_str("one");
        for i in 0..5 {
            composer.break_line();
            composer.insert_str(&format!("line{}", i));
        }
        assert_eq!(composer.lines().len(), 6);
        assert_eq!(composer.height(), 3);
        // Internal scroll keeps the cursor in view.
        let (row, _) = composer.cursor_screen_position();
        assert!(row < 3);
    }

    #[test]
    fn paste_with_newlines_lands_at_the_cursor() {
        let mut composer = ComposerState::default();
        composer.insert_str("ac");
        composer.move_left();
        composer.insert_str("b\r\nmid");
        assert_eq!(composer.text(), "ab\nmidc");
    }

    #[test]
    fn backspace_joins_lines() {
        let mut composer = ComposerState::default();
        composer.insert_str("ab\ncd");
        composer.move_up();
        composer.move_down(); // cursor at col min(2, len) on line 1
        composer.cursor = (1, 0);
        composer.backspace();
        assert_eq!(composer.text(), "abcd");
        assert_eq!(composer.cursor, (0, 2));
    }

    #[test]
    fn disabled_composer_drops_edits_but_keeps_content() {
        let mut composer = ComposerState::default();
        composer.insert_str("draft");
        composer.set_enabled(false);
        composer.insert_char('x');
        composer.insert_str("more");
        composer.break_line();
        composer.backspace();
        assert_eq!(composer.text(), "draft");
        composer.set_enabled(true);
        composer.insert_char('!');
        assert_eq!(composer.text(), "draft!");
    }

    #[test]
    fn multibyte_chars_edit_cleanly() {
        let mut composer = ComposerState::default();
        composer.insert_str("héllo");
        composer.backspace();
        composer.backspace();
        assert_eq!(composer.text(), "hél");
        composer.move_left();
        composer.insert_char('é');
        assert_eq!(composer.text(), "héél");
    }
}
