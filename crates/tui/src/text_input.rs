/// Editable text with a cursor kept on a char boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TextInput {
    text: String,
    cursor: usize,
}

impl TextInput {
    pub(crate) fn with_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let cursor = text.len();
        Self { text, cursor }
    }

    pub(crate) fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the whole text and moves the cursor to its end.
    pub(crate) fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cursor = self.text.len();
    }

    pub(crate) fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub(crate) fn insert(&mut self, ch: char) {
        self.text.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    pub(crate) fn backspace(&mut self) {
        let Some(previous) = self.previous_boundary() else {
            return;
        };
        self.text.replace_range(previous..self.cursor, "");
        self.cursor = previous;
    }

    pub(crate) fn move_left(&mut self) {
        if let Some(previous) = self.previous_boundary() {
            self.cursor = previous;
        }
    }

    pub(crate) fn move_right(&mut self) {
        if let Some(ch) = self.text[self.cursor..].chars().next() {
            self.cursor += ch.len_utf8();
        }
    }

    /// Moves to the same column on the previous line, clamped to its length.
    pub(crate) fn move_up(&mut self) {
        let line_start = self.line_start(self.cursor);
        if line_start == 0 {
            self.cursor = 0;
            return;
        }
        let column = self.text[line_start..self.cursor].chars().count();
        let previous_start = self.line_start(line_start - 1);
        self.cursor = self.offset_in_line(previous_start, column);
    }

    /// Moves to the same column on the next line, clamped to its length.
    pub(crate) fn move_down(&mut self) {
        let line_start = self.line_start(self.cursor);
        let column = self.text[line_start..self.cursor].chars().count();
        match self.text[self.cursor..].find('\n') {
            Some(newline) => {
                let next_start = self.cursor + newline + 1;
                self.cursor = self.offset_in_line(next_start, column);
            }
            None => self.cursor = self.text.len(),
        }
    }

    /// Zero-based `(line, column)` of the cursor, columns counted in chars.
    pub(crate) fn cursor_position(&self) -> (usize, usize) {
        let before = &self.text[..self.cursor];
        let line = before.matches('\n').count();
        let column = before[self.line_start(self.cursor)..].chars().count();
        (line, column)
    }

    fn previous_boundary(&self) -> Option<usize> {
        self.text[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(index, _)| index)
    }

    fn line_start(&self, offset: usize) -> usize {
        self.text[..offset].rfind('\n').map_or(0, |newline| newline + 1)
    }

    fn offset_in_line(&self, line_start: usize, column: usize) -> usize {
        let line = &self.text[line_start..];
        let line_end = line.find('\n').unwrap_or(line.len());
        line[..line_end]
            .char_indices()
            .nth(column)
            .map_or(line_start + line_end, |(index, _)| line_start + index)
    }
}
