#![forbid(unsafe_code)]

//! Editable line with an independent cursor.
//!
//! Holds printable ASCII only, so byte index, character index, and terminal
//! column are the same number. All edits go through bounds-checked
//! [`Vec::insert`] / [`Vec::remove`] and keep `0 <= cursor <= len`.

/// Default maximum line length in bytes.
pub const DEFAULT_MAX_LEN: usize = 256;

/// Fixed-capacity line buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineBuffer {
    bytes: Vec<u8>,
    cursor: usize,
    max_len: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LEN)
    }
}

impl LineBuffer {
    /// Create an empty buffer holding at most `max_len` characters.
    #[must_use]
    pub fn new(max_len: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(max_len),
            cursor: 0,
            max_len,
        }
    }

    /// Insert a printable character at the cursor and advance it.
    ///
    /// Returns `false` (and leaves the buffer untouched) if the buffer is full
    /// or the byte is not printable ASCII.
    pub fn insert(&mut self, byte: u8) -> bool {
        if self.is_full() || !is_printable(byte) {
            return false;
        }
        self.bytes.insert(self.cursor, byte);
        self.cursor += 1;
        true
    }

    /// Remove the character before the cursor.
    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        self.bytes.remove(self.cursor);
        true
    }

    /// Remove the character under the cursor.
    pub fn delete(&mut self) -> bool {
        if self.cursor >= self.bytes.len() {
            return false;
        }
        self.bytes.remove(self.cursor);
        true
    }

    pub fn move_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    pub fn move_right(&mut self) -> bool {
        if self.cursor >= self.bytes.len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    /// Move to column 0, returning how many columns the cursor moved.
    pub fn move_home(&mut self) -> usize {
        std::mem::take(&mut self.cursor)
    }

    /// Move past the last character, returning how many columns the cursor moved.
    pub fn move_end(&mut self) -> usize {
        let moved = self.bytes.len() - self.cursor;
        self.cursor = self.bytes.len();
        moved
    }

    /// Replace the contents, leaving the cursor at the end.
    ///
    /// Non-printable bytes are dropped and the text is cut at `max_len`.
    pub fn replace(&mut self, text: &str) {
        self.bytes.clear();
        self.bytes.extend(
            text.bytes()
                .filter(|&b| is_printable(b))
                .take(self.max_len),
        );
        self.cursor = self.bytes.len();
    }

    /// Empty the buffer and return its previous contents.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        let bytes = std::mem::take(&mut self.bytes);
        bytes.into_iter().map(char::from).collect()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
        self.cursor = 0;
    }

    /// Current contents.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Only printable ASCII is ever stored.
        std::str::from_utf8(&self.bytes).unwrap_or_default()
    }

    /// Characters from the cursor to the end of the line.
    #[must_use]
    pub fn tail(&self) -> &[u8] {
        &self.bytes[self.cursor..]
    }

    /// Characters from `from` to the end of the line.
    #[must_use]
    pub fn suffix(&self, from: usize) -> &[u8] {
        &self.bytes[from.min(self.bytes.len())..]
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.bytes.len() >= self.max_len
    }
}

/// Printable ASCII, space included.
#[must_use]
pub const fn is_printable(byte: u8) -> bool {
    matches!(byte, 0x20..=0x7E)
}
