#![forbid(unsafe_code)]

//! Cursor-aware line editor.
//!
//! [`LineEditor`] reads raw bytes one at a time, decodes them with
//! [`KeyDecoder`], applies each key to a [`LineBuffer`], and repaints only
//! the part of the line that changed.
//!
//! # Repaint contract
//!
//! After every handled key the terminal cursor sits at the column of the
//! logical cursor. The editor tracks no absolute screen position; it only
//! moves relative to where it left the cursor, one column per motion control:
//!
//! | Edit | Output |
//! |------|--------|
//! | insert | inserted char + tail, then `CSI D` × tail |
//! | backspace | `CSI D`, tail, space, then `CSI D` × (tail + 1) |
//! | delete | tail, space, then `CSI D` × (tail + 1) |
//! | left / right | one `CSI D` / `CSI C` |
//! | home / end | one `CSI D` / `CSI C` per column moved |
//! | history recall | `CSI D` × cursor, recalled text, `CSI K` |
//!
//! # Example
//!
//! ```
//! use iotool_core::editor::{EditorConfig, LineEditor};
//!
//! let mut editor = LineEditor::new(EditorConfig::default());
//! let mut input: &[u8] = b"iorb 0x60\r";
//! let mut output = Vec::new();
//!
//! let line = editor.read_line("io> ", &mut input, &mut output)?;
//! assert_eq!(line.as_deref(), Some("iorb 0x60"));
//! assert_eq!(editor.history().len(), 1);
//! # Ok::<(), std::io::Error>(())
//! ```

use std::io::{self, Read, Write};

use crate::history::{self, History};
use crate::input::{Key, KeyDecoder};
use crate::line_buffer::{self, LineBuffer};

/// Cursor one column left (`CSI D`).
pub const CURSOR_LEFT: &[u8] = b"\x1b[D";
/// Cursor one column right (`CSI C`).
pub const CURSOR_RIGHT: &[u8] = b"\x1b[C";
/// Erase from cursor to end of line (`CSI K`).
pub const CLEAR_TO_EOL: &[u8] = b"\x1b[K";
/// Raw mode disables output post-processing, so newlines need an explicit CR.
const NEWLINE: &[u8] = b"\r\n";

/// Editor sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorConfig {
    /// Longest line accepted, in characters.
    pub max_line_len: usize,
    /// History budget in bytes.
    pub history_capacity: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_line_len: line_buffer::DEFAULT_MAX_LEN,
            history_capacity: history::DEFAULT_CAPACITY,
        }
    }
}

/// Result of feeding one byte to the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The line is still being edited.
    Pending,
    /// Enter was pressed.
    Done(String),
    /// Interrupt or end-of-input on an empty line.
    Cancelled,
}

/// Interactive line editor with history.
#[derive(Debug)]
pub struct LineEditor {
    buffer: LineBuffer,
    decoder: KeyDecoder,
    history: History,
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl LineEditor {
    #[must_use]
    pub fn new(config: EditorConfig) -> Self {
        Self {
            buffer: LineBuffer::new(config.max_line_len),
            decoder: KeyDecoder::new(),
            history: History::new(config.history_capacity),
        }
    }

    /// Print `prompt` and edit one line until it is submitted or cancelled.
    ///
    /// Returns `Ok(None)` on cancellation, including when `input` reaches
    /// end of stream.
    pub fn read_line<R, W>(
        &mut self,
        prompt: &str,
        input: &mut R,
        output: &mut W,
    ) -> io::Result<Option<String>>
    where
        R: Read + ?Sized,
        W: Write + ?Sized,
    {
        self.begin_line();
        output.write_all(prompt.as_bytes())?;
        output.flush()?;

        loop {
            let Some(byte) = read_byte(input)? else {
                crate::debug!("input closed");
                self.cancel(output)?;
                output.flush()?;
                return Ok(None);
            };
            let step = self.handle_byte(byte, output)?;
            output.flush()?;
            match step {
                Step::Pending => {}
                Step::Done(line) => return Ok(Some(line)),
                Step::Cancelled => return Ok(None),
            }
        }
    }

    /// Reset per-line state before a new input cycle.
    pub fn begin_line(&mut self) {
        self.buffer.clear();
        self.decoder.reset();
        self.history.reset_cursor();
    }

    /// Feed one raw input byte.
    pub fn handle_byte<W: Write + ?Sized>(&mut self, byte: u8, out: &mut W) -> io::Result<Step> {
        match self.decoder.feed(byte) {
            Some(key) => self.handle_key(key, out),
            None => Ok(Step::Pending),
        }
    }

    /// Apply one decoded key.
    pub fn handle_key<W: Write + ?Sized>(&mut self, key: Key, out: &mut W) -> io::Result<Step> {
        match key {
            Key::Char(byte) => {
                if self.buffer.insert(byte) {
                    let from = self.buffer.cursor() - 1;
                    out.write_all(self.buffer.suffix(from))?;
                    cursor_left(out, self.buffer.tail().len())?;
                }
            }
            Key::Backspace => {
                if self.buffer.backspace() {
                    out.write_all(CURSOR_LEFT)?;
                    self.repaint_tail(out)?;
                }
            }
            Key::Delete => {
                if self.buffer.delete() {
                    self.repaint_tail(out)?;
                }
            }
            Key::Left => {
                if self.buffer.move_left() {
                    out.write_all(CURSOR_LEFT)?;
                }
            }
            Key::Right => {
                if self.buffer.move_right() {
                    out.write_all(CURSOR_RIGHT)?;
                }
            }
            Key::Home => {
                let moved = self.buffer.move_home();
                cursor_left(out, moved)?;
            }
            Key::End => {
                let moved = self.buffer.move_end();
                cursor_right(out, moved)?;
            }
            Key::Up => {
                if let Some(text) = self.history.previous(self.buffer.as_str()) {
                    self.show_recalled(&text, out)?;
                }
            }
            Key::Down => {
                if let Some(text) = self.history.next() {
                    self.show_recalled(&text, out)?;
                }
            }
            Key::Enter => {
                out.write_all(NEWLINE)?;
                let line = self.buffer.take();
                self.history.append(&line);
                self.history.reset_cursor();
                return Ok(Step::Done(line));
            }
            Key::Interrupt => {
                crate::debug!(discarded_len = self.buffer.len(), "line interrupted");
                self.cancel(out)?;
                return Ok(Step::Cancelled);
            }
            Key::EndOfInput => {
                if self.buffer.is_empty() {
                    self.cancel(out)?;
                    return Ok(Step::Cancelled);
                }
            }
        }
        Ok(Step::Pending)
    }

    /// Release every history entry.
    pub fn shutdown(&mut self) {
        self.history.clear();
    }

    /// Line currently being edited.
    #[must_use]
    pub fn buffer(&self) -> &LineBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    /// Redraw from the cursor to the end, blank the vacated last column,
    /// and walk back to the cursor.
    fn repaint_tail<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        let tail = self.buffer.tail();
        out.write_all(tail)?;
        out.write_all(b" ")?;
        cursor_left(out, tail.len() + 1)
    }

    fn show_recalled<W: Write + ?Sized>(&mut self, text: &str, out: &mut W) -> io::Result<()> {
        cursor_left(out, self.buffer.cursor())?;
        self.buffer.replace(text);
        out.write_all(self.buffer.as_str().as_bytes())?;
        out.write_all(CLEAR_TO_EOL)
    }

    fn cancel<W: Write + ?Sized>(&mut self, out: &mut W) -> io::Result<()> {
        self.buffer.clear();
        self.history.reset_cursor();
        out.write_all(NEWLINE)
    }
}

fn cursor_left<W: Write + ?Sized>(out: &mut W, columns: usize) -> io::Result<()> {
    for _ in 0..columns {
        out.write_all(CURSOR_LEFT)?;
    }
    Ok(())
}

fn cursor_right<W: Write + ?Sized>(out: &mut W, columns: usize) -> io::Result<()> {
    for _ in 0..columns {
        out.write_all(CURSOR_RIGHT)?;
    }
    Ok(())
}

/// Blocking read of a single byte. `None` means end of stream.
fn read_byte<R: Read + ?Sized>(input: &mut R) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match input.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}
