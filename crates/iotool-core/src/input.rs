#![forbid(unsafe_code)]

//! Input decoder state machine.
//!
//! Decodes raw terminal bytes, one at a time, into [`Key`] values for the
//! line editor.
//!
//! # Design
//!
//! Decoding is a pure transition function, [`transition`], over
//! `(DecodeState, byte)`. [`KeyDecoder`] only stores the current state.
//! Every transition can therefore be tested on its own.
//!
//! # Recognised sequences
//!
//! | Bytes | Key |
//! |-------|-----|
//! | `ESC [ A` / `ESC [ B` | [`Key::Up`] / [`Key::Down`] |
//! | `ESC [ C` / `ESC [ D` | [`Key::Right`] / [`Key::Left`] |
//! | `ESC [ H` / `ESC [ F` | [`Key::Home`] / [`Key::End`] |
//! | `ESC [ 1 ~` / `ESC [ 7 ~` | [`Key::Home`] |
//! | `ESC [ 4 ~` / `ESC [ 8 ~` | [`Key::End`] |
//! | `ESC [ 3 ~` | [`Key::Delete`] |
//!
//! Anything else that starts with `ESC` is discarded without producing a key.
//! `ESC` followed by a byte other than `[` consumes that byte as well.

/// Escape (0x1B).
const ESC: u8 = 0x1B;
/// Ctrl+C.
const ETX: u8 = 0x03;
/// Ctrl+D.
const EOT: u8 = 0x04;
/// Ctrl+H.
const BS: u8 = 0x08;
const LF: u8 = 0x0A;
const CR: u8 = 0x0D;
const DEL: u8 = 0x7F;

/// Parameter code for multi-byte sequences that map to no key.
const UNKNOWN_CODE: u8 = 0;

/// A decoded key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Printable ASCII character.
    Char(u8),
    Backspace,
    Enter,
    /// Ctrl+C.
    Interrupt,
    /// Ctrl+D.
    EndOfInput,
    Left,
    Right,
    /// Up arrow (history previous).
    Up,
    /// Down arrow (history next).
    Down,
    Home,
    End,
    /// Forward delete.
    Delete,
}

/// Decoder states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeState {
    /// Plain character input.
    #[default]
    Normal,
    /// After ESC.
    Escape1,
    /// After `ESC [`.
    Escape2,
    /// After `ESC [ <digit>`, waiting for `~`. Holds the digit, or 0 once the
    /// parameters no longer match a known key.
    EscapeExtra(u8),
}

/// One step of the decoder: `(state, byte) -> (next state, key)`.
#[must_use]
pub const fn transition(state: DecodeState, byte: u8) -> (DecodeState, Option<Key>) {
    use DecodeState::{Escape1, Escape2, EscapeExtra, Normal};

    match state {
        Normal => match byte {
            ESC => (Escape1, None),
            0x20..=0x7E => (Normal, Some(Key::Char(byte))),
            DEL | BS => (Normal, Some(Key::Backspace)),
            CR | LF => (Normal, Some(Key::Enter)),
            ETX => (Normal, Some(Key::Interrupt)),
            EOT => (Normal, Some(Key::EndOfInput)),
            _ => (Normal, None),
        },
        Escape1 => match byte {
            b'[' => (Escape2, None),
            _ => (Normal, None),
        },
        Escape2 => match byte {
            b'A' => (Normal, Some(Key::Up)),
            b'B' => (Normal, Some(Key::Down)),
            b'C' => (Normal, Some(Key::Right)),
            b'D' => (Normal, Some(Key::Left)),
            b'H' => (Normal, Some(Key::Home)),
            b'F' => (Normal, Some(Key::End)),
            b'0'..=b'9' => (EscapeExtra(byte), None),
            _ => (Normal, None),
        },
        EscapeExtra(code) => match (code, byte) {
            (b'1' | b'7', b'~') => (Normal, Some(Key::Home)),
            (b'3', b'~') => (Normal, Some(Key::Delete)),
            (b'4' | b'8', b'~') => (Normal, Some(Key::End)),
            // Longer parameter lists (F-keys, modifiers) are consumed whole.
            (_, b'0'..=b'9' | b';') => (EscapeExtra(UNKNOWN_CODE), None),
            _ => (Normal, None),
        },
    }
}

/// Stateful wrapper around [`transition`].
#[derive(Debug, Clone, Default)]
pub struct KeyDecoder {
    state: DecodeState,
}

impl KeyDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte, returning a key once one is complete.
    pub fn feed(&mut self, byte: u8) -> Option<Key> {
        let (next, key) = transition(self.state, byte);
        if next == DecodeState::Normal && self.state != DecodeState::Normal && key.is_none() {
            crate::trace!(state = ?self.state, byte, "escape sequence discarded");
        }
        self.state = next;
        key
    }

    #[cfg(test)]
    fn decode(&mut self, input: &[u8]) -> Vec<Key> {
        input.iter().filter_map(|&b| self.feed(b)).collect()
    }

    #[must_use]
    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Drop any partial sequence.
    pub fn reset(&mut self) {
        self.state = DecodeState::Normal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_ascii_is_char() {
        for b in 0x20..=0x7E {
            assert_eq!(
                transition(DecodeState::Normal, b),
                (DecodeState::Normal, Some(Key::Char(b)))
            );
        }
    }

    #[test]
    fn control_characters() {
        let cases = [
            (0x7F, Key::Backspace),
            (0x08, Key::Backspace),
            (0x0D, Key::Enter),
            (0x0A, Key::Enter),
            (0x03, Key::Interrupt),
            (0x04, Key::EndOfInput),
        ];
        for (byte, key) in cases {
            assert_eq!(
                transition(DecodeState::Normal, byte),
                (DecodeState::Normal, Some(key))
            );
        }
    }

    #[test]
    fn other_controls_are_ignored() {
        for byte in [0x00, 0x01, 0x07, 0x09, 0x1A, 0x80, 0xFF] {
            assert_eq!(transition(DecodeState::Normal, byte), (DecodeState::Normal, None));
        }
    }

    #[test]
    fn escape_enters_escape1() {
        assert_eq!(transition(DecodeState::Normal, 0x1B), (DecodeState::Escape1, None));
    }

    #[test]
    fn bracket_enters_escape2() {
        assert_eq!(transition(DecodeState::Escape1, b'['), (DecodeState::Escape2, None));
    }

    #[test]
    fn non_bracket_aborts_escape() {
        for byte in [b'a', b'O', b'x', 0x1B, 0x0D] {
            assert_eq!(transition(DecodeState::Escape1, byte), (DecodeState::Normal, None));
        }
    }

    #[test]
    fn arrow_keys() {
        let mut decoder = KeyDecoder::new();
        assert_eq!(decoder.decode(b"\x1b[A"), [Key::Up]);
        assert_eq!(decoder.decode(b"\x1b[B"), [Key::Down]);
        assert_eq!(decoder.decode(b"\x1b[C"), [Key::Right]);
        assert_eq!(decoder.decode(b"\x1b[D"), [Key::Left]);
    }

    #[test]
    fn home_end_variants() {
        let mut decoder = KeyDecoder::new();
        assert_eq!(decoder.decode(b"\x1b[H"), [Key::Home]);
        assert_eq!(decoder.decode(b"\x1b[F"), [Key::End]);
        assert_eq!(decoder.decode(b"\x1b[1~"), [Key::Home]);
        assert_eq!(decoder.decode(b"\x1b[7~"), [Key::Home]);
        assert_eq!(decoder.decode(b"\x1b[4~"), [Key::End]);
        assert_eq!(decoder.decode(b"\x1b[8~"), [Key::End]);
    }

    #[test]
    fn delete_needs_tilde() {
        assert_eq!(
            transition(DecodeState::Escape2, b'3'),
            (DecodeState::EscapeExtra(b'3'), None)
        );
        assert_eq!(
            transition(DecodeState::EscapeExtra(b'3'), b'~'),
            (DecodeState::Normal, Some(Key::Delete))
        );
        assert_eq!(
            transition(DecodeState::EscapeExtra(b'3'), b'x'),
            (DecodeState::Normal, None)
        );
    }

    #[test]
    fn unknown_csi_final_is_discarded() {
        let mut decoder = KeyDecoder::new();
        assert!(decoder.decode(b"\x1b[Z").is_empty());
        assert!(decoder.decode(b"\x1b[2~").is_empty());
        assert!(decoder.decode(b"\x1b[15~").is_empty());
        assert!(decoder.decode(b"\x1b[1;5C").is_empty());
        assert_eq!(decoder.state(), DecodeState::Normal);
    }

    #[test]
    fn byte_after_aborted_escape_is_swallowed() {
        // The aborting byte is consumed by the escape, not re-read as input.
        let mut decoder = KeyDecoder::new();
        assert_eq!(decoder.decode(b"\x1bab"), [Key::Char(b'b')]);
    }

    #[test]
    fn reset_drops_partial_sequence() {
        let mut decoder = KeyDecoder::new();
        decoder.decode(b"\x1b[");
        assert_eq!(decoder.state(), DecodeState::Escape2);
        decoder.reset();
        assert_eq!(decoder.decode(b"A"), [Key::Char(b'A')]);
    }

    #[test]
    fn no_panic_on_garbage() {
        let mut decoder = KeyDecoder::new();
        // The second ESC aborts the first and is consumed with it, so the
        // following '[' and '3' arrive as plain characters.
        let garbage = [0xFF, 0x1B, 0x1B, b'[', 0xFF, b'3', 0x00, 0x1B, b'[', b'8', b'~'];
        assert_eq!(
            decoder.decode(&garbage),
            [Key::Char(b'['), Key::Char(b'3'), Key::End]
        );
    }
}
