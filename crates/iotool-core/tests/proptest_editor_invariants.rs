//! Property-based invariant tests for the line editor and history store.
//!
//! 1. `0 <= cursor <= len` after every key, for any key sequence.
//! 2. The terminal cursor always ends at the logical cursor.
//! 3. History bytes stay within capacity and survivors keep their order.
//! 4. Previous-then-next hands back the unsubmitted line byte-for-byte.
//! 5. Blank submissions never create history entries.
//! 6. No panics on arbitrary input bytes.

use iotool_core::editor::{CLEAR_TO_EOL, CURSOR_LEFT, CURSOR_RIGHT, EditorConfig, LineEditor, Step};
use iotool_core::history::History;
use iotool_core::input::Key;
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

fn editing_key() -> impl Strategy<Value = Key> {
    prop_oneof![
        4 => (0x20u8..=0x7E).prop_map(Key::Char),
        1 => Just(Key::Backspace),
        1 => Just(Key::Delete),
        1 => Just(Key::Left),
        1 => Just(Key::Right),
        1 => Just(Key::Home),
        1 => Just(Key::End),
        1 => Just(Key::Up),
        1 => Just(Key::Down),
    ]
}

/// Printable line without surrounding whitespace, so it is always stored.
fn entry_text(max: usize) -> impl Strategy<Value = String> {
    proptest::string::string_regex(&format!("[a-z0-9][a-z0-9 ]{{0,{}}}[a-z0-9]", max.saturating_sub(2)))
        .expect("valid regex")
}

/// Tracks only the cursor column; text checks live in the unit tests.
fn apply_motion(col: &mut usize, bytes: &[u8]) {
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(CURSOR_LEFT) {
            assert!(*col > 0, "cursor moved left of column 0");
            *col -= 1;
            i += CURSOR_LEFT.len();
        } else if bytes[i..].starts_with(CURSOR_RIGHT) {
            *col += 1;
            i += CURSOR_RIGHT.len();
        } else if bytes[i..].starts_with(CLEAR_TO_EOL) {
            i += CLEAR_TO_EOL.len();
        } else {
            *col += 1;
            i += 1;
        }
    }
}

fn editor_with(history: &[String], max_line_len: usize) -> LineEditor {
    let mut editor = LineEditor::new(EditorConfig {
        max_line_len,
        history_capacity: 1024,
    });
    for line in history {
        editor.history_mut().append(line);
    }
    editor
}

// ═════════════════════════════════════════════════════════════════════════
// 1 + 2. Cursor bounds and terminal synchronisation
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn cursor_stays_in_bounds_and_in_sync(
        history in proptest::collection::vec(entry_text(24), 0..4),
        keys in proptest::collection::vec(editing_key(), 0..200),
        max_line_len in 1usize..40,
    ) {
        let mut editor = editor_with(&history, max_line_len);
        let mut col = 0usize;

        for key in keys {
            let mut out = Vec::new();
            let step = editor.handle_key(key, &mut out).unwrap();
            prop_assert_eq!(step, Step::Pending);
            apply_motion(&mut col, &out);

            let buffer = editor.buffer();
            prop_assert!(buffer.cursor() <= buffer.len(), "cursor {} > len {}", buffer.cursor(), buffer.len());
            prop_assert!(buffer.len() <= max_line_len);
            prop_assert_eq!(col, buffer.cursor(), "terminal column out of sync after {:?}", key);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Capacity bound and FIFO order
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn history_respects_capacity_and_order(
        capacity in 8usize..256,
        lines in proptest::collection::vec(entry_text(6), 1..64),
    ) {
        let mut history = History::new(capacity);
        for line in &lines {
            history.append(line);
            prop_assert!(history.used_bytes() <= history.capacity());
        }

        // Survivors are exactly the newest suffix of what was appended.
        let stored: Vec<&str> = history.iter().collect();
        let expected: Vec<&str> = lines[lines.len() - stored.len()..]
            .iter()
            .map(String::as_str)
            .collect();
        prop_assert_eq!(stored, expected);

        let charged: usize = history.iter().map(|e| e.len() + 1).sum();
        prop_assert_eq!(charged, history.used_bytes());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Draft round-trip
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn previous_then_next_returns_draft(
        history in proptest::collection::vec(entry_text(24), 1..6),
        draft in "[ -~]{0,40}",
    ) {
        let mut store = History::new(4096);
        for line in &history {
            store.append(line);
        }
        prop_assert!(store.previous(&draft).is_some());
        prop_assert_eq!(store.next(), Some(draft));
        prop_assert!(!store.is_browsing());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Blank submissions
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn blank_lines_never_enter_history(spaces in 0usize..20) {
        let mut editor = LineEditor::default();
        let mut out = Vec::new();
        for _ in 0..spaces {
            editor.handle_byte(b' ', &mut out).unwrap();
        }
        let step = editor.handle_byte(b'\r', &mut out).unwrap();
        prop_assert_eq!(step, Step::Done(" ".repeat(spaces)));
        prop_assert!(editor.history().is_empty());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Arbitrary bytes
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let mut editor = editor_with(&["help".to_string()], 32);
        let mut out = Vec::new();
        for byte in bytes {
            match editor.handle_byte(byte, &mut out).unwrap() {
                Step::Pending => {}
                Step::Done(_) | Step::Cancelled => editor.begin_line(),
            }
            prop_assert!(editor.buffer().cursor() <= editor.buffer().len());
        }
    }
}
