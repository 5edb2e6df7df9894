#![forbid(unsafe_code)]

//! Command history with a byte budget.
//!
//! Submitted lines are kept oldest-first in a [`VecDeque`]. Each entry costs
//! its length plus one byte against the capacity; when a new entry does not
//! fit, the oldest entries are evicted in insertion order until it does.
//!
//! # Browsing
//!
//! [`History::previous`] and [`History::next`] walk the entries with a
//! transient cursor. When browsing starts, the unsubmitted line is saved as a
//! draft and handed back once the cursor walks past the newest entry.
//!
//! ```
//! use iotool_core::history::History;
//!
//! let mut history = History::new(64);
//! history.append("help");
//! history.append("iorb 0x60");
//!
//! assert_eq!(history.previous("io").as_deref(), Some("iorb 0x60"));
//! assert_eq!(history.previous("").as_deref(), Some("help"));
//! assert_eq!(history.next().as_deref(), Some("iorb 0x60"));
//! assert_eq!(history.next().as_deref(), Some("io"));
//! ```

use std::collections::VecDeque;

/// Per-entry overhead charged against the capacity.
const ENTRY_OVERHEAD: usize = 1;

/// Default capacity in bytes.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Ordered store of previously submitted lines.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<String>,
    used: usize,
    capacity: usize,
    /// Index into `entries` of the entry currently shown, `None` when not browsing.
    cursor: Option<usize>,
    /// Line that was being edited when browsing started. Only `Some` while
    /// `cursor` is; both are set and cleared together.
    draft: Option<String>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl History {
    /// Create an empty history bounded to `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            used: 0,
            capacity,
            cursor: None,
            draft: None,
        }
    }

    /// Record a submitted line.
    ///
    /// Blank lines are ignored. An entry larger than the whole capacity is
    /// still stored once every older entry has been evicted.
    pub fn append(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        self.reset_cursor();

        let size = cost(text);
        while self.used + size > self.capacity {
            let Some(evicted) = self.entries.pop_front() else {
                break;
            };
            self.used -= cost(&evicted);
            crate::debug!(
                evicted_len = evicted.len(),
                used = self.used,
                "history entry evicted"
            );
        }

        self.entries.push_back(text.to_owned());
        self.used += size;
        crate::trace!(entries = self.entries.len(), used = self.used, "history append");
    }

    /// Step to the next older entry.
    ///
    /// `current` is the line being edited; it becomes the draft when browsing
    /// starts. Returns `None` when there is nothing older to show.
    pub fn previous(&mut self, current: &str) -> Option<String> {
        let index = match self.cursor {
            None => {
                let newest = self.entries.len().checked_sub(1)?;
                self.draft = Some(current.to_owned());
                newest
            }
            Some(index) => index.checked_sub(1)?,
        };
        self.cursor = Some(index);
        self.entries.get(index).cloned()
    }

    /// Step to the next newer entry.
    ///
    /// Walking past the newest entry ends browsing and returns the saved
    /// draft (empty if there was none). Returns `None` when not browsing.
    pub fn next(&mut self) -> Option<String> {
        let index = self.cursor?;
        if index + 1 < self.entries.len() {
            self.cursor = Some(index + 1);
            return self.entries.get(index + 1).cloned();
        }
        self.cursor = None;
        Some(self.draft.take().unwrap_or_default())
    }

    /// Stop browsing and drop any saved draft.
    pub fn reset_cursor(&mut self) {
        self.cursor = None;
        self.draft = None;
    }

    /// Release every entry.
    pub fn clear(&mut self) {
        crate::debug!(entries = self.entries.len(), "history released");
        self.entries.clear();
        self.used = 0;
        self.reset_cursor();
    }

    /// Whether the browse cursor is on an entry.
    #[must_use]
    pub fn is_browsing(&self) -> bool {
        self.cursor.is_some()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes charged against the capacity.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.used
    }

    /// Capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

fn cost(text: &str) -> usize {
    text.len() + ENTRY_OVERHEAD
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(history: &History) -> Vec<&str> {
        history.iter().collect()
    }

    #[test]
    fn empty_and_blank_lines_are_not_stored() {
        let mut history = History::new(32);
        history.append("");
        history.append("   \t ");
        assert!(history.is_empty());
        assert_eq!(history.used_bytes(), 0);
    }

    #[test]
    fn entries_charge_length_plus_one() {
        let mut history = History::new(20);
        for line in ["ab", "cd", "ef", "ghijklmno"] {
            history.append(line);
        }
        assert_eq!(history.used_bytes(), 19);
        assert_eq!(entries(&history), ["ab", "cd", "ef", "ghijklmno"]);
    }

    #[test]
    fn eviction_is_oldest_first_until_entry_fits() {
        let mut history = History::new(20);
        for line in ["ab", "cd", "ef", "ghijklmno"] {
            history.append(line);
        }
        let p = "p".repeat(15);
        history.append(&p);

        // 10 + 16 would exceed 20, so "ghijklmno" goes after the first three.
        assert_eq!(entries(&history), [p.as_str()]);
        assert_eq!(history.used_bytes(), 16);
        assert!(history.used_bytes() <= history.capacity());
    }

    #[test]
    fn eviction_stops_as_soon_as_entry_fits() {
        let mut history = History::new(26);
        for line in ["ab", "cd", "ef", "ghijklmno"] {
            history.append(line);
        }
        let p = "p".repeat(15);
        history.append(&p);

        assert_eq!(entries(&history), ["ghijklmno", p.as_str()]);
        assert_eq!(history.used_bytes(), 26);
    }

    #[test]
    fn oversized_entry_is_admitted_alone() {
        let mut history = History::new(8);
        history.append("abc");
        history.append("0123456789abcdef");
        assert_eq!(entries(&history), ["0123456789abcdef"]);
        assert_eq!(history.used_bytes(), 17);

        // The next entry evicts the oversized one.
        history.append("x");
        assert_eq!(entries(&history), ["x"]);
        assert_eq!(history.used_bytes(), 2);
    }

    #[test]
    fn up_up_down_walks_entries() {
        let mut history = History::new(64);
        history.append("help");
        history.append("iorb 0x60");

        assert_eq!(history.previous("").as_deref(), Some("iorb 0x60"));
        assert_eq!(history.previous("").as_deref(), Some("help"));
        assert_eq!(history.next().as_deref(), Some("iorb 0x60"));
    }

    #[test]
    fn previous_stops_at_oldest() {
        let mut history = History::new(64);
        history.append("help");
        assert_eq!(history.previous("").as_deref(), Some("help"));
        assert_eq!(history.previous(""), None);
        assert!(history.is_browsing());
    }

    #[test]
    fn previous_on_empty_store_is_no_change() {
        let mut history = History::new(64);
        assert_eq!(history.previous("draft"), None);
        assert!(!history.is_browsing());
    }

    #[test]
    fn next_past_newest_restores_draft() {
        let mut history = History::new(64);
        history.append("help");
        assert_eq!(history.previous("iowb 0x80").as_deref(), Some("help"));
        assert_eq!(history.next().as_deref(), Some("iowb 0x80"));
        assert!(!history.is_browsing());
        assert_eq!(history.next(), None);
    }

    #[test]
    fn next_without_draft_yields_empty_line() {
        let mut history = History::new(64);
        history.append("help");
        history.previous("");
        assert_eq!(history.next().as_deref(), Some(""));
    }

    #[test]
    fn append_resets_browsing() {
        let mut history = History::new(64);
        history.append("help");
        history.previous("typed");
        history.append("quit");
        assert!(!history.is_browsing());
        assert_eq!(history.previous("").as_deref(), Some("quit"));
    }

    #[test]
    fn draft_does_not_outlive_browsing() {
        let mut history = History::new(64);
        history.append("help");
        history.previous("typed");
        assert_eq!(history.next().as_deref(), Some("typed"));
        assert!(!history.is_browsing());
        // A new browse saves the new line, never the old draft.
        history.previous("");
        assert_eq!(history.next().as_deref(), Some(""));

        history.previous("again");
        history.reset_cursor();
        history.previous("");
        assert_eq!(history.next().as_deref(), Some(""));
    }

    #[test]
    fn clear_releases_everything() {
        let mut history = History::new(64);
        history.append("help");
        history.previous("");
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.used_bytes(), 0);
        assert!(!history.is_browsing());
    }
}
