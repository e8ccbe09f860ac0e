use serde::{Deserialize, Serialize};

/// A single replicated log entry. Its index is its position in the log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub term: u64,
    pub command: String,
}

impl LogEntry {
    pub fn new(term: u64, command: impl Into<String>) -> Self {
        Self {
            term,
            command: command.into(),
        }
    }

    /// The entry stored at index 0 of every log.
    pub fn sentinel() -> Self {
        Self {
            term: 0,
            command: String::new(),
        }
    }
}

/// What `merge_from` did to the log, mirrored into the write-ahead log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// First index removed because of a term conflict.
    pub truncated_from: Option<u64>,
    /// Index of the first appended entry, if any were appended.
    pub appended_from: Option<u64>,
    pub appended: usize,
}

#[derive(Debug, Clone)]
pub struct RaftLog {
    // entries[0] is the sentinel
    entries: Vec<LogEntry>,
}

impl Default for RaftLog {
    fn default() -> Self {
        Self::new()
    }
}

impl RaftLog {
    pub fn new() -> Self {
        Self {
            entries: vec![LogEntry::sentinel()],
        }
    }

    pub fn append(&mut self, term: u64, command: impl Into<String>) -> u64 {
        self.entries.push(LogEntry::new(term, command));
        self.last_index()
    }

    pub fn get(&self, index: u64) -> Option<&LogEntry> {
        self.entries.get(usize::try_from(index).ok()?)
    }

    pub fn term_at(&self, index: u64) -> Option<u64> {
        self.get(index).map(|e| e.term)
    }

    /// Entries from `start_index` to the end of the log. Never includes the sentinel.
    pub fn entries_from(&self, start_index: u64) -> Vec<LogEntry> {
        let start = start_index.max(1) as usize;
        if start >= self.entries.len() {
            return Vec::new();
        }
        self.entries[start..].to_vec()
    }

    pub fn last_index(&self) -> u64 {
        (self.entries.len() - 1) as u64
    }

    pub fn last_term(&self) -> u64 {
        self.entries.last().map(|e| e.term).unwrap_or(0)
    }

    /// Number of slots including the sentinel, so `len() == last_index() + 1`.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the log holds nothing but the sentinel.
    pub fn is_empty(&self) -> bool {
        self.entries.len() == 1
    }

    /// Whether a candidate whose log ends at (`candidate_last_term`,
    /// `candidate_last_index`) is at least as up to date as this one.
    pub fn is_up_to_date(&self, candidate_last_term: u64, candidate_last_index: u64) -> bool {
        if candidate_last_term != self.last_term() {
            return candidate_last_term > self.last_term();
        }
        candidate_last_index >= self.last_index()
    }

    /// Drops the entry at `from` and everything after it. The sentinel stays.
    pub fn truncate(&mut self, from: u64) {
        let keep = usize::try_from(from.max(1)).unwrap_or(usize::MAX);
        self.entries.truncate(keep);
    }

    pub fn matches(&self, prev_log_index: u64, prev_log_term: u64) -> bool {
        self.term_at(prev_log_index) == Some(prev_log_term)
    }

    /// Merges `incoming` (which starts right after `prev_log_index`) into the
    /// log. Entries that already match are left alone; on the first term
    /// conflict the local suffix is dropped and the rest appended.
    ///
    /// Callers must have checked `matches(prev_log_index, ..)` first.
    pub fn merge_from(&mut self, prev_log_index: u64, incoming: &[LogEntry]) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        let mut index = prev_log_index + 1;
        let mut pos = 0;

        while pos < incoming.len() {
            match self.term_at(index) {
                Some(term) if term == incoming[pos].term => {
                    index += 1;
                    pos += 1;
                }
                Some(_) => {
                    self.entries.truncate(index as usize);
                    outcome.truncated_from = Some(index);
                    break;
                }
                None => break,
            }
        }

        if pos < incoming.len() {
            outcome.appended_from = Some(index);
            outcome.appended = incoming.len() - pos;
            self.entries.extend_from_slice(&incoming[pos..]);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_with_terms(terms: &[u64]) -> RaftLog {
        let mut log = RaftLog::new();
        for (i, term) in terms.iter().enumerate() {
            log.append(*term, format!("PUT k{} v", i + 1));
        }
        log
    }

    #[test]
    fn test_new_log_has_only_sentinel() {
        let log = RaftLog::new();
        assert_eq!(log.len(), 1);
        assert_eq!(log.last_index(), 0);
        assert_eq!(log.last_term(), 0);
        assert!(log.is_empty());
        assert!(log.matches(0, 0));
        assert!(log.entries_from(0).is_empty());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut log = log_with_terms(&[1, 1]);
        let incoming = log.entries_from(1);

        let outcome = log.merge_from(0, &incoming);

        assert_eq!(outcome, MergeOutcome::default());
        assert_eq!(log.last_index(), 2);
    }

    #[test]
    fn test_merge_truncates_on_conflict() {
        let mut log = log_with_terms(&[1, 1, 1]);
        let incoming = vec![LogEntry::new(1, "PUT k2 v"), LogEntry::new(2, "PUT x y")];

        let outcome = log.merge_from(1, &incoming);

        assert_eq!(outcome.truncated_from, Some(3));
        assert_eq!(outcome.appended_from, Some(3));
        assert_eq!(outcome.appended, 1);
        assert_eq!(log.last_index(), 3);
        assert_eq!(log.term_at(3), Some(2));
        assert_eq!(log.get(3).map(|e| e.command.as_str()), Some("PUT x y"));
    }

    #[test]
    fn test_merge_keeps_longer_matching_suffix() {
        let mut log = log_with_terms(&[1, 1, 1]);
        let incoming = vec![LogEntry::new(1, "PUT k1 v")];

        let outcome = log.merge_from(0, &incoming);

        assert_eq!(outcome.truncated_from, None);
        assert_eq!(log.last_index(), 3);
    }

    #[test]
    fn test_truncate_keeps_prefix_and_sentinel() {
        let mut log = log_with_terms(&[1, 1, 2]);

        log.truncate(3);
        assert_eq!(log.last_index(), 2);
        assert_eq!(log.last_term(), 1);

        log.truncate(0);
        assert!(log.is_empty());
        assert_eq!(log.term_at(0), Some(0));

        log.truncate(7);
        assert!(log.is_empty());
    }
}
