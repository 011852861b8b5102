//! Error statistics (spec.md §3 `ErrorStatistics`/`DetailedErrorStatistics`,
//! §5 concurrency notes).

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::error::ErrorKind;

/// Bound on the top-messages list kept per kind (spec.md §3).
const MAX_TOP_MESSAGES: usize = 50;
/// Bound on the recent-errors ring buffer (spec.md §3).
const MAX_RECENT_ERRORS: usize = 100;

/// Plain six-counter tally, one per [`ErrorKind`] (spec.md §3).
#[derive(Debug, Clone)]
pub struct ErrorStatistics {
    counts: [u64; 6],
    /// When the counters were last reset.
    pub last_reset: DateTime<Utc>,
}

impl ErrorStatistics {
    /// A fresh all-zero tally stamped with `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { counts: [0; 6], last_reset: now }
    }

    /// Increment the counter for `kind`.
    #[expect(clippy::indexing_slicing, reason = "ErrorKind::index is a fixed 0..6 mapping")]
    pub fn increment(&mut self, kind: ErrorKind) {
        self.counts[kind.index()] += 1;
    }

    /// Current count for `kind`.
    #[must_use]
    #[expect(clippy::indexing_slicing, reason = "ErrorKind::index is a fixed 0..6 mapping")]
    pub fn count(&self, kind: ErrorKind) -> u64 {
        self.counts[kind.index()]
    }

    /// Sum across every kind.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Zero every counter and re-stamp `last_reset`.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.counts = [0; 6];
        self.last_reset = now;
    }
}

/// One entry in the bounded top-messages list.
#[derive(Debug, Clone)]
pub struct TopMessageEntry {
    /// The raw (unpatterned) message text.
    pub message: String,
    /// Occurrences of this exact message.
    pub count: u64,
    /// First time this message was observed.
    pub first_seen: DateTime<Utc>,
    /// Most recent time this message was observed.
    pub last_seen: DateTime<Utc>,
}

/// One entry in the bounded recent-errors ring (spec.md §3).
#[derive(Debug, Clone)]
pub struct RecentErrorEntry {
    /// The error kind.
    pub kind: ErrorKind,
    /// The raw message text, already sanitized by the caller.
    pub message: String,
    /// When the error occurred.
    pub occurred_at: DateTime<Utc>,
}

/// Per-kind sub-category histogram plus hourly/daily buckets, a bounded
/// top-messages list, and a bounded recent-errors ring (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct DetailedErrorStatistics {
    sub_category_counts: HashMap<ErrorKind, HashMap<String, u64>>,
    hourly: HashMap<ErrorKind, [u64; 24]>,
    daily: HashMap<ErrorKind, [u64; 7]>,
    top_messages: HashMap<ErrorKind, Vec<TopMessageEntry>>,
    recent_errors: Vec<RecentErrorEntry>,
}

impl DetailedErrorStatistics {
    /// A fresh, empty set of detailed statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence: bumps the sub-category histogram, the
    /// hour-of-day and day-of-week buckets, the top-messages list (capped
    /// at [`MAX_TOP_MESSAGES`] distinct messages, evicting the
    /// lowest-frequency entry once full rather than dropping the
    /// newcomer), and the recent-errors ring (capped at
    /// [`MAX_RECENT_ERRORS`], evicting oldest-first).
    pub fn record(&mut self, kind: ErrorKind, sub_category: &str, message: &str, now: DateTime<Utc>) {
        *self.sub_category_counts.entry(kind).or_default().entry(sub_category.to_owned()).or_insert(0) += 1;

        let hour = usize::try_from(now.hour()).unwrap_or(0);
        if let Some(slot) = self.hourly.entry(kind).or_insert([0; 24]).get_mut(hour) {
            *slot += 1;
        }

        let weekday = usize::try_from(now.weekday().num_days_from_monday()).unwrap_or(0);
        if let Some(slot) = self.daily.entry(kind).or_insert([0; 7]).get_mut(weekday) {
            *slot += 1;
        }

        let entries = self.top_messages.entry(kind).or_default();
        if let Some(existing) = entries.iter_mut().find(|entry| entry.message == message) {
            existing.count += 1;
            existing.last_seen = now;
        } else if entries.len() < MAX_TOP_MESSAGES {
            entries.push(TopMessageEntry { message: message.to_owned(), count: 1, first_seen: now, last_seen: now });
        } else if let Some((lowest_index, _)) = entries.iter().enumerate().min_by_key(|(_, entry)| entry.count) {
            entries[lowest_index] = TopMessageEntry { message: message.to_owned(), count: 1, first_seen: now, last_seen: now };
        }

        self.recent_errors.push(RecentErrorEntry { kind, message: message.to_owned(), occurred_at: now });
        if self.recent_errors.len() > MAX_RECENT_ERRORS {
            let overflow = self.recent_errors.len() - MAX_RECENT_ERRORS;
            self.recent_errors.drain(0..overflow);
        }
    }

    /// Sub-category histogram for `kind`, as (name, count) pairs.
    #[must_use]
    pub fn sub_categories(&self, kind: ErrorKind) -> Vec<(String, u64)> {
        self.sub_category_counts.get(&kind).map(|counts| counts.iter().map(|(name, count)| (name.clone(), *count)).collect()).unwrap_or_default()
    }

    /// 24-slot hour-of-day histogram for `kind`.
    #[must_use]
    pub fn hourly(&self, kind: ErrorKind) -> [u64; 24] {
        self.hourly.get(&kind).copied().unwrap_or([0; 24])
    }

    /// 7-slot day-of-week histogram for `kind`.
    #[must_use]
    pub fn daily(&self, kind: ErrorKind) -> [u64; 7] {
        self.daily.get(&kind).copied().unwrap_or([0; 7])
    }

    /// Current top-messages list for `kind`, sorted by frequency
    /// (occurrence count) descending, per spec.md §3.
    #[must_use]
    pub fn top_messages(&self, kind: ErrorKind) -> Vec<TopMessageEntry> {
        let mut entries = self.top_messages.get(&kind).cloned().unwrap_or_default();
        entries.sort_by(|left, right| right.count.cmp(&left.count));
        entries
    }

    /// The bounded recent-errors ring, oldest first.
    #[must_use]
    pub fn recent_errors(&self) -> &[RecentErrorEntry] {
        &self.recent_errors
    }

    /// The hour (0-23, summed across all kinds) with the highest total,
    /// used by the error-summary log line.
    #[must_use]
    pub fn peak_hour(&self) -> Option<(usize, u64)> {
        let mut totals = [0u64; 24];
        for buckets in self.hourly.values() {
            for (slot, count) in buckets.iter().enumerate() {
                if let Some(total) = totals.get_mut(slot) {
                    *total += count;
                }
            }
        }
        totals.iter().copied().enumerate().max_by_key(|(_, count)| *count).filter(|(_, count)| *count > 0)
    }

    /// Reset all detailed statistics to empty.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
