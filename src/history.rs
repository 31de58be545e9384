use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::metrics::{performance_label, SessionResult};
use crate::storage::{Storage, StorageError};

/// Storage key holding the whole history array
pub const HISTORY_KEY: &str = "copyCatHistory";
const PROBE_KEY: &str = "__copyCatTest__";

/// How long completed sessions are kept
pub fn retention() -> Duration {
    Duration::days(7)
}

/// Persisted record of one completed session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// milliseconds since the unix epoch
    pub timestamp: i64,
    pub wpm: u32,
    pub accuracy: u8,
    #[serde(rename = "timeTaken")]
    pub time_taken_secs: u64,
}

impl HistoryEntry {
    pub fn from_result(result: SessionResult, now: DateTime<Utc>) -> Self {
        Self {
            timestamp: now.timestamp_millis(),
            wpm: result.wpm,
            accuracy: result.accuracy,
            time_taken_secs: result.time_taken_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub entry: HistoryEntry,
    pub date: String,
    pub label: &'static str,
}

/// History ready for display: newest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryView {
    pub rows: Vec<HistoryRow>,
}

impl HistoryView {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// e.g. "Nov 14, 10:13 PM"
pub fn format_timestamp<Tz: TimeZone>(timestamp: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match tz.timestamp_millis_opt(timestamp).single() {
        Some(at) => at.format("%b %-d, %-I:%M %p").to_string(),
        None => String::from("-"),
    }
}

/// Completed-session log kept behind a single storage key.
///
/// Every failure of the backing storage is logged and swallowed: a broken
/// store behaves like an empty one and never interrupts a session.
pub struct HistoryStore {
    storage: Option<Box<dyn Storage>>,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("available", &self.is_available())
            .finish()
    }
}

impl HistoryStore {
    /// Wrap `storage`, probing it once. A store that fails the probe is inert.
    pub fn new(storage: Box<dyn Storage>) -> Self {
        match probe(storage.as_ref()) {
            Ok(()) => Self {
                storage: Some(storage),
            },
            Err(e) => {
                warn!(error = %e, "history disabled: storage unavailable");
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { storage: None }
    }

    pub fn is_available(&self) -> bool {
        self.storage.is_some()
    }

    pub fn load(&self) -> Vec<HistoryEntry> {
        let Some(storage) = &self.storage else {
            return Vec::new();
        };

        let raw = match storage.get(HISTORY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "failed to read history");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<HistoryEntry>>(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "failed to parse history, treating as empty");
                Vec::new()
            }
        }
    }

    /// Drop entries older than the retention window, writing back only when
    /// something was removed.
    pub fn prune(&self, entries: Vec<HistoryEntry>, now: DateTime<Utc>) -> Vec<HistoryEntry> {
        let cutoff = (now - retention()).timestamp_millis();
        let before = entries.len();
        let kept: Vec<HistoryEntry> = entries
            .into_iter()
            .filter(|e| e.timestamp >= cutoff)
            .collect();

        if kept.len() != before {
            debug!(removed = before - kept.len(), "pruned expired history");
            self.persist(&kept);
        }
        kept
    }

    /// Record a completed session and return the updated history
    pub fn append(&self, result: SessionResult, now: DateTime<Utc>) -> Vec<HistoryEntry> {
        if !self.is_available() {
            return Vec::new();
        }

        let mut entries = self.prune(self.load(), now);
        entries.push(HistoryEntry::from_result(result, now));
        self.persist(&entries);
        entries
    }

    /// Current history after expiring old entries
    pub fn current(&self, now: DateTime<Utc>) -> Vec<HistoryEntry> {
        self.prune(self.load(), now)
    }

    pub fn render(&self, entries: &[HistoryEntry]) -> HistoryView {
        render_in(entries, &Local)
    }

    fn persist(&self, entries: &[HistoryEntry]) {
        let Some(storage) = &self.storage else {
            return;
        };
        if let Err(e) = write_entries(storage.as_ref(), entries) {
            warn!(error = %e, "failed to save history");
        }
    }
}

fn probe(storage: &dyn Storage) -> Result<(), StorageError> {
    storage.set(PROBE_KEY, PROBE_KEY)?;
    storage.remove(PROBE_KEY)
}

fn write_entries(storage: &dyn Storage, entries: &[HistoryEntry]) -> Result<(), StorageError> {
    let raw = serde_json::to_string(entries)?;
    storage.set(HISTORY_KEY, &raw)
}

/// Newest-first rows with dates rendered in `tz`
pub fn render_in<Tz: TimeZone>(entries: &[HistoryEntry], tz: &Tz) -> HistoryView
where
    Tz::Offset: std::fmt::Display,
{
    let rows = entries
        .iter()
        .sorted_by(|a, b| b.timestamp.cmp(&a.timestamp))
        .map(|entry| HistoryRow {
            entry: *entry,
            date: format_timestamp(entry.timestamp, tz),
            label: performance_label(entry.wpm),
        })
        .collect();

    HistoryView { rows }
}
