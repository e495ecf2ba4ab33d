//! Action log entries.
//!
//! The log is append-only: a step's state is the status of its most recent
//! entry. A lingering `Started` means the process died mid-step.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::IdempotencyKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Written right before a step executes.
    Started,
    Completed,
    Failed,
    /// Not executed because its group evaluated `false`.
    Skipped,
    /// A conditional group's decision (carried in `value`).
    Decided,
}

impl EntryStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Decided => "decided",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(idempotency_key, status, timestamp, error_detail?)` plus run metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub key: IdempotencyKey,
    pub status: EntryStatus,
    pub timestamp: DateTime<Utc>,
    pub run_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Prompt answer or gate decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// The failure was tolerated and the plan continued.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub tolerated: bool,
}

impl LogEntry {
    pub fn new(key: IdempotencyKey, status: EntryStatus, run_id: Uuid) -> Self {
        Self {
            key,
            status,
            timestamp: Utc::now(),
            run_id,
            error: None,
            value: None,
            tolerated: false,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn tolerated(mut self) -> Self {
        self.tolerated = true;
        self
    }

    /// Whether this entry means the step must not run again.
    pub fn is_applied(&self) -> bool {
        match self.status {
            EntryStatus::Completed | EntryStatus::Decided => true,
            EntryStatus::Failed => self.tolerated,
            EntryStatus::Started | EntryStatus::Skipped => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applied_statuses() {
        let run = Uuid::new_v4();
        let key = IdempotencyKey::from("run:ls");
        assert!(LogEntry::new(key.clone(), EntryStatus::Completed, run).is_applied());
        assert!(!LogEntry::new(key.clone(), EntryStatus::Started, run).is_applied());
        assert!(!LogEntry::new(key.clone(), EntryStatus::Skipped, run).is_applied());
        assert!(!LogEntry::new(key.clone(), EntryStatus::Failed, run).is_applied());
        assert!(
            LogEntry::new(key, EntryStatus::Failed, run)
                .tolerated()
                .is_applied()
        );
    }

    #[test]
    fn serializes_compactly() {
        let entry = LogEntry::new("copy:a->b".into(), EntryStatus::Completed, Uuid::nil());
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains(r#""key":"copy:a->b""#));
        assert!(json.contains(r#""status":"completed""#));
        assert!(!json.contains("error"));
        assert!(!json.contains("tolerated"));

        let back: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
