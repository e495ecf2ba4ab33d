//! Action Log - which steps have run, for idempotence and resume.
//!
//! Every transition is appended to the [`ActionLogStore`] before the call
//! returns, so the persisted log is never behind the in-memory view. A step's
//! state is the status of its most recent entry.

use std::collections::HashMap;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    application::ports::ActionLogStore,
    domain::{EntryStatus, IdempotencyKey, LogEntry},
    error::ScaffoldResult,
};

/// Count of keys per latest status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogSummary {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub started: usize,
    pub decided: usize,
}

pub struct ActionLog {
    store: Box<dyn ActionLogStore>,
    entries: Vec<LogEntry>,
    latest: HashMap<IdempotencyKey, usize>,
    run_id: Uuid,
}

impl ActionLog {
    /// Open a log and load its persisted entries.
    ///
    /// # Errors
    /// `ActionLogCorrupt` if the store cannot parse its contents.
    #[instrument(skip_all, fields(location = %store.location()))]
    pub fn open(store: Box<dyn ActionLogStore>) -> ScaffoldResult<Self> {
        let mut log = Self {
            store,
            entries: Vec::new(),
            latest: HashMap::new(),
            run_id: Uuid::new_v4(),
        };
        log.load()?;
        Ok(log)
    }

    /// (Re)load entries from the store.
    pub fn load(&mut self) -> ScaffoldResult<()> {
        let entries = self.store.load()?;
        self.latest.clear();
        for (idx, entry) in entries.iter().enumerate() {
            self.latest.insert(entry.key.clone(), idx);
        }
        debug!(entries = entries.len(), "Action log loaded");
        self.entries = entries;
        Ok(())
    }

    /// Identifier stamped on every entry written by this process.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn location(&self) -> String {
        self.store.location()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Full history in write order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Most recent entry for a key.
    pub fn latest(&self, key: &IdempotencyKey) -> Option<&LogEntry> {
        self.latest.get(key).map(|&idx| &self.entries[idx])
    }

    pub fn status_of(&self, key: &IdempotencyKey) -> Option<EntryStatus> {
        self.latest(key).map(|e| e.status)
    }

    /// `true` if the step completed (or failed with the failure tolerated).
    pub fn has_applied(&self, key: &IdempotencyKey) -> bool {
        self.latest(key).is_some_and(LogEntry::is_applied)
    }

    /// Recorded prompt answer or gate decision.
    pub fn recorded_value(&self, key: &IdempotencyKey) -> Option<&str> {
        self.latest(key)
            .filter(|e| e.is_applied())
            .and_then(|e| e.value.as_deref())
    }

    /// Keys whose latest entry is `started`: the process died mid-step.
    pub fn interrupted(&self) -> Vec<&IdempotencyKey> {
        let mut keys: Vec<(&IdempotencyKey, usize)> = self
            .latest
            .iter()
            .filter(|&(_, &idx)| self.entries[idx].status == EntryStatus::Started)
            .map(|(k, &idx)| (k, idx))
            .collect();
        keys.sort_by_key(|&(_, idx)| idx);
        keys.into_iter().map(|(k, _)| k).collect()
    }

    /// Record a status transition.
    pub fn record(
        &mut self,
        key: &IdempotencyKey,
        status: EntryStatus,
        error: Option<String>,
    ) -> ScaffoldResult<()> {
        let mut entry = LogEntry::new(key.clone(), status, self.run_id);
        entry.error = error;
        self.record_entry(entry)
    }

    /// Record a transition that carries a prompt answer or gate decision.
    pub fn record_value(
        &mut self,
        key: &IdempotencyKey,
        status: EntryStatus,
        value: impl Into<String>,
    ) -> ScaffoldResult<()> {
        let entry = LogEntry::new(key.clone(), status, self.run_id).with_value(value);
        self.record_entry(entry)
    }

    /// Append a fully built entry.
    pub fn record_entry(&mut self, entry: LogEntry) -> ScaffoldResult<()> {
        self.store.append(&entry)?;
        debug!(key = %entry.key, status = %entry.status, "Recorded");
        self.latest.insert(entry.key.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// Compact the store down to the latest entry per key.
    #[instrument(skip_all)]
    pub fn persist(&mut self) -> ScaffoldResult<()> {
        let mut indices: Vec<usize> = self.latest.values().copied().collect();
        indices.sort_unstable();
        let compacted: Vec<LogEntry> = indices
            .into_iter()
            .map(|idx| self.entries[idx].clone())
            .collect();

        self.store.rewrite(&compacted)?;
        debug!(
            before = self.entries.len(),
            after = compacted.len(),
            "Action log compacted"
        );
        self.entries = compacted;
        self.latest = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, e)| (e.key.clone(), idx))
            .collect();
        Ok(())
    }

    /// Counts of keys by latest status.
    pub fn summary(&self) -> LogSummary {
        let mut summary = LogSummary::default();
        for &idx in self.latest.values() {
            match self.entries[idx].status {
                EntryStatus::Completed => summary.completed += 1,
                EntryStatus::Failed => summary.failed += 1,
                EntryStatus::Skipped => summary.skipped += 1,
                EntryStatus::Started => summary.started += 1,
                EntryStatus::Decided => summary.decided += 1,
            }
        }
        summary
    }
}

impl std::fmt::Debug for ActionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionLog")
            .field("location", &self.store.location())
            .field("entries", &self.entries.len())
            .field("run_id", &self.run_id)
            .finish()
    }
}
