//! In-memory action log store for testing.

use std::sync::{Arc, Mutex};

use scaffold_core::{
    application::{ApplicationError, ports::ActionLogStore},
    domain::LogEntry,
    error::ScaffoldResult,
};

/// Action log kept in memory. Clones share the same entries, so a test can
/// hand one clone to the sequencer and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryActionLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemoryActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ActionLogStore for MemoryActionLog {
    fn load(&mut self) -> ScaffoldResult<Vec<LogEntry>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| ApplicationError::StoreLockError)?;
        Ok(entries.clone())
    }

    fn append(&mut self, entry: &LogEntry) -> ScaffoldResult<()> {
        self.entries
            .lock()
            .map_err(|_| ApplicationError::StoreLockError)?
            .push(entry.clone());
        Ok(())
    }

    fn rewrite(&mut self, entries: &[LogEntry]) -> ScaffoldResult<()> {
        *self
            .entries
            .lock()
            .map_err(|_| ApplicationError::StoreLockError)? = entries.to_vec();
        Ok(())
    }

    fn location(&self) -> String {
        "memory".into()
    }
}
