//! JSON-lines action log at `<target>/.scaffold/actions.jsonl`.
//!
//! One serialized [`LogEntry`] per line, appended and synced after every
//! step transition. A writer holds `actions.jsonl.lock` (created with
//! `create_new`) for as long as the store is alive. The lock records the
//! holder's PID; a lock whose holder no longer exists is reclaimed.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use scaffold_core::{
    application::{ApplicationError, ports::ActionLogStore},
    domain::LogEntry,
    error::{ScaffoldError, ScaffoldResult},
};

use crate::filesystem::map_io_error;

/// Directory, relative to the target, that holds scaffold state.
pub const LOG_DIR: &str = ".scaffold";
pub const LOG_FILE: &str = "actions.jsonl";

#[derive(Debug)]
pub struct JsonLinesActionLog {
    path: PathBuf,
    lock: Option<LockGuard>,
}

impl JsonLinesActionLog {
    /// Default log path for a target directory.
    pub fn path_for(target: &Path) -> PathBuf {
        target.join(LOG_DIR).join(LOG_FILE)
    }

    /// Open for writing, taking the exclusive lock.
    ///
    /// # Errors
    /// `ActionLogLocked` if another store holds the lock.
    #[instrument(fields(path = %path.as_ref().display()), skip(path))]
    pub fn open_locked(path: impl AsRef<Path>) -> ScaffoldResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| map_io_error(parent, e, "create directory"))?;
        }
        let lock = LockGuard::acquire(lock_path(&path))?;
        debug!("Action log lock acquired");
        Ok(Self {
            path,
            lock: Some(lock),
        })
    }

    /// Open for inspection only; writes are refused.
    pub fn open_read_only(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Delete the log file. Returns `false` if there was nothing to delete.
    ///
    /// # Errors
    /// `ActionLogLocked` while a run holds the log.
    pub fn remove(path: impl AsRef<Path>) -> ScaffoldResult<bool> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(false);
        }
        let _guard = LockGuard::acquire(lock_path(path))?;
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(map_io_error(path, e, "remove action log")),
        }
    }

    fn ensure_writable(&self) -> ScaffoldResult<()> {
        if self.lock.is_none() {
            return Err(ScaffoldError::Internal {
                message: format!("action log {} was opened read-only", self.path.display()),
            });
        }
        Ok(())
    }
}

impl ActionLogStore for JsonLinesActionLog {
    fn load(&mut self) -> ScaffoldResult<Vec<LogEntry>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(map_io_error(&self.path, e, "read action log")),
        };

        let mut entries = Vec::new();
        for (idx, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: LogEntry =
                serde_json::from_str(line).map_err(|e| ApplicationError::ActionLogCorrupt {
                    location: self.location(),
                    line: idx + 1,
                    reason: e.to_string(),
                })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    fn append(&mut self, entry: &LogEntry) -> ScaffoldResult<()> {
        self.ensure_writable()?;

        let mut line = serde_json::to_string(entry).map_err(|e| ScaffoldError::Internal {
            message: format!("failed to serialize log entry: {e}"),
        })?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| map_io_error(&self.path, e, "open action log"))?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.sync_data())
            .map_err(|e| map_io_error(&self.path, e, "append to action log"))
    }

    fn rewrite(&mut self, entries: &[LogEntry]) -> ScaffoldResult<()> {
        self.ensure_writable()?;

        let tmp = self.path.with_extension("jsonl.tmp");
        let mut file =
            File::create(&tmp).map_err(|e| map_io_error(&tmp, e, "create action log"))?;
        for entry in entries {
            let line = serde_json::to_string(entry).map_err(|e| ScaffoldError::Internal {
                message: format!("failed to serialize log entry: {e}"),
            })?;
            writeln!(file, "{line}").map_err(|e| map_io_error(&tmp, e, "write action log"))?;
        }
        file.sync_all()
            .map_err(|e| map_io_error(&tmp, e, "sync action log"))?;
        fs::rename(&tmp, &self.path).map_err(|e| map_io_error(&self.path, e, "replace action log"))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

fn lock_path(log: &Path) -> PathBuf {
    let mut name = log.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Exclusive lock file, removed on drop.
#[derive(Debug)]
struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    fn acquire(path: PathBuf) -> ScaffoldResult<Self> {
        if let Some(guard) = Self::try_create(&path)? {
            return Ok(guard);
        }

        if let Some(pid) = stale_holder(&path) {
            warn!(path = %path.display(), pid, "Reclaiming lock left by a process that no longer exists");
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(map_io_error(&path, e, "remove stale lock file")),
            }
            if let Some(guard) = Self::try_create(&path)? {
                return Ok(guard);
            }
        }

        Err(ApplicationError::ActionLogLocked { lock_path: path }.into())
    }

    fn try_create(path: &Path) -> ScaffoldResult<Option<Self>> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Some(Self {
                    path: path.to_path_buf(),
                }))
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(map_io_error(path, e, "create lock file")),
        }
    }
}

/// PID recorded in the lock file, if that process is gone.
fn stale_holder(path: &Path) -> Option<i32> {
    let pid: i32 = fs::read_to_string(path).ok()?.trim().parse().ok()?;
    (pid > 0 && !process_alive(pid)).then_some(pid)
}

#[cfg(unix)]
fn process_alive(pid: i32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    !matches!(kill(Pid::from_raw(pid), None), Err(Errno::ESRCH))
}

#[cfg(not(unix))]
fn process_alive(_pid: i32) -> bool {
    true
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove lock file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scaffold_core::domain::{EntryStatus, IdempotencyKey};
    use tempfile::TempDir;
    use uuid::Uuid;

    fn entry(key: &str, status: EntryStatus) -> LogEntry {
        LogEntry::new(IdempotencyKey::from(key), status, Uuid::nil())
    }

    #[test]
    fn appended_entries_are_loaded_back() {
        let temp = TempDir::new().unwrap();
        let path = JsonLinesActionLog::path_for(temp.path());

        {
            let mut log = JsonLinesActionLog::open_locked(&path).unwrap();
            log.append(&entry("run:git init", EntryStatus::Started))
                .unwrap();
            log.append(&entry("run:git init", EntryStatus::Completed))
                .unwrap();
        }

        let mut reader = JsonLinesActionLog::open_read_only(&path);
        let entries = reader.load().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].status, EntryStatus::Completed);
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn missing_file_loads_empty() {
        let temp = TempDir::new().unwrap();
        let mut log = JsonLinesActionLog::open_read_only(temp.path().join("none.jsonl"));
        assert!(log.load().unwrap().is_empty());
    }

    #[test]
    fn corrupt_line_is_reported_with_its_number() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(LOG_FILE);
        let good = serde_json::to_string(&entry("a", EntryStatus::Completed)).unwrap();
        fs::write(&path, format!("{good}\nnot json\n")).unwrap();

        let err = JsonLinesActionLog::open_read_only(&path)
            .load()
            .unwrap_err();
        assert!(matches!(
            err,
            ScaffoldError::Application(ApplicationError::ActionLogCorrupt { line: 2, .. })
        ));
    }

    #[test]
    fn second_writer_is_locked_out_until_first_drops() {
        let temp = TempDir::new().unwrap();
        let path = JsonLinesActionLog::path_for(temp.path());

        let first = JsonLinesActionLog::open_locked(&path).unwrap();
        let err = JsonLinesActionLog::open_locked(&path).unwrap_err();
        assert!(matches!(
            err,
            ScaffoldError::Application(ApplicationError::ActionLogLocked { .. })
        ));

        drop(first);
        assert!(JsonLinesActionLog::open_locked(&path).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn lock_left_by_a_dead_process_is_reclaimed() {
        let temp = TempDir::new().unwrap();
        let path = JsonLinesActionLog::path_for(temp.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();

        let mut child = std::process::Command::new("true").spawn().unwrap();
        let dead_pid = child.id();
        child.wait().unwrap();
        fs::write(lock_path(&path), format!("{dead_pid}\n")).unwrap();

        let log = JsonLinesActionLog::open_locked(&path).unwrap();
        assert_eq!(
            fs::read_to_string(lock_path(&path)).unwrap().trim(),
            std::process::id().to_string()
        );
        drop(log);
        assert!(!lock_path(&path).exists());
    }

    #[test]
    fn lock_without_a_readable_pid_is_respected() {
        let temp = TempDir::new().unwrap();
        let path = JsonLinesActionLog::path_for(temp.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(lock_path(&path), "").unwrap();

        assert!(matches!(
            JsonLinesActionLog::open_locked(&path).unwrap_err(),
            ScaffoldError::Application(ApplicationError::ActionLogLocked { .. })
        ));
    }

    #[test]
    fn read_only_store_refuses_writes() {
        let temp = TempDir::new().unwrap();
        let mut log = JsonLinesActionLog::open_read_only(temp.path().join(LOG_FILE));
        assert!(log.append(&entry("a", EntryStatus::Started)).is_err());
    }

    #[test]
    fn rewrite_replaces_contents() {
        let temp = TempDir::new().unwrap();
        let path = JsonLinesActionLog::path_for(temp.path());
        let mut log = JsonLinesActionLog::open_locked(&path).unwrap();
        log.append(&entry("a", EntryStatus::Started)).unwrap();
        log.append(&entry("a", EntryStatus::Completed)).unwrap();

        log.rewrite(&[entry("a", EntryStatus::Completed)]).unwrap();
        let entries = log.load().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, EntryStatus::Completed);
    }

    #[test]
    fn remove_deletes_the_log() {
        let temp = TempDir::new().unwrap();
        let path = JsonLinesActionLog::path_for(temp.path());
        {
            let mut log = JsonLinesActionLog::open_locked(&path).unwrap();
            log.append(&entry("a", EntryStatus::Completed)).unwrap();
        }
        assert!(JsonLinesActionLog::remove(&path).unwrap());
        assert!(!JsonLinesActionLog::remove(&path).unwrap());
    }
}
