//! Local filesystem adapter using std::fs.

use std::io;
use std::path::Path;

use scaffold_core::{
    application::{ApplicationError, ports::Filesystem},
    error::{ScaffoldError, ScaffoldResult},
};

/// Production filesystem implementation using `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    pub fn new() -> Self {
        Self
    }
}

impl Filesystem for LocalFilesystem {
    fn create_dir_all(&self, path: &Path) -> ScaffoldResult<()> {
        std::fs::create_dir_all(path).map_err(|e| map_io_error(path, e, "create directory"))
    }

    fn write_file(&self, path: &Path, content: &str) -> ScaffoldResult<()> {
        std::fs::write(path, content).map_err(|e| map_io_error(path, e, "write file"))
    }

    fn read_to_string(&self, path: &Path) -> ScaffoldResult<String> {
        std::fs::read_to_string(path).map_err(|e| map_io_error(path, e, "read file"))
    }

    fn set_permissions(&self, path: &Path, executable: bool) -> ScaffoldResult<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata =
                std::fs::metadata(path).map_err(|e| map_io_error(path, e, "get metadata"))?;
            let mut perms = metadata.permissions();
            let mode = if executable {
                perms.mode() | 0o111
            } else {
                perms.mode() & !0o111
            };
            perms.set_mode(mode);
            std::fs::set_permissions(path, perms)
                .map_err(|e| map_io_error(path, e, "set permissions"))?;
        }
        #[cfg(not(unix))]
        {
            let _ = (path, executable);
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

pub(crate) fn map_io_error(path: &Path, e: io::Error, operation: &str) -> ScaffoldError {
    ApplicationError::FilesystemError {
        path: path.to_path_buf(),
        reason: format!("Failed to {operation}: {e}"),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_then_read_round_trips_text() {
        let temp = TempDir::new().unwrap();
        let fs = LocalFilesystem::new();
        let dir = temp.path().join("config");
        let file = dir.join("app.yml");

        fs.create_dir_all(&dir).unwrap();
        fs.write_file(&file, "name: shop\n").unwrap();

        assert!(fs.exists(&file));
        assert_eq!(fs.read_to_string(&file).unwrap(), "name: shop\n");
    }

    #[test]
    fn reading_missing_file_is_filesystem_error() {
        let temp = TempDir::new().unwrap();
        let err = LocalFilesystem
            .read_to_string(&temp.path().join("nope"))
            .unwrap_err();
        assert!(matches!(
            err,
            ScaffoldError::Application(ApplicationError::FilesystemError { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn executable_bit_is_set() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let file = temp.path().join("setup");
        let fs = LocalFilesystem::new();
        fs.write_file(&file, "#!/bin/sh\n").unwrap();
        fs.set_permissions(&file, true).unwrap();

        let mode = std::fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}
