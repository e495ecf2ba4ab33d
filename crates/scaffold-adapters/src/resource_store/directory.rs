//! Resources read from a directory next to the plan file.

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::{debug, instrument};
use walkdir::WalkDir;

use scaffold_core::{
    application::{ApplicationError, ports::ResourceStore},
    domain::RelativePath,
    error::ScaffoldResult,
};

/// Serves `name` from `<root>/<name>`. Names must stay inside `root`.
#[derive(Debug, Clone)]
pub struct DirectoryResourceStore {
    root: PathBuf,
}

impl DirectoryResourceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> ScaffoldResult<PathBuf> {
        Ok(RelativePath::try_new(name)?.under(&self.root))
    }
}

impl ResourceStore for DirectoryResourceStore {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    fn get(&self, name: &str) -> ScaffoldResult<String> {
        let path = self.resolve(name)?;
        match fs::read_to_string(&path) {
            Ok(content) => {
                debug!(bytes = content.len(), "Resource loaded");
                Ok(content)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound || path.is_dir() => {
                Err(ApplicationError::ResourceNotFound {
                    name: name.to_string(),
                }
                .into())
            }
            Err(e) => Err(ApplicationError::FilesystemError {
                path,
                reason: format!("Failed to read resource: {e}"),
            }
            .into()),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok_and(|path| path.is_file())
    }

    fn list(&self) -> ScaffoldResult<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1) {
            let entry = entry.map_err(|e| ApplicationError::FilesystemError {
                path: self.root.clone(),
                reason: format!("directory walk error: {e}"),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&self.root) {
                names.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
        names.sort();
        Ok(names)
    }
}
