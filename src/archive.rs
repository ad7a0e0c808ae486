//! Output archives for compiled layers
//!
//! ## Table of Contents
//! - **Archive**: Trait for packed output storage
//! - **MemoryArchive**: In-memory archive (tests, dry runs)
//! - **DirectoryArchive**: Archive backed by a directory tree

use crate::error::{CompileError, Result};
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Packed storage that compiled output is placed into
pub trait Archive: Send + Sync {
    /// Write an entry, replacing any previous content
    fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Read an entry
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Check whether an entry exists
    fn contains(&self, path: &str) -> bool;

    /// All entry paths, sorted
    fn paths(&self) -> Result<Vec<String>>;

    /// Check that `path` is acceptable before anything is produced for it
    fn check_path(&self, _path: &str) -> Result<()> {
        Ok(())
    }

    /// Archive name for logging
    fn name(&self) -> &str;
}

/// Shared archive handle
pub type BoxedArchive = Arc<dyn Archive>;

/// Serialize and write JSON to an archive
pub fn archive_write_json<T: Serialize>(archive: &dyn Archive, path: &str, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    archive.write(path, &bytes)
}

/// Read and deserialize JSON from an archive
pub fn archive_read_json<T: DeserializeOwned>(archive: &dyn Archive, path: &str) -> Result<Option<T>> {
    match archive.read(path)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// In-memory archive
#[derive(Debug, Default)]
pub struct MemoryArchive {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryArchive {
    /// Create an empty archive
    pub fn new() -> Self {
        Self::default()
    }
}

impl Archive for MemoryArchive {
    fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        self.entries.write().insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(path).cloned())
    }

    fn contains(&self, path: &str) -> bool {
        self.entries.read().contains_key(path)
    }

    fn paths(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Archive that stores each entry as a file under a root directory
#[derive(Debug)]
pub struct DirectoryArchive {
    root: PathBuf,
}

impl DirectoryArchive {
    /// Open or create an archive rooted at `root`
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .map_err(|e| CompileError::archive(format!("Failed to create {}: {}", root.display(), e)))?;

        info!(path = %root.display(), "Directory archive opened");
        Ok(Self { root })
    }

    /// Archive root
    pub fn root(&self) -> &Path {
        &self.root
    }

    // Entry paths are relative and may not climb out of the root.
    fn entry_path(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let valid = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !valid {
            return Err(CompileError::archive(format!("invalid entry path '{}'", path)));
        }
        Ok(self.root.join(relative))
    }

    fn collect(&self, dir: &Path, out: &mut Vec<String>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.collect(&path, out)?;
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(parts.join("/"));
            }
        }
        Ok(())
    }
}

impl Archive for DirectoryArchive {
    fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let target = self.entry_path(path)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, data)?;
        debug!(path = %target.display(), bytes = data.len(), "Archive entry written");
        Ok(())
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let target = self.entry_path(path)?;
        if !target.is_file() {
            return Ok(None);
        }
        Ok(Some(std::fs::read(target)?))
    }

    fn contains(&self, path: &str) -> bool {
        self.entry_path(path).map(|p| p.is_file()).unwrap_or(false)
    }

    fn paths(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        self.collect(&self.root, &mut out)?;
        out.sort();
        Ok(out)
    }

    fn check_path(&self, path: &str) -> Result<()> {
        self.entry_path(path).map(|_| ())
    }

    fn name(&self) -> &str {
        "directory"
    }
}
