//! Persistence of the lock document.
//!
//! Every save replaces the whole document. Concurrent invocations racing on
//! the same file are last-writer-wins.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};

use super::model::LockDocument;
use crate::error::{GuardError, Result};

/// Load/save boundary for the lock document.
pub trait ConfigStore {
    fn load(&self) -> Result<LockDocument>;
    fn save(&self, doc: &LockDocument) -> Result<()>;
}

/// TOML file store. A missing file loads as an empty document.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.kube-lock.toml`, or `None` when no home directory is known.
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(Path::new(&home).join(".kube-lock.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_error(&self, reason: impl ToString) -> GuardError {
        GuardError::ConfigRead {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    fn write_error(&self, reason: impl ToString) -> GuardError {
        GuardError::ConfigWrite {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write to a sibling temp file, then rename over `path`. Readers see the
/// old contents or the new ones, never a partial write.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp = temp_path(path);
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path).inspect_err(|_| {
        let _ = std::fs::remove_file(&tmp);
    })
}

impl ConfigStore for FileStore {
    fn load(&self) -> Result<LockDocument> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no lock config at {}, starting empty", self.path.display());
                return Ok(LockDocument::default());
            }
            Err(e) => return Err(self.read_error(e)),
        };
        log::debug!("using lock config {}", self.path.display());
        toml::from_str(&content).map_err(|e| self.read_error(e))
    }

    /// Atomic: an interrupted save never leaves a truncated document behind.
    fn save(&self, doc: &LockDocument) -> Result<()> {
        let content = toml::to_string(doc).map_err(|e| self.write_error(e))?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| self.write_error(e))?;
        }
        write_atomic(&self.path, content.as_bytes()).map_err(|e| self.write_error(e))
    }
}

/// In-process store for embedding and tests. Counts saves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    doc: RefCell<LockDocument>,
    saves: Cell<usize>,
}

impl MemoryStore {
    pub fn new(doc: LockDocument) -> Self {
        Self {
            doc: RefCell::new(doc),
            saves: Cell::new(0),
        }
    }

    /// Snapshot of the last saved (or initial) document.
    pub fn document(&self) -> LockDocument {
        self.doc.borrow().clone()
    }

    pub fn saves(&self) -> usize {
        self.saves.get()
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<LockDocument> {
        Ok(self.document())
    }

    fn save(&self, doc: &LockDocument) -> Result<()> {
        *self.doc.borrow_mut() = doc.clone();
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Status, Target};

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("absent.toml"));
        assert_eq!(store.load().unwrap(), LockDocument::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested/kube-lock.toml"));
        let mut doc = LockDocument::default();
        doc.unlock_timeout_period = "30m".into();
        doc.contexts.push(Target::new("prod", Status::Locked));
        store.save(&doc).unwrap();

        assert_eq!(store.load().unwrap(), doc);
        assert!(!temp_path(store.path()).exists());
    }

    #[test]
    fn malformed_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kube-lock.toml");
        std::fs::write(&path, "contexts = 'not a list").unwrap();
        let err = FileStore::new(path).load().unwrap_err();
        assert!(matches!(err, GuardError::ConfigRead { .. }));
    }

    #[test]
    fn memory_store_counts_saves() {
        let store = MemoryStore::default();
        store.save(&LockDocument::default()).unwrap();
        store.save(&LockDocument::default()).unwrap();
        assert_eq!(store.saves(), 2);
    }
}
