use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use super::{SessionStorage, StorageError};

/// Storage backed by a single JSON object on disk.
///
/// The whole object is held in memory and rewritten through a temporary
/// sibling file plus rename on every mutation, so a crash never leaves a
/// half-written file behind.
pub struct FileStorage {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Opens (or lazily creates) the storage file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let items = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| StorageError::Format {
                path: path.display().to_string(),
                source,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Storage file {} does not exist yet", path.display());
                BTreeMap::new()
            }
            Err(source) => {
                return Err(StorageError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        Ok(FileStorage {
            path,
            items: Mutex::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn flush(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let raw = serde_json::to_string_pretty(items).map_err(|source| StorageError::Format {
            path: self.path.display().to_string(),
            source,
        })?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, raw).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }

    /// Applies `change` and writes the result; the in-memory copy is only
    /// replaced once the file write succeeded.
    fn mutate(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, String>) -> bool,
    ) -> Result<(), StorageError> {
        let mut items = self.items.lock().expect("file storage mutex poisoned");
        let mut next = items.clone();
        if !change(&mut next) {
            return Ok(());
        }
        self.flush(&next)?;
        *items = next;
        Ok(())
    }
}

impl SessionStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().expect("file storage mutex poisoned");
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.mutate(|items| {
            items.insert(key.to_string(), value.to_string()).as_deref() != Some(value)
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.mutate(|items| items.remove(key).is_some())
    }
}
