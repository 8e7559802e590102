use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::{file_storage::FileStorage, memory_storage::MemoryStorage};
use crate::config::StorageConfig;
use crate::models::SessionUser;

/// Key holding the opaque bearer token.
pub const TOKEN_KEY: &str = "token";
/// Key holding the JSON-serialized user profile.
pub const USER_KEY: &str = "user_data";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("storage file {path} is not a JSON object of strings: {source}")]
    Format {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("cached user profile is not valid JSON: {0}")]
    CorruptUser(#[source] serde_json::Error),
    #[error("could not serialize user profile: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// The SessionStorage trait abstracts synchronous string key/value persistence
/// that survives a reload (get, set, remove).
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Creates a concrete storage implementation based on the StorageConfig.
pub fn create_storage(config: &StorageConfig) -> Result<Arc<dyn SessionStorage>, StorageError> {
    match config {
        StorageConfig::Memory => {
            info!("Using in-memory session storage; sessions will not survive a restart.");
            Ok(Arc::new(MemoryStorage::new()))
        }
        StorageConfig::File(file) => {
            let storage = FileStorage::open(&file.path)?;
            info!("Using file session storage at {}", storage.path().display());
            Ok(Arc::new(storage))
        }
    }
}

/// A token and user profile read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSession {
    pub token: String,
    pub user: SessionUser,
}

/// Reads the cached session. Both keys must be present; a profile that does not
/// parse is reported as `CorruptUser` so the caller can log it and treat it as a miss.
pub fn load_cached_session(
    storage: &dyn SessionStorage,
) -> Result<Option<CachedSession>, StorageError> {
    let token = storage.get_item(TOKEN_KEY)?.filter(|t| !t.is_empty());
    let raw_user = storage.get_item(USER_KEY)?.filter(|u| !u.is_empty());
    match (token, raw_user) {
        (Some(token), Some(raw_user)) => {
            let user = serde_json::from_str(&raw_user).map_err(StorageError::CorruptUser)?;
            Ok(Some(CachedSession { token, user }))
        }
        _ => {
            debug!("No complete cached session found.");
            Ok(None)
        }
    }
}

/// Writes token and profile together. If the profile cannot be written the
/// previous token is put back, so a token never outlives its profile.
pub fn persist_session(
    storage: &dyn SessionStorage,
    token: &str,
    user: &SessionUser,
) -> Result<(), StorageError> {
    let raw_user = serde_json::to_string(user).map_err(StorageError::Serialize)?;
    let previous_token = storage.get_item(TOKEN_KEY)?;
    storage.set_item(TOKEN_KEY, token)?;
    if let Err(e) = storage.set_item(USER_KEY, &raw_user) {
        let restored = match previous_token.as_deref() {
            Some(previous) => storage.set_item(TOKEN_KEY, previous),
            None => storage.remove_item(TOKEN_KEY),
        };
        if let Err(restore_error) = restored {
            warn!("Could not roll back session token: {}", restore_error);
        }
        return Err(e);
    }
    Ok(())
}

/// Removes both keys. Attempts the second removal even if the first fails.
pub fn clear_session(storage: &dyn SessionStorage) -> Result<(), StorageError> {
    let token_result = storage.remove_item(TOKEN_KEY);
    let user_result = storage.remove_item(USER_KEY);
    token_result.and(user_result)
}

/// Whether a manually issued token is currently persisted.
pub fn has_token(storage: &dyn SessionStorage) -> Result<bool, StorageError> {
    Ok(storage
        .get_item(TOKEN_KEY)?
        .is_some_and(|token| !token.is_empty()))
}
