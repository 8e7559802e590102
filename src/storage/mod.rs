pub mod base;
pub mod file_storage;
pub mod memory_storage;

// Re-export the primary storage items so code outside can do
// "use crate::storage::{SessionStorage, create_storage};"
pub use base::{
    clear_session, create_storage, has_token, load_cached_session, persist_session,
    CachedSession, SessionStorage, StorageError, TOKEN_KEY, USER_KEY,
};
pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;
