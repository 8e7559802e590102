use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the session token and cached user profile are persisted.
/// We differentiate the backends via a "type" tag in the YAML.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(tag = "type")]
pub enum StorageConfig {
    /// Process-local storage; nothing survives a restart.
    #[serde(rename = "memory")]
    Memory,
    /// A JSON object on disk, the closest analogue of browser local storage.
    #[serde(rename = "file")]
    File(FileStorageConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::File(FileStorageConfig::default())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct FileStorageConfig {
    pub path: PathBuf,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".coteacher/session.json"),
        }
    }
}
