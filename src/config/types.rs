use std::path::Path;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::identity::IdentityConfig;
use super::logging::LoggingConfig;
use super::storage::StorageConfig;

/// Environment variables with this prefix override file values,
/// e.g. `COTEACHER_API__BASE_URL`.
pub const ENV_PREFIX: &str = "COTEACHER_";

pub const DEFAULT_CONFIG_PATH: &str = "./config.yaml";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
pub struct ConfigV1 {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// REST backend settings.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ApiConfig {
    /// Normalized to end in `/api` when the client is built.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_in_ms")]
    pub timeout_in_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_in_ms: default_timeout_in_ms(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_timeout_in_ms() -> u64 {
    10_000
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct SessionConfig {
    /// How long a caller waits for the first identity provider event before
    /// giving up on session resolution.
    #[serde(default = "default_resolve_timeout_in_ms")]
    pub resolve_timeout_in_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            resolve_timeout_in_ms: default_resolve_timeout_in_ms(),
        }
    }
}

fn default_resolve_timeout_in_ms() -> u64 {
    3_000
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error loading configuration: {0}")]
    Figment(#[from] Box<figment::Error>),
}

/// Builds the layered configuration: the current version tag, then the YAML file
/// (if it exists), then `COTEACHER_*` environment variables.
pub fn figment(path: impl AsRef<Path>) -> Figment {
    Figment::from(Serialized::default("version", "1.0.0"))
        .merge(Yaml::file(path.as_ref()))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load config from the given YAML file, falling back to defaults for anything unset.
pub fn load_config(path: impl AsRef<Path>) -> Result<ConfigV1, ConfigError> {
    extract(figment(path))
}

pub fn extract(figment: Figment) -> Result<ConfigV1, ConfigError> {
    match figment.extract::<Config>().map_err(Box::new)? {
        Config::ConfigV1(c) => Ok(c),
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), serde_json::Error> {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
