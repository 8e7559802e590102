//! Session wiring.
//!
//! Builds storage, the API client, the identity provider and the bridge from
//! configuration, connects the 401 handler and mounts the bridge.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};
use crate::config::ConfigV1;
use crate::identity::{create_identity_provider, IdentityProvider};
use crate::session::{SessionBridge, SessionState};
use crate::storage::{create_storage, SessionStorage, StorageError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("could not open session storage: {0}")]
    Storage(#[from] StorageError),
    #[error("could not build API client: {0}")]
    Api(#[from] ApiError),
}

/// Everything a host needs to drive the session.
pub struct Session {
    pub storage: Arc<dyn SessionStorage>,
    pub api: Arc<ApiClient>,
    pub identity: Arc<dyn IdentityProvider>,
    pub bridge: Arc<SessionBridge>,
    resolve_timeout: Duration,
}

impl Session {
    /// Waits for the session to resolve, up to `session.resolve_timeout_in_ms`.
    /// On timeout the current (still loading) state is returned.
    pub async fn resolved(&self) -> SessionState {
        match tokio::time::timeout(self.resolve_timeout, self.bridge.wait_until_resolved()).await {
            Ok(state) => state,
            Err(_) => {
                warn!(
                    provider_name = self.identity.get_name(),
                    "Identity provider did not report within {:?}",
                    self.resolve_timeout
                );
                self.bridge.snapshot()
            }
        }
    }
}

/// Builds and mounts a session from configuration. Must run inside a Tokio runtime.
pub fn start(config: &ConfigV1) -> Result<Session, StartupError> {
    let storage = create_storage(&config.storage)?;
    let api = Arc::new(ApiClient::new(&config.api, storage.clone())?);
    let identity = create_identity_provider(&config.identity);
    let bridge = SessionBridge::new(storage.clone(), identity.clone(), api.clone());
    api.set_unauthorized_handler(&bridge);
    bridge.mount();

    info!(
        api_base_url = api.base_url(),
        provider_name = identity.get_name(),
        "session started"
    );
    Ok(Session {
        storage,
        api,
        identity,
        bridge,
        resolve_timeout: Duration::from_millis(config.session.resolve_timeout_in_ms),
    })
}
