use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{channel_provider::ChannelIdentityProvider, no_provider::NoIdentityProvider};
use crate::config::IdentityConfig;
use crate::models::FederatedUser;

/// A change in the federated provider's session.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthStateEvent {
    SignedIn(FederatedUser),
    SignedOut,
}

/// Receiving end of an auth-state subscription. Dropping it unsubscribes.
pub type AuthStateReceiver = mpsc::UnboundedReceiver<AuthStateEvent>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IdentityError {
    #[error("identity provider is not configured")]
    NotConfigured,
    #[error("no signed-in federated user")]
    NotSignedIn,
    #[error("identity token unavailable for user {0}")]
    TokenUnavailable(String),
    #[error("identity provider error: {0}")]
    Provider(String),
}

/// A federated identity provider must report session changes, mint identity
/// tokens for its signed-in user, and sign out.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// A descriptive name for the provider (for logs/debug).
    fn get_name(&self) -> &str;

    /// Registers a listener. Once the provider has restored its own session,
    /// a new subscriber immediately receives the current state.
    fn on_auth_state_changed(&self) -> AuthStateReceiver;

    /// A fresh identity token for `user`, suitable for the backend exchange.
    async fn get_id_token(&self, user: &FederatedUser) -> Result<String, IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;
}

/// Picks the provider for the given config: a host-driven provider when the
/// federated keys are present, otherwise a provider that is permanently signed out.
pub fn create_identity_provider(config: &IdentityConfig) -> Arc<dyn IdentityProvider> {
    if config.is_complete() {
        info!(
            "Federated identity configured for project '{}'",
            config.project_id.as_deref().unwrap_or_default()
        );
        Arc::new(ChannelIdentityProvider::new("federated"))
    } else {
        warn!("Federated identity config missing. Federated sign-in will not work.");
        Arc::new(NoIdentityProvider::new())
    }
}
