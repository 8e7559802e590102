use tokio::sync::mpsc;

use super::{AuthStateEvent, AuthStateReceiver, IdentityError, IdentityProvider};
use crate::models::FederatedUser;

/// A provider with no federated backend behind it. Every subscriber is told
/// immediately that nobody is signed in, so session resolution never waits on it.
pub struct NoIdentityProvider;

impl NoIdentityProvider {
    pub fn new() -> Self {
        NoIdentityProvider
    }
}

impl Default for NoIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IdentityProvider for NoIdentityProvider {
    fn get_name(&self) -> &str {
        "none"
    }

    fn on_auth_state_changed(&self) -> AuthStateReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive here, so this cannot fail.
        let _ = tx.send(AuthStateEvent::SignedOut);
        rx
    }

    async fn get_id_token(&self, _user: &FederatedUser) -> Result<String, IdentityError> {
        Err(IdentityError::NotConfigured)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        Ok(())
    }
}
