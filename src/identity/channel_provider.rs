use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::debug;

use super::{AuthStateEvent, AuthStateReceiver, IdentityError, IdentityProvider};
use crate::models::FederatedUser;

#[derive(Clone)]
struct SignedInUser {
    user: FederatedUser,
    id_token: String,
}

#[derive(Default)]
struct ProviderState {
    /// `None` until the host reports the restored session.
    current: Option<Option<SignedInUser>>,
    subscribers: Vec<UnboundedSender<AuthStateEvent>>,
}

impl ProviderState {
    fn current_event(&self) -> Option<AuthStateEvent> {
        self.current.as_ref().map(|current| match current {
            Some(signed_in) => AuthStateEvent::SignedIn(signed_in.user.clone()),
            None => AuthStateEvent::SignedOut,
        })
    }

    fn broadcast(&mut self, event: AuthStateEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// An identity provider whose state is pushed in by the host's federated SDK
/// integration (popup sign-in, session restoration, token refresh).
///
/// It fans auth-state events out to every live subscriber and replays the
/// current state to late subscribers once the session has been restored.
pub struct ChannelIdentityProvider {
    name: String,
    state: Mutex<ProviderState>,
    sign_out_calls: AtomicUsize,
}

impl ChannelIdentityProvider {
    pub fn new(name: impl Into<String>) -> Self {
        ChannelIdentityProvider {
            name: name.into(),
            state: Mutex::new(ProviderState::default()),
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProviderState> {
        self.state.lock().expect("identity provider mutex poisoned")
    }

    /// The SDK signed a user in (or restored a persisted federated session).
    pub fn sign_in(&self, user: FederatedUser, id_token: impl Into<String>) {
        debug!(provider_name = self.name.as_str(), uid = user.uid.as_str(), "federated sign-in");
        let mut state = self.lock();
        state.current = Some(Some(SignedInUser {
            user: user.clone(),
            id_token: id_token.into(),
        }));
        state.broadcast(AuthStateEvent::SignedIn(user));
    }

    /// The SDK finished restoring and found no federated session.
    pub fn restore_signed_out(&self) {
        let mut state = self.lock();
        state.current = Some(None);
        state.broadcast(AuthStateEvent::SignedOut);
    }

    /// Replaces the identity token without notifying listeners, as a token
    /// refresh does not change who is signed in.
    pub fn refresh_id_token(&self, id_token: impl Into<String>) {
        let mut state = self.lock();
        if let Some(Some(signed_in)) = state.current.as_mut() {
            signed_in.id_token = id_token.into();
        }
    }

    /// Number of listeners still subscribed.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    /// Number of times `sign_out` has been invoked through the trait.
    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for ChannelIdentityProvider {
    fn get_name(&self) -> &str {
        &self.name
    }

    fn on_auth_state_changed(&self) -> AuthStateReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        if let Some(event) = state.current_event() {
            let _ = tx.send(event);
        }
        state.subscribers.push(tx);
        rx
    }

    async fn get_id_token(&self, user: &FederatedUser) -> Result<String, IdentityError> {
        let state = self.lock();
        match state.current.as_ref() {
            Some(Some(signed_in)) if signed_in.user.uid == user.uid => {
                Ok(signed_in.id_token.clone())
            }
            Some(Some(_)) => Err(IdentityError::TokenUnavailable(user.uid.clone())),
            _ => Err(IdentityError::NotSignedIn),
        }
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        let was_signed_in = matches!(state.current, Some(Some(_)));
        state.current = Some(None);
        if was_signed_in {
            state.broadcast(AuthStateEvent::SignedOut);
        }
        Ok(())
    }
}
