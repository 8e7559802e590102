use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::state::{SessionSource, SessionState};
use crate::api::{ApiError, AuthBackend, UnauthorizedHandler};
use crate::identity::{AuthStateEvent, AuthStateReceiver, IdentityError, IdentityProvider};
use crate::models::{AppUser, ExchangeResponse, FederatedUser, SessionUser};
use crate::storage::{
    clear_session, has_token, load_cached_session, persist_session, SessionStorage, StorageError,
};

#[derive(Debug, Error)]
enum ExchangeError {
    #[error("could not obtain identity token: {0}")]
    Identity(#[from] IdentityError),
    #[error("backend exchange failed: {0}")]
    Backend(#[from] ApiError),
}

/// The provider subscription belonging to one mount.
struct Listener {
    mount_id: Uuid,
    alive: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Listener {
    fn shutdown(self) {
        self.alive.store(false, Ordering::SeqCst);
        self.task.abort();
        debug!(mount_id = %self.mount_id, "auth-state listener torn down");
    }
}

/// Reconciles the persisted session, the backend and the federated identity
/// provider into one observable `SessionState`.
///
/// Every consumer reads the same state through [`SessionBridge::subscribe`];
/// there is no second copy to keep in sync.
pub struct SessionBridge {
    storage: Arc<dyn SessionStorage>,
    identity: Arc<dyn IdentityProvider>,
    backend: Arc<dyn AuthBackend>,
    state: watch::Sender<SessionState>,
    /// Held while storage and state are updated together.
    transition: Mutex<()>,
    /// Bumped by every logout; exchanges started before it are discarded.
    epoch: AtomicU64,
    listener: Mutex<Option<Listener>>,
}

impl SessionBridge {
    pub fn new(
        storage: Arc<dyn SessionStorage>,
        identity: Arc<dyn IdentityProvider>,
        backend: Arc<dyn AuthBackend>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::default());
        Arc::new(SessionBridge {
            storage,
            identity,
            backend,
            state,
            transition: Mutex::new(()),
            epoch: AtomicU64::new(0),
            listener: Mutex::new(None),
        })
    }

    fn lock_transition(&self) -> MutexGuard<'_, ()> {
        self.transition.lock().expect("session transition mutex poisoned")
    }

    fn lock_listener(&self) -> MutexGuard<'_, Option<Listener>> {
        self.listener.lock().expect("session listener mutex poisoned")
    }

    /// Resolves the session from storage if possible, then subscribes to the
    /// identity provider. A previous mount is torn down first, so at most one
    /// provider listener exists per bridge.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn mount(self: &Arc<Self>) {
        let mut listener = self.lock_listener();
        if let Some(previous) = listener.take() {
            self.retire(previous);
        }

        let mount_id = Uuid::new_v4();
        self.resolve_from_cache(mount_id);

        let alive = Arc::new(AtomicBool::new(true));
        let events = self.identity.on_auth_state_changed();
        let task = tokio::spawn(listen(
            Arc::downgrade(self),
            events,
            alive.clone(),
            mount_id,
        ));
        info!(
            mount_id = %mount_id,
            provider_name = self.identity.get_name(),
            "session bridge mounted"
        );
        *listener = Some(Listener {
            mount_id,
            alive,
            task,
        });
    }

    /// Stops listening to the identity provider. In-flight work from the
    /// current mount will not write to storage or state afterwards.
    pub fn unmount(&self) {
        if let Some(listener) = self.lock_listener().take() {
            self.retire(listener);
        }
    }

    /// Writers check liveness under the transition lock, so no write from
    /// the retired mount can land after this returns.
    fn retire(&self, listener: Listener) {
        let _guard = self.lock_transition();
        listener.shutdown();
    }

    pub fn is_mounted(&self) -> bool {
        self.lock_listener().is_some()
    }

    fn resolve_from_cache(&self, mount_id: Uuid) {
        let _guard = self.lock_transition();
        let mut next = SessionState::default();
        match load_cached_session(&*self.storage) {
            Ok(Some(cached)) => {
                debug!(mount_id = %mount_id, "cached session found; resolving without waiting for provider");
                next.user = Some(cached.user);
                next.loading = false;
                next.source = Some(SessionSource::Cached);
            }
            Ok(None) => {
                debug!(mount_id = %mount_id, "no cached session; waiting for provider");
            }
            Err(e) => {
                error!(mount_id = %mount_id, "Failed to parse stored user: {}", e);
            }
        }
        self.state.send_replace(next);
    }

    /// Records a session established by email/password login or registration.
    /// Storage and state change together; on a storage failure neither changes.
    pub fn manual_login(&self, user: AppUser, token: &str) -> Result<(), StorageError> {
        let user: SessionUser = user.into();
        let _guard = self.lock_transition();
        persist_session(&*self.storage, token, &user)?;
        info!(
            event_name = "session.manual_login",
            event_domain = "session",
            user = user.display_name().unwrap_or_default(),
            "manual session established"
        );
        self.set_user(Some(user), Some(SessionSource::Manual));
        Ok(())
    }

    /// Signs out everywhere: the federated provider (without waiting for it),
    /// storage and state. Safe to call repeatedly.
    pub fn logout(&self) {
        self.sign_out_federated();
        let _guard = self.lock_transition();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = clear_session(&*self.storage) {
            error!("Failed to clear stored session: {}", e);
        }
        if self.set_user(None, None) {
            info!(
                event_name = "session.logout",
                event_domain = "session",
                "session cleared"
            );
        }
    }

    fn sign_out_federated(&self) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let identity = self.identity.clone();
                handle.spawn(async move {
                    if let Err(e) = identity.sign_out().await {
                        warn!(
                            provider_name = identity.get_name(),
                            "Federated sign-out failed: {}", e
                        );
                    }
                });
            }
            Err(_) => warn!("No async runtime available; skipping federated sign-out"),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<SessionUser> {
        self.state.borrow().user.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Waits until the session has been resolved by the cache or the provider.
    pub async fn wait_until_resolved(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        let resolved = rx.wait_for(|s| !s.loading).await.map(|s| s.clone());
        resolved.unwrap_or_else(|_| self.snapshot())
    }

    /// Returns whether anything changed.
    fn set_user(&self, user: Option<SessionUser>, source: Option<SessionSource>) -> bool {
        self.state.send_if_modified(|state| {
            if state.user == user && state.source == source {
                return false;
            }
            state.user = user;
            state.source = source;
            true
        })
    }

    fn finish_loading(&self) {
        let flipped = self.state.send_if_modified(|state| {
            if !state.loading {
                return false;
            }
            state.loading = false;
            true
        });
        if flipped {
            debug!("session resolved by identity provider");
        }
    }

    async fn handle_auth_state(&self, event: AuthStateEvent, alive: &AtomicBool) {
        match event {
            AuthStateEvent::SignedIn(user) => self.sync_federated_user(user, alive).await,
            AuthStateEvent::SignedOut => self.handle_signed_out(alive),
        }
        let _guard = self.lock_transition();
        if alive.load(Ordering::SeqCst) {
            self.finish_loading();
        }
    }

    async fn exchange(&self, user: &FederatedUser) -> Result<ExchangeResponse, ExchangeError> {
        let id_token = self.identity.get_id_token(user).await?;
        Ok(self.backend.exchange_id_token(&id_token).await?)
    }

    async fn sync_federated_user(&self, user: FederatedUser, alive: &AtomicBool) {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let exchanged = self.exchange(&user).await;

        let _guard = self.lock_transition();
        if !alive.load(Ordering::SeqCst) {
            debug!(uid = user.uid.as_str(), "bridge unmounted during exchange; result dropped");
            return;
        }
        if self.epoch.load(Ordering::SeqCst) != epoch {
            info!(uid = user.uid.as_str(), "signed out during exchange; result dropped");
            return;
        }
        match exchanged {
            Ok(response) => {
                let (session_user, source): (SessionUser, _) = match response.user {
                    Some(app_user) => (app_user.into(), SessionSource::Exchanged),
                    None => (user.into(), SessionSource::FederatedFallback),
                };
                match response.token.filter(|t| !t.is_empty()) {
                    Some(token) => {
                        if let Err(e) = persist_session(&*self.storage, &token, &session_user) {
                            error!("Failed to persist exchanged session: {}", e);
                        }
                    }
                    None => warn!("Backend exchange returned no token; session not persisted"),
                }
                info!(
                    event_name = "session.federated_sync",
                    event_domain = "session",
                    user = session_user.display_name().unwrap_or_default(),
                    "federated session synced with backend"
                );
                self.set_user(Some(session_user), Some(source));
            }
            Err(e) => {
                warn!(
                    event_name = "session.federated_sync.failed",
                    event_domain = "session",
                    uid = user.uid.as_str(),
                    "Backend sync failed, falling back to federated user: {}",
                    e
                );
                self.set_user(Some(user.into()), Some(SessionSource::FederatedFallback));
            }
        }
    }

    fn handle_signed_out(&self, alive: &AtomicBool) {
        let _guard = self.lock_transition();
        if !alive.load(Ordering::SeqCst) {
            return;
        }
        match has_token(&*self.storage) {
            Ok(true) => debug!("no federated session, keeping manually issued session"),
            Ok(false) => {
                self.set_user(None, None);
            }
            Err(e) => {
                warn!("Could not read stored token, treating as signed out: {}", e);
                self.set_user(None, None);
            }
        }
    }
}

impl UnauthorizedHandler for SessionBridge {
    fn handle_unauthorized(&self) {
        info!("Backend returned 401; signing out");
        self.logout();
    }
}

impl Drop for SessionBridge {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Processes provider events for one mount, in order, until torn down.
async fn listen(
    bridge: Weak<SessionBridge>,
    mut events: AuthStateReceiver,
    alive: Arc<AtomicBool>,
    mount_id: Uuid,
) {
    while let Some(event) = events.recv().await {
        if !alive.load(Ordering::SeqCst) {
            break;
        }
        let Some(bridge) = bridge.upgrade() else {
            break;
        };
        debug!(mount_id = %mount_id, ?event, "auth-state event");
        bridge.handle_auth_state(event, &alive).await;
    }
    debug!(mount_id = %mount_id, "auth-state listener stopped");
}
