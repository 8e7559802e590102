use crate::models::SessionUser;

/// How the current user was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    /// Read back from storage at mount; not yet confirmed by any provider event.
    Cached,
    /// Email/password login or registration.
    Manual,
    /// Federated sign-in confirmed by the backend exchange.
    Exchanged,
    /// Federated sign-in whose backend exchange failed or returned no profile.
    FederatedFallback,
}

/// The observable session: who is signed in and whether that is known yet.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub user: Option<SessionUser>,
    /// True until the cache or the first provider event has settled the session.
    pub loading: bool,
    pub source: Option<SessionSource>,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState {
            user: None,
            loading: true,
            source: None,
        }
    }
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// False only while the user comes from the optimistic cache read.
    pub fn is_confirmed(&self) -> bool {
        self.source != Some(SessionSource::Cached)
    }
}
