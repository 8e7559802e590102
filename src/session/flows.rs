//! Email/password login and registration, routed through the bridge.

use thiserror::Error;
use tracing::{debug, info, warn};

use super::bridge::SessionBridge;
use crate::api::{ApiError, AuthBackend};
use crate::models::{AuthResponse, LoginRequest, RegisterRequest, SessionUser};
use crate::storage::StorageError;

pub const LOGIN_FAILED: &str = "Login failed. Please check your credentials.";
pub const REGISTRATION_FAILED: &str = "Registration failed. Try a different email.";

/// A failed flow. `Display` is the message shown to the user.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{0}")]
    Invalid(String),
    #[error("{message}")]
    Rejected {
        message: String,
        #[source]
        source: ApiError,
    },
    #[error("Signed in, but the session could not be saved: {0}")]
    Storage(#[from] StorageError),
}

impl FlowError {
    fn rejected(source: ApiError, fallback: &str) -> Self {
        FlowError::Rejected {
            message: source.user_message(fallback),
            source,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

fn require(value: &str, field: &str) -> Result<(), FlowError> {
    if value.trim().is_empty() {
        return Err(FlowError::Invalid(format!("{} is required.", field)));
    }
    Ok(())
}

fn establish(bridge: &SessionBridge, response: AuthResponse) -> Result<SessionUser, FlowError> {
    let AuthResponse { token, user } = response;
    debug!(
        user_id = user.id().as_deref().unwrap_or_default(),
        "establishing backend session"
    );
    bridge.manual_login(user.clone(), &token)?;
    Ok(user.into())
}

/// Logs in with email and password. On success the session is persisted and
/// published before this returns.
pub async fn sign_in_with_password(
    bridge: &SessionBridge,
    backend: &dyn AuthBackend,
    email: &str,
    password: &str,
) -> Result<SessionUser, FlowError> {
    require(email, "Email")?;
    require(password, "Password")?;

    let request = LoginRequest {
        email: email.trim().to_string(),
        password: password.to_string(),
    };
    let response = backend.login(&request).await.map_err(|e| {
        warn!(
            event_name = "session.login.failed",
            event_domain = "session",
            "Login failed: {}",
            e
        );
        FlowError::rejected(e, LOGIN_FAILED)
    })?;
    info!(
        event_name = "session.login",
        event_domain = "session",
        "password login succeeded"
    );
    establish(bridge, response)
}

/// Creates an account and signs it in.
pub async fn register(
    bridge: &SessionBridge,
    backend: &dyn AuthBackend,
    request: RegisterRequest,
) -> Result<SessionUser, FlowError> {
    require(&request.name, "Name")?;
    require(&request.email, "Email")?;
    require(&request.password, "Password")?;

    let response = backend.register(&request).await.map_err(|e| {
        warn!(
            event_name = "session.register.failed",
            event_domain = "session",
            role = request.role.as_str(),
            "Registration failed: {}",
            e
        );
        FlowError::rejected(e, REGISTRATION_FAILED)
    })?;
    info!(
        event_name = "session.register",
        event_domain = "session",
        role = request.role.as_str(),
        "account registered"
    );
    establish(bridge, response)
}
