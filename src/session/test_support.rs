//! Doubles shared by the session tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::{sleep, timeout, Instant};

use crate::api::{ApiError, AuthBackend};
use crate::models::{AuthResponse, ExchangeResponse, LoginRequest, RegisterRequest};

pub const RESOLVE_TIMEOUT: Duration = Duration::from_secs(2);

/// Polls `condition` until it holds, failing the test after `RESOLVE_TIMEOUT`.
pub async fn eventually<F: FnMut() -> bool>(mut condition: F) {
    let deadline = Instant::now() + RESOLVE_TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        sleep(Duration::from_millis(5)).await;
    }
}

pub enum ExchangeBehavior {
    Respond(ExchangeResponse),
    Reject,
    /// Respond only after `FakeBackend::release` is called.
    Hold(ExchangeResponse),
}

/// What `login` / `register` answer with.
pub enum AuthBehavior {
    Respond(AuthResponse),
    Fail { status: u16, message: Option<String> },
}

pub struct FakeBackend {
    exchange: ExchangeBehavior,
    auth: Mutex<Option<AuthBehavior>>,
    exchanged: Mutex<Vec<String>>,
    called: Notify,
    released: Notify,
}

impl FakeBackend {
    pub fn new(exchange: ExchangeBehavior) -> Self {
        FakeBackend {
            exchange,
            auth: Mutex::new(None),
            exchanged: Mutex::new(Vec::new()),
            called: Notify::new(),
            released: Notify::new(),
        }
    }

    pub fn with_auth(self, auth: AuthBehavior) -> Self {
        *self.auth.lock().unwrap() = Some(auth);
        self
    }

    pub fn exchanged_tokens(&self) -> Vec<String> {
        self.exchanged.lock().unwrap().clone()
    }

    pub async fn wait_for_exchange(&self) {
        timeout(RESOLVE_TIMEOUT, self.called.notified())
            .await
            .expect("exchange was never called");
    }

    pub fn release(&self) {
        self.released.notify_one();
    }

    fn auth_result(&self, path: &str) -> Result<AuthResponse, ApiError> {
        match self.auth.lock().unwrap().as_ref() {
            Some(AuthBehavior::Respond(response)) => Ok(response.clone()),
            Some(AuthBehavior::Fail { status, message }) => Err(ApiError::Status {
                path: path.to_string(),
                status: *status,
                message: message.clone(),
            }),
            None => panic!("unexpected call to {}", path),
        }
    }
}

#[async_trait]
impl AuthBackend for FakeBackend {
    async fn exchange_id_token(&self, id_token: &str) -> Result<ExchangeResponse, ApiError> {
        self.exchanged.lock().unwrap().push(id_token.to_string());
        self.called.notify_one();
        match &self.exchange {
            ExchangeBehavior::Respond(response) => Ok(response.clone()),
            ExchangeBehavior::Reject => Err(ApiError::Status {
                path: "/auth/google".to_string(),
                status: 500,
                message: Some("exchange unavailable".to_string()),
            }),
            ExchangeBehavior::Hold(response) => {
                self.released.notified().await;
                Ok(response.clone())
            }
        }
    }

    async fn login(&self, _request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.auth_result("/auth/login")
    }

    async fn register(&self, _request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.auth_result("/auth/register")
    }
}
