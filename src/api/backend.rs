use async_trait::async_trait;
use tracing::debug;

use super::{client::ApiClient, error::ApiError};
use crate::models::{
    AuthResponse, ExchangeResponse, IdTokenExchangeRequest, LoginRequest, RegisterRequest,
};

/// The three backend calls that establish an application session.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// `POST /auth/google`: trade a federated identity token for an application session.
    async fn exchange_id_token(&self, id_token: &str) -> Result<ExchangeResponse, ApiError>;

    /// `POST /auth/login`.
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError>;

    /// `POST /auth/register`.
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError>;
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn exchange_id_token(&self, id_token: &str) -> Result<ExchangeResponse, ApiError> {
        debug!("Exchanging federated identity token with backend");
        let body = IdTokenExchangeRequest {
            id_token: id_token.to_string(),
        };
        self.post_json("/auth/google", &body).await
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        debug!("Logging in '{}'", request.email);
        self.post_json("/auth/login", request).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        debug!("Registering '{}' as {}", request.email, request.role);
        self.post_json("/auth/register", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::models::Role;
    use crate::storage::MemoryStorage;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::sync::Arc;

    fn client_for(url: String) -> ApiClient {
        let config = ApiConfig {
            base_url: url,
            timeout_in_ms: 2_000,
        };
        ApiClient::new(&config, Arc::new(MemoryStorage::new())).unwrap()
    }

    /// Test that the exchange posts the id token under `idToken`.
    #[tokio::test]
    async fn test_exchange_id_token() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/api/auth/google")
            .match_body(Matcher::Json(json!({"idToken": "fed-token"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token": "xyz", "user": {"name": "Ana"}}"#)
            .create_async()
            .await;

        let res = client_for(server.url())
            .exchange_id_token("fed-token")
            .await
            .unwrap();
        m.assert_async().await;
        assert_eq!(res.token.as_deref(), Some("xyz"));
        assert_eq!(res.user.and_then(|u| u.name).as_deref(), Some("Ana"));
    }

    /// Test that a successful login returns token and user.
    #[tokio::test]
    async fn test_login_success() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/api/auth/login")
            .match_body(Matcher::Json(
                json!({"email": "lee@school.edu", "password": "pw"}),
            ))
            .with_status(200)
            .with_body(r#"{"token": "t1", "user": {"name": "Lee", "role": "TEACHER"}}"#)
            .create_async()
            .await;

        let res = client_for(server.url())
            .login(&LoginRequest {
                email: "lee@school.edu".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();
        m.assert_async().await;
        assert_eq!(res.token, "t1");
        assert_eq!(res.user.role, Some(Role::Teacher));
    }

    /// Test that register sends the role and surfaces backend errors.
    #[tokio::test]
    async fn test_register_conflict() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/api/auth/register")
            .match_body(Matcher::PartialJson(json!({"role": "TEACHER"})))
            .with_status(400)
            .with_body(r#"{"error": "User already exists"}"#)
            .create_async()
            .await;

        let err = client_for(server.url())
            .register(&RegisterRequest::teacher(
                "Lee".to_string(),
                "lee@school.edu".to_string(),
                "pw".to_string(),
            ))
            .await
            .unwrap_err();
        m.assert_async().await;
        assert_eq!(err.server_message(), Some("User already exists"));
    }
}
