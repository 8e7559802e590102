use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::ApiError;
use crate::config::ApiConfig;
use crate::models::ErrorBody;
use crate::storage::{SessionStorage, TOKEN_KEY};

/// Called whenever the backend answers 401, so the session can be torn down.
pub trait UnauthorizedHandler: Send + Sync {
    fn handle_unauthorized(&self);
}

/// Ensures the base URL ends with `/api` (a trailing slash is tolerated).
pub fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim();
    if trimmed.ends_with("/api") || trimmed.ends_with("/api/") {
        trimmed.to_string()
    } else if trimmed.ends_with('/') {
        format!("{}api", trimmed)
    } else {
        format!("{}/api", trimmed)
    }
}

/// HTTP client for the Co-Teacher REST backend.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    storage: Arc<dyn SessionStorage>,
    unauthorized: RwLock<Option<Weak<dyn UnauthorizedHandler>>>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, storage: Arc<dyn SessionStorage>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_in_ms))
            .build()
            .map_err(ApiError::Client)?;
        let base_url = normalize_base_url(&config.base_url);
        info!("API client initializing with base URL: {}", base_url);
        Ok(ApiClient {
            client,
            base_url,
            storage,
            unauthorized: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Registers the handler notified on 401 responses. Held weakly, so the
    /// handler may itself own this client.
    pub fn set_unauthorized_handler<H: UnauthorizedHandler + 'static>(&self, handler: &Arc<H>) {
        let weak = Arc::downgrade(handler);
        let weak: Weak<dyn UnauthorizedHandler> = weak;
        *self
            .unauthorized
            .write()
            .expect("unauthorized handler lock poisoned") = Some(weak);
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let request = self.client.get(self.url(path)).query(query);
        self.execute(path, request).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let request = self.client.post(self.url(path)).json(body);
        self.execute(path, request).await
    }

    fn bearer_token(&self) -> Option<String> {
        match self.storage.get_item(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!("Could not read session token from storage: {}", e);
                None
            }
        }
    }

    fn notify_unauthorized(&self) {
        let handler = self
            .unauthorized
            .read()
            .expect("unauthorized handler lock poisoned")
            .as_ref()
            .and_then(Weak::upgrade);
        match handler {
            Some(handler) => handler.handle_unauthorized(),
            None => debug!("401 received but no unauthorized handler is registered"),
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        path: &str,
        mut request: RequestBuilder,
    ) -> Result<T, ApiError> {
        if let Some(token) = self.bearer_token() {
            request = request.bearer_auth(token);
        }

        debug!("Sending API request to {}", path);
        let response = request.send().await.map_err(|source| ApiError::Transport {
            path: path.to_string(),
            source,
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|source| ApiError::Transport {
            path: path.to_string(),
            source,
        })?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|source| ApiError::Decode {
                path: path.to_string(),
                source,
            });
        }

        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error);
        if status == StatusCode::UNAUTHORIZED {
            warn!(
                event_name = "api.unauthorized",
                event_domain = "api",
                path,
                "backend rejected credentials; signing out"
            );
            self.notify_unauthorized();
            return Err(ApiError::Unauthorized {
                path: path.to_string(),
                message,
            });
        }

        debug!("API request to {} failed with status {}", path, status);
        Err(ApiError::Status {
            path: path.to_string(),
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use mockito::{Matcher, Server};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHandler {
        calls: AtomicUsize,
    }

    impl UnauthorizedHandler for CountingHandler {
        fn handle_unauthorized(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn client_for(url: String, storage: Arc<MemoryStorage>) -> ApiClient {
        let config = ApiConfig {
            base_url: url,
            timeout_in_ms: 2_000,
        };
        ApiClient::new(&config, storage).expect("client should build")
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("http://localhost:5000"),
            "http://localhost:5000/api"
        );
        assert_eq!(
            normalize_base_url("http://localhost:5000/"),
            "http://localhost:5000/api"
        );
        assert_eq!(
            normalize_base_url("https://x.example.com/api"),
            "https://x.example.com/api"
        );
        assert_eq!(
            normalize_base_url("https://x.example.com/api/"),
            "https://x.example.com/api/"
        );
    }

    #[test]
    fn test_url_joins_without_double_slashes() {
        let client = client_for(
            "https://x.example.com/api/".to_string(),
            Arc::new(MemoryStorage::new()),
        );
        assert_eq!(
            client.url("/auth/login"),
            "https://x.example.com/api/auth/login"
        );
    }

    /// Test that the persisted token is sent as a bearer credential.
    #[tokio::test]
    async fn test_bearer_token_attached() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/api/curriculum/metadata")
            .match_header("authorization", "Bearer abc")
            .match_query(Matcher::UrlEncoded("curriculum".into(), "CBSE".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"subjects": ["Maths"]}"#)
            .create_async()
            .await;

        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(TOKEN_KEY, "abc").unwrap();
        let client = client_for(server.url(), storage);

        let body: Value = client
            .get_json("/curriculum/metadata", &[("curriculum", "CBSE")])
            .await
            .unwrap();
        m.assert_async().await;
        assert_eq!(body, json!({"subjects": ["Maths"]}));
    }

    /// Test that no authorization header is sent without a token.
    #[tokio::test]
    async fn test_no_token_no_header() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/api/auth/login")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"ok": true}"#)
            .create_async()
            .await;

        let client = client_for(server.url(), Arc::new(MemoryStorage::new()));
        let body: Value = client
            .post_json("/auth/login", &json!({"email": "a@b.c", "password": "pw"}))
            .await
            .unwrap();
        m.assert_async().await;
        assert_eq!(body["ok"], true);
    }

    /// Test that a backend error payload becomes the user-facing message.
    #[tokio::test]
    async fn test_error_payload_is_surfaced() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/api/auth/register")
            .with_status(409)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "Email already registered"}"#)
            .create_async()
            .await;

        let client = client_for(server.url(), Arc::new(MemoryStorage::new()));
        let err = client
            .post_json::<_, Value>("/auth/register", &json!({}))
            .await
            .unwrap_err();
        m.assert_async().await;
        assert_eq!(err.status(), Some(409));
        assert_eq!(err.user_message("fallback"), "Email already registered");
    }

    /// Test that a 401 notifies the registered handler exactly once.
    #[tokio::test]
    async fn test_unauthorized_notifies_handler() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/api/lessons")
            .with_status(401)
            .with_body("Unauthorized")
            .create_async()
            .await;

        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(TOKEN_KEY, "expired").unwrap();
        let client = client_for(server.url(), storage);
        let handler = Arc::new(CountingHandler::default());
        client.set_unauthorized_handler(&handler);

        let err = client.get_json::<Value>("/lessons", &[]).await.unwrap_err();
        m.assert_async().await;
        assert!(matches!(err, ApiError::Unauthorized { .. }));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    /// Test that a dropped handler is simply skipped.
    #[tokio::test]
    async fn test_unauthorized_with_dropped_handler() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/api/lessons")
            .with_status(401)
            .create_async()
            .await;

        let client = client_for(server.url(), Arc::new(MemoryStorage::new()));
        let handler = Arc::new(CountingHandler::default());
        client.set_unauthorized_handler(&handler);
        drop(handler);

        let err = client.get_json::<Value>("/lessons", &[]).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
    }

    /// Test that a malformed success body is a decode error.
    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/api/students")
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let client = client_for(server.url(), Arc::new(MemoryStorage::new()));
        let err = client.get_json::<Value>("/students", &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }
}
