use std::sync::Arc;
use std::time::Duration;

use coteacher_session::api::ApiClient;
use coteacher_session::config::ApiConfig;
use coteacher_session::identity::ChannelIdentityProvider;
use coteacher_session::session::{SessionBridge, SessionState};
use coteacher_session::storage::MemoryStorage;
use tokio::time::timeout;

pub const RESOLVE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct TestSession {
    pub storage: Arc<MemoryStorage>,
    pub provider: Arc<ChannelIdentityProvider>,
    pub api: Arc<ApiClient>,
    pub bridge: Arc<SessionBridge>,
}

/// Wires a mounted bridge against a mock backend, the way `startup::start` does,
/// but with a provider the test can drive.
pub fn build_session(server_url: &str) -> TestSession {
    let storage = Arc::new(MemoryStorage::new());
    let provider = Arc::new(ChannelIdentityProvider::new("test"));
    let config = ApiConfig {
        base_url: server_url.to_string(),
        timeout_in_ms: 2_000,
    };
    let api = Arc::new(ApiClient::new(&config, storage.clone()).expect("client should build"));
    let bridge = SessionBridge::new(storage.clone(), provider.clone(), api.clone());
    api.set_unauthorized_handler(&bridge);
    bridge.mount();

    TestSession {
        storage,
        provider,
        api,
        bridge,
    }
}

pub async fn wait_for_state<F>(bridge: &SessionBridge, predicate: F) -> SessionState
where
    F: FnMut(&SessionState) -> bool,
{
    let mut rx = bridge.subscribe();
    let state = timeout(RESOLVE_TIMEOUT, rx.wait_for(predicate))
        .await
        .expect("state should change in time")
        .expect("bridge dropped");
    state.clone()
}
