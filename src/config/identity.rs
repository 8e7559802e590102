use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Federated identity provider settings.
///
/// Only `api_key` and `project_id` are required for the provider to be
/// considered configured; the remaining keys are passed through to the host SDK.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
pub struct IdentityConfig {
    pub api_key: Option<String>,
    pub auth_domain: Option<String>,
    pub project_id: Option<String>,
    pub storage_bucket: Option<String>,
    pub messaging_sender_id: Option<String>,
    pub app_id: Option<String>,
}

impl IdentityConfig {
    pub fn is_complete(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.api_key) && present(&self.project_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_without_project_id() {
        let config = IdentityConfig {
            api_key: Some("key".to_string()),
            ..Default::default()
        };
        assert!(!config.is_complete());
    }

    #[test]
    fn blank_values_are_not_complete() {
        let config = IdentityConfig {
            api_key: Some("  ".to_string()),
            project_id: Some("coteacher".to_string()),
            ..Default::default()
        };
        assert!(!config.is_complete());
    }

    #[test]
    fn complete_with_api_key_and_project() {
        let config = IdentityConfig {
            api_key: Some("key".to_string()),
            project_id: Some("coteacher".to_string()),
            ..Default::default()
        };
        assert!(config.is_complete());
    }
}
