use thiserror::Error;

/// Everything that can go wrong talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {path} was not authorized")]
    Unauthorized {
        path: String,
        message: Option<String>,
    },
    #[error("request to {path} returned HTTP {status}")]
    Status {
        path: String,
        status: u16,
        message: Option<String>,
    },
    #[error("could not decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// The human-readable `error` field the backend sent, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { message, .. } | ApiError::Status { message, .. } => {
                message.as_deref().filter(|m| !m.trim().is_empty())
            }
            _ => None,
        }
    }

    /// The backend's message, or `fallback` when it did not send one.
    pub fn user_message(&self, fallback: &str) -> String {
        self.server_message().unwrap_or(fallback).to_string()
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
