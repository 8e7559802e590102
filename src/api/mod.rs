//! REST backend access.
//!
//! `ApiClient` attaches the persisted bearer token to every request and turns
//! 401 responses into a sign-out through the registered `UnauthorizedHandler`.

pub mod backend;
pub mod client;
pub mod error;

pub use backend::AuthBackend;
pub use client::{normalize_base_url, ApiClient, UnauthorizedHandler};
pub use error::ApiError;
