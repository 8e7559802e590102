//! The session bridge and the flows that feed it.
//!
//! `SessionBridge` is the single source of truth for who is signed in. It
//! reconciles the persisted session, the backend and the federated identity
//! provider, and publishes the result as an observable `SessionState`.

pub mod bridge;
pub mod flows;
pub mod state;

#[cfg(test)]
mod test_support;

pub use bridge::SessionBridge;
pub use flows::{register, sign_in_with_password, FlowError};
pub use state::{SessionSource, SessionState};
