pub mod base;
pub mod channel_provider;
pub mod no_provider;

// Re-export from base.rs so we can do "use crate::identity::*;"
pub use base::*;
pub use channel_provider::ChannelIdentityProvider;
pub use no_provider::NoIdentityProvider;
