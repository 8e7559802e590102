//! Library exports for coteacher-session, shared between the binary and tests.

pub mod api;
pub mod config;
pub mod guard;
pub mod identity;
pub mod models;
pub mod session;
pub mod startup;
pub mod storage;
pub mod utils;
