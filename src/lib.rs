//! OAuth token service — library crate.
//!
//! Re-exports the modules `tests/` and `src/main.rs` both depend on: the
//! RBAC authorization engine, the KMS-backed signing pipeline, the token
//! endpoint orchestration, the transport-independent error taxonomy, and
//! ambient configuration.

pub mod api;
pub mod config;
pub mod errors;
pub mod rbac;
pub mod signing;
pub mod token_endpoint;

use std::sync::Arc;

/// Shared application state passed to every handler.
pub struct AppState {
    pub repository: Arc<rbac::repository::Repository>,
    pub token_endpoint: Arc<token_endpoint::TokenEndpoint>,
    pub jwks: Arc<signing::jwks::JwksPublisher>,
    pub discovery: Arc<signing::jwks::OidcDiscovery>,
    pub config: Arc<config::Config>,
}
