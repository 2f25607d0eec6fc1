//! HTTP transport (spec.md §6) — route mapping and JSON binding are
//! explicitly out of scope per spec.md §1, but a runnable service needs
//! *some* concrete router; this is the minimal one that dispatches straight
//! into the RBAC repository and token endpoint, grounded on the teacher's
//! `api::mod`'s `Router::new().route(...)` composition style.

pub mod handlers;
pub mod token;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/token", post(token::issue_token))
        .route("/.well-known/openid-configuration", get(token::openid_configuration))
        .route("/.well-known/jwks.json", get(token::jwks))
        .route(
            "/resources",
            post(handlers::create_resource).get(handlers::get_resource).delete(handlers::delete_resource),
        )
        .route(
            "/scopes",
            post(handlers::create_scope).get(handlers::get_scope).delete(handlers::delete_scope),
        )
        .route(
            "/roles",
            post(handlers::create_role).get(handlers::get_role).delete(handlers::delete_role),
        )
        .route(
            "/assignments/scopes",
            post(handlers::create_scope_assignment)
                .get(handlers::get_scope_assignment)
                .delete(handlers::delete_scope_assignment),
        )
        .route(
            "/assignments/roles",
            post(handlers::create_role_assignment)
                .get(handlers::get_role_assignment)
                .delete(handlers::delete_role_assignment),
        )
        .route(
            "/assignments/principals",
            get(handlers::get_principal_access).delete(handlers::delete_principal),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
