//! Thin HTTP handlers for the RBAC management and assignment surface
//! (spec.md §6) — delegate to `Repository`, map domain results straight to
//! JSON, and let [`AppError`]'s `IntoResponse` impl own every status code.
//! Mirrors the teacher's `api::handlers` discipline: a handler parses its
//! request, calls one state method, and returns.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::AppState;

fn ack() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

// ── Resources ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ResourceBody {
    pub resource_name: String,
}

#[derive(Debug, Serialize)]
pub struct ResourceView {
    pub resource_name: String,
}

pub async fn create_resource(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResourceBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.repository.create_resource(&body.resource_name).await?;
    Ok(ack())
}

pub async fn get_resource(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResourceBody>,
) -> Result<Json<ResourceView>, AppError> {
    let found = state.repository.get_resource(&body.resource_name).await?;
    match found {
        Some(resource_name) => Ok(Json(ResourceView { resource_name })),
        None => Err(AppError::not_found("resource", body.resource_name)),
    }
}

pub async fn delete_resource(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResourceBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.repository.delete_resource(&body.resource_name).await?;
    Ok(ack())
}

// ── Scopes ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ScopeBody {
    pub resource_name: String,
    pub scope_name: String,
}

pub async fn create_scope(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ScopeBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.repository.create_scope(&body.resource_name, &body.scope_name).await?;
    Ok(ack())
}

pub async fn get_scope(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ScopeBody>,
) -> Result<Json<crate::rbac::model::Scope>, AppError> {
    let found = state.repository.get_scope(&body.resource_name, &body.scope_name).await?;
    found.ok_or_else(|| AppError::not_found("scope", body.scope_name))
        .map(Json)
}

pub async fn delete_scope(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ScopeBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.repository.delete_scope(&body.resource_name, &body.scope_name).await?;
    Ok(ack())
}

// ── Roles ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RoleBody {
    pub resource_name: String,
    pub role_name: String,
}

pub async fn create_role(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RoleBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.repository.create_role(&body.resource_name, &body.role_name).await?;
    Ok(ack())
}

pub async fn get_role(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RoleBody>,
) -> Result<Json<crate::rbac::model::Role>, AppError> {
    let found = state.repository.get_role(&body.resource_name, &body.role_name).await?;
    found.ok_or_else(|| AppError::not_found("role", body.role_name)).map(Json)
}

pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RoleBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.repository.delete_role(&body.resource_name, &body.role_name).await?;
    Ok(ack())
}

// ── Scope assignments ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ScopeAssignmentBody {
    pub resource_name: String,
    pub scope_name: String,
    pub principal_id: String,
}

pub async fn create_scope_assignment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ScopeAssignmentBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .repository
        .create_scope_assignment(&body.principal_id, &body.resource_name, &body.scope_name)
        .await?;
    Ok(ack())
}

pub async fn get_scope_assignment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ScopeAssignmentBody>,
) -> Result<Json<crate::rbac::model::ScopeAssignment>, AppError> {
    let found = state
        .repository
        .get_scope_assignment(&body.principal_id, &body.resource_name, &body.scope_name)
        .await?;
    found.ok_or_else(|| AppError::not_found("scopeAssignment", body.principal_id)).map(Json)
}

pub async fn delete_scope_assignment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ScopeAssignmentBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .repository
        .delete_scope_assignment(&body.principal_id, &body.resource_name, &body.scope_name)
        .await?;
    Ok(ack())
}

// ── Role assignments ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RoleAssignmentBody {
    pub resource_name: String,
    pub role_name: String,
    pub principal_id: String,
}

pub async fn create_role_assignment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RoleAssignmentBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .repository
        .create_role_assignment(&body.principal_id, &body.resource_name, &body.role_name)
        .await?;
    Ok(ack())
}

pub async fn get_role_assignment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RoleAssignmentBody>,
) -> Result<Json<crate::rbac::model::RoleAssignment>, AppError> {
    let found = state
        .repository
        .get_role_assignment(&body.principal_id, &body.resource_name, &body.role_name)
        .await?;
    found.ok_or_else(|| AppError::not_found("roleAssignment", body.principal_id)).map(Json)
}

pub async fn delete_role_assignment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RoleAssignmentBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .repository
        .delete_role_assignment(&body.principal_id, &body.resource_name, &body.role_name)
        .await?;
    Ok(ack())
}

// ── Principals ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PrincipalAccessQuery {
    pub principal_id: String,
    pub resource_name: String,
    pub scope_name: Option<String>,
}

pub async fn get_principal_access(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PrincipalAccessQuery>,
) -> Result<Json<crate::rbac::model::PrincipalAccess>, AppError> {
    let access = state
        .repository
        .get_principal_access(&body.principal_id, &body.resource_name, body.scope_name.as_deref())
        .await?;
    Ok(Json(access))
}

#[derive(Debug, Deserialize)]
pub struct PrincipalBody {
    pub principal_id: String,
}

pub async fn delete_principal(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PrincipalBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.repository.delete_principal(&body.principal_id).await?;
    Ok(ack())
}
