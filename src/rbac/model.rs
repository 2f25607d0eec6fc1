//! Entity types for the RBAC authorization engine (spec.md §3).

use serde::{Deserialize, Serialize};

/// The literal scope name reserved to mean "every scope the principal holds".
pub const DEFAULT_SCOPE: &str = ".default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub resource_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub resource_name: String,
    pub scope_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub resource_name: String,
    pub role_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeAssignment {
    pub principal_id: String,
    pub resource_name: String,
    pub scope_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub principal_id: String,
    pub resource_name: String,
    pub role_name: String,
}

/// Result of the principal-access query (spec.md §4.4). `scopes` and `roles`
/// are always sorted ascending by name — rule 7.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalAccess {
    pub resource_name: String,
    pub scopes: Vec<String>,
    pub roles: Vec<String>,
}
