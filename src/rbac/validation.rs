//! Name-format validators.
//!
//! spec.md §1 treats the real grammars as an external collaborator ("input-
//! format validators for names... out of scope"); what the repository needs
//! is the `Validate(name) -> (ok, normalized)` predicate shape it calls
//! before touching the store (§4.3). These are concrete but intentionally
//! narrow, grounded on the regex + `once_cell::Lazy` discipline
//! `middleware::sanitize` uses for its own pattern matching.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::encoding::is_valid_field;
use super::model::DEFAULT_SCOPE;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

fn err(field: &'static str, reason: impl Into<String>) -> ValidationError {
    ValidationError { field, reason: reason.into() }
}

static RESOURCE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://[^\s#]+$").unwrap());

static SHORT_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_.-]{0,127}$").unwrap());

/// Validates a resource name (audience-URI form, e.g. `api://orders`).
pub fn validate_resource_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if !is_valid_field(name) {
        return Err(err("resourceName", "must be non-empty and not contain '##'"));
    }
    if !RESOURCE_NAME_RE.is_match(name) {
        return Err(err(
            "resourceName",
            "must be an audience-URI of the form 'scheme://rest' (e.g. 'api://orders')",
        ));
    }
    Ok(name.to_string())
}

/// Validates a scope name for *creation* — the reserved `.default` literal
/// is rejected here (spec.md I5); callers that accept a query-time scope
/// argument use [`validate_scope_query`] instead.
pub fn validate_scope_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name == DEFAULT_SCOPE {
        return Err(err("scopeName", "'.default' is reserved and cannot be created"));
    }
    validate_short_token("scopeName", name)
}

/// Validates a scope name supplied as a query parameter (§4.3) — `.default`
/// is accepted here, everything else goes through the same grammar as
/// creation.
pub fn validate_scope_query(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name == DEFAULT_SCOPE {
        return Ok(name.to_string());
    }
    validate_short_token("scopeName", name)
}

pub fn validate_role_name(name: &str) -> Result<String, ValidationError> {
    validate_short_token("roleName", name.trim())
}

fn validate_short_token(field: &'static str, name: &str) -> Result<String, ValidationError> {
    if !is_valid_field(name) {
        return Err(err(field, "must be non-empty and not contain '##'"));
    }
    if !SHORT_TOKEN_RE.is_match(name) {
        return Err(err(
            field,
            "must start with a letter and contain only letters, digits, '.', '_' or '-'",
        ));
    }
    Ok(name.to_string())
}

/// Validates a principal identifier (an AWS ARN). Loose on purpose — full
/// ARN grammar validation belongs to the AWS SDK/IAM layer, not this crate;
/// this only guards the invariants the encoder depends on (I6, and no
/// double-separator collision with the SK scheme).
pub fn validate_principal_id(principal_id: &str) -> Result<String, ValidationError> {
    let principal_id = principal_id.trim();
    if !is_valid_field(principal_id) {
        return Err(err("principalId", "must be non-empty and not contain '##'"));
    }
    if !principal_id.starts_with("arn:") {
        return Err(err("principalId", "must be an AWS ARN (expected 'arn:...')"));
    }
    Ok(principal_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_resource_name() {
        assert_eq!(validate_resource_name("api://orders").unwrap(), "api://orders");
    }

    #[test]
    fn rejects_resource_name_without_scheme() {
        assert!(validate_resource_name("orders").is_err());
    }

    #[test]
    fn rejects_reserved_default_scope_on_create() {
        let e = validate_scope_name(".default").unwrap_err();
        assert_eq!(e.field, "scopeName");
    }

    #[test]
    fn accepts_default_scope_on_query() {
        assert_eq!(validate_scope_query(".default").unwrap(), ".default");
    }

    #[test]
    fn accepts_dotted_role_name() {
        assert_eq!(validate_role_name("rbac.read").unwrap(), "rbac.read");
    }

    #[test]
    fn rejects_name_with_double_separator() {
        assert!(validate_scope_name("weird##name").is_err());
    }

    #[test]
    fn validates_principal_arn_shape() {
        assert!(validate_principal_id("arn:aws:iam::1:user/alice").is_ok());
        assert!(validate_principal_id("not-an-arn").is_err());
    }
}
