//! Canonical marker-prefix encoding of composite partition/sort keys.
//!
//! Every item in the single-table store is addressed by a pair of opaque
//! strings — partition identifier (PK) and sort identifier (SK) — built by
//! concatenating `MARKER#field` fragments. Compound sort keys (assignments)
//! join two fragments with the fixed double separator `##`, which cannot
//! appear inside a valid field (see [`is_valid_field`]), so decoding is
//! unambiguous: I4/I6 in spec.md require byte-exact, case-sensitive names,
//! and this encoding never folds or reorders them.

use std::fmt;

/// The double separator joining fragments inside a compound sort key.
pub const SEP: &str = "##";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Resource,
    Scope,
    Role,
    Principal,
    ScopeAssignment,
    RoleAssignment,
}

impl Marker {
    pub fn prefix(self) -> &'static str {
        match self {
            Marker::Resource => "RESOURCE#",
            Marker::Scope => "SCOPE#",
            Marker::Role => "ROLE#",
            Marker::Principal => "PRINCIPAL#",
            Marker::ScopeAssignment => "SCOPEASSIGNMENT#",
            Marker::RoleAssignment => "ROLEASSIGNMENT#",
        }
    }

    /// Strips this marker's prefix from `s`, returning the remainder.
    fn strip<'a>(self, s: &'a str) -> Option<&'a str> {
        s.strip_prefix(self.prefix())
    }

    /// The bare marker word, with no trailing `#` — this is the leading
    /// fragment of a compound sort key (spec.md §4.1, e.g.
    /// `SCOPEASSIGNMENT##RESOURCE#{r}##SCOPE#{s}`), where [`SEP`] supplies
    /// the separator instead of [`Marker::prefix`]'s trailing `#`.
    fn word(self) -> &'static str {
        match self {
            Marker::Resource => "RESOURCE",
            Marker::Scope => "SCOPE",
            Marker::Role => "ROLE",
            Marker::Principal => "PRINCIPAL",
            Marker::ScopeAssignment => "SCOPEASSIGNMENT",
            Marker::RoleAssignment => "ROLEASSIGNMENT",
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A field value is valid for encoding iff it cannot be confused with a
/// fragment boundary: it must not contain the double separator.
pub fn is_valid_field(value: &str) -> bool {
    !value.is_empty() && !value.contains(SEP)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub pk: String,
    pub sk: String,
}

fn fragment(marker: Marker, value: &str) -> String {
    format!("{}{}", marker.prefix(), value)
}

// ── Single-entity keys ───────────────────────────────────────────────

pub fn resources_pk() -> String {
    Marker::Resource.prefix().to_string()
}

pub fn resource_key(resource_name: &str) -> Key {
    Key {
        pk: resources_pk(),
        sk: fragment(Marker::Resource, resource_name),
    }
}

pub fn resource_items_pk(resource_name: &str) -> String {
    fragment(Marker::Resource, resource_name)
}

pub fn scope_key(resource_name: &str, scope_name: &str) -> Key {
    Key {
        pk: resource_items_pk(resource_name),
        sk: fragment(Marker::Scope, scope_name),
    }
}

pub fn role_key(resource_name: &str, role_name: &str) -> Key {
    Key {
        pk: resource_items_pk(resource_name),
        sk: fragment(Marker::Role, role_name),
    }
}

pub fn scope_sk_prefix() -> String {
    Marker::Scope.prefix().to_string()
}

pub fn role_sk_prefix() -> String {
    Marker::Role.prefix().to_string()
}

pub fn principal_pk(principal_id: &str) -> String {
    fragment(Marker::Principal, principal_id)
}

// ── Assignment keys (dual-indexed, §4.1) ────────────────────────────

pub fn scope_assignment_principal_key(principal_id: &str, resource_name: &str, scope_name: &str) -> Key {
    Key {
        pk: principal_pk(principal_id),
        sk: format!(
            "{}{}{}{}{}",
            Marker::ScopeAssignment.word(),
            SEP,
            fragment(Marker::Resource, resource_name),
            SEP,
            fragment(Marker::Scope, scope_name),
        ),
    }
}

pub fn scope_assignment_resource_key(resource_name: &str, scope_name: &str, principal_id: &str) -> Key {
    Key {
        pk: resource_items_pk(resource_name),
        sk: format!(
            "{}{}{}{}{}",
            Marker::ScopeAssignment.word(),
            SEP,
            fragment(Marker::Scope, scope_name),
            SEP,
            fragment(Marker::Principal, principal_id),
        ),
    }
}

pub fn role_assignment_principal_key(principal_id: &str, resource_name: &str, role_name: &str) -> Key {
    Key {
        pk: principal_pk(principal_id),
        sk: format!(
            "{}{}{}{}{}",
            Marker::RoleAssignment.word(),
            SEP,
            fragment(Marker::Resource, resource_name),
            SEP,
            fragment(Marker::Role, role_name),
        ),
    }
}

pub fn role_assignment_resource_key(resource_name: &str, role_name: &str, principal_id: &str) -> Key {
    Key {
        pk: resource_items_pk(resource_name),
        sk: format!(
            "{}{}{}{}{}",
            Marker::RoleAssignment.word(),
            SEP,
            fragment(Marker::Role, role_name),
            SEP,
            fragment(Marker::Principal, principal_id),
        ),
    }
}

/// SK prefix for "all scope-assignments of principal `p` under resource `r`".
pub fn scope_assignments_by_principal_prefix(resource_name: &str) -> String {
    format!(
        "{}{}{}{}",
        Marker::ScopeAssignment.word(),
        SEP,
        fragment(Marker::Resource, resource_name),
        SEP,
    )
}

/// SK prefix for "all role-assignments of principal `p` under resource `r`".
pub fn role_assignments_by_principal_prefix(resource_name: &str) -> String {
    format!(
        "{}{}{}{}",
        Marker::RoleAssignment.word(),
        SEP,
        fragment(Marker::Resource, resource_name),
        SEP,
    )
}

/// SK prefix for "all principals holding scope `s`" (queried under the
/// resource's PK — the scope view).
pub fn scope_assignments_by_scope_prefix(scope_name: &str) -> String {
    format!(
        "{}{}{}{}",
        Marker::ScopeAssignment.word(),
        SEP,
        fragment(Marker::Scope, scope_name),
        SEP,
    )
}

/// SK prefix for "all principals holding role `ro`" (queried under the
/// resource's PK — the role view).
pub fn role_assignments_by_role_prefix(role_name: &str) -> String {
    format!(
        "{}{}{}{}",
        Marker::RoleAssignment.word(),
        SEP,
        fragment(Marker::Role, role_name),
        SEP,
    )
}

// ── Decoding ─────────────────────────────────────────────────────────

/// Extracts `resourceName` from a Resource SK (`RESOURCE#{name}`).
pub fn decode_resource_sk(sk: &str) -> Option<&str> {
    Marker::Resource.strip(sk)
}

/// Extracts `scopeName` from a Scope SK (`SCOPE#{name}`).
pub fn decode_scope_sk(sk: &str) -> Option<&str> {
    Marker::Scope.strip(sk)
}

/// Extracts `roleName` from a Role SK (`ROLE#{name}`).
pub fn decode_role_sk(sk: &str) -> Option<&str> {
    Marker::Role.strip(sk)
}

/// Splits a compound SK on the double separator and strips the trailing
/// fragment's marker, returning the last field (e.g. the scope name out of
/// a principal-view scope-assignment SK, or the principal ID out of a
/// scope-view one).
pub fn decode_last_fragment(sk: &str) -> Option<&str> {
    let last = sk.rsplit(SEP).next()?;
    for marker in [
        Marker::Resource,
        Marker::Scope,
        Marker::Role,
        Marker::Principal,
    ] {
        if let Some(v) = marker.strip(last) {
            return Some(v);
        }
    }
    None
}

/// Splits a three-fragment compound SK (`MARKER##middle##last`) and strips
/// the middle fragment's marker — e.g. the resource name out of a
/// principal-view assignment SK, or the scope/role name out of a
/// resource-view one.
pub fn decode_middle_fragment(sk: &str) -> Option<&str> {
    let mut parts = sk.split(SEP);
    let _head = parts.next()?;
    let middle = parts.next()?;
    for marker in [
        Marker::Resource,
        Marker::Scope,
        Marker::Role,
        Marker::Principal,
    ] {
        if let Some(v) = marker.strip(middle) {
            return Some(v);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_roundtrip() {
        let key = resource_key("api://x");
        assert_eq!(key.pk, "RESOURCE#");
        assert_eq!(key.sk, "RESOURCE#api://x");
        assert_eq!(decode_resource_sk(&key.sk), Some("api://x"));
    }

    #[test]
    fn scope_and_role_roundtrip() {
        let scope = scope_key("api://x", "rbac");
        assert_eq!(scope.pk, "RESOURCE#api://x");
        assert_eq!(scope.sk, "SCOPE#rbac");
        assert_eq!(decode_scope_sk(&scope.sk), Some("rbac"));

        let role = role_key("api://x", "rbac.read");
        assert_eq!(role.pk, "RESOURCE#api://x");
        assert_eq!(role.sk, "ROLE#rbac.read");
        assert_eq!(decode_role_sk(&role.sk), Some("rbac.read"));
    }

    #[test]
    fn scope_assignment_dual_view() {
        let principal_view = scope_assignment_principal_key("arn:aws:iam::1:user/alice", "api://x", "rbac");
        assert_eq!(principal_view.pk, "PRINCIPAL#arn:aws:iam::1:user/alice");
        assert_eq!(
            principal_view.sk,
            "SCOPEASSIGNMENT##RESOURCE#api://x##SCOPE#rbac"
        );

        let scope_view = scope_assignment_resource_key("api://x", "rbac", "arn:aws:iam::1:user/alice");
        assert_eq!(scope_view.pk, "RESOURCE#api://x");
        assert_eq!(
            scope_view.sk,
            "SCOPEASSIGNMENT##SCOPE#rbac##PRINCIPAL#arn:aws:iam::1:user/alice"
        );

        assert_eq!(decode_last_fragment(&principal_view.sk), Some("rbac"));
        assert_eq!(
            decode_last_fragment(&scope_view.sk),
            Some("arn:aws:iam::1:user/alice")
        );
    }

    #[test]
    fn role_assignment_dual_view() {
        let principal_view = role_assignment_principal_key("arn:p", "api://x", "rbac.read");
        assert_eq!(
            principal_view.sk,
            "ROLEASSIGNMENT##RESOURCE#api://x##ROLE#rbac.read"
        );
        let role_view = role_assignment_resource_key("api://x", "rbac.read", "arn:p");
        assert_eq!(role_view.pk, "RESOURCE#api://x");
        assert_eq!(
            role_view.sk,
            "ROLEASSIGNMENT##ROLE#rbac.read##PRINCIPAL#arn:p"
        );
    }

    #[test]
    fn prefixes_match_generated_keys() {
        let prefix = scope_assignments_by_principal_prefix("api://x");
        let key = scope_assignment_principal_key("arn:p", "api://x", "rbac");
        assert!(key.sk.starts_with(&prefix));

        let prefix = role_assignments_by_role_prefix("rbac.read");
        let key = role_assignment_resource_key("api://x", "rbac.read", "arn:p");
        assert!(key.sk.starts_with(&prefix));
    }

    #[test]
    fn decodes_middle_fragment_from_both_views() {
        let principal_view = scope_assignment_principal_key("arn:p", "api://x", "rbac");
        assert_eq!(decode_middle_fragment(&principal_view.sk), Some("api://x"));

        let scope_view = scope_assignment_resource_key("api://x", "rbac", "arn:p");
        assert_eq!(decode_middle_fragment(&scope_view.sk), Some("rbac"));
    }

    #[test]
    fn rejects_fields_containing_separator() {
        assert!(!is_valid_field("has##separator"));
        assert!(!is_valid_field(""));
        assert!(is_valid_field("api://x"));
        assert!(is_valid_field("rbac.read"));
    }
}
