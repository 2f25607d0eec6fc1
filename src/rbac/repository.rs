//! RBAC Repository — owns every CRUD operation over resources, scopes,
//! roles and their dual-indexed assignments, plus the principal-access query
//! that backs the token endpoint (spec.md §4.3/§4.4). Grounded on
//! `store::postgres::PgStore`'s CRUD surface and
//! `rotation::RotationScheduler`'s optimistic-concurrency retry pattern.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::errors::AppError;

use super::cascade::{self, CascadePlan};
use super::encoding;
use super::model::{PrincipalAccess, Role, RoleAssignment, Scope, ScopeAssignment, DEFAULT_SCOPE};
use super::store::{Item, PutCondition, Store, StoreError, TransactOp, MAX_TRANSACT_ITEMS};
use super::validation;

/// Maximum retry attempts for a `TransactionAborted` store error before it
/// surfaces to the caller (spec.md §4.9).
const MAX_TRANSACT_RETRIES: u32 = 3;

pub struct Repository {
    store: Arc<dyn Store>,
}

impl Repository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Retries a transaction on `TransactionAborted` with exponential
    /// backoff and jitter, up to [`MAX_TRANSACT_RETRIES`] attempts — the
    /// repository boundary is where spec.md scopes this retry, not a
    /// generic ambient middleware.
    async fn transact_with_retry(&self, ops: Vec<TransactOp>) -> Result<(), AppError> {
        let mut attempt = 0;
        loop {
            match self.store.transact(ops.clone()).await {
                Ok(()) => return Ok(()),
                Err(StoreError::TransactionAborted(cause)) if attempt < MAX_TRANSACT_RETRIES => {
                    attempt += 1;
                    let backoff_ms = 10u64 * 2u64.pow(attempt);
                    let jitter_ms = rand::thread_rng().gen_range(0..backoff_ms);
                    tracing::warn!(attempt, %cause, "transaction aborted, retrying");
                    tokio::time::sleep(Duration::from_millis(backoff_ms + jitter_ms)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    // ── Resource ─────────────────────────────────────────────────────

    pub async fn create_resource(&self, resource_name: &str) -> Result<(), AppError> {
        let resource_name = validation::validate_resource_name(resource_name)?;
        let key = encoding::resource_key(&resource_name);
        self.store
            .put(Item::new(key.pk, key.sk), PutCondition::MustNotExist)
            .await
            .map_err(|e| match e {
                StoreError::AlreadyExists => {
                    AppError::already_exists("resource", resource_name.clone())
                }
                other => other.into(),
            })?;
        tracing::info!(resource_name, "resource created");
        Ok(())
    }

    pub async fn get_resource(&self, resource_name: &str) -> Result<Option<String>, AppError> {
        let key = encoding::resource_key(resource_name);
        let item = self.store.get(&key.pk, &key.sk).await?;
        Ok(item.and_then(|i| encoding::decode_resource_sk(&i.sk).map(str::to_string)))
    }

    pub async fn list_resources(&self) -> Result<Vec<String>, AppError> {
        let items = self
            .store
            .query(&encoding::resources_pk(), encoding::Marker::Resource.prefix())
            .await?;
        Ok(items
            .iter()
            .filter_map(|i| encoding::decode_resource_sk(&i.sk).map(str::to_string))
            .collect())
    }

    /// Deletes a resource and every row it owns — scopes, roles, and both
    /// views of every assignment under it — in a cascade that deletes the
    /// resource row last (P3).
    pub async fn delete_resource(&self, resource_name: &str) -> Result<(), AppError> {
        let pk = encoding::resource_items_pk(resource_name);
        let owned = self.store.query(&pk, "").await?;

        let mut plan = CascadePlan::new();
        for item in &owned {
            if item.sk.starts_with(encoding::Marker::ScopeAssignment.prefix()) {
                if let (Some(scope_name), Some(principal_id)) = (
                    encoding::decode_middle_fragment(&item.sk),
                    encoding::decode_last_fragment(&item.sk),
                ) {
                    let mirror = encoding::scope_assignment_principal_key(
                        principal_id,
                        resource_name,
                        scope_name,
                    );
                    plan.push(mirror.pk, mirror.sk);
                }
            } else if item.sk.starts_with(encoding::Marker::RoleAssignment.prefix()) {
                if let (Some(role_name), Some(principal_id)) = (
                    encoding::decode_middle_fragment(&item.sk),
                    encoding::decode_last_fragment(&item.sk),
                ) {
                    let mirror = encoding::role_assignment_principal_key(
                        principal_id,
                        resource_name,
                        role_name,
                    );
                    plan.push(mirror.pk, mirror.sk);
                }
            }
            plan.push(item.pk.clone(), item.sk.clone());
        }

        let resource_key = encoding::resource_key(resource_name);
        plan.owner_delete = Some((resource_key.pk, resource_key.sk));

        tracing::info!(
            resource_name,
            items = plan.total_items(),
            batches = plan.batch_count(MAX_TRANSACT_ITEMS),
            "deleting resource cascade"
        );
        cascade::execute(self.store.as_ref(), plan, MAX_TRANSACT_ITEMS).await?;
        Ok(())
    }

    // ── Scope ────────────────────────────────────────────────────────

    pub async fn create_scope(&self, resource_name: &str, scope_name: &str) -> Result<(), AppError> {
        let resource_name = validation::validate_resource_name(resource_name)?;
        let scope_name = validation::validate_scope_name(scope_name)?;
        let key = encoding::scope_key(&resource_name, &scope_name);
        self.store
            .put(Item::new(key.pk, key.sk), PutCondition::MustNotExist)
            .await
            .map_err(|e| match e {
                StoreError::AlreadyExists => AppError::already_exists("scope", scope_name.clone()),
                other => other.into(),
            })?;
        tracing::info!(resource_name, scope_name, "scope created");
        Ok(())
    }

    pub async fn get_scope(&self, resource_name: &str, scope_name: &str) -> Result<Option<Scope>, AppError> {
        let key = encoding::scope_key(resource_name, scope_name);
        let item = self.store.get(&key.pk, &key.sk).await?;
        Ok(item.and_then(|i| {
            encoding::decode_scope_sk(&i.sk).map(|scope_name| Scope {
                resource_name: resource_name.to_string(),
                scope_name: scope_name.to_string(),
            })
        }))
    }

    pub async fn list_scopes_by_resource(&self, resource_name: &str) -> Result<Vec<Scope>, AppError> {
        let items = self
            .store
            .query(&encoding::resource_items_pk(resource_name), &encoding::scope_sk_prefix())
            .await?;
        Ok(items
            .iter()
            .filter_map(|i| {
                encoding::decode_scope_sk(&i.sk).map(|scope_name| Scope {
                    resource_name: resource_name.to_string(),
                    scope_name: scope_name.to_string(),
                })
            })
            .collect())
    }

    /// Deletes a scope, its owning row last, along with every scope
    /// assignment (both views) referencing it.
    pub async fn delete_scope(&self, resource_name: &str, scope_name: &str) -> Result<(), AppError> {
        let view_prefix = encoding::scope_assignments_by_scope_prefix(scope_name);
        let views = self
            .store
            .query(&encoding::resource_items_pk(resource_name), &view_prefix)
            .await?;

        let mut plan = CascadePlan::new();
        for item in &views {
            if let Some(principal_id) = encoding::decode_last_fragment(&item.sk) {
                let mirror =
                    encoding::scope_assignment_principal_key(principal_id, resource_name, scope_name);
                plan.push(mirror.pk, mirror.sk);
            }
            plan.push(item.pk.clone(), item.sk.clone());
        }

        let scope_key = encoding::scope_key(resource_name, scope_name);
        plan.owner_delete = Some((scope_key.pk, scope_key.sk));

        tracing::info!(resource_name, scope_name, items = plan.total_items(), "deleting scope cascade");
        cascade::execute(self.store.as_ref(), plan, MAX_TRANSACT_ITEMS).await?;
        Ok(())
    }

    // ── Role ─────────────────────────────────────────────────────────

    pub async fn create_role(&self, resource_name: &str, role_name: &str) -> Result<(), AppError> {
        let resource_name = validation::validate_resource_name(resource_name)?;
        let role_name = validation::validate_role_name(role_name)?;
        let key = encoding::role_key(&resource_name, &role_name);
        self.store
            .put(Item::new(key.pk, key.sk), PutCondition::MustNotExist)
            .await
            .map_err(|e| match e {
                StoreError::AlreadyExists => AppError::already_exists("role", role_name.clone()),
                other => other.into(),
            })?;
        tracing::info!(resource_name, role_name, "role created");
        Ok(())
    }

    pub async fn get_role(&self, resource_name: &str, role_name: &str) -> Result<Option<Role>, AppError> {
        let key = encoding::role_key(resource_name, role_name);
        let item = self.store.get(&key.pk, &key.sk).await?;
        Ok(item.and_then(|i| {
            encoding::decode_role_sk(&i.sk).map(|role_name| Role {
                resource_name: resource_name.to_string(),
                role_name: role_name.to_string(),
            })
        }))
    }

    pub async fn list_roles_by_resource(&self, resource_name: &str) -> Result<Vec<Role>, AppError> {
        let items = self
            .store
            .query(&encoding::resource_items_pk(resource_name), &encoding::role_sk_prefix())
            .await?;
        Ok(items
            .iter()
            .filter_map(|i| {
                encoding::decode_role_sk(&i.sk).map(|role_name| Role {
                    resource_name: resource_name.to_string(),
                    role_name: role_name.to_string(),
                })
            })
            .collect())
    }

    pub async fn delete_role(&self, resource_name: &str, role_name: &str) -> Result<(), AppError> {
        let view_prefix = encoding::role_assignments_by_role_prefix(role_name);
        let views = self
            .store
            .query(&encoding::resource_items_pk(resource_name), &view_prefix)
            .await?;

        let mut plan = CascadePlan::new();
        for item in &views {
            if let Some(principal_id) = encoding::decode_last_fragment(&item.sk) {
                let mirror =
                    encoding::role_assignment_principal_key(principal_id, resource_name, role_name);
                plan.push(mirror.pk, mirror.sk);
            }
            plan.push(item.pk.clone(), item.sk.clone());
        }

        let role_key = encoding::role_key(resource_name, role_name);
        plan.owner_delete = Some((role_key.pk, role_key.sk));

        tracing::info!(resource_name, role_name, items = plan.total_items(), "deleting role cascade");
        cascade::execute(self.store.as_ref(), plan, MAX_TRANSACT_ITEMS).await?;
        Ok(())
    }

    // ── Scope assignment ────────────────────────────────────────────

    pub async fn create_scope_assignment(
        &self,
        principal_id: &str,
        resource_name: &str,
        scope_name: &str,
    ) -> Result<(), AppError> {
        let principal_id = validation::validate_principal_id(principal_id)?;
        let resource_name = validation::validate_resource_name(resource_name)?;
        // `.default` is reserved and never exists as a real scope row (I5),
        // so it is rejected here rather than special-cased: the ConditionCheck
        // below would fail for it anyway, but rejecting it as a validation
        // error keeps the failure mode a 422, not a confusing 409.
        let scope_name = validation::validate_scope_name(scope_name)?;

        let principal_view =
            encoding::scope_assignment_principal_key(&principal_id, &resource_name, &scope_name);
        let resource_view =
            encoding::scope_assignment_resource_key(&resource_name, &scope_name, &principal_id);
        let scope_key = encoding::scope_key(&resource_name, &scope_name);

        let ops = vec![
            TransactOp::must_exist(scope_key.pk, scope_key.sk),
            TransactOp::put(Item::new(principal_view.pk, principal_view.sk), PutCondition::MustNotExist),
            TransactOp::put(Item::new(resource_view.pk, resource_view.sk), PutCondition::MustNotExist),
        ];

        self.transact_with_retry(ops).await?;
        tracing::info!(principal_id, resource_name, scope_name, "scope assignment created");
        Ok(())
    }

    pub async fn delete_scope_assignment(
        &self,
        principal_id: &str,
        resource_name: &str,
        scope_name: &str,
    ) -> Result<(), AppError> {
        let principal_view =
            encoding::scope_assignment_principal_key(principal_id, resource_name, scope_name);
        let resource_view =
            encoding::scope_assignment_resource_key(resource_name, scope_name, principal_id);

        let ops = vec![
            TransactOp::delete(principal_view.pk, principal_view.sk),
            TransactOp::delete(resource_view.pk, resource_view.sk),
        ];
        self.transact_with_retry(ops).await?;
        tracing::info!(principal_id, resource_name, scope_name, "scope assignment deleted");
        Ok(())
    }

    pub async fn get_scope_assignment(
        &self,
        principal_id: &str,
        resource_name: &str,
        scope_name: &str,
    ) -> Result<Option<ScopeAssignment>, AppError> {
        let key = encoding::scope_assignment_principal_key(principal_id, resource_name, scope_name);
        let item = self.store.get(&key.pk, &key.sk).await?;
        Ok(item.map(|_| ScopeAssignment {
            principal_id: principal_id.to_string(),
            resource_name: resource_name.to_string(),
            scope_name: scope_name.to_string(),
        }))
    }

    pub async fn list_scope_assignments_by_principal(
        &self,
        principal_id: &str,
        resource_name: &str,
    ) -> Result<Vec<ScopeAssignment>, AppError> {
        let prefix = encoding::scope_assignments_by_principal_prefix(resource_name);
        let items = self.store.query(&encoding::principal_pk(principal_id), &prefix).await?;
        Ok(items
            .iter()
            .filter_map(|i| {
                encoding::decode_last_fragment(&i.sk).map(|scope_name| ScopeAssignment {
                    principal_id: principal_id.to_string(),
                    resource_name: resource_name.to_string(),
                    scope_name: scope_name.to_string(),
                })
            })
            .collect())
    }

    pub async fn list_principals_by_scope(
        &self,
        resource_name: &str,
        scope_name: &str,
    ) -> Result<Vec<String>, AppError> {
        let prefix = encoding::scope_assignments_by_scope_prefix(scope_name);
        let items = self
            .store
            .query(&encoding::resource_items_pk(resource_name), &prefix)
            .await?;
        Ok(items
            .iter()
            .filter_map(|i| encoding::decode_last_fragment(&i.sk).map(str::to_string))
            .collect())
    }

    // ── Role assignment ──────────────────────────────────────────────

    pub async fn create_role_assignment(
        &self,
        principal_id: &str,
        resource_name: &str,
        role_name: &str,
    ) -> Result<(), AppError> {
        let principal_id = validation::validate_principal_id(principal_id)?;
        let resource_name = validation::validate_resource_name(resource_name)?;
        let role_name = validation::validate_role_name(role_name)?;

        let principal_view =
            encoding::role_assignment_principal_key(&principal_id, &resource_name, &role_name);
        let resource_view =
            encoding::role_assignment_resource_key(&resource_name, &role_name, &principal_id);
        let role_key = encoding::role_key(&resource_name, &role_name);

        let ops = vec![
            TransactOp::put(Item::new(principal_view.pk, principal_view.sk), PutCondition::MustNotExist),
            TransactOp::put(Item::new(resource_view.pk, resource_view.sk), PutCondition::MustNotExist),
            TransactOp::must_exist(role_key.pk, role_key.sk),
        ];
        self.transact_with_retry(ops).await?;
        tracing::info!(principal_id, resource_name, role_name, "role assignment created");
        Ok(())
    }

    pub async fn delete_role_assignment(
        &self,
        principal_id: &str,
        resource_name: &str,
        role_name: &str,
    ) -> Result<(), AppError> {
        let principal_view =
            encoding::role_assignment_principal_key(principal_id, resource_name, role_name);
        let resource_view =
            encoding::role_assignment_resource_key(resource_name, role_name, principal_id);

        let ops = vec![
            TransactOp::delete(principal_view.pk, principal_view.sk),
            TransactOp::delete(resource_view.pk, resource_view.sk),
        ];
        self.transact_with_retry(ops).await?;
        tracing::info!(principal_id, resource_name, role_name, "role assignment deleted");
        Ok(())
    }

    pub async fn get_role_assignment(
        &self,
        principal_id: &str,
        resource_name: &str,
        role_name: &str,
    ) -> Result<Option<RoleAssignment>, AppError> {
        let key = encoding::role_assignment_principal_key(principal_id, resource_name, role_name);
        let item = self.store.get(&key.pk, &key.sk).await?;
        Ok(item.map(|_| RoleAssignment {
            principal_id: principal_id.to_string(),
            resource_name: resource_name.to_string(),
            role_name: role_name.to_string(),
        }))
    }

    pub async fn list_role_assignments_by_principal(
        &self,
        principal_id: &str,
        resource_name: &str,
    ) -> Result<Vec<RoleAssignment>, AppError> {
        let prefix = encoding::role_assignments_by_principal_prefix(resource_name);
        let items = self.store.query(&encoding::principal_pk(principal_id), &prefix).await?;
        Ok(items
            .iter()
            .filter_map(|i| {
                encoding::decode_last_fragment(&i.sk).map(|role_name| RoleAssignment {
                    principal_id: principal_id.to_string(),
                    resource_name: resource_name.to_string(),
                    role_name: role_name.to_string(),
                })
            })
            .collect())
    }

    pub async fn list_principals_by_role(
        &self,
        resource_name: &str,
        role_name: &str,
    ) -> Result<Vec<String>, AppError> {
        let prefix = encoding::role_assignments_by_role_prefix(role_name);
        let items = self
            .store
            .query(&encoding::resource_items_pk(resource_name), &prefix)
            .await?;
        Ok(items
            .iter()
            .filter_map(|i| encoding::decode_last_fragment(&i.sk).map(str::to_string))
            .collect())
    }

    // ── Principal ────────────────────────────────────────────────────

    /// Deletes every assignment (both views) held by `principal_id`, across
    /// every resource. There is no owning row for a principal — it exists
    /// only as the union of its assignments.
    pub async fn delete_principal(&self, principal_id: &str) -> Result<(), AppError> {
        let owned = self.store.query(&encoding::principal_pk(principal_id), "").await?;

        let mut plan = CascadePlan::new();
        for item in &owned {
            let Some(resource_name) = encoding::decode_middle_fragment(&item.sk) else {
                continue;
            };
            let Some(last) = encoding::decode_last_fragment(&item.sk) else {
                continue;
            };
            if item.sk.starts_with(encoding::Marker::ScopeAssignment.prefix()) {
                let mirror = encoding::scope_assignment_resource_key(resource_name, last, principal_id);
                plan.push(mirror.pk, mirror.sk);
            } else if item.sk.starts_with(encoding::Marker::RoleAssignment.prefix()) {
                let mirror = encoding::role_assignment_resource_key(resource_name, last, principal_id);
                plan.push(mirror.pk, mirror.sk);
            }
            plan.push(item.pk.clone(), item.sk.clone());
        }

        tracing::info!(principal_id, items = plan.total_items(), "deleting principal cascade");
        cascade::execute(self.store.as_ref(), plan, MAX_TRANSACT_ITEMS).await?;
        Ok(())
    }

    /// Computes the access a principal holds on a resource (spec.md §4.4),
    /// the sole place authorization decisions are synthesized.
    ///
    /// `scope_name` is the optional query-time scope filter: `None` and
    /// `Some(".default")` both mean "every scope the principal holds";
    /// `Some(s)` for a real scope name narrows the result to just `s` (or to
    /// nothing, if the principal doesn't hold it). The central invariant —
    /// rule 5, "scope-gating" — is that `roles` is empty whenever the
    /// principal's held-scope set `S` is empty, regardless of any role
    /// assignment.
    pub async fn get_principal_access(
        &self,
        principal_id: &str,
        resource_name: &str,
        scope_name: Option<&str>,
    ) -> Result<PrincipalAccess, AppError> {
        let principal_id = validation::validate_principal_id(principal_id)?;
        let resource_name = validation::validate_resource_name(resource_name)?;
        let scope_name = scope_name.map(validation::validate_scope_query).transpose()?;

        if self.get_resource(&resource_name).await?.is_none() {
            return Err(AppError::not_found("resource", resource_name));
        }

        if let Some(s) = &scope_name {
            if s != DEFAULT_SCOPE {
                let key = encoding::scope_key(&resource_name, s);
                if self.store.get(&key.pk, &key.sk).await?.is_none() {
                    return Err(AppError::not_found("scope", s.clone()));
                }
            }
        }

        let held: Vec<String> = self
            .list_scope_assignments_by_principal(&principal_id, &resource_name)
            .await?
            .into_iter()
            .map(|a| a.scope_name)
            .collect();

        let mut scopes = match scope_name.as_deref() {
            None | Some(DEFAULT_SCOPE) => held.clone(),
            Some(s) if held.iter().any(|h| h == s) => vec![s.to_string()],
            Some(_) => Vec::new(),
        };

        let mut roles: Vec<String> = if held.is_empty() || scopes.is_empty() {
            Vec::new()
        } else {
            self.list_role_assignments_by_principal(&principal_id, &resource_name)
                .await?
                .into_iter()
                .map(|a| a.role_name)
                .collect()
        };

        scopes.sort();
        scopes.dedup();
        roles.sort();
        roles.dedup();

        Ok(PrincipalAccess { resource_name, scopes, roles })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::memory_store::MemoryStore;

    const ALICE: &str = "arn:aws:iam::1:user/alice";
    const RESOURCE: &str = "api://x";

    async fn seeded() -> Repository {
        let store = Arc::new(MemoryStore::new());
        let repo = Repository::new(store);
        repo.create_resource(RESOURCE).await.unwrap();
        repo.create_scope(RESOURCE, "rbac").await.unwrap();
        repo.create_role(RESOURCE, "rbac.read").await.unwrap();
        repo.create_scope_assignment(ALICE, RESOURCE, "rbac").await.unwrap();
        repo.create_role_assignment(ALICE, RESOURCE, "rbac.read").await.unwrap();
        repo
    }

    #[tokio::test]
    async fn e1_scope_and_role_both_granted() {
        let repo = seeded().await;
        let access = repo.get_principal_access(ALICE, RESOURCE, None).await.unwrap();
        assert_eq!(access.scopes, vec!["rbac".to_string()]);
        assert_eq!(access.roles, vec!["rbac.read".to_string()]);
    }

    #[tokio::test]
    async fn e2_role_without_any_scope_is_gated_to_nothing() {
        let store = Arc::new(MemoryStore::new());
        let repo = Repository::new(store);
        repo.create_resource(RESOURCE).await.unwrap();
        repo.create_role(RESOURCE, "rbac.read").await.unwrap();
        repo.create_role_assignment(ALICE, RESOURCE, "rbac.read").await.unwrap();

        let access = repo.get_principal_access(ALICE, RESOURCE, None).await.unwrap();
        assert!(access.scopes.is_empty());
        assert!(access.roles.is_empty());
    }

    #[tokio::test]
    async fn e3_unheld_specific_scope_returns_nothing() {
        let repo = seeded().await;
        repo.create_scope(RESOURCE, "prod").await.unwrap();

        let access = repo.get_principal_access(ALICE, RESOURCE, Some("prod")).await.unwrap();
        assert!(access.scopes.is_empty());
        assert!(access.roles.is_empty());
    }

    #[tokio::test]
    async fn e4_default_scope_matches_no_scope_argument() {
        let repo = seeded().await;
        let no_arg = repo.get_principal_access(ALICE, RESOURCE, None).await.unwrap();
        let default_arg = repo.get_principal_access(ALICE, RESOURCE, Some(".default")).await.unwrap();
        assert_eq!(no_arg, default_arg);
    }

    #[tokio::test]
    async fn e6_deleting_principal_clears_access_and_rows() {
        let store = Arc::new(MemoryStore::new());
        let repo = Repository::new(store.clone());
        repo.create_resource(RESOURCE).await.unwrap();
        repo.create_scope(RESOURCE, "rbac").await.unwrap();
        repo.create_role(RESOURCE, "rbac.read").await.unwrap();
        repo.create_scope_assignment(ALICE, RESOURCE, "rbac").await.unwrap();
        repo.create_role_assignment(ALICE, RESOURCE, "rbac.read").await.unwrap();

        repo.delete_principal(ALICE).await.unwrap();

        let access = repo.get_principal_access(ALICE, RESOURCE, None).await.unwrap();
        assert!(access.scopes.is_empty());
        assert!(access.roles.is_empty());
        assert!(store.items_referencing(ALICE).is_empty());
    }

    #[tokio::test]
    async fn held_specific_scope_narrows_to_just_that_scope() {
        let repo = seeded().await;
        repo.create_scope(RESOURCE, "prod").await.unwrap();
        repo.create_scope_assignment(ALICE, RESOURCE, "prod").await.unwrap();

        let access = repo.get_principal_access(ALICE, RESOURCE, Some("rbac")).await.unwrap();
        assert_eq!(access.scopes, vec!["rbac".to_string()]);
        // roles are gated by S (the full held set), not by the narrowed filter
        assert_eq!(access.roles, vec!["rbac.read".to_string()]);
    }

    #[tokio::test]
    async fn unknown_resource_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let repo = Repository::new(store);
        let err = repo.get_principal_access(ALICE, RESOURCE, None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { kind: "resource", .. }));
    }

    #[tokio::test]
    async fn unknown_specific_scope_is_not_found() {
        let repo = seeded().await;
        let err = repo.get_principal_access(ALICE, RESOURCE, Some("nonexistent")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { kind: "scope", .. }));
    }

    #[tokio::test]
    async fn p3_resource_delete_cascades_completely() {
        let store = Arc::new(MemoryStore::new());
        let repo = Repository::new(store.clone());
        repo.create_resource(RESOURCE).await.unwrap();
        repo.create_scope(RESOURCE, "rbac").await.unwrap();
        repo.create_role(RESOURCE, "rbac.read").await.unwrap();
        repo.create_scope_assignment(ALICE, RESOURCE, "rbac").await.unwrap();
        repo.create_role_assignment(ALICE, RESOURCE, "rbac.read").await.unwrap();

        repo.delete_resource(RESOURCE).await.unwrap();

        assert!(repo.get_resource(RESOURCE).await.unwrap().is_none());
        // P3: a full scan must yield zero items whose PK or SK references the
        // deleted resource — not just the owner row checked above.
        assert!(store.items_referencing(RESOURCE).is_empty());
    }
}
