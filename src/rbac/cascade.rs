//! Cascading-delete coordinator shared by Resource/Scope/Role/Principal
//! deletion (spec.md §4.3/§5). Batches at the store's transaction limit and
//! always deletes the owning row last, so a crash mid-cascade leaves an
//! entity that still exists and can simply be retried — grounded on the
//! batch-with-partial-failure-tolerance shape of
//! `rotation::RotationScheduler::run_rotation_cycle`.

use super::store::{Store, StoreError, TransactOp};

/// A set of rows to remove for one delete operation, split into the
/// dependent rows (assignments, child scopes/roles) and the owning row that
/// must only be removed once every dependent row is gone.
#[derive(Debug, Default, Clone)]
pub struct CascadePlan {
    pub dependent_deletes: Vec<(String, String)>,
    pub owner_delete: Option<(String, String)>,
}

impl CascadePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            dependent_deletes: Vec::new(),
            owner_delete: Some((pk.into(), sk.into())),
        }
    }

    pub fn push(&mut self, pk: impl Into<String>, sk: impl Into<String>) {
        self.dependent_deletes.push((pk.into(), sk.into()));
    }

    pub fn total_items(&self) -> usize {
        self.dependent_deletes.len() + self.owner_delete.is_some() as usize
    }

    pub fn batch_count(&self, batch_limit: usize) -> usize {
        let total = self.total_items();
        if total == 0 {
            0
        } else if total <= batch_limit {
            1
        } else {
            self.dependent_deletes.len().div_ceil(batch_limit)
                + self.owner_delete.is_some() as usize
        }
    }
}

/// Executes `plan` against `store`, returning the number of rows deleted.
///
/// When the whole plan fits in one transaction (including the owner row) it
/// commits atomically. Otherwise dependent rows are deleted in fixed order
/// across as many batches as needed, and the owner row is deleted last in
/// its own transaction — only once every dependent batch has succeeded.
pub async fn execute(
    store: &dyn Store,
    plan: CascadePlan,
    batch_limit: usize,
) -> Result<usize, StoreError> {
    let total = plan.total_items();
    if total == 0 {
        return Ok(0);
    }

    if total <= batch_limit {
        let mut ops: Vec<TransactOp> = plan
            .dependent_deletes
            .iter()
            .map(|(pk, sk)| TransactOp::delete(pk.clone(), sk.clone()))
            .collect();
        if let Some((pk, sk)) = &plan.owner_delete {
            ops.push(TransactOp::delete(pk.clone(), sk.clone()));
        }
        store.transact(ops).await?;
        tracing::info!(items = total, batches = 1, "cascade committed in a single transaction");
        return Ok(total);
    }

    tracing::info!(
        items = total,
        batch_limit,
        "cascade exceeds transaction limit, splitting into batches"
    );

    let mut committed = 0;
    for chunk in plan.dependent_deletes.chunks(batch_limit) {
        let ops = chunk
            .iter()
            .map(|(pk, sk)| TransactOp::delete(pk.clone(), sk.clone()))
            .collect();
        store.transact(ops).await?;
        committed += chunk.len();
        tracing::info!(batch_items = chunk.len(), committed, total, "cascade batch committed");
    }

    if let Some((pk, sk)) = plan.owner_delete {
        store.transact(vec![TransactOp::delete(pk, sk)]).await?;
        committed += 1;
        tracing::info!(committed, total, "cascade owner row deleted");
    }

    Ok(committed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::memory_store::MemoryStore;
    use crate::rbac::store::{Item, PutCondition};

    async fn seed(store: &MemoryStore, n: usize) -> Vec<(String, String)> {
        let mut keys = Vec::new();
        for i in 0..n {
            let pk = format!("RESOURCE#api://x");
            let sk = format!("SCOPE#scope-{i}");
            store
                .put(Item::new(pk.clone(), sk.clone()), PutCondition::Any)
                .await
                .unwrap();
            keys.push((pk, sk));
        }
        keys
    }

    #[tokio::test]
    async fn single_transaction_when_under_limit() {
        let store = MemoryStore::new();
        let keys = seed(&store, 3).await;
        store
            .put(
                Item::new("RESOURCE#", "RESOURCE#api://x"),
                PutCondition::Any,
            )
            .await
            .unwrap();

        let mut plan = CascadePlan::with_owner("RESOURCE#", "RESOURCE#api://x");
        for (pk, sk) in keys {
            plan.push(pk, sk);
        }

        let deleted = execute(&store, plan, 100).await.unwrap();
        assert_eq!(deleted, 4);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn splits_into_batches_over_limit() {
        let store = MemoryStore::new();
        let keys = seed(&store, 5).await;
        store
            .put(
                Item::new("RESOURCE#", "RESOURCE#api://x"),
                PutCondition::Any,
            )
            .await
            .unwrap();

        let mut plan = CascadePlan::with_owner("RESOURCE#", "RESOURCE#api://x");
        for (pk, sk) in keys {
            plan.push(pk, sk);
        }

        assert_eq!(plan.batch_count(2), 3);
        let deleted = execute(&store, plan, 2).await.unwrap();
        assert_eq!(deleted, 6);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn empty_plan_is_a_no_op() {
        let store = MemoryStore::new();
        let deleted = execute(&store, CascadePlan::new(), 100).await.unwrap();
        assert_eq!(deleted, 0);
    }
}
