//! In-memory [`Store`] fake used by tests. Stands in for the real DynamoDB
//! backend the way `wiremock` stands in for a real HTTP upstream elsewhere
//! in this codebase's test suite — there is no local DynamoDB emulator
//! dependency here, so a trait-object fake plays the same role.

use super::store::{Item, PutCondition, Store, StoreError, TransactOp, MAX_TRANSACT_ITEMS};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

type Key = (String, String);

#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<BTreeMap<Key, Item>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total item count — used by cascade tests to assert full cleanup (P3).
    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All items whose pk or sk contains `needle` — used to assert P3
    /// ("zero items reference r after Resource.Delete").
    pub fn items_referencing(&self, needle: &str) -> Vec<Item> {
        self.items
            .lock()
            .unwrap()
            .values()
            .filter(|item| item.pk.contains(needle) || item.sk.contains(needle))
            .cloned()
            .collect()
    }

    fn check_condition(existing: Option<&Item>, condition: PutCondition) -> Result<(), StoreError> {
        match condition {
            PutCondition::MustNotExist if existing.is_some() => Err(StoreError::AlreadyExists),
            PutCondition::MustExist if existing.is_none() => Err(StoreError::NotFound),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, pk: &str, sk: &str) -> Result<Option<Item>, StoreError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .get(&(pk.to_string(), sk.to_string()))
            .cloned())
    }

    async fn put(&self, item: Item, condition: PutCondition) -> Result<(), StoreError> {
        let mut items = self.items.lock().unwrap();
        let key = (item.pk.clone(), item.sk.clone());
        Self::check_condition(items.get(&key), condition)?;
        items.insert(key, item);
        Ok(())
    }

    async fn query(&self, pk: &str, sk_prefix: &str) -> Result<Vec<Item>, StoreError> {
        let items = self.items.lock().unwrap();
        Ok(items
            .iter()
            .filter(|((item_pk, item_sk), _)| item_pk == pk && item_sk.starts_with(sk_prefix))
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn transact(&self, ops: Vec<TransactOp>) -> Result<(), StoreError> {
        if ops.len() > MAX_TRANSACT_ITEMS {
            return Err(StoreError::TransactionTooLarge(ops.len(), MAX_TRANSACT_ITEMS));
        }

        let mut items = self.items.lock().unwrap();

        // Validate every condition against the pre-transaction state first —
        // all-or-nothing, mirroring TransactWriteItems semantics.
        for op in &ops {
            match op {
                TransactOp::Put { item, condition } => {
                    let key = (item.pk.clone(), item.sk.clone());
                    Self::check_condition(items.get(&key), *condition)
                        .map_err(|e| StoreError::TransactionAborted(e.to_string()))?;
                }
                TransactOp::ConditionCheck { pk, sk, must_exist } => {
                    let key = (pk.clone(), sk.clone());
                    let exists = items.contains_key(&key);
                    if exists != *must_exist {
                        return Err(StoreError::TransactionAborted(format!(
                            "condition check failed for {:?}",
                            key
                        )));
                    }
                }
                TransactOp::Delete { .. } => {}
            }
        }

        for op in ops {
            match op {
                TransactOp::Put { item, .. } => {
                    items.insert((item.pk.clone(), item.sk.clone()), item);
                }
                TransactOp::Delete { pk, sk } => {
                    items.remove(&(pk, sk));
                }
                TransactOp::ConditionCheck { .. } => {}
            }
        }

        Ok(())
    }
}
