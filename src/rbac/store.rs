//! RBAC Store Adapter (spec.md §4.2) — a thin transactional wrapper over a
//! single-table KV database. Translates backend-specific errors into
//! [`StoreError`] so the repository never sees an AWS SDK type, the same
//! boundary discipline `store::postgres::PgStore` drew around `sqlx::Error`.

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ConditionCheck, Delete, Put, TransactWriteItem};
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// DynamoDB's hard cap on operations inside a single `TransactWriteItems` call.
pub const MAX_TRANSACT_ITEMS: usize = 100;

pub const PK_ATTR: &str = "pk";
pub const SK_ATTR: &str = "sk";
const CREATED_AT_ATTR: &str = "created_at";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub pk: String,
    pub sk: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Item {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
            created_at: Some(Utc::now()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutCondition {
    MustNotExist,
    MustExist,
    Any,
}

/// One operation inside a `Transact` call (spec.md §4.2).
#[derive(Debug, Clone)]
pub enum TransactOp {
    Put { item: Item, condition: PutCondition },
    Delete { pk: String, sk: String },
    ConditionCheck { pk: String, sk: String, must_exist: bool },
}

impl TransactOp {
    pub fn put(item: Item, condition: PutCondition) -> Self {
        TransactOp::Put { item, condition }
    }

    pub fn delete(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        TransactOp::Delete { pk: pk.into(), sk: sk.into() }
    }

    pub fn must_exist(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        TransactOp::ConditionCheck { pk: pk.into(), sk: sk.into(), must_exist: true }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("item already exists")]
    AlreadyExists,
    #[error("item not found")]
    NotFound,
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),
    #[error("transaction too large: {0} operations exceeds limit of {1}")]
    TransactionTooLarge(usize, usize),
    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, pk: &str, sk: &str) -> Result<Option<Item>, StoreError>;
    async fn put(&self, item: Item, condition: PutCondition) -> Result<(), StoreError>;
    async fn query(&self, pk: &str, sk_prefix: &str) -> Result<Vec<Item>, StoreError>;
    async fn transact(&self, ops: Vec<TransactOp>) -> Result<(), StoreError>;
}

/// DynamoDB-backed implementation. The table has a simple `(pk, sk)` primary
/// key and no secondary indexes — every query in this system is answered by
/// the dual-indexing the repository performs at write time (spec.md §4.1/§6).
pub struct DynamoStore {
    client: Client,
    table_name: String,
}

impl DynamoStore {
    pub async fn connect(table_name: impl Into<String>) -> anyhow::Result<Self> {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = Client::new(&config);
        Ok(Self { client, table_name: table_name.into() })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn item_to_attrs(item: &Item) -> HashMap<String, AttributeValue> {
        let mut attrs = HashMap::new();
        attrs.insert(PK_ATTR.to_string(), AttributeValue::S(item.pk.clone()));
        attrs.insert(SK_ATTR.to_string(), AttributeValue::S(item.sk.clone()));
        if let Some(created_at) = item.created_at {
            attrs.insert(
                CREATED_AT_ATTR.to_string(),
                AttributeValue::S(created_at.to_rfc3339()),
            );
        }
        attrs
    }

    fn attrs_to_item(attrs: &HashMap<String, AttributeValue>) -> anyhow::Result<Item> {
        let pk = attrs
            .get(PK_ATTR)
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| anyhow::anyhow!("item missing pk attribute"))?
            .clone();
        let sk = attrs
            .get(SK_ATTR)
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| anyhow::anyhow!("item missing sk attribute"))?
            .clone();
        let created_at = attrs
            .get(CREATED_AT_ATTR)
            .and_then(|v| v.as_s().ok())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Ok(Item { pk, sk, created_at })
    }

    fn condition_expression(condition: PutCondition) -> Option<&'static str> {
        match condition {
            PutCondition::MustNotExist => Some("attribute_not_exists(pk)"),
            PutCondition::MustExist => Some("attribute_exists(pk)"),
            PutCondition::Any => None,
        }
    }
}

#[async_trait]
impl Store for DynamoStore {
    async fn get(&self, pk: &str, sk: &str) -> Result<Option<Item>, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(PK_ATTR, AttributeValue::S(pk.to_string()))
            .key(SK_ATTR, AttributeValue::S(sk.to_string()))
            .send()
            .await
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("GetItem failed: {e}")))?;

        match output.item {
            Some(attrs) => Ok(Some(
                Self::attrs_to_item(&attrs).map_err(StoreError::Backend)?,
            )),
            None => Ok(None),
        }
    }

    async fn put(&self, item: Item, condition: PutCondition) -> Result<(), StoreError> {
        let mut req = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(Self::item_to_attrs(&item)));

        if let Some(expr) = Self::condition_expression(condition) {
            req = req.condition_expression(expr);
        }

        req.send().await.map_err(|e| {
            let service_err = e.into_service_error();
            if service_err.is_conditional_check_failed_exception() {
                match condition {
                    PutCondition::MustNotExist => StoreError::AlreadyExists,
                    _ => StoreError::NotFound,
                }
            } else {
                StoreError::Backend(anyhow::anyhow!("PutItem failed: {service_err}"))
            }
        })?;

        Ok(())
    }

    async fn query(&self, pk: &str, sk_prefix: &str) -> Result<Vec<Item>, StoreError> {
        let mut items = Vec::new();
        let mut exclusive_start_key = None;

        loop {
            let mut req = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("#pk = :pk AND begins_with(#sk, :skprefix)")
                .expression_attribute_names("#pk", PK_ATTR)
                .expression_attribute_names("#sk", SK_ATTR)
                .expression_attribute_values(":pk", AttributeValue::S(pk.to_string()))
                .expression_attribute_values(":skprefix", AttributeValue::S(sk_prefix.to_string()));

            if let Some(key) = exclusive_start_key.take() {
                req = req.set_exclusive_start_key(Some(key));
            }

            let output = req
                .send()
                .await
                .map_err(|e| StoreError::Backend(anyhow::anyhow!("Query failed: {e}")))?;

            for attrs in output.items.unwrap_or_default() {
                items.push(Self::attrs_to_item(&attrs).map_err(StoreError::Backend)?);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => exclusive_start_key = Some(key),
                _ => break,
            }
        }

        // Ordered by SI lexicographically (spec.md §4.2) — DynamoDB already
        // returns items sorted by sort key within a partition; this is kept
        // explicit so pagination across multiple Query pages never changes it.
        items.sort_by(|a, b| a.sk.cmp(&b.sk));
        Ok(items)
    }

    async fn transact(&self, ops: Vec<TransactOp>) -> Result<(), StoreError> {
        if ops.len() > MAX_TRANSACT_ITEMS {
            return Err(StoreError::TransactionTooLarge(ops.len(), MAX_TRANSACT_ITEMS));
        }
        if ops.is_empty() {
            return Ok(());
        }

        let mut transact_items = Vec::with_capacity(ops.len());
        for op in ops {
            let item = match op {
                TransactOp::Put { item, condition } => {
                    let mut builder = Put::builder()
                        .table_name(&self.table_name)
                        .set_item(Some(Self::item_to_attrs(&item)));
                    if let Some(expr) = Self::condition_expression(condition) {
                        builder = builder.condition_expression(expr);
                    }
                    TransactWriteItem::builder()
                        .put(builder.build().map_err(|e| {
                            StoreError::Backend(anyhow::anyhow!("invalid Put item: {e}"))
                        })?)
                        .build()
                }
                TransactOp::Delete { pk, sk } => TransactWriteItem::builder()
                    .delete(
                        Delete::builder()
                            .table_name(&self.table_name)
                            .key(PK_ATTR, AttributeValue::S(pk))
                            .key(SK_ATTR, AttributeValue::S(sk))
                            .build()
                            .map_err(|e| {
                                StoreError::Backend(anyhow::anyhow!("invalid Delete key: {e}"))
                            })?,
                    )
                    .build(),
                TransactOp::ConditionCheck { pk, sk, must_exist } => {
                    let expr = if must_exist {
                        "attribute_exists(pk)"
                    } else {
                        "attribute_not_exists(pk)"
                    };
                    TransactWriteItem::builder()
                        .condition_check(
                            ConditionCheck::builder()
                                .table_name(&self.table_name)
                                .key(PK_ATTR, AttributeValue::S(pk))
                                .key(SK_ATTR, AttributeValue::S(sk))
                                .condition_expression(expr)
                                .build()
                                .map_err(|e| {
                                    StoreError::Backend(anyhow::anyhow!(
                                        "invalid ConditionCheck: {e}"
                                    ))
                                })?,
                        )
                        .build()
                }
            };
            transact_items.push(item);
        }

        self.client
            .transact_write_items()
            .set_transact_items(Some(transact_items))
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_transaction_canceled_exception() {
                    StoreError::TransactionAborted(service_err.to_string())
                } else {
                    StoreError::Backend(anyhow::anyhow!("TransactWriteItems failed: {service_err}"))
                }
            })?;

        Ok(())
    }
}
