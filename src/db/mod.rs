//! Database layer (Supabase tables via PostgREST).
//!
//! `TableStore` is the row-level seam: JSON rows in, JSON rows out, always
//! scoped by an owner filter. `Db` is the typed layer the routes use.

pub mod memory;
pub mod postgrest;

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;

use crate::error::{AppError, Result};
use crate::models::StoredRow;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Table names as constants.
pub mod tables {
    pub const HEALTH_RECORDS: &str = "health_records";
    pub const VISION_ANALYSES: &str = "vision_analysis";
    pub const PNEUMONIA_ANALYSES: &str = "pneumonia_analyses";
    pub const MNIST_ANALYSES: &str = "mnist_analyses";
    pub const CLIP_ANALYSES: &str = "clip_analyses";
    pub const CAPTION_ANALYSES: &str = "autoglm_analyses";
}

/// Owner column present on every table.
pub const OWNER_COLUMN: &str = "user_id";

/// Equality filter over row columns.
///
/// Only constructible from an owner id, so no query can escape the
/// owner scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    conditions: Vec<(&'static str, String)>,
}

impl Filter {
    /// Rows owned by `owner`.
    pub fn owned_by(owner: &str) -> Self {
        Self {
            conditions: vec![(OWNER_COLUMN, owner.to_string())],
        }
    }

    /// Narrow to a single row id.
    pub fn with_id(mut self, id: i64) -> Self {
        self.conditions.push(("id", id.to_string()));
        self
    }

    pub fn conditions(&self) -> &[(&'static str, String)] {
        &self.conditions
    }

    /// Whether a JSON row satisfies every condition.
    pub fn matches(&self, row: &Value) -> bool {
        self.conditions.iter().all(|(column, expected)| {
            match row.get(*column) {
                Some(Value::String(s)) => s == expected,
                Some(Value::Number(n)) => n.to_string() == *expected,
                Some(Value::Bool(b)) => b.to_string() == *expected,
                _ => false,
            }
        })
    }
}

/// Sort order for `select`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: &'static str,
    pub descending: bool,
}

impl Order {
    pub fn desc(column: &'static str) -> Self {
        Self {
            column,
            descending: true,
        }
    }
}

/// Row-level access to the external relational data API.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Insert one row, returning it with server-assigned columns.
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    async fn select(&self, table: &str, filter: &Filter, order: Option<Order>)
        -> Result<Vec<Value>>;

    /// Apply `changes` to matching rows, returning the updated rows.
    async fn update(&self, table: &str, filter: &Filter, changes: Value) -> Result<Vec<Value>>;

    /// Delete matching rows, returning the deleted rows.
    async fn delete(&self, table: &str, filter: &Filter) -> Result<Vec<Value>>;
}

/// Feature-specific fields of an owner-scoped table.
pub trait OwnedRow: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TABLE: &'static str;
    /// Listing order column (always descending)
    const ORDER_BY: &'static str;
    /// Human-readable name used in messages
    const LABEL: &'static str;
}

/// Rows that may be edited after creation.
pub trait MutableRow: OwnedRow {}

#[derive(Serialize)]
struct OwnedInsert<'a, F> {
    user_id: &'a str,
    #[serde(flatten)]
    fields: &'a F,
}

/// Typed, owner-scoped operations over a `TableStore`.
#[derive(Clone)]
pub struct Db {
    store: Arc<dyn TableStore>,
}

impl Db {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    /// Insert a row for `owner`.
    pub async fn create<F: OwnedRow>(&self, owner: &str, fields: &F) -> Result<StoredRow<F>> {
        let row = to_json(&OwnedInsert {
            user_id: owner,
            fields,
        })?;
        let inserted = self.store.insert(F::TABLE, row).await?;
        from_json(inserted)
    }

    /// All rows for `owner`, newest first by the table's ordering column.
    pub async fn list<F: OwnedRow>(&self, owner: &str) -> Result<Vec<StoredRow<F>>> {
        self.store
            .select(
                F::TABLE,
                &Filter::owned_by(owner),
                Some(Order::desc(F::ORDER_BY)),
            )
            .await?
            .into_iter()
            .map(from_json)
            .collect()
    }

    /// One row by id; `None` when absent or owned by someone else.
    pub async fn get<F: OwnedRow>(&self, owner: &str, id: i64) -> Result<Option<StoredRow<F>>> {
        self.store
            .select(F::TABLE, &Filter::owned_by(owner).with_id(id), None)
            .await?
            .into_iter()
            .next()
            .map(from_json)
            .transpose()
    }

    /// Replace the editable fields of one row; `None` when nothing matched.
    pub async fn update<F: MutableRow>(
        &self,
        owner: &str,
        id: i64,
        fields: &F,
    ) -> Result<Option<StoredRow<F>>> {
        let changes = to_json(fields)?;
        self.store
            .update(F::TABLE, &Filter::owned_by(owner).with_id(id), changes)
            .await?
            .into_iter()
            .next()
            .map(from_json)
            .transpose()
    }

    /// Delete one row; `false` when nothing matched.
    pub async fn delete<F: OwnedRow>(&self, owner: &str, id: i64) -> Result<bool> {
        let deleted = self
            .store
            .delete(F::TABLE, &Filter::owned_by(owner).with_id(id))
            .await?;
        Ok(!deleted.is_empty())
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode row: {}", e)))
}

fn from_json<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| AppError::Upstream(format!("Unexpected row shape: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_matches_strings_and_numbers() {
        let row = json!({"id": 42, "user_id": "owner-a", "title": "x"});

        assert!(Filter::owned_by("owner-a").matches(&row));
        assert!(Filter::owned_by("owner-a").with_id(42).matches(&row));
        assert!(!Filter::owned_by("owner-a").with_id(7).matches(&row));
        assert!(!Filter::owned_by("owner-b").with_id(42).matches(&row));
    }

    #[test]
    fn test_filter_rejects_rows_without_owner() {
        let row = json!({"id": 42});
        assert!(!Filter::owned_by("owner-a").matches(&row));
    }

    #[test]
    fn test_owned_insert_carries_owner_and_fields() {
        #[derive(Serialize)]
        struct Fields {
            title: &'static str,
        }

        let row = to_json(&OwnedInsert {
            user_id: "owner-a",
            fields: &Fields { title: "t" },
        })
        .unwrap();

        assert_eq!(row, json!({"user_id": "owner-a", "title": "t"}));
    }
}
