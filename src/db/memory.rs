// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory table store for tests and offline development.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::{Filter, Order, TableStore};
use crate::error::{AppError, Result};
use crate::time_utils::now_rfc3339;

/// Tables held as JSON rows, keyed by table name.
#[derive(Default)]
pub struct MemoryStore {
    tables: DashMap<String, Vec<Value>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map(|rows| rows.len()).unwrap_or(0)
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let Value::Object(mut map) = row else {
            return Err(AppError::Upstream(format!(
                "Insert into {} requires an object",
                table
            )));
        };

        let id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        map.insert("id".to_string(), Value::from(id));
        map.entry("created_at")
            .or_insert_with(|| Value::String(now_rfc3339()));

        let row = Value::Object(map);
        self.tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<Order>,
    ) -> Result<Vec<Value>> {
        let mut rows: Vec<Value> = self
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = order {
            rows.sort_by(|a, b| {
                let by_column = compare(a.get(order.column), b.get(order.column))
                    .then_with(|| compare(a.get("id"), b.get("id")));
                if order.descending {
                    by_column.reverse()
                } else {
                    by_column
                }
            });
        }

        Ok(rows)
    }

    async fn update(&self, table: &str, filter: &Filter, changes: Value) -> Result<Vec<Value>> {
        let Value::Object(changes) = changes else {
            return Err(AppError::Upstream(format!(
                "Update of {} requires an object",
                table
            )));
        };

        let Some(mut rows) = self.tables.get_mut(table) else {
            return Ok(Vec::new());
        };

        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|r| filter.matches(r)) {
            if let Value::Object(map) = row {
                for (key, value) in &changes {
                    map.insert(key.clone(), value.clone());
                }
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<Vec<Value>> {
        let Some(mut rows) = self.tables.get_mut(table) else {
            return Ok(Vec::new());
        };

        let (deleted, kept): (Vec<Value>, Vec<Value>) =
            rows.drain(..).partition(|r| filter.matches(r));
        *rows = kept;
        Ok(deleted)
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}
