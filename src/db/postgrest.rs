// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PostgREST client for the Supabase table API.
//!
//! Uses the service role key; ownership is enforced by the `Filter` every
//! call carries rather than by row level security.

use async_trait::async_trait;
use serde_json::Value;

use super::{Filter, Order, TableStore};
use crate::error::{AppError, Result};

/// Table client over `{supabase_url}/rest/v1`.
#[derive(Clone)]
pub struct PostgrestStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PostgrestStore {
    pub fn new(supabase_url: &str, service_role_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{}/rest/v1", supabase_url.trim_end_matches('/')),
            api_key: service_role_key.to_string(),
        }
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.base_url, table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
    }

    /// Check response status and parse the returned rows.
    async fn rows(&self, table: &str, response: reqwest::Response) -> Result<Vec<Value>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Table {} request failed (HTTP {}): {}",
                table,
                status,
                postgrest_message(&body)
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Table {} returned invalid JSON: {}", table, e)))
    }
}

#[async_trait]
impl TableStore for PostgrestStore {
    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let response = self
            .request(reqwest::Method::POST, table)
            .json(&row)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Table {} unreachable: {}", table, e)))?;

        self.rows(table, response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Upstream(format!("Insert into {} returned no data", table)))
    }

    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<Order>,
    ) -> Result<Vec<Value>> {
        let mut query = filter_query(filter);
        query.push(("select".to_string(), "*".to_string()));
        if let Some(order) = order {
            query.push(("order".to_string(), order_param(order)));
        }

        let response = self
            .request(reqwest::Method::GET, table)
            .query(&query)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Table {} unreachable: {}", table, e)))?;

        self.rows(table, response).await
    }

    async fn update(&self, table: &str, filter: &Filter, changes: Value) -> Result<Vec<Value>> {
        let response = self
            .request(reqwest::Method::PATCH, table)
            .query(&filter_query(filter))
            .json(&changes)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Table {} unreachable: {}", table, e)))?;

        self.rows(table, response).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<Vec<Value>> {
        let response = self
            .request(reqwest::Method::DELETE, table)
            .query(&filter_query(filter))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Table {} unreachable: {}", table, e)))?;

        self.rows(table, response).await
    }
}

/// `column=eq.value` pairs for each filter condition.
fn filter_query(filter: &Filter) -> Vec<(String, String)> {
    filter
        .conditions()
        .iter()
        .map(|(column, value)| (column.to_string(), format!("eq.{}", value)))
        .collect()
}

/// Descending order with `id` as tie-breaker.
fn order_param(order: Order) -> String {
    let direction = if order.descending { "desc" } else { "asc" };
    if order.column == "id" {
        format!("id.{}", direction)
    } else {
        format!("{}.{},id.{}", order.column, direction, direction)
    }
}

/// Pull `message` out of a PostgREST error body when there is one.
fn postgrest_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
