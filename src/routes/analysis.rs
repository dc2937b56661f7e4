// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! History, lookup and deletion routes shared by every analysis kind.

use crate::db::OwnedRow;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::StoredRow;
use crate::routes::ApiResponse;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use std::sync::Arc;

/// `GET /api/{feature}/history` and `GET|DELETE /api/{feature}/analyze/{id}`.
pub fn routes<F: OwnedRow>(feature: &str) -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("/api/{}/history", feature), get(list_analyses::<F>))
        .route(
            &format!("/api/{}/analyze/{{id}}", feature),
            get(get_analysis::<F>).delete(delete_analysis::<F>),
        )
}

/// All of the caller's analyses, newest first.
pub async fn list_analyses<F: OwnedRow>(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<StoredRow<F>>>>> {
    let rows = state.db.list::<F>(user.id()).await?;
    Ok(Json(ApiResponse::list(rows)))
}

pub async fn get_analysis<F: OwnedRow>(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> Result<Json<ApiResponse<StoredRow<F>>>> {
    let row = state
        .db
        .get::<F>(user.id(), id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} not found", F::LABEL)))?;
    Ok(Json(ApiResponse::data(row)))
}

pub async fn delete_analysis<F: OwnedRow>(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> Result<Json<ApiResponse<()>>> {
    if !state.db.delete::<F>(user.id(), id).await? {
        return Err(AppError::NotFound(format!("{} not found", F::LABEL)));
    }

    tracing::info!(user_id = %user.id(), id, table = F::TABLE, "Analysis deleted");
    Ok(Json(ApiResponse::message(format!(
        "{} deleted successfully",
        F::LABEL
    ))))
}

/// Insert an analysis row, logging instead of failing the request.
///
/// Returns the new row's id and timestamp when the insert succeeded.
pub async fn store_best_effort<F: OwnedRow>(
    state: &AppState,
    owner: &str,
    fields: &F,
) -> (Option<i64>, Option<String>) {
    match state.db.create(owner, fields).await {
        Ok(row) => {
            tracing::info!(user_id = %owner, id = row.id, table = F::TABLE, "Analysis stored");
            (Some(row.id), row.created_at)
        }
        Err(e) => {
            tracing::warn!(user_id = %owner, table = F::TABLE, error = %e, "Failed to store analysis");
            (None, None)
        }
    }
}
