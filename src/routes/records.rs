// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Health record CRUD routes.

use crate::db::OwnedRow;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{HealthRecord, RecordFields};
use crate::routes::ApiResponse;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/records", get(list_records).post(create_record))
        .route(
            "/api/records/{id}",
            get(get_record).put(update_record).delete(delete_record),
        )
}

fn not_found() -> AppError {
    AppError::NotFound(format!("{} not found", RecordFields::LABEL))
}

async fn create_record(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Json(fields), _): WithRejection<Json<RecordFields>, AppError>,
) -> Result<Json<ApiResponse<HealthRecord>>> {
    fields.validate()?;

    let record = state.db.create(user.id(), &fields).await?;
    tracing::info!(user_id = %user.id(), id = record.id, "Health record created");

    Ok(Json(
        ApiResponse::data(record).with_message("Health record created successfully"),
    ))
}

/// The caller's records, most recent date first.
async fn list_records(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<HealthRecord>>>> {
    let records = state.db.list::<RecordFields>(user.id()).await?;
    Ok(Json(ApiResponse::list(records)))
}

async fn get_record(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> Result<Json<ApiResponse<HealthRecord>>> {
    let record = state
        .db
        .get::<RecordFields>(user.id(), id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(ApiResponse::data(record)))
}

async fn update_record(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Json(fields), _): WithRejection<Json<RecordFields>, AppError>,
) -> Result<Json<ApiResponse<HealthRecord>>> {
    fields.validate()?;

    let record = state
        .db
        .update(user.id(), id, &fields)
        .await?
        .ok_or_else(not_found)?;
    tracing::info!(user_id = %user.id(), id, "Health record updated");

    Ok(Json(
        ApiResponse::data(record).with_message("Health record updated successfully"),
    ))
}

async fn delete_record(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> Result<Json<ApiResponse<()>>> {
    if !state.db.delete::<RecordFields>(user.id(), id).await? {
        return Err(not_found());
    }

    tracing::info!(user_id = %user.id(), id, "Health record deleted");
    Ok(Json(ApiResponse::message("Health record deleted successfully")))
}
