// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chest X-ray pneumonia detection routes.

use crate::error::{AppError, Result};
use crate::inference::{pneumonia, round_to, Pipeline};
use crate::middleware::auth::AuthUser;
use crate::models::PneumoniaFields;
use crate::routes::{analysis, model_status, upload::read_image_form, ApiResponse, StatusResponse};
use crate::services::Bucket;
use crate::AppState;
use axum::{
    extract::{Multipart, State},
    routing::post,
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/pneumonia/analyze", post(analyze))
        .merge(analysis::routes::<PneumoniaFields>("pneumonia"))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    model_status("Pneumonia Detection (Chest X-ray)", &state.models.pneumonia).await
}

/// Classification as returned to the client.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Classification {
    #[serde(flatten)]
    pub result: pneumonia::XrayClassification,
    pub processing_time: f64,
    pub model: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct XrayAnalysisResponse {
    pub image_url: String,
    pub classification: Classification,
    /// `None` when the result could not be stored
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub analysis_id: Option<i64>,
    pub created_at: Option<String>,
}

/// Classify an uploaded chest X-ray.
async fn analyze(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    WithRejection(multipart, _): WithRejection<Multipart, AppError>,
) -> Result<Json<ApiResponse<XrayAnalysisResponse>>> {
    let form = read_image_form(multipart).await?;
    let pipeline = state.models.pneumonia.get().await?;

    let started = Instant::now();
    let scores = pipeline.classify(form.image.clone()).await?;
    let result = pneumonia::classify(scores)?;
    let processing_time = round_to(started.elapsed().as_secs_f64(), 2);
    tracing::info!(
        user_id = %user.id(),
        prediction = %result.prediction,
        confidence = result.confidence,
        processing_time,
        "Chest X-ray classified"
    );

    let object = state
        .storage
        .upload(
            Bucket::PNEUMONIA_IMAGES,
            user.id(),
            form.filename.as_deref(),
            form.image,
        )
        .await?;

    let fields = PneumoniaFields {
        image_url: object.url.clone(),
        prediction: result.prediction.clone(),
        confidence: result.confidence,
        confidence_percentage: result.confidence_percentage,
        is_pneumonia: result.is_pneumonia,
        severity: result.severity.clone(),
        recommendation: result.recommendation.clone(),
        all_predictions: result.all_predictions.clone(),
        processing_time,
        model_name: pipeline.model_id().to_string(),
    };
    let (analysis_id, created_at) = analysis::store_best_effort(&state, user.id(), &fields).await;

    Ok(Json(
        ApiResponse::data(XrayAnalysisResponse {
            image_url: object.url,
            classification: Classification {
                result,
                processing_time,
                model: fields.model_name,
            },
            analysis_id,
            created_at,
        })
        .with_message("Chest X-ray analyzed successfully"),
    ))
}
