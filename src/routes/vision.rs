// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Medical image description routes.

use crate::error::{AppError, Result};
use crate::inference::{round_to, ImageSource, Pipeline};
use crate::middleware::auth::AuthUser;
use crate::models::{VisionAnalysis, VisionFields};
use crate::routes::{analysis, model_status, upload::read_image_form, ApiResponse, StatusResponse};
use crate::services::Bucket;
use crate::AppState;
use axum::{
    extract::{Multipart, State},
    routing::post,
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use std::sync::Arc;
use std::time::Instant;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/vision/analyze", post(analyze))
        .merge(analysis::routes::<VisionFields>("vision"))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    model_status("Vision AI (Medical Image Description)", &state.models.vision).await
}

/// Describe an uploaded image and store the result.
async fn analyze(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    WithRejection(multipart, _): WithRejection<Multipart, AppError>,
) -> Result<Json<ApiResponse<VisionAnalysis>>> {
    let form = read_image_form(multipart).await?;
    let pipeline = state.models.vision.get().await?;

    let started = Instant::now();
    let description = pipeline
        .caption(ImageSource::Bytes(form.image.clone()))
        .await?;
    let processing_time = round_to(started.elapsed().as_secs_f64(), 2);
    tracing::info!(user_id = %user.id(), processing_time, "Image described");

    let object = state
        .storage
        .upload(
            Bucket::HEALTH_IMAGES,
            user.id(),
            form.filename.as_deref(),
            form.image,
        )
        .await?;

    let fields = VisionFields {
        image_url: object.url,
        ai_description: description,
        processing_time,
        model_name: pipeline.model_id().to_string(),
    };

    let analysis = state
        .db
        .create(user.id(), &fields)
        .await
        .map_err(|e| AppError::Upstream(format!("Failed to store analysis: {}", e)))?;

    Ok(Json(
        ApiResponse::data(analysis).with_message("Image analyzed successfully"),
    ))
}
