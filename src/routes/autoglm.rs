// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Caption-from-URL routes.

use crate::error::{AppError, Result};
use crate::inference::ImageSource;
use crate::middleware::auth::AuthUser;
use crate::models::CaptionFields;
use crate::routes::{analysis, model_status, StatusResponse};
use crate::AppState;
use axum::{extract::State, routing::post, Extension, Json, Router};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/autoglm/infer", post(infer))
        .merge(analysis::routes::<CaptionFields>("autoglm"))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    model_status("Image Captioning (BLIP)", &state.models.captioner).await
}

#[derive(Debug, Deserialize, Validate)]
pub struct CaptionRequest {
    #[validate(url(message = "image_url must be a valid URL"))]
    pub image_url: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CaptionResponse {
    pub success: bool,
    pub caption: String,
    pub image_url: String,
    pub analysis_id: Option<i64>,
}

/// Caption the image at `image_url`.
async fn infer(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Json(body), _): WithRejection<Json<CaptionRequest>, AppError>,
) -> Result<Json<CaptionResponse>> {
    body.validate()?;
    let pipeline = state.models.captioner.get().await?;

    let caption = pipeline
        .caption(ImageSource::Url(body.image_url.clone()))
        .await?;
    tracing::info!(user_id = %user.id(), "Image captioned");

    let fields = CaptionFields {
        image_url: body.image_url,
        caption,
        description: body.description,
    };
    let (analysis_id, _) = analysis::store_best_effort(&state, user.id(), &fields).await;

    Ok(Json(CaptionResponse {
        success: true,
        caption: fields.caption,
        image_url: fields.image_url,
        analysis_id,
    }))
}
