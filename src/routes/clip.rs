// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Image/text similarity routes.

use crate::error::{AppError, Result};
use crate::inference::similarity::cosine_similarity;
use crate::middleware::auth::AuthUser;
use crate::models::ClipFields;
use crate::routes::{analysis, model_status, upload::read_image_form, StatusResponse};
use crate::services::Bucket;
use crate::AppState;
use axum::{
    extract::{Multipart, Query, State},
    routing::post,
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Form field (or query parameter) carrying the text.
const TEXT_FIELD: &str = "text";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/clip/similarity", post(similarity))
        .merge(analysis::routes::<ClipFields>("clip"))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    model_status("CLIP Image-Text Similarity", &state.models.clip).await
}

#[derive(Debug, Default, Deserialize)]
pub struct SimilarityQuery {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SimilarityResponse {
    pub success: bool,
    pub similarity_score: f64,
    pub text: String,
    pub filename: String,
    pub image_url: String,
    pub analysis_id: Option<i64>,
}

/// Score how well `text` describes the uploaded image.
///
/// The text comes from the `text` form field, falling back to `?text=`.
async fn similarity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Query(query), _): WithRejection<Query<SimilarityQuery>, AppError>,
    WithRejection(multipart, _): WithRejection<Multipart, AppError>,
) -> Result<Json<SimilarityResponse>> {
    let mut form = read_image_form(multipart).await?;
    let text = form
        .fields
        .remove(TEXT_FIELD)
        .or(query.text)
        .unwrap_or_default();
    let pipeline = state.models.clip.get().await?;

    let embeddings = pipeline.embed(form.image.clone(), &text).await?;
    let similarity_score = cosine_similarity(&embeddings)?;
    tracing::info!(user_id = %user.id(), similarity_score, "Similarity computed");

    let filename = form.filename_or_default();
    let object = state
        .storage
        .upload(
            Bucket::HEALTH_IMAGES,
            user.id(),
            form.filename.as_deref(),
            form.image,
        )
        .await?;

    let fields = ClipFields {
        image_url: object.url,
        text,
        similarity_score,
        filename,
    };
    let (analysis_id, _) = analysis::store_best_effort(&state, user.id(), &fields).await;

    Ok(Json(SimilarityResponse {
        success: true,
        similarity_score: fields.similarity_score,
        text: fields.text,
        filename: fields.filename,
        image_url: fields.image_url,
        analysis_id,
    }))
}
