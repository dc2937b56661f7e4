// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Handwritten digit recognition routes.

use crate::error::{AppError, Result};
use crate::inference::digit;
use crate::middleware::auth::AuthUser;
use crate::models::DigitFields;
use crate::routes::{analysis, model_status, upload::read_image_form, StatusResponse};
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

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/mnist/infer", post(infer))
        .merge(analysis::routes::<DigitFields>("mnist"))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    model_status("MNIST Digit Classifier", &state.models.digits).await
}

#[derive(Debug, Serialize)]
pub struct DigitResponse {
    pub success: bool,
    pub prediction: u8,
    pub probabilities: Vec<f64>,
    pub image_url: String,
    pub analysis_id: Option<i64>,
}

/// Recognise the digit in an uploaded 28x28 grayscale image.
async fn infer(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    WithRejection(multipart, _): WithRejection<Multipart, AppError>,
) -> Result<Json<DigitResponse>> {
    let form = read_image_form(multipart).await?;
    let pipeline = state.models.digits.get().await?;

    let logits = pipeline.logits(form.image.clone()).await?;
    let result = digit::predict(&logits)?;
    tracing::info!(user_id = %user.id(), prediction = result.prediction, "Digit recognised");

    let filename = form.filename_or_default();
    let object = state
        .storage
        .upload(
            Bucket::MNIST_IMAGES,
            user.id(),
            form.filename.as_deref(),
            form.image,
        )
        .await?;

    let fields = DigitFields {
        image_url: object.url,
        prediction: result.prediction,
        probabilities: result.probabilities,
        filename,
    };
    let (analysis_id, _) = analysis::store_best_effort(&state, user.id(), &fields).await;

    Ok(Json(DigitResponse {
        success: true,
        prediction: fields.prediction,
        probabilities: fields.probabilities,
        image_url: fields.image_url,
        analysis_id,
    }))
}
