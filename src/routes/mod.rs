// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod analysis;
pub mod auth;
pub mod autoglm;
pub mod clip;
pub mod mnist;
pub mod pneumonia;
pub mod records;
pub mod upload;
pub mod vision;

use crate::inference::{ModelSlot, ModelStatus, Pipeline};
use crate::middleware::auth::require_auth;
use crate::AppState;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue, Method};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Response envelope shared by the JSON routes.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            count: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            count: None,
        }
    }
}

impl<T> ApiResponse<Vec<T>> {
    pub fn list(items: Vec<T>) -> Self {
        Self {
            success: true,
            message: None,
            count: Some(items.len()),
            data: Some(items),
        }
    }
}

/// Body of the per-model status routes.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StatusResponse {
    pub success: bool,
    /// Display name of the feature
    pub model: &'static str,
    pub status: ModelStatus,
}

pub(crate) async fn model_status<P: Pipeline + ?Sized>(
    name: &'static str,
    slot: &ModelSlot<P>,
) -> Json<StatusResponse> {
    Json(StatusResponse {
        success: true,
        model: name,
        status: slot.status().await,
    })
}

/// Service description and model states
async fn root(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "message": "Newjilo API with Vision AI and Pneumonia Detection",
        "version": env!("CARGO_PKG_VERSION"),
        "models": state.models.statuses().await,
        "endpoints": {
            "auth": {
                "signup": "POST /api/auth/signup",
                "login": "POST /api/auth/login",
                "logout": "POST /api/auth/logout",
                "user": "GET /api/auth/user"
            },
            "records": {
                "create": "POST /api/records",
                "list": "GET /api/records",
                "get": "GET /api/records/{id}",
                "update": "PUT /api/records/{id}",
                "delete": "DELETE /api/records/{id}"
            },
            "vision": {
                "analyze": "POST /api/vision/analyze",
                "history": "GET /api/vision/history",
                "status": "GET /api/vision/status"
            },
            "pneumonia": {
                "analyze": "POST /api/pneumonia/analyze",
                "history": "GET /api/pneumonia/history",
                "status": "GET /api/pneumonia/status"
            },
            "mnist": {
                "infer": "POST /api/mnist/infer",
                "history": "GET /api/mnist/history",
                "status": "GET /api/mnist/status"
            },
            "clip": {
                "similarity": "POST /api/clip/similarity",
                "history": "GET /api/clip/history",
                "status": "GET /api/clip/status"
            },
            "autoglm": {
                "infer": "POST /api/autoglm/infer",
                "history": "GET /api/autoglm/history",
                "status": "GET /api/autoglm/status"
            }
        }
    }))
}

/// Health check response
async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "models": state.models.statuses().await,
    }))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    if allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(auth::public_routes())
        .route("/api/vision/status", get(vision::status))
        .route("/api/pneumonia/status", get(pneumonia::status))
        .route("/api/mnist/status", get(mnist::status))
        .route("/api/clip/status", get(clip::status))
        .route("/api/autoglm/status", get(autoglm::status));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .merge(auth::routes())
        .merge(records::routes())
        .merge(vision::routes())
        .merge(pneumonia::routes())
        .merge(mnist::routes())
        .merge(clip::routes())
        .merge(autoglm::routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
