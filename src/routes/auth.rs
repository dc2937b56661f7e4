// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication routes (credential pass-through to the identity provider).

use axum::{extract::State, routing::get, routing::post, Extension, Json, Router};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{AuthSession, UserIdentity};
use crate::routes::ApiResponse;
use crate::services::AuthError;
use crate::AppState;

/// Sign-up and login.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
}

/// Logout and current user (require authentication).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/user", get(current_user))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

async fn signup(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(body), _): WithRejection<Json<SignUpRequest>, AppError>,
) -> Result<Json<ApiResponse<AuthSession>>> {
    body.validate()?;

    let session = state
        .identity
        .sign_up(&body.email, &body.password, &body.full_name)
        .await
        .map_err(|e| match e {
            // A refused sign-up is a bad request, not an auth failure
            AuthError::Rejected(msg) => AppError::Upstream(msg),
            other => other.into(),
        })?;

    Ok(Json(
        ApiResponse::data(session).with_message("User created successfully"),
    ))
}

async fn login(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(body), _): WithRejection<Json<SignInRequest>, AppError>,
) -> Result<Json<ApiResponse<AuthSession>>> {
    body.validate()?;

    let session = state.identity.sign_in(&body.email, &body.password).await?;
    tracing::info!(user_id = %session.user.id, "User logged in");

    Ok(Json(
        ApiResponse::data(session).with_message("Logged in successfully"),
    ))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<()>>> {
    state
        .identity
        .sign_out(&user.access_token)
        .await
        .map_err(|e| match e {
            AuthError::Rejected(msg) | AuthError::Provider(msg) => AppError::Upstream(msg),
            AuthError::InvalidToken => AppError::Upstream(e.to_string()),
        })?;

    tracing::info!(user_id = %user.id(), "User logged out");
    Ok(Json(ApiResponse::message("Logged out successfully")))
}

async fn current_user(Extension(user): Extension<AuthUser>) -> Json<ApiResponse<UserIdentity>> {
    Json(ApiResponse::data(user.user))
}
