// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local verification of Supabase access tokens.
//!
//! With a JWT secret configured, protected routes accept signed tokens
//! without calling the auth service.

use axum::http::{Method, StatusCode};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use newjilo_api::config::Config;
use newjilo_api::db::{Db, MemoryStore};
use newjilo_api::routes::create_router;
use newjilo_api::services::{MemoryObjectStore, StorageService, SupabaseAuth};
use newjilo_api::AppState;
use serde_json::{json, Value};
use std::sync::Arc;

mod common;

use common::{body_json, json_request, models, send, ModelsState};

const SECRET: &[u8] = b"test-jwt-secret-with-at-least-32-characters";

async fn jwt_app() -> axum::Router {
    let mut config = Config::test_default();
    config.supabase_jwt_secret = Some(SECRET.to_vec());

    // Nothing listens here; verification must stay local
    let identity = SupabaseAuth::new(
        "http://127.0.0.1:9",
        &config.supabase_anon_key,
        config.supabase_jwt_secret.as_deref(),
    );

    let state = Arc::new(AppState {
        identity: Arc::new(identity),
        db: Db::new(Arc::new(MemoryStore::new())),
        storage: StorageService::new(Arc::new(MemoryObjectStore::new(&config.supabase_url))),
        models: models(ModelsState::Ready).await,
        config,
    });
    create_router(state)
}

fn token(claims: Value, secret: &[u8]) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .unwrap()
}

fn claims(aud: &str, exp_offset: i64) -> Value {
    json!({
        "sub": "7d0c1a8e-0000-4000-8000-000000000001",
        "email": "jwt@example.com",
        "aud": aud,
        "role": "authenticated",
        "exp": chrono::Utc::now().timestamp() + exp_offset,
        "user_metadata": {"full_name": "Jay Dub"}
    })
}

#[tokio::test]
async fn test_valid_token_is_accepted() {
    let app = jwt_app().await;
    let token = token(claims("authenticated", 3600), SECRET);

    let response = send(
        &app,
        json_request(Method::GET, "/api/auth/user", Some(&token), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["id"], "7d0c1a8e-0000-4000-8000-000000000001");
    assert_eq!(body["data"]["email"], "jwt@example.com");
    assert_eq!(body["data"]["full_name"], "Jay Dub");
}

#[tokio::test]
async fn test_token_subject_scopes_records() {
    let app = jwt_app().await;
    let token = token(claims("authenticated", 3600), SECRET);

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/api/records",
            Some(&token),
            Some(json!({
                "title": "Checkup",
                "description": "",
                "category": "visit",
                "date": "2025-05-01"
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["user_id"], "7d0c1a8e-0000-4000-8000-000000000001");
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = jwt_app().await;
    let token = token(claims("authenticated", -3600), SECRET);

    let response = send(
        &app,
        json_request(Method::GET, "/api/auth/user", Some(&token), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "invalid_token");
}

#[tokio::test]
async fn test_wrong_audience_is_rejected() {
    let app = jwt_app().await;
    let token = token(claims("anon", 3600), SECRET);

    let response = send(
        &app,
        json_request(Method::GET, "/api/auth/user", Some(&token), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_secret_is_rejected() {
    let app = jwt_app().await;
    let token = token(
        claims("authenticated", 3600),
        b"some-other-secret-that-is-also-long-enough",
    );

    let response = send(
        &app,
        json_request(Method::GET, "/api/records", Some(&token), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
