// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Health record CRUD and ownership tests.

use axum::http::{Method, StatusCode};
use axum::routing::patch;
use newjilo_api::config::Config;
use newjilo_api::db::PostgrestStore;
use serde_json::{json, Value};
use std::sync::Arc;

mod common;

use common::{
    body_json, build_app, create_test_app, json_request, models, send, signup, spawn_server,
    ModelsState,
};

fn record(title: &str, date: &str) -> Value {
    json!({
        "title": title,
        "description": "Fasting blood panel",
        "category": "lab",
        "date": date,
    })
}

async fn create(app: &axum::Router, token: &str, body: Value) -> Value {
    let response = send(
        app,
        json_request(Method::POST, "/api/records", Some(token), Some(body)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn test_create_then_get_returns_same_fields() {
    let test = create_test_app().await;
    let (token, user_id) = signup(&test.app, "ann@example.com").await;

    let created = create(&test.app, &token, record("Blood test", "2025-02-01")).await;
    assert_eq!(created["message"], "Health record created successfully");
    let id = created["data"]["id"].as_i64().unwrap();
    assert!(created["data"]["created_at"].is_string());

    let response = send(
        &test.app,
        json_request(Method::GET, &format!("/api/records/{}", id), Some(&token), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let fetched = body_json(response).await;
    assert_eq!(fetched["data"], created["data"]);
    assert_eq!(fetched["data"]["user_id"], user_id.as_str());
    assert_eq!(fetched["data"]["title"], "Blood test");
}

#[tokio::test]
async fn test_list_is_scoped_and_ordered_by_date() {
    let test = create_test_app().await;
    let (ann, _) = signup(&test.app, "ann@example.com").await;
    let (bob, _) = signup(&test.app, "bob@example.com").await;

    create(&test.app, &ann, record("January", "2025-01-15")).await;
    create(&test.app, &ann, record("March", "2025-03-15")).await;
    create(&test.app, &ann, record("February", "2025-02-15")).await;
    create(&test.app, &bob, record("Bob's", "2025-04-01")).await;

    let response = send(
        &test.app,
        json_request(Method::GET, "/api/records", Some(&ann), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["count"], 3);
    let titles: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["March", "February", "January"]);
}

#[tokio::test]
async fn test_other_owner_gets_not_found() {
    let test = create_test_app().await;
    let (ann, _) = signup(&test.app, "ann@example.com").await;
    let (bob, _) = signup(&test.app, "bob@example.com").await;

    let created = create(&test.app, &ann, record("Private", "2025-01-01")).await;
    let uri = format!("/api/records/{}", created["data"]["id"]);

    let response = send(&test.app, json_request(Method::GET, &uri, Some(&bob), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["detail"], "Health record not found");
    assert!(body.get("data").is_none());

    let response = send(
        &test.app,
        json_request(Method::PUT, &uri, Some(&bob), Some(record("Hijacked", "2025-01-01"))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&test.app, json_request(Method::DELETE, &uri, Some(&bob), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Still intact for the owner
    let response = send(&test.app, json_request(Method::GET, &uri, Some(&ann), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["title"], "Private");
}

#[tokio::test]
async fn test_update_and_delete() {
    let test = create_test_app().await;
    let (token, _) = signup(&test.app, "ann@example.com").await;

    let created = create(&test.app, &token, record("Draft", "2025-01-01")).await;
    let uri = format!("/api/records/{}", created["data"]["id"]);

    let response = send(
        &test.app,
        json_request(Method::PUT, &uri, Some(&token), Some(record("Final", "2025-01-02"))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Health record updated successfully");
    assert_eq!(body["data"]["title"], "Final");
    assert_eq!(body["data"]["date"], "2025-01-02");
    assert_eq!(body["data"]["id"], created["data"]["id"]);

    let response = send(&test.app, json_request(Method::DELETE, &uri, Some(&token), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Health record deleted successfully");

    let response = send(&test.app, json_request(Method::GET, &uri, Some(&token), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&test.app, json_request(Method::DELETE, &uri, Some(&token), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_record_bodies() {
    let test = create_test_app().await;
    let (token, _) = signup(&test.app, "ann@example.com").await;

    let response = send(
        &test.app,
        json_request(Method::POST, "/api/records", Some(&token), Some(record("", "2025-01-01"))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = send(
        &test.app,
        json_request(
            Method::POST,
            "/api/records",
            Some(&token),
            Some(json!({"title": "No date", "description": "", "category": "lab"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_non_numeric_id_is_bad_request() {
    let test = create_test_app().await;
    let (token, _) = signup(&test.app, "ann@example.com").await;

    let response = send(
        &test.app,
        json_request(Method::GET, "/api/records/abc", Some(&token), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_postgrest_empty_representation_is_not_found() {
    // PostgREST answers `[]` when the owner filter matches no row
    let rest = axum::Router::new().route(
        "/rest/v1/health_records",
        patch(|| async { axum::Json(json!([])) }).delete(|| async { axum::Json(json!([])) }),
    );
    let url = spawn_server(rest).await;

    let test = build_app(
        Config::test_default(),
        Arc::new(PostgrestStore::new(&url, "service-key")),
        models(ModelsState::Ready).await,
    );
    let (token, _) = signup(&test.app, "bob@example.com").await;

    let response = send(
        &test.app,
        json_request(
            Method::PUT,
            "/api/records/5",
            Some(&token),
            Some(record("Hijacked", "2025-01-01")),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["detail"], "Health record not found");

    let response = send(
        &test.app,
        json_request(Method::DELETE, "/api/records/5", Some(&token), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
