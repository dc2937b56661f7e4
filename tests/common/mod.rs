// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, Method, Request, Response};
use newjilo_api::config::Config;
use newjilo_api::db::{Db, Filter, MemoryStore, Order, TableStore};
use newjilo_api::error::{AppError, Result as AppResult};
use newjilo_api::inference::{
    Captioner, DigitClassifier, Embeddings, ImageClassifier, ImageSource, ImageTextEncoder,
    InferenceError, LabelScore, Models, Pipeline,
};
use newjilo_api::routes::create_router;
use newjilo_api::services::{MemoryIdentity, MemoryObjectStore, StorageService};
use newjilo_api::AppState;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const BOUNDARY: &str = "newjilo-test-boundary";

/// Caption returned by the fake captioners.
pub const FAKE_CAPTION: &str = "a frontal chest x-ray";

pub struct FakeCaptioner;

#[async_trait]
impl Pipeline for FakeCaptioner {
    fn model_id(&self) -> &str {
        "fake/blip"
    }

    async fn warm_up(&self) -> Result<(), InferenceError> {
        Ok(())
    }
}

#[async_trait]
impl Captioner for FakeCaptioner {
    async fn caption(&self, image: ImageSource) -> Result<String, InferenceError> {
        match image {
            ImageSource::Url(url) if !url.starts_with("http") => Err(
                InferenceError::InvalidInput(format!("Failed to fetch image: {}", url)),
            ),
            _ => Ok(FAKE_CAPTION.to_string()),
        }
    }
}

/// Classifier with a fixed score table.
pub struct FakeXrayClassifier {
    pub scores: Vec<(&'static str, f64)>,
}

#[async_trait]
impl Pipeline for FakeXrayClassifier {
    fn model_id(&self) -> &str {
        "fake/vit-xray"
    }

    async fn warm_up(&self) -> Result<(), InferenceError> {
        Ok(())
    }
}

#[async_trait]
impl ImageClassifier for FakeXrayClassifier {
    async fn classify(&self, _image: Bytes) -> Result<Vec<LabelScore>, InferenceError> {
        Ok(self
            .scores
            .iter()
            .map(|(label, score)| LabelScore {
                label: label.to_string(),
                score: *score,
            })
            .collect())
    }
}

/// Digit classifier that always favours `digit`.
pub struct FakeDigits {
    pub digit: usize,
}

#[async_trait]
impl Pipeline for FakeDigits {
    fn model_id(&self) -> &str {
        "fake/mnist"
    }

    async fn warm_up(&self) -> Result<(), InferenceError> {
        Ok(())
    }
}

#[async_trait]
impl DigitClassifier for FakeDigits {
    async fn logits(&self, _image: Bytes) -> Result<Vec<f64>, InferenceError> {
        let mut logits = vec![-2.0; 10];
        logits[self.digit] = 6.0;
        Ok(logits)
    }
}

/// Encoder whose text embedding points at the image only for x-ray text.
pub struct FakeEncoder;

#[async_trait]
impl Pipeline for FakeEncoder {
    fn model_id(&self) -> &str {
        "fake/clip"
    }

    async fn warm_up(&self) -> Result<(), InferenceError> {
        Ok(())
    }
}

#[async_trait]
impl ImageTextEncoder for FakeEncoder {
    async fn embed(&self, _image: Bytes, text: &str) -> Result<Embeddings, InferenceError> {
        let text_embedding = if text.to_lowercase().contains("x-ray") {
            vec![0.9, 0.1, 0.0]
        } else {
            vec![0.1, 0.2, 0.9]
        };
        Ok(Embeddings {
            image: vec![1.0, 0.0, 0.0],
            text: text_embedding,
        })
    }
}

/// Pipeline whose warm-up always fails.
pub struct BrokenCaptioner;

#[async_trait]
impl Pipeline for BrokenCaptioner {
    fn model_id(&self) -> &str {
        "fake/broken"
    }

    async fn warm_up(&self) -> Result<(), InferenceError> {
        Err(InferenceError::Backend("weights unavailable".to_string()))
    }
}

#[async_trait]
impl Captioner for BrokenCaptioner {
    async fn caption(&self, _image: ImageSource) -> Result<String, InferenceError> {
        Err(InferenceError::Backend("not loaded".to_string()))
    }
}

/// Table store that refuses every insert.
#[derive(Default)]
pub struct RejectingInserts {
    inner: MemoryStore,
}

#[async_trait]
impl TableStore for RejectingInserts {
    async fn insert(&self, table: &str, _row: Value) -> AppResult<Value> {
        Err(AppError::Upstream(format!(
            "Table {} request failed (HTTP 403): permission denied",
            table
        )))
    }

    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<Order>,
    ) -> AppResult<Vec<Value>> {
        self.inner.select(table, filter, order).await
    }

    async fn update(&self, table: &str, filter: &Filter, changes: Value) -> AppResult<Vec<Value>> {
        self.inner.update(table, filter, changes).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> AppResult<Vec<Value>> {
        self.inner.delete(table, filter).await
    }
}

/// Router plus handles on the in-memory backends.
#[allow(dead_code)]
pub struct TestApp {
    pub app: axum::Router,
    pub state: Arc<AppState>,
    pub objects: Arc<MemoryObjectStore>,
}

#[allow(dead_code)]
pub enum ModelsState {
    Ready,
    NotLoaded,
}

#[allow(dead_code)]
pub async fn models(state: ModelsState) -> Arc<Models> {
    let models = Arc::new(Models::new(&Config::test_default().inference));
    if let ModelsState::Ready = state {
        models.vision.load(Arc::new(FakeCaptioner)).await;
        models
            .pneumonia
            .load(Arc::new(FakeXrayClassifier {
                scores: vec![("NORMAL", 0.03), ("PNEUMONIA", 0.97)],
            }))
            .await;
        models.digits.load(Arc::new(FakeDigits { digit: 7 })).await;
        models.clip.load(Arc::new(FakeEncoder)).await;
        models.captioner.load(Arc::new(FakeCaptioner)).await;
    }
    models
}

/// Build a test app over the given table store and models.
#[allow(dead_code)]
pub fn build_app(config: Config, tables: Arc<dyn TableStore>, models: Arc<Models>) -> TestApp {
    let objects = Arc::new(MemoryObjectStore::new(&config.supabase_url));

    let state = Arc::new(AppState {
        config,
        identity: Arc::new(MemoryIdentity::new()),
        db: Db::new(tables),
        storage: StorageService::new(objects.clone()),
        models,
    });

    TestApp {
        app: create_router(state.clone()),
        state,
        objects,
    }
}

/// Test app with every model ready and in-memory backends.
#[allow(dead_code)]
pub async fn create_test_app() -> TestApp {
    build_app(
        Config::test_default(),
        Arc::new(MemoryStore::new()),
        models(ModelsState::Ready).await,
    )
}

/// Send one request through a clone of the router.
#[allow(dead_code)]
pub async fn send(app: &axum::Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// JSON request, optionally authenticated.
#[allow(dead_code)]
pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Multipart form with an `image` file part and extra text parts.
#[allow(dead_code)]
pub fn multipart_body(filename: &str, image: &[u8], fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            BOUNDARY, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(image);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Authenticated multipart POST.
#[allow(dead_code)]
pub fn multipart_request(uri: &str, token: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Sign up a user and return `(access_token, user_id)`.
#[allow(dead_code)]
pub async fn signup(app: &axum::Router, email: &str) -> (String, String) {
    let response = send(
        app,
        json_request(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(serde_json::json!({
                "email": email,
                "password": "correct-horse",
                "full_name": "Test User",
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), 200);

    let body = body_json(response).await;
    let token = body["data"]["session"]["access_token"]
        .as_str()
        .unwrap()
        .to_string();
    let user_id = body["data"]["user"]["id"].as_str().unwrap().to_string();
    (token, user_id)
}

/// Serve `router` on a loopback port and return its base URL.
#[allow(dead_code)]
pub async fn spawn_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Bytes that look like the start of a PNG.
#[allow(dead_code)]
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
