// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pipelines backed by a Hugging Face style inference server.
//!
//! Requests go to `{base_url}/models/{model_id}`. Image pipelines post the
//! raw image bytes; the joint image/text encoder posts JSON with the image
//! base64 encoded. A 503 from the server means the model is still loading.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::Value;

use super::{
    Captioner, DigitClassifier, Embeddings, ImageClassifier, ImageSource, ImageTextEncoder,
    InferenceError, LabelScore, Models, Pipeline,
};
use crate::config::InferenceConfig;

const MAX_WARMUP_WAIT: Duration = Duration::from_secs(10);

/// Shared connection to the inference server.
pub struct InferenceClient {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    warmup_attempts: u32,
    max_image_bytes: usize,
}

/// Body of a 503 while a model loads.
#[derive(Debug, Deserialize)]
struct LoadingBody {
    error: Option<String>,
    estimated_time: Option<f64>,
}

impl InferenceClient {
    pub fn new(config: &InferenceConfig) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| InferenceError::Backend(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            warmup_attempts: config.warmup_attempts.max(1),
            max_image_bytes: config.max_image_bytes,
        })
    }

    fn model_url(&self, model: &str) -> String {
        format!("{}/models/{}", self.base_url, model)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn post_bytes(&self, model: &str, image: Bytes) -> Result<Value, InferenceError> {
        let request = self
            .http
            .post(self.model_url(model))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image);

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| InferenceError::Backend(e.to_string()))?;

        check_response_json(response).await
    }

    async fn post_json(&self, model: &str, body: &Value) -> Result<Value, InferenceError> {
        let request = self.http.post(self.model_url(model)).json(body);

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| InferenceError::Backend(e.to_string()))?;

        check_response_json(response).await
    }

    /// Download an image referenced by URL, at most `max_image_bytes` long.
    pub async fn fetch_image(&self, url: &str) -> Result<Bytes, InferenceError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| InferenceError::InvalidInput(format!("Invalid image URL: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(InferenceError::InvalidInput(format!(
                "Unsupported image URL scheme: {}",
                parsed.scheme()
            )));
        }

        let mut response = self
            .http
            .get(parsed)
            .send()
            .await
            .map_err(|e| InferenceError::InvalidInput(format!("Failed to fetch image: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InferenceError::InvalidInput(format!(
                "Failed to fetch image: HTTP {}",
                status
            )));
        }

        let too_large = || InferenceError::InvalidInput("Image too large".to_string());
        if let Some(length) = response.content_length() {
            if length > self.max_image_bytes as u64 {
                return Err(too_large());
            }
        }

        // Content-Length may be absent or wrong; cap what is actually read
        let mut image = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| InferenceError::InvalidInput(format!("Failed to fetch image: {}", e)))?
        {
            if image.len() + chunk.len() > self.max_image_bytes {
                return Err(too_large());
            }
            image.extend_from_slice(&chunk);
        }

        Ok(Bytes::from(image))
    }

    /// Poll the model endpoint until it stops answering 503.
    async fn wait_until_loaded(&self, model: &str) -> Result<(), InferenceError> {
        for attempt in 1..=self.warmup_attempts {
            let response = self
                .authorize(self.http.get(self.model_url(model)))
                .send()
                .await
                .map_err(|e| InferenceError::Backend(e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }
            if status != reqwest::StatusCode::SERVICE_UNAVAILABLE {
                let body = response.text().await.unwrap_or_default();
                return Err(InferenceError::Backend(format!(
                    "HTTP {}: {}",
                    status,
                    error_message(&body)
                )));
            }

            let loading: Option<LoadingBody> = response.json().await.ok();
            let wait = loading
                .as_ref()
                .and_then(|l| l.estimated_time)
                .filter(|t| t.is_finite() && *t > 0.0)
                .map(Duration::from_secs_f64)
                .unwrap_or(Duration::from_secs(1))
                .min(MAX_WARMUP_WAIT);

            tracing::debug!(
                model,
                attempt,
                wait_secs = wait.as_secs_f64(),
                reason = %loading.and_then(|l| l.error).unwrap_or_default(),
                "Model still loading"
            );
            tokio::time::sleep(wait).await;
        }

        Err(InferenceError::Backend(format!(
            "Model {} did not finish loading after {} attempts",
            model, self.warmup_attempts
        )))
    }
}

async fn check_response_json(response: reqwest::Response) -> Result<Value, InferenceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(InferenceError::Backend(format!(
            "HTTP {}: {}",
            status,
            error_message(&body)
        )));
    }

    response
        .json()
        .await
        .map_err(|e| InferenceError::MalformedOutput(e.to_string()))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// `[{"generated_text": ...}]` or a bare object.
fn parse_caption(value: Value) -> Result<String, InferenceError> {
    let first = match value {
        Value::Array(items) => items.into_iter().next(),
        other => Some(other),
    };

    first
        .as_ref()
        .and_then(|v| v.get("generated_text"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| InferenceError::MalformedOutput("missing generated_text".to_string()))
}

/// `[{"label", "score"}]`, possibly nested once per input image.
fn parse_label_scores(value: Value) -> Result<Vec<LabelScore>, InferenceError> {
    let value = match value {
        Value::Array(mut items) if matches!(items.first(), Some(Value::Array(_))) => {
            items.swap_remove(0)
        }
        other => other,
    };

    serde_json::from_value(value).map_err(|e| InferenceError::MalformedOutput(e.to_string()))
}

/// `{"logits": [...]}` or a bare array, possibly batched.
fn parse_logits(value: Value) -> Result<Vec<f64>, InferenceError> {
    let value = match value {
        Value::Object(mut map) => map.remove("logits").unwrap_or(Value::Null),
        other => other,
    };
    let value = match value {
        Value::Array(mut items) if matches!(items.first(), Some(Value::Array(_))) => {
            items.swap_remove(0)
        }
        other => other,
    };

    serde_json::from_value(value).map_err(|e| InferenceError::MalformedOutput(e.to_string()))
}

macro_rules! http_pipeline {
    ($name:ident) => {
        pub struct $name {
            client: Arc<InferenceClient>,
            model: String,
        }

        impl $name {
            pub fn new(client: Arc<InferenceClient>, model: impl Into<String>) -> Self {
                Self {
                    client,
                    model: model.into(),
                }
            }
        }

        #[async_trait]
        impl Pipeline for $name {
            fn model_id(&self) -> &str {
                &self.model
            }

            async fn warm_up(&self) -> Result<(), InferenceError> {
                self.client.wait_until_loaded(&self.model).await
            }
        }
    };
}

http_pipeline!(HttpCaptioner);
http_pipeline!(HttpImageClassifier);
http_pipeline!(HttpDigitClassifier);
http_pipeline!(HttpImageTextEncoder);

#[async_trait]
impl Captioner for HttpCaptioner {
    async fn caption(&self, image: ImageSource) -> Result<String, InferenceError> {
        let bytes = match image {
            ImageSource::Bytes(bytes) => bytes,
            ImageSource::Url(url) => self.client.fetch_image(&url).await?,
        };
        let value = self.client.post_bytes(&self.model, bytes).await?;
        parse_caption(value)
    }
}

#[async_trait]
impl ImageClassifier for HttpImageClassifier {
    async fn classify(&self, image: Bytes) -> Result<Vec<LabelScore>, InferenceError> {
        let value = self.client.post_bytes(&self.model, image).await?;
        parse_label_scores(value)
    }
}

#[async_trait]
impl DigitClassifier for HttpDigitClassifier {
    async fn logits(&self, image: Bytes) -> Result<Vec<f64>, InferenceError> {
        let value = self.client.post_bytes(&self.model, image).await?;
        parse_logits(value)
    }
}

#[async_trait]
impl ImageTextEncoder for HttpImageTextEncoder {
    async fn embed(&self, image: Bytes, text: &str) -> Result<Embeddings, InferenceError> {
        let body = serde_json::json!({
            "inputs": {
                "image": STANDARD.encode(&image),
                "text": text,
            }
        });
        let value = self.client.post_json(&self.model, &body).await?;
        serde_json::from_value(value).map_err(|e| InferenceError::MalformedOutput(e.to_string()))
    }
}

/// Build every HTTP pipeline and load each slot in its own background task.
pub fn spawn_loading(models: &Arc<Models>, config: &InferenceConfig) -> Result<(), InferenceError> {
    let client = Arc::new(InferenceClient::new(config)?);

    let m = models.clone();
    let p = Arc::new(HttpCaptioner::new(client.clone(), &config.vision_model));
    tokio::spawn(async move { m.vision.load(p).await });

    let m = models.clone();
    let p = Arc::new(HttpImageClassifier::new(client.clone(), &config.pneumonia_model));
    tokio::spawn(async move { m.pneumonia.load(p).await });

    // Unconfigured slots were created failed and stay that way
    if let Some(model) = &config.digit_model {
        let m = models.clone();
        let p = Arc::new(HttpDigitClassifier::new(client.clone(), model));
        tokio::spawn(async move { m.digits.load(p).await });
    }

    if let Some(model) = &config.clip_model {
        let m = models.clone();
        let p = Arc::new(HttpImageTextEncoder::new(client.clone(), model));
        tokio::spawn(async move { m.clip.load(p).await });
    }

    let m = models.clone();
    let p = Arc::new(HttpCaptioner::new(client, &config.caption_model));
    tokio::spawn(async move { m.captioner.load(p).await });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server;
    use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_parse_caption() {
        let caption = parse_caption(json!([{"generated_text": " a lung x-ray "}])).unwrap();
        assert_eq!(caption, "a lung x-ray");

        assert!(parse_caption(json!([])).is_err());
        assert!(parse_caption(json!([{"generated_text": ""}])).is_err());
    }

    #[test]
    fn test_parse_label_scores_flat_and_batched() {
        let flat = json!([{"label": "PNEUMONIA", "score": 0.9}, {"label": "NORMAL", "score": 0.1}]);
        assert_eq!(parse_label_scores(flat).unwrap().len(), 2);

        let batched = json!([[{"label": "NORMAL", "score": 0.7}]]);
        let scores = parse_label_scores(batched).unwrap();
        assert_eq!(scores[0].label, "NORMAL");
    }

    #[test]
    fn test_parse_logits_shapes() {
        assert_eq!(parse_logits(json!({"logits": [[1.0, 2.0]]})).unwrap(), vec![1.0, 2.0]);
        assert_eq!(parse_logits(json!([0.5, 0.25])).unwrap(), vec![0.5, 0.25]);
        assert!(parse_logits(json!({"probs": [1.0]})).is_err());
    }

    #[test]
    fn test_embeddings_accept_server_field_names() {
        let embeddings: Embeddings =
            serde_json::from_value(json!({"image_embeds": [1.0], "text_embeds": [2.0]})).unwrap();
        assert_eq!(embeddings.image, vec![1.0]);
        assert_eq!(embeddings.text, vec![2.0]);
    }

    #[test]
    fn test_error_message_prefers_error_field() {
        assert_eq!(error_message(r#"{"error":"Model too busy"}"#), "Model too busy");
        assert_eq!(error_message("bad gateway"), "bad gateway");
    }

    fn client_for(base_url: &str, warmup_attempts: u32, max_image_bytes: usize) -> InferenceClient {
        InferenceClient::new(&InferenceConfig {
            base_url: base_url.to_string(),
            warmup_attempts,
            max_image_bytes,
            ..InferenceConfig::default()
        })
        .unwrap()
    }

    /// Model endpoint answering 503 for the first `loading_polls` requests,
    /// then `then`. Returns the base URL and the request counter.
    async fn model_server(
        loading_polls: usize,
        then: StatusCode,
    ) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/models/test-model",
                get(
                    move |State(hits): State<Arc<AtomicUsize>>| async move {
                        let n = hits.fetch_add(1, Ordering::SeqCst);
                        if n < loading_polls {
                            (
                                StatusCode::SERVICE_UNAVAILABLE,
                                Json(json!({"error": "Model is loading", "estimated_time": 0.01})),
                            )
                        } else {
                            (then, Json(json!({"error": "done"})))
                        }
                    },
                ),
            )
            .with_state(hits.clone());
        (test_server::spawn(router).await, hits)
    }

    #[tokio::test]
    async fn test_warm_up_polls_while_loading() {
        let (url, hits) = model_server(2, StatusCode::OK).await;
        let client = client_for(&url, 5, 1024);

        client.wait_until_loaded("test-model").await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_warm_up_stops_on_other_errors() {
        let (url, hits) = model_server(0, StatusCode::NOT_FOUND).await;
        let client = client_for(&url, 5, 1024);

        let err = client.wait_until_loaded("test-model").await.unwrap_err();
        assert!(matches!(err, InferenceError::Backend(_)));
        assert!(err.to_string().contains("404"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_warm_up_gives_up_after_attempts() {
        let (url, hits) = model_server(usize::MAX, StatusCode::OK).await;
        let client = client_for(&url, 3, 1024);

        let err = client.wait_until_loaded("test-model").await.unwrap_err();
        assert!(err.to_string().contains("did not finish loading after 3 attempts"));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_image_enforces_size_limit() {
        let router = Router::new()
            .route("/small.png", get(|| async { vec![7u8; 512] }))
            .route("/large.png", get(|| async { vec![7u8; 4096] }));
        let url = test_server::spawn(router).await;
        let client = client_for(&url, 1, 1024);

        let image = client.fetch_image(&format!("{}/small.png", url)).await.unwrap();
        assert_eq!(image.len(), 512);

        match client.fetch_image(&format!("{}/large.png", url)).await {
            Err(InferenceError::InvalidInput(msg)) => assert_eq!(msg, "Image too large"),
            other => panic!("expected size rejection, got {:?}", other),
        }

        assert!(matches!(
            client.fetch_image(&format!("{}/missing.png", url)).await,
            Err(InferenceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_image_rejects_non_http_urls() {
        let client = InferenceClient::new(&InferenceConfig::default()).unwrap();
        assert!(matches!(
            client.fetch_image("file:///etc/passwd").await,
            Err(InferenceError::InvalidInput(_))
        ));
        assert!(matches!(
            client.fetch_image("not a url").await,
            Err(InferenceError::InvalidInput(_))
        ));
    }
}
