// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pretrained model pipelines and their load state.
//!
//! Every pipeline lives in a `ModelSlot` that is loaded once, in the
//! background, at startup. Requests only ever read the slot: either the
//! shared pipeline is ready or the caller gets `InferenceError::NotReady`.

pub mod digit;
pub mod http;
pub mod pneumonia;
pub mod similarity;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::InferenceConfig;

/// Inference failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InferenceError {
    #[error("Model {model} is not ready ({state}). Please try again later.")]
    NotReady { model: String, state: String },
    #[error("{0}")]
    InvalidInput(String),
    #[error("Inference backend failed: {0}")]
    Backend(String),
    #[error("Unexpected model output: {0}")]
    MalformedOutput(String),
}

/// Lifecycle of a model slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    NotStarted,
    Loading { progress: u8 },
    Ready,
    Failed { reason: String },
}

impl LoadState {
    pub fn progress(&self) -> u8 {
        match self {
            LoadState::Loading { progress } => *progress,
            LoadState::Ready => 100,
            LoadState::NotStarted | LoadState::Failed { .. } => 0,
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::NotStarted => write!(f, "not started"),
            LoadState::Loading { progress } => write!(f, "loading ({}%)", progress),
            LoadState::Ready => write!(f, "ready"),
            LoadState::Failed { reason } => write!(f, "error: {}", reason),
        }
    }
}

/// Status report for one model, as served by the status routes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ModelStatus {
    pub model: String,
    pub loaded: bool,
    /// `not_started`, `loading`, `ready` or `error`
    pub status: &'static str,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Common surface of every pipeline.
#[async_trait]
pub trait Pipeline: Send + Sync {
    fn model_id(&self) -> &str;

    /// Block until the model can serve requests.
    async fn warm_up(&self) -> Result<(), InferenceError>;
}

/// An image handed to a pipeline.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Bytes(Bytes),
    Url(String),
}

/// One label of a classifier's output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Image and text embeddings from a joint encoder.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Embeddings {
    #[serde(alias = "image_embeds")]
    pub image: Vec<f64>,
    #[serde(alias = "text_embeds")]
    pub text: Vec<f64>,
}

/// Image to free-text description.
#[async_trait]
pub trait Captioner: Pipeline {
    async fn caption(&self, image: ImageSource) -> Result<String, InferenceError>;
}

/// Image to label scores.
#[async_trait]
pub trait ImageClassifier: Pipeline {
    async fn classify(&self, image: Bytes) -> Result<Vec<LabelScore>, InferenceError>;
}

/// 28x28 grayscale digit image to raw logits over 0-9.
#[async_trait]
pub trait DigitClassifier: Pipeline {
    async fn logits(&self, image: Bytes) -> Result<Vec<f64>, InferenceError>;
}

/// Image and text to embeddings in a shared space.
#[async_trait]
pub trait ImageTextEncoder: Pipeline {
    async fn embed(&self, image: Bytes, text: &str) -> Result<Embeddings, InferenceError>;
}

enum SlotState<P: ?Sized> {
    NotStarted,
    Loading(u8),
    Ready(Arc<P>),
    Failed(String),
}

/// A pipeline plus its load state.
pub struct ModelSlot<P: ?Sized> {
    model_id: String,
    state: RwLock<SlotState<P>>,
}

impl<P: Pipeline + ?Sized> ModelSlot<P> {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            state: RwLock::new(SlotState::NotStarted),
        }
    }

    /// Slot whose model id was never configured. It stays failed.
    pub fn unconfigured(variable: &str) -> Self {
        Self {
            model_id: "unconfigured".to_string(),
            state: RwLock::new(SlotState::Failed(format!("{} not configured", variable))),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub async fn state(&self) -> LoadState {
        match &*self.state.read().await {
            SlotState::NotStarted => LoadState::NotStarted,
            SlotState::Loading(progress) => LoadState::Loading {
                progress: *progress,
            },
            SlotState::Ready(_) => LoadState::Ready,
            SlotState::Failed(reason) => LoadState::Failed {
                reason: reason.clone(),
            },
        }
    }

    pub async fn status(&self) -> ModelStatus {
        let state = self.state().await;
        let (status, error) = match &state {
            LoadState::NotStarted => ("not_started", None),
            LoadState::Loading { .. } => ("loading", None),
            LoadState::Ready => ("ready", None),
            LoadState::Failed { reason } => ("error", Some(reason.clone())),
        };

        ModelStatus {
            model: self.model_id.clone(),
            loaded: state == LoadState::Ready,
            status,
            progress: state.progress(),
            error,
        }
    }

    /// The loaded pipeline, or `NotReady` with the current state.
    pub async fn get(&self) -> Result<Arc<P>, InferenceError> {
        if let SlotState::Ready(pipeline) = &*self.state.read().await {
            return Ok(pipeline.clone());
        }

        Err(InferenceError::NotReady {
            model: self.model_id.clone(),
            state: self.state().await.to_string(),
        })
    }

    /// Warm `pipeline` up and publish it. Called once per slot at startup.
    pub async fn load(&self, pipeline: Arc<P>) {
        let started = std::time::Instant::now();
        *self.state.write().await = SlotState::Loading(20);
        tracing::info!(model = %self.model_id, "Loading model");

        *self.state.write().await = SlotState::Loading(50);
        match pipeline.warm_up().await {
            Ok(()) => {
                *self.state.write().await = SlotState::Ready(pipeline);
                tracing::info!(
                    model = %self.model_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Model ready"
                );
            }
            Err(e) => {
                tracing::error!(model = %self.model_id, error = %e, "Model failed to load");
                *self.state.write().await = SlotState::Failed(e.to_string());
            }
        }
    }
}

/// All pipelines served by the API.
pub struct Models {
    /// Medical image description
    pub vision: ModelSlot<dyn Captioner>,
    pub pneumonia: ModelSlot<dyn ImageClassifier>,
    pub digits: ModelSlot<dyn DigitClassifier>,
    pub clip: ModelSlot<dyn ImageTextEncoder>,
    /// Caption-from-URL
    pub captioner: ModelSlot<dyn Captioner>,
}

impl Models {
    /// Empty slots named after the configured models.
    pub fn new(config: &InferenceConfig) -> Self {
        Self {
            vision: ModelSlot::new(&config.vision_model),
            pneumonia: ModelSlot::new(&config.pneumonia_model),
            digits: match &config.digit_model {
                Some(model) => ModelSlot::new(model),
                None => ModelSlot::unconfigured("DIGIT_MODEL"),
            },
            clip: match &config.clip_model {
                Some(model) => ModelSlot::new(model),
                None => ModelSlot::unconfigured("CLIP_MODEL"),
            },
            captioner: ModelSlot::new(&config.caption_model),
        }
    }

    /// Status of every slot keyed by feature name.
    pub async fn statuses(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        for (feature, status) in [
            ("vision", self.vision.status().await),
            ("pneumonia", self.pneumonia.status().await),
            ("mnist", self.digits.status().await),
            ("clip", self.clip.status().await),
            ("autoglm", self.captioner.status().await),
        ] {
            map.insert(
                feature.to_string(),
                serde_json::to_value(status).unwrap_or_default(),
            );
        }
        map
    }
}

/// Round to `places` decimal digits.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
