// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Analysis result models, one per inference feature.
//!
//! Analysis rows are append-only: they are created by the analyze endpoints
//! and only ever read or deleted afterwards.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::db::{tables, OwnedRow};
use crate::inference::pneumonia::PredictionScore;
use crate::models::StoredRow;

/// Vision captioning result (`vision_analysis`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct VisionFields {
    pub image_url: String,
    pub ai_description: String,
    /// Seconds spent in the pipeline
    pub processing_time: f64,
    pub model_name: String,
}

/// Chest X-ray classification result (`pneumonia_analyses`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PneumoniaFields {
    pub image_url: String,
    pub prediction: String,
    pub confidence: f64,
    pub confidence_percentage: f64,
    pub is_pneumonia: bool,
    pub severity: String,
    pub recommendation: String,
    #[serde(default)]
    pub all_predictions: Vec<PredictionScore>,
    pub processing_time: f64,
    pub model_name: String,
}

/// Handwritten digit recognition result (`mnist_analyses`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DigitFields {
    pub image_url: String,
    pub prediction: u8,
    /// Softmax over the ten digit classes, indexed by digit
    pub probabilities: Vec<f64>,
    pub filename: String,
}

/// Image/text similarity result (`clip_analyses`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ClipFields {
    pub image_url: String,
    pub text: String,
    pub similarity_score: f64,
    pub filename: String,
}

/// Caption generated for a remote image (`autoglm_analyses`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CaptionFields {
    pub image_url: String,
    pub caption: String,
    /// Free-text note supplied by the user
    pub description: Option<String>,
}

pub type VisionAnalysis = StoredRow<VisionFields>;

impl OwnedRow for VisionFields {
    const TABLE: &'static str = tables::VISION_ANALYSES;
    const ORDER_BY: &'static str = "created_at";
    const LABEL: &'static str = "Vision analysis";
}

impl OwnedRow for PneumoniaFields {
    const TABLE: &'static str = tables::PNEUMONIA_ANALYSES;
    const ORDER_BY: &'static str = "created_at";
    const LABEL: &'static str = "Pneumonia analysis";
}

impl OwnedRow for DigitFields {
    const TABLE: &'static str = tables::MNIST_ANALYSES;
    const ORDER_BY: &'static str = "created_at";
    const LABEL: &'static str = "Digit analysis";
}

impl OwnedRow for ClipFields {
    const TABLE: &'static str = tables::CLIP_ANALYSES;
    const ORDER_BY: &'static str = "created_at";
    const LABEL: &'static str = "Similarity analysis";
}

impl OwnedRow for CaptionFields {
    const TABLE: &'static str = tables::CAPTION_ANALYSES;
    const ORDER_BY: &'static str = "created_at";
    const LABEL: &'static str = "Caption analysis";
}
