// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chest X-ray classification post-processing.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use super::{round_to, InferenceError, LabelScore};

/// Label of the positive class.
pub const PNEUMONIA_LABEL: &str = "PNEUMONIA";

/// One class of the classifier output, rounded for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PredictionScore {
    pub label: String,
    pub confidence: f64,
    pub percentage: f64,
}

/// Confidence bands shared by severity and recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceTier {
    High,
    Moderate,
    Low,
    Unclear,
}

impl ConfidenceTier {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.95 {
            ConfidenceTier::High
        } else if confidence >= 0.80 {
            ConfidenceTier::Moderate
        } else if confidence >= 0.60 {
            ConfidenceTier::Low
        } else {
            ConfidenceTier::Unclear
        }
    }
}

/// Post-processed classification of one X-ray.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct XrayClassification {
    pub prediction: String,
    pub confidence: f64,
    pub confidence_percentage: f64,
    pub is_pneumonia: bool,
    pub severity: String,
    pub recommendation: String,
    /// Every class, highest score first
    pub all_predictions: Vec<PredictionScore>,
}

pub fn severity(is_pneumonia: bool, confidence: f64) -> &'static str {
    if !is_pneumonia {
        return "Normal";
    }

    match ConfidenceTier::from_confidence(confidence) {
        ConfidenceTier::High => "High Confidence - Pneumonia Detected",
        ConfidenceTier::Moderate => "Moderate Confidence - Pneumonia Likely",
        ConfidenceTier::Low => "Low Confidence - Pneumonia Possible",
        ConfidenceTier::Unclear => "Very Low Confidence - Unclear",
    }
}

pub fn recommendation(is_pneumonia: bool, confidence: f64) -> &'static str {
    let tier = ConfidenceTier::from_confidence(confidence);

    if !is_pneumonia {
        return match tier {
            ConfidenceTier::High | ConfidenceTier::Moderate => {
                "X-ray appears normal. Continue regular health monitoring."
            }
            ConfidenceTier::Low | ConfidenceTier::Unclear => {
                "X-ray appears mostly normal, but confidence is moderate. Consider follow-up if symptoms persist."
            }
        };
    }

    match tier {
        ConfidenceTier::High => {
            "HIGH PRIORITY: Pneumonia detected with high confidence. Immediate medical consultation strongly recommended."
        }
        ConfidenceTier::Moderate => {
            "MODERATE PRIORITY: Pneumonia likely detected. Please consult a healthcare provider soon for proper diagnosis."
        }
        ConfidenceTier::Low => {
            "LOW PRIORITY: Possible pneumonia indication. Monitor symptoms and consider medical consultation if condition worsens."
        }
        ConfidenceTier::Unclear => {
            "Results inconclusive. If experiencing respiratory symptoms, please consult a healthcare provider."
        }
    }
}

/// Turn raw classifier scores into a classification.
///
/// The top-scoring label is the prediction. Ties keep the model's order.
pub fn classify(mut scores: Vec<LabelScore>) -> Result<XrayClassification, InferenceError> {
    if scores.is_empty() {
        return Err(InferenceError::MalformedOutput(
            "No classification results returned".to_string(),
        ));
    }
    if let Some(bad) = scores.iter().find(|s| !s.score.is_finite()) {
        return Err(InferenceError::MalformedOutput(format!(
            "Non-finite score for {}",
            bad.label
        )));
    }

    scores.sort_by(|a, b| b.score.total_cmp(&a.score));

    let top = &scores[0];
    let confidence = top.score;
    let is_pneumonia = top.label.to_uppercase() == PNEUMONIA_LABEL;

    Ok(XrayClassification {
        prediction: top.label.clone(),
        confidence: round_to(confidence, 4),
        confidence_percentage: round_to(confidence * 100.0, 2),
        is_pneumonia,
        severity: severity(is_pneumonia, confidence).to_string(),
        recommendation: recommendation(is_pneumonia, confidence).to_string(),
        all_predictions: scores
            .iter()
            .map(|s| PredictionScore {
                label: s.label.clone(),
                confidence: round_to(s.score, 4),
                percentage: round_to(s.score * 100.0, 2),
            })
            .collect(),
    })
}
