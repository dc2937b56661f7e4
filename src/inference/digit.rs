// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Handwritten digit post-processing.

use super::InferenceError;

pub const DIGIT_CLASSES: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct DigitPrediction {
    pub prediction: u8,
    /// Indexed by digit, sums to 1
    pub probabilities: Vec<f64>,
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Probabilities and argmax for one image's logits.
pub fn predict(logits: &[f64]) -> Result<DigitPrediction, InferenceError> {
    if logits.len() != DIGIT_CLASSES {
        return Err(InferenceError::MalformedOutput(format!(
            "Expected {} logits, got {}",
            DIGIT_CLASSES,
            logits.len()
        )));
    }
    if logits.iter().any(|l| !l.is_finite()) {
        return Err(InferenceError::MalformedOutput(
            "Non-finite logit".to_string(),
        ));
    }

    let probabilities = softmax(logits);
    let prediction = probabilities
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(digit, _)| digit as u8)
        .unwrap_or_default();

    Ok(DigitPrediction {
        prediction,
        probabilities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one_for_large_logits() {
        let probs = softmax(&[1000.0, 1001.0, 1002.0]);
        let sum: f64 = probs.iter().sum();

        assert!((sum - 1.0).abs() < 1e-12);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_predict_argmax() {
        let mut logits = vec![0.0; 10];
        logits[7] = 5.0;

        let result = predict(&logits).unwrap();
        assert_eq!(result.prediction, 7);
        assert_eq!(result.probabilities.len(), 10);
        assert!(result.probabilities[7] > 0.9);
    }

    #[test]
    fn test_predict_rejects_wrong_shape() {
        assert!(matches!(
            predict(&[0.1, 0.2]),
            Err(InferenceError::MalformedOutput(_))
        ));
        let mut logits = vec![0.0; 10];
        logits[3] = f64::NAN;
        assert!(predict(&logits).is_err());
    }
}
