use serde::Serialize;

use crate::db::models::Activity;
use crate::error::PipelineError;

use super::thresholds::{fixed_confidence, ClassificationThresholds};
use super::Classification;

/// Summary statistics of acceleration magnitudes over one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MagnitudeStats {
    pub mean: f64,
    pub variance: f64,
    pub max: f64,
}

impl MagnitudeStats {
    pub fn from_magnitudes(magnitudes: &[f64]) -> Result<Self, PipelineError> {
        if magnitudes.is_empty() {
            return Err(PipelineError::InsufficientData {
                needed: 1,
                available: 0,
            });
        }

        let n = magnitudes.len() as f64;
        let mean = magnitudes.iter().sum::<f64>() / n;
        let variance = magnitudes.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / n;
        let max = magnitudes.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Ok(Self {
            mean,
            variance,
            max,
        })
    }
}

/// Deterministic rule matching the device firmware.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdClassifier {
    thresholds: ClassificationThresholds,
}

impl ThresholdClassifier {
    pub fn new(thresholds: ClassificationThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ClassificationThresholds {
        &self.thresholds
    }

    pub fn classify(&self, magnitudes: &[f64]) -> Result<Classification, PipelineError> {
        let stats = MagnitudeStats::from_magnitudes(magnitudes)?;
        Ok(self.decide(&stats))
    }

    /// First matching rule wins: running, then walking, then idle.
    pub fn decide(&self, stats: &MagnitudeStats) -> Classification {
        let t = &self.thresholds;
        let activity = if stats.variance > t.running_variance && stats.max > t.running_magnitude {
            Activity::Running
        } else if stats.variance > t.walking_variance && stats.max > t.walking_magnitude {
            Activity::Walking
        } else {
            Activity::Idle
        };

        Classification {
            activity,
            confidence: fixed_confidence(activity),
            raw_probability: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(variance: f64, max: f64) -> MagnitudeStats {
        MagnitudeStats {
            mean: 1.0,
            variance,
            max,
        }
    }

    #[test]
    fn running_rule_takes_precedence() {
        let result = ThresholdClassifier::default().decide(&stats(0.2, 1.6));
        assert_eq!(result.activity, Activity::Running);
        assert_eq!(result.confidence, 0.85);
    }

    #[test]
    fn walking_band() {
        let result = ThresholdClassifier::default().decide(&stats(0.1, 1.3));
        assert_eq!(result.activity, Activity::Walking);
        assert_eq!(result.confidence, 0.80);

        // High variance but peak below the running cutoff still reads as walking.
        let result = ThresholdClassifier::default().decide(&stats(0.5, 1.4));
        assert_eq!(result.activity, Activity::Walking);
    }

    #[test]
    fn idle_is_the_default() {
        let result = ThresholdClassifier::default().decide(&stats(0.01, 1.0));
        assert_eq!(result.activity, Activity::Idle);
        assert_eq!(result.confidence, 0.75);

        // Strict inequalities: exactly on the cutoff does not qualify.
        let result = ThresholdClassifier::default().decide(&stats(0.05, 1.15));
        assert_eq!(result.activity, Activity::Idle);
    }

    #[test]
    fn classifies_from_raw_magnitudes() {
        let resting = vec![1.0; 50];
        let result = ThresholdClassifier::default().classify(&resting).unwrap();
        assert_eq!(result.activity, Activity::Idle);

        let running: Vec<f64> = (0..50).map(|n| if n % 2 == 0 { 0.4 } else { 2.0 }).collect();
        let stats = MagnitudeStats::from_magnitudes(&running).unwrap();
        assert!((stats.mean - 1.2).abs() < 1e-12);
        assert!((stats.variance - 0.64).abs() < 1e-12);
        assert_eq!(stats.max, 2.0);
        let result = ThresholdClassifier::default().classify(&running).unwrap();
        assert_eq!(result.activity, Activity::Running);
        assert_eq!(result.raw_probability, None);
    }

    #[test]
    fn empty_input_is_insufficient() {
        let err = ThresholdClassifier::default().classify(&[]).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData { .. }));
    }
}
