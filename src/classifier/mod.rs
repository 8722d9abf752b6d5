//! Activity classifiers.
//!
//! Two strategies sit behind one contract: a trained model over the feature
//! vector and the deterministic threshold rule over acceleration magnitudes.
//! Which one serves the primary path is configuration; the backup scheduler
//! always uses the threshold rule.

mod model;
mod threshold;
mod thresholds;

pub use model::{LogisticModel, ModelArtifact, ModelClassifier, Predictor};
pub use threshold::{MagnitudeStats, ThresholdClassifier};
pub use thresholds::{fixed_confidence, ClassificationThresholds, DEVICE_THRESHOLDS};

use serde::{Deserialize, Serialize};

use crate::db::models::{Activity, SensorSample};
use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub activity: Activity,
    pub confidence: f64,
    /// Probability of the running class; only the model strategy sets it.
    pub raw_probability: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum StrategyKind {
    Model,
    #[default]
    Threshold,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Model => "model",
            StrategyKind::Threshold => "threshold",
        }
    }
}

#[derive(Debug)]
pub enum ClassifierStrategy {
    Model(ModelClassifier),
    Threshold(ThresholdClassifier),
    /// The model strategy was selected but its artifact could not be loaded.
    ModelUnavailable(String),
}

impl ClassifierStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            ClassifierStrategy::Threshold(_) => StrategyKind::Threshold,
            ClassifierStrategy::Model(_) | ClassifierStrategy::ModelUnavailable(_) => {
                StrategyKind::Model
            }
        }
    }

    /// Classifies a full window. The window must already hold `window_size` samples.
    pub fn classify(
        &self,
        window: &[SensorSample],
        window_size: usize,
    ) -> Result<Classification, PipelineError> {
        if window.len() < window_size {
            return Err(PipelineError::InsufficientData {
                needed: window_size,
                available: window.len(),
            });
        }

        match self {
            ClassifierStrategy::Model(model) => model.classify_window(window),
            ClassifierStrategy::Threshold(rule) => {
                let tail = &window[window.len() - window_size..];
                let magnitudes: Vec<f64> = tail.iter().map(SensorSample::magnitude).collect();
                rule.classify(&magnitudes)
            }
            ClassifierStrategy::ModelUnavailable(reason) => {
                Err(PipelineError::ModelUnavailable(reason.clone()))
            }
        }
    }
}
