use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::db::models::{Activity, SensorSample};
use crate::error::PipelineError;
use crate::features::{extract_normalized, FeatureVector, NormalizationParams, FEATURE_LEN};

use super::Classification;

/// A pretrained binary discriminator over the 30-feature layout.
///
/// Returns the predicted class index and the per-class probabilities, where
/// class 1 is running and class 0 is walking.
pub trait Predictor: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> (usize, Vec<f64>);
}

/// Logistic regression exported from the training notebook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl Predictor for LogisticModel {
    fn predict(&self, features: &FeatureVector) -> (usize, Vec<f64>) {
        let z = self
            .coefficients
            .iter()
            .zip(features.as_slice())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        let p_running = 1.0 / (1.0 + (-z).exp());
        let label = usize::from(p_running >= 0.5);
        (label, vec![1.0 - p_running, p_running])
    }
}

/// On-disk model artifact: coefficients plus the scaler they were trained with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model: LogisticModel,
    pub normalization: NormalizationParams,
}

impl ModelArtifact {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            PipelineError::ModelUnavailable(format!("cannot read {}: {err}", path.display()))
        })?;
        let artifact: ModelArtifact = serde_json::from_str(&contents).map_err(|err| {
            PipelineError::ModelUnavailable(format!("corrupt artifact {}: {err}", path.display()))
        })?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.model.coefficients.len() != FEATURE_LEN {
            return Err(PipelineError::ModelUnavailable(format!(
                "expected {FEATURE_LEN} coefficients, found {}",
                self.model.coefficients.len()
            )));
        }
        let finite = self.model.intercept.is_finite()
            && self.model.coefficients.iter().all(|w| w.is_finite())
            && self.normalization.is_finite();
        if !finite {
            return Err(PipelineError::ModelUnavailable(
                "artifact contains non-finite parameters".into(),
            ));
        }
        Ok(())
    }
}

/// Model-based strategy: normalize, extract features, ask the predictor.
pub struct ModelClassifier {
    predictor: Box<dyn Predictor>,
    normalization: NormalizationParams,
}

impl std::fmt::Debug for ModelClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClassifier")
            .field("normalization", &self.normalization)
            .finish_non_exhaustive()
    }
}

impl ModelClassifier {
    pub fn new(predictor: Box<dyn Predictor>, normalization: NormalizationParams) -> Self {
        Self {
            predictor,
            normalization,
        }
    }

    /// Loads an artifact and checks it was trained for `window_size` samples.
    pub fn from_artifact_path(path: &Path, window_size: usize) -> Result<Self, PipelineError> {
        let artifact = ModelArtifact::load(path)?;
        if artifact.normalization.window_size != window_size {
            return Err(PipelineError::ModelUnavailable(format!(
                "model trained on {}-sample windows, configured window is {window_size}",
                artifact.normalization.window_size
            )));
        }
        Ok(Self::new(Box::new(artifact.model), artifact.normalization))
    }

    pub fn window_size(&self) -> usize {
        self.normalization.window_size
    }

    pub fn classify_window(&self, window: &[SensorSample]) -> Result<Classification, PipelineError> {
        let features = extract_normalized(window, self.normalization.window_size, &self.normalization)?;
        self.predict(&features)
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<Classification, PipelineError> {
        let (label, probabilities) = self.predictor.predict(features);

        if probabilities.is_empty() || probabilities.iter().any(|p| !p.is_finite()) {
            return Err(PipelineError::ModelUnavailable(
                "predictor returned unusable probabilities".into(),
            ));
        }

        let confidence = probabilities
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
            .clamp(0.0, 1.0);
        let activity = if label == 1 {
            Activity::Running
        } else {
            Activity::Walking
        };

        Ok(Classification {
            activity,
            confidence,
            raw_probability: probabilities.get(1).copied(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    struct Fixed(usize, Vec<f64>);

    impl Predictor for Fixed {
        fn predict(&self, _features: &FeatureVector) -> (usize, Vec<f64>) {
            (self.0, self.1.clone())
        }
    }

    fn artifact(window_size: usize) -> ModelArtifact {
        // Weight only on the ax std feature (index 1).
        let mut coefficients = vec![0.0; FEATURE_LEN];
        coefficients[1] = 4.0;
        ModelArtifact {
            model: LogisticModel {
                coefficients,
                intercept: -2.0,
            },
            normalization: NormalizationParams::identity(window_size),
        }
    }

    fn window(len: usize, swing: f64) -> Vec<SensorSample> {
        (0..len)
            .map(|n| {
                let ax = if n % 2 == 0 { swing } else { -swing };
                SensorSample::new([ax, 0.0, 1.0, 0.0, 0.0, 0.0], Utc::now()).unwrap()
            })
            .collect()
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{name}-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn maps_label_and_confidence() {
        let classifier = ModelClassifier::new(
            Box::new(Fixed(1, vec![0.3, 0.7])),
            NormalizationParams::identity(4),
        );
        let result = classifier.classify_window(&window(4, 1.0)).unwrap();
        assert_eq!(result.activity, Activity::Running);
        assert_eq!(result.confidence, 0.7);
        assert_eq!(result.raw_probability, Some(0.7));

        let classifier = ModelClassifier::new(
            Box::new(Fixed(0, vec![0.9, 0.1])),
            NormalizationParams::identity(4),
        );
        let result = classifier.classify_window(&window(4, 1.0)).unwrap();
        assert_eq!(result.activity, Activity::Walking);
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn logistic_model_separates_by_variability() {
        let artifact = artifact(10);
        let classifier = ModelClassifier::new(Box::new(artifact.model), artifact.normalization);

        let calm = classifier.classify_window(&window(10, 0.1)).unwrap();
        assert_eq!(calm.activity, Activity::Walking);

        let vigorous = classifier.classify_window(&window(10, 2.0)).unwrap();
        assert_eq!(vigorous.activity, Activity::Running);
        assert!(vigorous.confidence > 0.99);
    }

    #[test]
    fn short_window_is_insufficient() {
        let classifier = ModelClassifier::new(
            Box::new(Fixed(1, vec![0.5, 0.5])),
            NormalizationParams::identity(10),
        );
        let err = classifier.classify_window(&window(3, 1.0)).unwrap_err();
        assert_eq!(err.samples_needed(), Some(7));
    }

    #[test]
    fn unusable_probabilities_fail_closed() {
        let classifier = ModelClassifier::new(
            Box::new(Fixed(1, vec![f64::NAN, 0.5])),
            NormalizationParams::identity(2),
        );
        let err = classifier.classify_window(&window(2, 1.0)).unwrap_err();
        assert!(matches!(err, PipelineError::ModelUnavailable(_)));
    }

    #[test]
    fn loads_artifact_from_disk() {
        let path = temp_path("activity-model");
        fs::write(&path, serde_json::to_string(&artifact(50)).unwrap()).unwrap();

        let classifier = ModelClassifier::from_artifact_path(&path, 50).unwrap();
        assert_eq!(classifier.window_size(), 50);

        let mismatch = ModelClassifier::from_artifact_path(&path, 40).unwrap_err();
        assert!(matches!(mismatch, PipelineError::ModelUnavailable(_)));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_or_corrupt_artifacts_are_unavailable() {
        let missing = temp_path("missing-model");
        assert!(matches!(
            ModelArtifact::load(&missing),
            Err(PipelineError::ModelUnavailable(_))
        ));

        let corrupt = temp_path("corrupt-model");
        fs::write(&corrupt, "{\"model\": 3}").unwrap();
        assert!(matches!(
            ModelArtifact::load(&corrupt),
            Err(PipelineError::ModelUnavailable(_))
        ));
        fs::remove_file(&corrupt).unwrap();

        let mut short = artifact(50);
        short.model.coefficients.pop();
        assert!(short.validate().is_err());
    }
}
