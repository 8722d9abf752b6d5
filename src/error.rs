use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the classification pipeline and the backup scheduler.
///
/// Storage and wiring code works in `anyhow::Result`; those failures enter this
/// enum through the `Storage` variant at the pipeline boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The inbound sample was malformed. Only that sample is rejected.
    #[error("invalid sample: {0}")]
    InvalidSample(String),

    /// The window does not yet hold enough samples to classify.
    #[error("insufficient data: need {needed} samples, have {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The model artifact is missing, corrupt, or produced unusable output.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// A storage call did not complete within its deadline.
    #[error("storage call timed out after {0:?}")]
    StorageTimeout(Duration),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl PipelineError {
    /// Number of samples still missing when this is an `InsufficientData` error.
    pub fn samples_needed(&self) -> Option<usize> {
        match self {
            PipelineError::InsufficientData { needed, available } => {
                Some(needed.saturating_sub(*available))
            }
            _ => None,
        }
    }

    /// Transient errors are retried on the next cycle instead of being reported.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PipelineError::StorageTimeout(_) | PipelineError::Storage(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_reports_samples_needed() {
        let err = PipelineError::InsufficientData {
            needed: 50,
            available: 12,
        };
        assert_eq!(err.samples_needed(), Some(38));
        assert!(!err.is_transient());
    }

    #[test]
    fn storage_errors_are_transient() {
        let timeout = PipelineError::StorageTimeout(Duration::from_secs(5));
        let storage = PipelineError::from(anyhow::anyhow!("disk gone"));
        assert!(timeout.is_transient());
        assert!(storage.is_transient());
        assert_eq!(storage.samples_needed(), None);
    }
}
