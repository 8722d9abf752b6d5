use chrono::{DateTime, Utc};
use log::error;
use serde::Serialize;

use crate::db::models::{Activity, PredictionSource};
use crate::error::PipelineError;
use crate::metrics::IngestKind;

use super::IngestOutcome;

const INTERNAL_ERROR_MESSAGE: &str = "internal error";

/// Wire response for one ingested sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestResponse {
    Collecting {
        samples_needed: usize,
    },
    Classified {
        activity: Activity,
        confidence: f64,
        source: PredictionSource,
        timestamp: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        raw_probability: Option<f64>,
    },
    Rejected {
        message: String,
    },
    Error {
        message: String,
    },
}

impl IngestResponse {
    /// Maps an ingest result onto the wire. Warm-up is a status, not a
    /// failure, and internal errors never leak their details to the caller.
    pub fn from_result(result: &Result<IngestOutcome, PipelineError>) -> Self {
        match result {
            Ok(IngestOutcome::Collecting(state)) => IngestResponse::Collecting {
                samples_needed: state.samples_needed,
            },
            Ok(IngestOutcome::Classified {
                record,
                raw_probability,
            }) => IngestResponse::Classified {
                activity: record.activity,
                confidence: record.confidence,
                source: record.source,
                timestamp: record.timestamp,
                raw_probability: *raw_probability,
            },
            Err(PipelineError::InvalidSample(message)) => IngestResponse::Rejected {
                message: message.clone(),
            },
            Err(err) => match err.samples_needed() {
                Some(samples_needed) => IngestResponse::Collecting { samples_needed },
                None => {
                    error!("sample ingestion failed: {err:?}");
                    IngestResponse::Error {
                        message: INTERNAL_ERROR_MESSAGE.to_string(),
                    }
                }
            },
        }
    }

    pub fn kind(&self) -> IngestKind {
        match self {
            IngestResponse::Collecting { .. } => IngestKind::Collecting,
            IngestResponse::Classified { .. } => IngestKind::Classified,
            IngestResponse::Rejected { .. } => IngestKind::Rejected,
            IngestResponse::Error { .. } => IngestKind::Failed,
        }
    }
}
