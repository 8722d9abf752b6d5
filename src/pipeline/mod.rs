//! Primary ingestion path.
//!
//! validate → persist raw sample → push window → classify → persist a
//! `Primary` prediction. A device-supplied label short-circuits
//! classification and is recorded with its fixed confidence.

mod inbound;
mod response;

pub use inbound::InboundSample;
pub use response::IngestResponse;

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::info;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::classifier::{fixed_confidence, ClassifierStrategy, StrategyKind};
use crate::db::{Activity, Database, PredictionRecord, PredictionSource, SensorSample};
use crate::error::PipelineError;
use crate::metrics::MetricsCollector;
use crate::window::{SampleWindow, WindowState};

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Collecting(WindowState),
    Classified {
        record: PredictionRecord,
        raw_probability: Option<f64>,
    },
}

/// Owns the in-memory window. Clones share the same window, so concurrent
/// ingest calls serialize on its lock.
#[derive(Clone)]
pub struct ActivityPipeline {
    db: Database,
    window: Arc<Mutex<SampleWindow>>,
    strategy: Arc<ClassifierStrategy>,
    window_size: usize,
    metrics: MetricsCollector,
}

impl ActivityPipeline {
    pub fn new(
        db: Database,
        strategy: ClassifierStrategy,
        window_size: usize,
        metrics: MetricsCollector,
    ) -> Self {
        let window = SampleWindow::new(window_size);
        Self {
            db,
            window_size: window.capacity(),
            window: Arc::new(Mutex::new(window)),
            strategy: Arc::new(strategy),
            metrics,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Rebuilds the window from the most recent stored samples.
    pub async fn warm_start(&self) -> Result<WindowState> {
        let samples = self.db.recent_samples(self.window_size).await?;
        let mut window = self.window.lock().await;
        let state = window.seed(samples);
        info!(
            "window warm-started with {} stored samples ({} still needed)",
            window.len(),
            state.samples_needed
        );
        Ok(state)
    }

    pub async fn window_state(&self) -> WindowState {
        self.window.lock().await.state()
    }

    pub async fn ingest(
        &self,
        inbound: InboundSample,
        received_at: DateTime<Utc>,
    ) -> Result<IngestOutcome, PipelineError> {
        let sample = SensorSample::new(inbound.axes, received_at)?;

        let mut window = self.window.lock().await;
        self.db.insert_sample(&sample).await?;
        let state = window.push(sample);

        if let Some(label) = inbound.device_label {
            let activity = Activity::from_device_label(&label);
            let record = PredictionRecord::new(
                activity,
                fixed_confidence(activity),
                PredictionSource::Primary,
                received_at,
            );
            self.db.insert_prediction(&record).await?;
            return Ok(IngestOutcome::Classified {
                record,
                raw_probability: None,
            });
        }

        if !state.ready {
            return Ok(IngestOutcome::Collecting(state));
        }

        let classification = self
            .strategy
            .classify(&window.snapshot(), self.window_size)?;
        let record = PredictionRecord::new(
            classification.activity,
            classification.confidence,
            PredictionSource::Primary,
            received_at,
        );
        self.db.insert_prediction(&record).await?;

        Ok(IngestOutcome::Classified {
            record,
            raw_probability: classification.raw_probability,
        })
    }

    /// Parses, ingests and maps one raw JSON sample to its wire response,
    /// recording the outcome in metrics.
    pub async fn handle_sample(&self, value: &Value, received_at: DateTime<Utc>) -> IngestResponse {
        let result = match InboundSample::from_json(value) {
            Ok(inbound) => self.ingest(inbound, received_at).await,
            Err(err) => Err(err),
        };

        let response = IngestResponse::from_result(&result);
        self.metrics.record_ingest(response.kind()).await;
        response
    }
}
