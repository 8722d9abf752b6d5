mod types;

pub use types::{
    CycleCounters, CycleKind, CycleReport, IngestCounters, IngestKind, MetricsSnapshot,
};

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

const MAX_RECENT_CYCLES: usize = 20;

/// In-process counters for the ingestion path and the backup scheduler.
#[derive(Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsState>>,
}

#[derive(Default)]
struct MetricsState {
    ingest: IngestCounters,
    cycles: CycleCounters,
    recent_cycles: VecDeque<CycleReport>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_ingest(&self, kind: IngestKind) {
        let mut state = self.inner.lock().await;
        let counter = match kind {
            IngestKind::Collecting => &mut state.ingest.collecting,
            IngestKind::Classified => &mut state.ingest.classified,
            IngestKind::Rejected => &mut state.ingest.rejected,
            IngestKind::Failed => &mut state.ingest.failed,
        };
        *counter += 1;
    }

    pub async fn record_cycle(&self, report: CycleReport) {
        let mut state = self.inner.lock().await;

        let counter = match report.kind {
            CycleKind::Recorded => &mut state.cycles.recorded,
            CycleKind::SkippedPrimaryActive => &mut state.cycles.skipped_primary_active,
            CycleKind::SkippedInsufficientSamples => {
                &mut state.cycles.skipped_insufficient_samples
            }
            CycleKind::SkippedRecentBackup => &mut state.cycles.skipped_recent_backup,
            CycleKind::Failed => &mut state.cycles.failed,
            CycleKind::TimedOut => &mut state.cycles.timed_out,
        };
        *counter += 1;

        state.recent_cycles.push_back(report);
        if state.recent_cycles.len() > MAX_RECENT_CYCLES {
            state.recent_cycles.pop_front();
        }
    }

    pub async fn get_snapshot(&self) -> MetricsSnapshot {
        let state = self.inner.lock().await;
        MetricsSnapshot {
            ingest: state.ingest.clone(),
            cycles: state.cycles.clone(),
            recent_cycles: state.recent_cycles.iter().cloned().collect(),
        }
    }

    pub async fn reset(&self) {
        let mut state = self.inner.lock().await;
        *state = MetricsState::default();
    }
}
