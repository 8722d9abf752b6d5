use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::Activity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CycleKind {
    Recorded,
    SkippedPrimaryActive,
    SkippedInsufficientSamples,
    SkippedRecentBackup,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    pub kind: CycleKind,
    pub activity: Option<Activity>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IngestKind {
    Collecting,
    Classified,
    Rejected,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestCounters {
    pub collecting: u64,
    pub classified: u64,
    pub rejected: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleCounters {
    pub recorded: u64,
    pub skipped_primary_active: u64,
    pub skipped_insufficient_samples: u64,
    pub skipped_recent_backup: u64,
    pub failed: u64,
    pub timed_out: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub ingest: IngestCounters,
    pub cycles: CycleCounters,
    pub recent_cycles: Vec<CycleReport>,
}
