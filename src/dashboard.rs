//! Read-only views over stored predictions and runtime state.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::StrategyKind;
use crate::db::{Activity, Database, PredictionRecord, PredictionSource, SensorSample};
use crate::metrics::MetricsSnapshot;
use crate::window::WindowState;

pub const DEFAULT_HISTORY_HOURS: u32 = 24;
pub const DEFAULT_HISTORY_LIMIT: usize = 100;
const MAX_HISTORY_LIMIT: usize = 1000;

fn default_hours() -> u32 {
    DEFAULT_HISTORY_HOURS
}

fn default_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_offset() -> usize {
    0
}

/// A dashboard request as sent over the driver's input stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum DashboardQuery {
    Realtime,
    History {
        #[serde(default = "default_hours")]
        hours: u32,
        #[serde(default = "default_limit")]
        limit: usize,
    },
    Totals,
    Status,
    /// Raw stored samples, newest first.
    Sensors {
        #[serde(default = "default_limit")]
        limit: usize,
        #[serde(default = "default_offset")]
        offset: usize,
    },
    /// Raw stored predictions, newest first.
    Predictions {
        #[serde(default = "default_limit")]
        limit: usize,
        #[serde(default = "default_offset")]
        offset: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RealtimeView {
    Success {
        activity: Activity,
        confidence: f64,
        source: PredictionSource,
        timestamp: DateTime<Utc>,
    },
    NoData {
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    pub hours: u32,
    pub total_records: usize,
    pub records: Vec<PredictionRecord>,
    /// Counts over the whole window, not just the returned page.
    pub statistics: BTreeMap<Activity, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsView {
    pub total_records: u64,
    pub counts: BTreeMap<Activity, u64>,
}

/// One page of a raw table plus the table's full row count.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView<T> {
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
    pub records: Vec<T>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStatus {
    pub scheduler_running: bool,
    pub strategy: StrategyKind,
    pub window_size: usize,
    pub window: WindowState,
    pub stored_samples: u64,
    pub metrics: MetricsSnapshot,
}

pub async fn realtime(db: &Database, now: DateTime<Utc>) -> Result<RealtimeView> {
    let view = match db.latest_prediction().await? {
        Some(record) => RealtimeView::Success {
            activity: record.activity,
            confidence: record.confidence,
            source: record.source,
            timestamp: record.timestamp,
        },
        None => RealtimeView::NoData { timestamp: now },
    };
    Ok(view)
}

pub async fn history(
    db: &Database,
    hours: u32,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<HistoryView> {
    let since = now - Duration::hours(i64::from(hours));
    let limit = limit.min(MAX_HISTORY_LIMIT);

    let records = db.predictions_since(since, limit).await?;
    let statistics = db.activity_counts(Some(since)).await?;

    Ok(HistoryView {
        hours,
        total_records: records.len(),
        records,
        statistics,
    })
}

/// All-time counts with every activity present, zero when never seen.
pub async fn totals(db: &Database) -> Result<TotalsView> {
    let mut counts: BTreeMap<Activity, u64> =
        Activity::ALL.iter().map(|activity| (*activity, 0)).collect();
    counts.extend(db.activity_counts(None).await?);

    Ok(TotalsView {
        total_records: counts.values().sum(),
        counts,
    })
}

pub async fn sensor_page(
    db: &Database,
    limit: usize,
    offset: usize,
) -> Result<PageView<SensorSample>> {
    let limit = limit.min(MAX_HISTORY_LIMIT);
    Ok(PageView {
        total: db.count_samples().await?,
        limit,
        offset,
        records: db.sample_page(limit, offset).await?,
    })
}

pub async fn prediction_page(
    db: &Database,
    limit: usize,
    offset: usize,
) -> Result<PageView<PredictionRecord>> {
    let limit = limit.min(MAX_HISTORY_LIMIT);
    Ok(PageView {
        total: db.count_predictions().await?,
        limit,
        offset,
        records: db.prediction_page(limit, offset).await?,
    })
}
