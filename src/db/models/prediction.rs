//! Prediction record data model.
//!
//! A prediction is written once per classification event, either by the
//! ingestion path (`Primary`) or by the backup scheduler (`Backup`), and is
//! never updated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Activity {
    Walking,
    Running,
    Idle,
    Calibrating,
    Unknown,
}

impl Activity {
    pub const ALL: [Activity; 5] = [
        Activity::Walking,
        Activity::Running,
        Activity::Idle,
        Activity::Calibrating,
        Activity::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Activity::Walking => "Walking",
            Activity::Running => "Running",
            Activity::Idle => "Idle",
            Activity::Calibrating => "Calibrating",
            Activity::Unknown => "Unknown",
        }
    }

    /// Maps a free-form device label onto the fixed activity set.
    pub fn from_device_label(label: &str) -> Activity {
        match label.trim().to_ascii_lowercase().as_str() {
            "walking" => Activity::Walking,
            "running" => Activity::Running,
            "idle" => Activity::Idle,
            "calibrating" => Activity::Calibrating,
            _ => Activity::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum PredictionSource {
    Primary,
    Backup,
}

impl PredictionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionSource::Primary => "Primary",
            PredictionSource::Backup => "Backup",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub id: String,
    pub activity: Activity,
    pub confidence: f64,
    pub source: PredictionSource,
    pub timestamp: DateTime<Utc>,
}

impl PredictionRecord {
    /// Creates a fresh record. Confidence is clamped into `[0, 1]`.
    pub fn new(
        activity: Activity,
        confidence: f64,
        source: PredictionSource,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        Self {
            id: Uuid::new_v4().to_string(),
            activity,
            confidence,
            source,
            timestamp,
        }
    }
}
