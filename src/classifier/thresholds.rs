use serde::{Deserialize, Serialize};

use crate::db::models::Activity;

/// Magnitude-statistics cutoffs used by the threshold rule.
///
/// The same values run on the device firmware; both sides must label a given
/// window identically, so any change here ships as a new `version` on both.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationThresholds {
    pub version: u32,
    pub running_variance: f64,
    pub running_magnitude: f64,
    pub walking_variance: f64,
    pub walking_magnitude: f64,
}

/// Thresholds flashed on the current device firmware (gravity-normalized units).
pub const DEVICE_THRESHOLDS: ClassificationThresholds = ClassificationThresholds {
    version: 1,
    running_variance: 0.15,
    running_magnitude: 1.5,
    walking_variance: 0.05,
    walking_magnitude: 1.15,
};

impl Default for ClassificationThresholds {
    fn default() -> Self {
        DEVICE_THRESHOLDS
    }
}

impl ClassificationThresholds {
    pub fn matches_device(&self) -> bool {
        *self == DEVICE_THRESHOLDS
    }
}

/// Fixed per-label confidence shared by the threshold rule and device labels.
pub fn fixed_confidence(activity: Activity) -> f64 {
    match activity {
        Activity::Running => 0.85,
        Activity::Walking => 0.80,
        Activity::Idle => 0.75,
        Activity::Calibrating => 0.50,
        Activity::Unknown => 0.70,
    }
}
