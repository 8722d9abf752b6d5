//! Raw IMU sample data model.
//!
//! One accelerometer + gyroscope reading as received from the device. Samples
//! are validated on construction and never change afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

pub const AXIS_COUNT: usize = 6;

/// Axis order shared by storage, the window and the feature extractor.
pub const AXIS_NAMES: [&str; AXIS_COUNT] = ["ax", "ay", "az", "gx", "gy", "gz"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorSample {
    id: Option<i64>,
    axes: [f64; AXIS_COUNT],
    magnitude: f64,
    received_at: DateTime<Utc>,
}

impl SensorSample {
    /// Builds a sample, rejecting non-finite axis values.
    pub fn new(axes: [f64; AXIS_COUNT], received_at: DateTime<Utc>) -> Result<Self, PipelineError> {
        if let Some(index) = axes.iter().position(|value| !value.is_finite()) {
            return Err(PipelineError::InvalidSample(format!(
                "{} is not a finite number",
                AXIS_NAMES[index]
            )));
        }

        Ok(Self {
            id: None,
            axes,
            magnitude: acceleration_magnitude(axes[0], axes[1], axes[2]),
            received_at,
        })
    }

    /// Rebuilds a sample loaded from the store, re-running validation.
    ///
    /// Uses the persisted magnitude when present; rows written before the
    /// column existed hold NULL and get it recomputed.
    pub(crate) fn from_stored(
        id: i64,
        axes: [f64; AXIS_COUNT],
        magnitude: Option<f64>,
        received_at: DateTime<Utc>,
    ) -> Result<Self, PipelineError> {
        let mut sample = Self::new(axes, received_at)?;
        sample.id = Some(id);
        if let Some(stored) = magnitude.filter(|value| value.is_finite()) {
            sample.magnitude = stored;
        }
        Ok(sample)
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn axes(&self) -> [f64; AXIS_COUNT] {
        self.axes
    }

    pub fn axis(&self, index: usize) -> f64 {
        self.axes[index]
    }

    /// Euclidean norm of the three acceleration axes.
    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

pub fn acceleration_magnitude(ax: f64, ay: f64, az: f64) -> f64 {
    (ax * ax + ay * ay + az * az).sqrt()
}
