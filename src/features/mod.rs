//! Statistical feature extraction over a full window.
//!
//! Layout is grouped by axis (ax, ay, az, gx, gy, gz) and, within each axis,
//! by statistic (mean, std, min, max, median). Trained model coefficients are
//! indexed by this layout, so it must not change.

mod normalization;

pub use normalization::{NormalizationParams, NORMALIZATION_EPSILON};

use crate::db::models::{SensorSample, AXIS_COUNT, AXIS_NAMES};
use crate::error::PipelineError;

pub const STAT_COUNT: usize = 5;
pub const STAT_NAMES: [&str; STAT_COUNT] = ["mean", "std", "min", "max", "median"];
pub const FEATURE_LEN: usize = AXIS_COUNT * STAT_COUNT;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_LEN]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        FEATURE_LEN
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value of `STAT_NAMES[stat]` for axis `AXIS_NAMES[axis]`.
    pub fn get(&self, axis: usize, stat: usize) -> f64 {
        self.0[axis * STAT_COUNT + stat]
    }

    /// Column names in layout order, e.g. `ax_mean`, `ax_std`, ...
    pub fn names() -> impl Iterator<Item = String> {
        AXIS_NAMES.iter().flat_map(|axis| {
            STAT_NAMES
                .iter()
                .map(move |stat| format!("{axis}_{stat}"))
        })
    }
}

impl From<[f64; FEATURE_LEN]> for FeatureVector {
    fn from(values: [f64; FEATURE_LEN]) -> Self {
        Self(values)
    }
}

/// Extracts features from raw samples.
///
/// Requires at least `window_size` samples; when more are supplied only the
/// most recent `window_size` are used.
pub fn extract(window: &[SensorSample], window_size: usize) -> Result<FeatureVector, PipelineError> {
    let tail = tail(window, window_size)?;
    let rows: Vec<[f64; AXIS_COUNT]> = tail.iter().map(SensorSample::axes).collect();
    Ok(extract_rows(&rows))
}

/// Normalizes every sample with `params` before extracting features.
pub fn extract_normalized(
    window: &[SensorSample],
    window_size: usize,
    params: &NormalizationParams,
) -> Result<FeatureVector, PipelineError> {
    let tail = tail(window, window_size)?;
    let rows: Vec<[f64; AXIS_COUNT]> = tail.iter().map(|s| params.apply(s.axes())).collect();
    Ok(extract_rows(&rows))
}

fn tail(window: &[SensorSample], window_size: usize) -> Result<&[SensorSample], PipelineError> {
    if window_size == 0 || window.len() < window_size {
        return Err(PipelineError::InsufficientData {
            needed: window_size.max(1),
            available: window.len(),
        });
    }
    Ok(&window[window.len() - window_size..])
}

fn extract_rows(rows: &[[f64; AXIS_COUNT]]) -> FeatureVector {
    let mut features = [0.0; FEATURE_LEN];
    let mut column = Vec::with_capacity(rows.len());

    for axis in 0..AXIS_COUNT {
        column.clear();
        column.extend(rows.iter().map(|row| row[axis]));

        let stats = column_stats(&mut column);
        features[axis * STAT_COUNT..(axis + 1) * STAT_COUNT].copy_from_slice(&stats);
    }

    FeatureVector(features)
}

/// `[mean, population std, min, max, median]`; sorts `column` in place.
fn column_stats(column: &mut [f64]) -> [f64; STAT_COUNT] {
    let n = column.len() as f64;
    let mean = column.iter().sum::<f64>() / n;
    let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    column.sort_by(|a, b| a.total_cmp(b));
    let min = column[0];
    let max = column[column.len() - 1];
    let mid = column.len() / 2;
    let median = if column.len() % 2 == 0 {
        (column[mid - 1] + column[mid]) / 2.0
    } else {
        column[mid]
    };

    [mean, variance.sqrt(), min, max, median]
}
