use serde::{Deserialize, Serialize};

use crate::db::models::AXIS_COUNT;

/// Guards against division by zero on a constant channel.
pub const NORMALIZATION_EPSILON: f64 = 1e-8;

/// Per-axis standardization parameters captured at training time.
///
/// These must be the exact values the model was trained with. Feeding a model
/// features normalized with different parameters raises no error; predictions
/// just get quietly worse. Keep the parameters inside the same artifact as the
/// model coefficients so the two cannot drift apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    pub mean: [f64; AXIS_COUNT],
    pub std: [f64; AXIS_COUNT],
    pub window_size: usize,
}

impl NormalizationParams {
    /// Parameters that leave values unchanged (apart from the epsilon).
    pub fn identity(window_size: usize) -> Self {
        Self {
            mean: [0.0; AXIS_COUNT],
            std: [1.0; AXIS_COUNT],
            window_size,
        }
    }

    pub fn apply(&self, axes: [f64; AXIS_COUNT]) -> [f64; AXIS_COUNT] {
        let mut normalized = [0.0; AXIS_COUNT];
        for axis in 0..AXIS_COUNT {
            normalized[axis] = (axes[axis] - self.mean[axis]) / (self.std[axis] + NORMALIZATION_EPSILON);
        }
        normalized
    }

    pub fn is_finite(&self) -> bool {
        self.mean.iter().chain(self.std.iter()).all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardizes_each_axis() {
        let params = NormalizationParams {
            mean: [1.0, 2.0, 3.0, 0.0, 0.0, 0.0],
            std: [2.0, 0.5, 1.0, 1.0, 1.0, 1.0],
            window_size: 50,
        };
        let out = params.apply([3.0, 1.0, 3.0, 4.0, -4.0, 0.0]);
        assert!((out[0] - 1.0).abs() < 1e-6);
        assert!((out[1] + 2.0).abs() < 1e-6);
        assert!(out[2].abs() < 1e-12);
        assert!((out[3] - 4.0).abs() < 1e-6);
    }

    #[test]
    fn constant_channel_does_not_divide_by_zero() {
        let mut params = NormalizationParams::identity(50);
        params.std[0] = 0.0;
        params.mean[0] = 1.0;
        let out = params.apply([1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(out[0], 0.0);
        assert!(out.iter().all(|v| v.is_finite()));
    }
}
