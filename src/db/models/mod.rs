pub mod prediction;
pub mod sensor_sample;

pub use prediction::{Activity, PredictionRecord, PredictionSource};
pub use sensor_sample::{acceleration_magnitude, SensorSample, AXIS_COUNT, AXIS_NAMES};
