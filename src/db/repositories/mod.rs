pub mod predictions;
pub mod sensor_samples;
