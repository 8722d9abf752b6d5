mod connection;
pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::{Activity, PredictionRecord, PredictionSource, SensorSample};

pub(crate) use repositories::predictions::{count_predictions_since_row, insert_prediction_row};
pub(crate) use repositories::sensor_samples::recent_sample_rows;
