//! Staleness-gated backup predictions.
//!
//! When the device stops producing primary predictions, a periodic task
//! classifies the most recent stored samples with the threshold rule and
//! records the result with `source = Backup`.

pub mod controller;
pub mod cycle;
pub mod loop_worker;

pub use controller::BackupController;
pub use cycle::{run_backup_cycle, run_backup_cycle_until, BackupPolicy, CycleOutcome};
pub use loop_worker::SchedulerTiming;
