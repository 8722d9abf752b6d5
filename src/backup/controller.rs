use anyhow::{Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::db::Database;
use crate::metrics::MetricsCollector;

use super::cycle::BackupPolicy;
use super::loop_worker::{backup_loop, SchedulerTiming};

/// Owns the background backup task. Starting is idempotent; stopping cancels
/// the loop and waits for it to exit.
pub struct BackupController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl Default for BackupController {
    fn default() -> Self {
        Self::new()
    }
}

impl BackupController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    /// Spawns the loop unless it is already running. Returns whether a new
    /// task was started. Must be called from within a Tokio runtime.
    pub fn start(
        &mut self,
        db: Database,
        policy: BackupPolicy,
        timing: SchedulerTiming,
        metrics: MetricsCollector,
    ) -> bool {
        if self.is_running() {
            info!("backup scheduler already running; start ignored");
            return false;
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(backup_loop(
            db,
            policy,
            timing,
            metrics,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        true
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("backup scheduler task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassificationThresholds;
    use crate::db::{PredictionSource, SensorSample};
    use crate::metrics::CycleKind;
    use chrono::Utc;
    use std::time::Duration;

    fn policy(window_size: usize) -> BackupPolicy {
        BackupPolicy {
            window_size,
            dead_time: Duration::from_secs(30),
            thresholds: ClassificationThresholds::default(),
        }
    }

    fn timing() -> SchedulerTiming {
        SchedulerTiming {
            tick_interval: Duration::from_millis(10),
            storage_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_ends_the_loop() {
        let db = Database::open_in_memory().unwrap();
        let metrics = MetricsCollector::new();
        let mut controller = BackupController::new();

        assert!(controller.start(db.clone(), policy(50), timing(), metrics.clone()));
        assert!(controller.is_running());
        assert!(!controller.start(db.clone(), policy(50), timing(), metrics.clone()));

        controller.stop().await.unwrap();
        assert!(!controller.is_running());

        // Stopping twice is harmless, and the controller can be restarted.
        controller.stop().await.unwrap();
        assert!(controller.start(db, policy(50), timing(), metrics));
        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn first_tick_writes_one_backup_then_waits_out_dead_time() {
        let db = Database::open_in_memory().unwrap();
        for _ in 0..5 {
            let sample = SensorSample::new([0.0, 0.0, 1.0, 0.0, 0.0, 0.0], Utc::now()).unwrap();
            db.insert_sample(&sample).await.unwrap();
        }

        let metrics = MetricsCollector::new();
        let mut controller = BackupController::new();
        controller.start(db.clone(), policy(5), timing(), metrics.clone());

        // Many ticks elapse; only the first falls outside the dead time.
        tokio::time::sleep(Duration::from_millis(200)).await;
        controller.stop().await.unwrap();

        let since = Utc::now() - chrono::Duration::hours(1);
        let backups = db
            .count_predictions_since(PredictionSource::Backup, since)
            .await
            .unwrap();
        assert_eq!(backups, 1);

        let snapshot = metrics.get_snapshot().await;
        assert_eq!(snapshot.cycles.recorded, 1);
        assert_eq!(snapshot.recent_cycles[0].kind, CycleKind::Recorded);
    }
}
