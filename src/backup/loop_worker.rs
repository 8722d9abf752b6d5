use chrono::Utc;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::db::Database;
use crate::error::PipelineError;
use crate::metrics::{CycleKind, CycleReport, MetricsCollector};

use super::cycle::{run_backup_cycle_until, BackupPolicy, CycleOutcome};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerTiming {
    pub tick_interval: Duration,
    /// Upper bound on one cycle's storage work.
    pub storage_timeout: Duration,
}

pub async fn backup_loop(
    db: Database,
    policy: BackupPolicy,
    timing: SchedulerTiming,
    metrics: MetricsCollector,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(timing.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last_attempt: Option<Instant> = None;

    log_info!(
        "backup scheduler started (tick {:?}, dead time {:?})",
        timing.tick_interval,
        policy.dead_time
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !dead_time_elapsed(last_attempt.as_ref(), policy.dead_time) {
                    continue;
                }

                let started = Instant::now();
                let deadline = (started + timing.storage_timeout).into_std();
                let fut = run_backup_cycle_until(&db, &policy, Utc::now(), deadline);
                let result = match tokio::time::timeout(timing.storage_timeout, fut).await {
                    Ok(Ok(outcome)) => Ok(outcome),
                    Ok(Err(err)) => Err(PipelineError::Storage(err)),
                    Err(_) => Err(PipelineError::StorageTimeout(timing.storage_timeout)),
                };

                // Failed cycles do not consume the dead time, so the next tick retries.
                if result.is_ok() {
                    last_attempt = Some(started);
                }

                metrics.record_cycle(report_for(&result, started)).await;
                log_outcome(&result);
            }
            _ = cancel_token.cancelled() => {
                log_info!("backup scheduler shutting down");
                break;
            }
        }
    }
}

fn dead_time_elapsed(last_attempt: Option<&Instant>, dead_time: Duration) -> bool {
    last_attempt
        .map(|instant| instant.elapsed() >= dead_time)
        .unwrap_or(true)
}

fn report_for(result: &Result<CycleOutcome, PipelineError>, started: Instant) -> CycleReport {
    let (kind, activity) = match result {
        Ok(CycleOutcome::Recorded { record, .. }) => (CycleKind::Recorded, Some(record.activity)),
        Ok(CycleOutcome::SkippedPrimaryActive { .. }) => (CycleKind::SkippedPrimaryActive, None),
        Ok(CycleOutcome::SkippedInsufficientSamples { .. }) => {
            (CycleKind::SkippedInsufficientSamples, None)
        }
        Ok(CycleOutcome::SkippedRecentBackup { .. }) => (CycleKind::SkippedRecentBackup, None),
        Err(PipelineError::StorageTimeout(_)) => (CycleKind::TimedOut, None),
        Err(_) => (CycleKind::Failed, None),
    };

    CycleReport {
        timestamp: Utc::now(),
        kind,
        activity,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

fn log_outcome(result: &Result<CycleOutcome, PipelineError>) {
    match result {
        Ok(CycleOutcome::Recorded { record, stats }) => log_warn!(
            "backup prediction: {} (conf={:.2}, var={:.3}, max={:.3})",
            record.activity.as_str(),
            record.confidence,
            stats.variance,
            stats.max
        ),
        Ok(CycleOutcome::SkippedPrimaryActive { recent_primary }) => {
            log_debug!("primary source active ({recent_primary} recent predictions), backup idle")
        }
        Ok(CycleOutcome::SkippedInsufficientSamples { available }) => {
            log_debug!("backup skipped: only {available} stored samples")
        }
        Ok(CycleOutcome::SkippedRecentBackup { recent_backup }) => {
            log_debug!("backup skipped: {recent_backup} backup predictions inside dead time")
        }
        Err(err @ PipelineError::StorageTimeout(_)) => log_warn!("backup cycle {err}"),
        Err(err) => log_error!("backup cycle failed: {err:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassificationThresholds;
    use crate::db::{PredictionSource, SensorSample};

    #[test]
    fn first_tick_is_always_eligible() {
        assert!(dead_time_elapsed(None, Duration::from_secs(30)));
    }

    #[test]
    fn recent_attempt_blocks_until_dead_time_passes() {
        let just_now = Instant::now();
        assert!(!dead_time_elapsed(Some(&just_now), Duration::from_secs(30)));
        assert!(dead_time_elapsed(Some(&just_now), Duration::ZERO));
    }

    #[test]
    fn timeouts_are_reported_separately_from_failures() {
        let started = Instant::now();
        let timeout = report_for(
            &Err(PipelineError::StorageTimeout(Duration::from_secs(5))),
            started,
        );
        assert_eq!(timeout.kind, CycleKind::TimedOut);

        let failed = report_for(&Err(PipelineError::from(anyhow::anyhow!("locked"))), started);
        assert_eq!(failed.kind, CycleKind::Failed);
    }

    #[tokio::test]
    async fn stalled_store_yields_one_backup_after_recovery() {
        let db = Database::open_in_memory().unwrap();
        for n in 0..5 {
            let axes = [0.0, 0.0, 1.0 + n as f64 * 0.01, 0.0, 0.0, 0.0];
            let sample = SensorSample::new(axes, Utc::now()).unwrap();
            db.insert_sample(&sample).await.unwrap();
        }

        // Occupy the worker thread so every cycle queues behind it.
        let stall = tokio::spawn({
            let db = db.clone();
            async move {
                db.execute(|_| {
                    std::thread::sleep(std::time::Duration::from_millis(300));
                    Ok(())
                })
                .await
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let policy = BackupPolicy {
            window_size: 5,
            dead_time: Duration::from_secs(30),
            thresholds: ClassificationThresholds::default(),
        };
        let timing = SchedulerTiming {
            tick_interval: Duration::from_millis(20),
            storage_timeout: Duration::from_millis(50),
        };
        let metrics = MetricsCollector::new();
        let cancel_token = CancellationToken::new();
        let worker = tokio::spawn(backup_loop(
            db.clone(),
            policy,
            timing,
            metrics.clone(),
            cancel_token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(800)).await;
        cancel_token.cancel();
        worker.await.unwrap();
        stall.await.unwrap().unwrap();

        let backups = db
            .count_predictions_since(PredictionSource::Backup, Utc::now() - chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(backups, 1);

        let cycles = metrics.get_snapshot().await.cycles;
        assert!(cycles.timed_out >= 1);
        assert!(cycles.recorded <= 1);
        assert!(cycles.recorded + cycles.skipped_recent_backup >= 1);
    }
}
