use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::TransactionBehavior;

use crate::classifier::{ClassificationThresholds, MagnitudeStats, ThresholdClassifier};
use crate::db::{
    count_predictions_since_row, insert_prediction_row, recent_sample_rows, Database,
    PredictionRecord, PredictionSource,
};

/// What a backup cycle needs to decide and classify.
#[derive(Debug, Clone, Copy)]
pub struct BackupPolicy {
    pub window_size: usize,
    /// Primary silence required before the backup may write, and the minimum
    /// spacing between backup attempts.
    pub dead_time: Duration,
    pub thresholds: ClassificationThresholds,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Recorded {
        record: PredictionRecord,
        stats: MagnitudeStats,
    },
    SkippedPrimaryActive {
        recent_primary: u64,
    },
    SkippedInsufficientSamples {
        available: usize,
    },
    /// Another backup already landed inside the dead time.
    SkippedRecentBackup {
        recent_backup: u64,
    },
}

/// Runs one eligibility check and, when eligible, writes a `Backup` prediction.
///
/// The check, the sample read and the insert happen in a single immediate
/// transaction on the store's worker thread, so no primary write can land
/// between deciding and writing.
pub async fn run_backup_cycle(
    db: &Database,
    policy: &BackupPolicy,
    now: DateTime<Utc>,
) -> Result<CycleOutcome> {
    run_cycle(db, policy, now, None).await
}

/// Same as [`run_backup_cycle`], but the work is dropped without writing
/// once `deadline` has passed.
///
/// A caller that stops waiting at `deadline` can leave the closure queued
/// behind a stalled worker; this keeps it from committing afterwards.
pub async fn run_backup_cycle_until(
    db: &Database,
    policy: &BackupPolicy,
    now: DateTime<Utc>,
    deadline: Instant,
) -> Result<CycleOutcome> {
    run_cycle(db, policy, now, Some(deadline)).await
}

fn ensure_before(deadline: Option<Instant>, stage: &str) -> Result<()> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => {
            bail!("backup cycle abandoned past its deadline ({stage})")
        }
        _ => Ok(()),
    }
}

async fn run_cycle(
    db: &Database,
    policy: &BackupPolicy,
    now: DateTime<Utc>,
    deadline: Option<Instant>,
) -> Result<CycleOutcome> {
    let policy = *policy;
    let dead_time = chrono::Duration::from_std(policy.dead_time)
        .context("dead time out of range")?;
    let since = now - dead_time;

    db.execute(move |conn| {
        ensure_before(deadline, "before start")?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to open backup transaction")?;

        let recent_primary = count_predictions_since_row(&tx, PredictionSource::Primary, since)?;
        if recent_primary > 0 {
            return Ok(CycleOutcome::SkippedPrimaryActive { recent_primary });
        }

        let recent_backup = count_predictions_since_row(&tx, PredictionSource::Backup, since)?;
        if recent_backup > 0 {
            return Ok(CycleOutcome::SkippedRecentBackup { recent_backup });
        }

        let samples = recent_sample_rows(&tx, policy.window_size)?;
        if samples.len() < policy.window_size {
            return Ok(CycleOutcome::SkippedInsufficientSamples {
                available: samples.len(),
            });
        }

        let magnitudes: Vec<f64> = samples.iter().map(|s| s.magnitude()).collect();
        let stats = MagnitudeStats::from_magnitudes(&magnitudes)?;
        let classification = ThresholdClassifier::new(policy.thresholds).decide(&stats);
        let record = PredictionRecord::new(
            classification.activity,
            classification.confidence,
            PredictionSource::Backup,
            now,
        );

        insert_prediction_row(&tx, &record)?;
        // Dropping the transaction here rolls the insert back.
        ensure_before(deadline, "before commit")?;
        tx.commit().context("failed to commit backup prediction")?;

        Ok(CycleOutcome::Recorded { record, stats })
    })
    .await
}
