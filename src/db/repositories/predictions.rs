use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{
        decode_text, format_timestamp, parse_activity, parse_datetime, parse_source, to_i64, to_u64,
    },
    models::{Activity, PredictionRecord, PredictionSource},
};

fn row_to_prediction(row: &Row) -> Result<PredictionRecord, rusqlite::Error> {
    Ok(PredictionRecord {
        id: row.get("id")?,
        activity: decode_text(row, "activity", parse_activity)?,
        confidence: row.get("confidence")?,
        source: decode_text(row, "source", parse_source)?,
        timestamp: decode_text(row, "timestamp", |value| parse_datetime(value, "timestamp"))?,
    })
}

pub(crate) fn insert_prediction_row(conn: &Connection, record: &PredictionRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO predictions (id, activity, confidence, source, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.id,
            record.activity.as_str(),
            record.confidence,
            record.source.as_str(),
            format_timestamp(record.timestamp),
        ],
    )
    .context("failed to insert prediction")?;
    Ok(())
}

/// Count of `source` predictions stamped strictly after `since`.
pub(crate) fn count_predictions_since_row(
    conn: &Connection,
    source: PredictionSource,
    since: DateTime<Utc>,
) -> Result<u64> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM predictions
             WHERE source = ?1 AND timestamp > ?2",
            params![source.as_str(), format_timestamp(since)],
            |row| row.get(0),
        )
        .context("failed to count recent predictions")?;
    to_u64(count, "prediction count")
}

impl Database {
    pub async fn insert_prediction(&self, record: &PredictionRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| insert_prediction_row(conn, &record))
            .await
    }

    pub async fn count_predictions_since(
        &self,
        source: PredictionSource,
        since: DateTime<Utc>,
    ) -> Result<u64> {
        self.execute(move |conn| count_predictions_since_row(conn, source, since))
            .await
    }

    /// Newest prediction from any source.
    pub async fn latest_prediction(&self) -> Result<Option<PredictionRecord>> {
        self.execute(|conn| {
            let record = conn
                .query_row(
                    "SELECT id, activity, confidence, source, timestamp
                     FROM predictions
                     ORDER BY timestamp DESC
                     LIMIT 1",
                    [],
                    row_to_prediction,
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    /// Predictions at or after `since`, newest first, capped at `limit`.
    pub async fn predictions_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PredictionRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, activity, confidence, source, timestamp
                 FROM predictions
                 WHERE timestamp >= ?1
                 ORDER BY timestamp DESC
                 LIMIT ?2",
            )?;

            let records = stmt
                .query_map(
                    params![format_timestamp(since), to_i64(limit as u64)?],
                    row_to_prediction,
                )?
                .collect::<Result<Vec<_>, _>>()
                .context("failed to read prediction history")?;
            Ok(records)
        })
        .await
    }

    /// Per-activity prediction counts, optionally restricted to `since` onwards.
    pub async fn activity_counts(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<BTreeMap<Activity, u64>> {
        self.execute(move |conn| {
            let since = since.map(format_timestamp);
            let mut stmt = conn.prepare(
                "SELECT activity, COUNT(*) AS count
                 FROM predictions
                 WHERE ?1 IS NULL OR timestamp >= ?1
                 GROUP BY activity",
            )?;

            let mut rows = stmt.query(params![since])?;
            let mut counts = BTreeMap::new();
            while let Some(row) = rows.next()? {
                let activity = parse_activity(&row.get::<_, String>(0)?)?;
                let count = to_u64(row.get::<_, i64>(1)?, "activity count")?;
                counts.insert(activity, count);
            }

            Ok(counts)
        })
        .await
    }

    /// One page of predictions in reverse insertion order.
    pub async fn prediction_page(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PredictionRecord>> {
        self.execute(move |conn| {
            // `id` is a uuid, so insertion order comes from the rowid.
            let mut stmt = conn.prepare(
                "SELECT id, activity, confidence, source, timestamp
                 FROM predictions
                 ORDER BY rowid DESC
                 LIMIT ?1 OFFSET ?2",
            )?;

            let records = stmt
                .query_map(
                    params![to_i64(limit as u64)?, to_i64(offset as u64)?],
                    row_to_prediction,
                )?
                .collect::<Result<Vec<_>, _>>()
                .context("failed to read prediction page")?;
            Ok(records)
        })
        .await
    }

    pub async fn count_predictions(&self) -> Result<u64> {
        self.execute(|conn| {
            let total: i64 =
                conn.query_row("SELECT COUNT(*) FROM predictions", [], |row| row.get(0))?;
            to_u64(total, "prediction count")
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn record(activity: Activity, source: PredictionSource, secs: i64) -> PredictionRecord {
        PredictionRecord::new(activity, 0.8, source, base_time() + Duration::seconds(secs))
    }

    #[tokio::test]
    async fn counts_only_matching_source_after_cutoff() {
        let db = Database::open_in_memory().unwrap();
        db.insert_prediction(&record(Activity::Walking, PredictionSource::Primary, 0))
            .await
            .unwrap();
        db.insert_prediction(&record(Activity::Walking, PredictionSource::Primary, 20))
            .await
            .unwrap();
        db.insert_prediction(&record(Activity::Idle, PredictionSource::Backup, 25))
            .await
            .unwrap();

        let since = base_time() + Duration::seconds(10);
        assert_eq!(
            db.count_predictions_since(PredictionSource::Primary, since)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            db.count_predictions_since(PredictionSource::Backup, since)
                .await
                .unwrap(),
            1
        );
        assert_eq!(db.count_predictions().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn latest_prediction_is_newest_by_timestamp() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.latest_prediction().await.unwrap().is_none());

        let newest = record(Activity::Running, PredictionSource::Backup, 30);
        db.insert_prediction(&newest).await.unwrap();
        db.insert_prediction(&record(Activity::Idle, PredictionSource::Primary, 5))
            .await
            .unwrap();

        assert_eq!(db.latest_prediction().await.unwrap(), Some(newest));
    }

    #[tokio::test]
    async fn history_and_counts_respect_window() {
        let db = Database::open_in_memory().unwrap();
        for (secs, activity) in [
            (0, Activity::Idle),
            (60, Activity::Walking),
            (120, Activity::Walking),
            (180, Activity::Running),
        ] {
            db.insert_prediction(&record(activity, PredictionSource::Primary, secs))
                .await
                .unwrap();
        }

        let since = base_time() + Duration::seconds(60);
        let history = db.predictions_since(since, 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].activity, Activity::Running);
        assert_eq!(history[1].activity, Activity::Walking);

        let windowed = db.activity_counts(Some(since)).await.unwrap();
        assert_eq!(windowed.get(&Activity::Walking), Some(&2));
        assert_eq!(windowed.get(&Activity::Idle), None);

        let all = db.activity_counts(None).await.unwrap();
        assert_eq!(all.values().sum::<u64>(), 4);
    }

    #[tokio::test]
    async fn prediction_pages_follow_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        // Inserted out of timestamp order on purpose.
        let inserted = [
            record(Activity::Idle, PredictionSource::Primary, 60),
            record(Activity::Walking, PredictionSource::Backup, 0),
            record(Activity::Running, PredictionSource::Primary, 30),
        ];
        for record in &inserted {
            db.insert_prediction(record).await.unwrap();
        }

        let page = db.prediction_page(2, 0).await.unwrap();
        assert_eq!(page, vec![inserted[2].clone(), inserted[1].clone()]);

        let rest = db.prediction_page(2, 2).await.unwrap();
        assert_eq!(rest, vec![inserted[0].clone()]);
        assert!(db.prediction_page(2, 3).await.unwrap().is_empty());
    }
}
