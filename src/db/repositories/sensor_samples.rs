use anyhow::{Context, Result};
use rusqlite::{params, types::Type, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{conversion_error, decode_text, format_timestamp, parse_datetime, to_i64, to_u64},
    models::{SensorSample, AXIS_COUNT, AXIS_NAMES},
};

const SAMPLE_COLUMNS: &str = "id, ax, ay, az, gx, gy, gz, magnitude, timestamp";

fn row_to_sample(row: &Row) -> Result<SensorSample, rusqlite::Error> {
    let id: i64 = row.get("id")?;
    let mut axes = [0.0; AXIS_COUNT];
    for (slot, name) in axes.iter_mut().zip(AXIS_NAMES) {
        *slot = row.get(name)?;
    }
    let magnitude: Option<f64> = row.get("magnitude")?;
    let received_at = decode_text(row, "timestamp", |value| parse_datetime(value, "timestamp"))?;

    SensorSample::from_stored(id, axes, magnitude, received_at).map_err(|err| {
        // Validation only fails on the axis columns, which start at index 1.
        conversion_error(1, Type::Real, err)
    })
}

pub(crate) fn insert_sample_row(conn: &Connection, sample: &SensorSample) -> Result<i64> {
    let [ax, ay, az, gx, gy, gz] = sample.axes();
    conn.execute(
        "INSERT INTO sensor_data (ax, ay, az, gx, gy, gz, magnitude, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            ax,
            ay,
            az,
            gx,
            gy,
            gz,
            sample.magnitude(),
            format_timestamp(sample.received_at()),
        ],
    )
    .context("failed to insert sensor sample")?;
    Ok(conn.last_insert_rowid())
}

/// Most recent `limit` samples, returned oldest first.
pub(crate) fn recent_sample_rows(conn: &Connection, limit: usize) -> Result<Vec<SensorSample>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SAMPLE_COLUMNS}
         FROM sensor_data
         ORDER BY id DESC
         LIMIT ?1"
    ))?;

    let mut samples = stmt
        .query_map(params![to_i64(limit as u64)?], row_to_sample)?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to read recent sensor samples")?;
    samples.reverse();
    Ok(samples)
}

impl Database {
    /// Appends one raw sample and returns its row id.
    pub async fn insert_sample(&self, sample: &SensorSample) -> Result<i64> {
        let record = sample.clone();
        self.execute(move |conn| insert_sample_row(conn, &record))
            .await
    }

    pub async fn recent_samples(&self, limit: usize) -> Result<Vec<SensorSample>> {
        self.execute(move |conn| recent_sample_rows(conn, limit))
            .await
    }

    /// One page of raw samples, newest first.
    pub async fn sample_page(&self, limit: usize, offset: usize) -> Result<Vec<SensorSample>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SAMPLE_COLUMNS}
                 FROM sensor_data
                 ORDER BY id DESC
                 LIMIT ?1 OFFSET ?2"
            ))?;

            let samples = stmt
                .query_map(
                    params![to_i64(limit as u64)?, to_i64(offset as u64)?],
                    row_to_sample,
                )?
                .collect::<Result<Vec<_>, _>>()
                .context("failed to read sensor sample page")?;
            Ok(samples)
        })
        .await
    }

    pub async fn count_samples(&self) -> Result<u64> {
        self.execute(|conn| {
            let total: i64 =
                conn.query_row("SELECT COUNT(*) FROM sensor_data", [], |row| row.get(0))?;
            to_u64(total, "sensor_data count")
        })
        .await
    }
}
