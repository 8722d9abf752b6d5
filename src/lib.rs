pub mod backup;
pub mod classifier;
mod commands;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod features;
pub mod metrics;
pub mod pipeline;
pub mod settings;
mod utils;
pub mod window;

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::Mutex,
};

use backup::BackupController;
use dashboard::RuntimeStatus;
use db::Database;
use metrics::MetricsCollector;
use pipeline::ActivityPipeline;
use settings::SettingsStore;

pub use error::PipelineError;

const DEFAULT_SETTINGS_PATH: &str = "activity-settings.json";

pub struct AppState {
    pub db: Database,
    pub pipeline: ActivityPipeline,
    pub metrics: MetricsCollector,
    pub settings: SettingsStore,
    backup: Mutex<BackupController>,
}

impl AppState {
    pub fn new(settings: SettingsStore, db: Database) -> Self {
        let current = settings.settings();
        let metrics = MetricsCollector::new();
        let pipeline = ActivityPipeline::new(
            db.clone(),
            current.build_strategy(),
            current.window_size,
            metrics.clone(),
        );

        Self {
            db,
            pipeline,
            metrics,
            settings,
            backup: Mutex::new(BackupController::new()),
        }
    }

    /// Opens the configured database and rebuilds the window from it.
    pub async fn open(settings: SettingsStore) -> Result<Self> {
        let database = Database::new(settings.settings().database_path)?;
        let state = Self::new(settings, database);
        state.pipeline.warm_start().await?;
        Ok(state)
    }

    pub async fn start_backup(&self) -> bool {
        let current = self.settings.settings();
        self.backup.lock().await.start(
            self.db.clone(),
            current.backup_policy(),
            current.scheduler_timing(),
            self.metrics.clone(),
        )
    }

    pub async fn stop_backup(&self) -> Result<()> {
        self.backup.lock().await.stop().await
    }

    pub async fn runtime_status(&self) -> Result<RuntimeStatus> {
        let scheduler_running = self.backup.lock().await.is_running();
        Ok(RuntimeStatus {
            scheduler_running,
            strategy: self.pipeline.strategy_kind(),
            window_size: self.pipeline.window_size(),
            window: self.pipeline.window_state().await,
            stored_samples: self.db.count_samples().await?,
            metrics: self.metrics.get_snapshot().await,
        })
    }
}

/// Runs the stdin/stdout driver until end of input or Ctrl-C.
///
/// Each input line is one JSON sample or dashboard query; each produces one
/// JSON line on stdout. Logs go to stderr.
pub async fn run() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("activity recognition starting up...");

    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH));
    let settings = SettingsStore::new(settings_path)?;

    let state = AppState::open(settings).await?;
    state.start_backup().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read input")? else {
                    info!("input closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let response = commands::handle_line(&state, &line).await;
                let mut output = serde_json::to_string(&response)?;
                output.push('\n');
                stdout.write_all(output.as_bytes()).await?;
                stdout.flush().await?;
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted, shutting down");
                break;
            }
        }
    }

    state.stop_backup().await
}
