use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::backup::{BackupPolicy, SchedulerTiming};
use crate::classifier::{
    ClassificationThresholds, ClassifierStrategy, ModelClassifier, StrategyKind,
    ThresholdClassifier,
};
use crate::window::DEFAULT_WINDOW_SIZE;

pub const DB_PATH_ENV: &str = "ACTIVITY_DB_PATH";
pub const MODEL_PATH_ENV: &str = "ACTIVITY_MODEL_PATH";
pub const STRATEGY_ENV: &str = "ACTIVITY_STRATEGY";
pub const DEBUG_ENV: &str = "ACTIVITY_DEBUG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerSettings {
    pub tick_interval_secs: u64,
    pub dead_time_secs: u64,
    pub storage_timeout_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval_secs: 10,
            dead_time_secs: 30,
            storage_timeout_secs: 5,
        }
    }
}

impl SchedulerSettings {
    /// Short timings for watching the backup path locally.
    fn debug() -> Self {
        Self {
            tick_interval_secs: 1,
            dead_time_secs: 5,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub window_size: usize,
    pub strategy: StrategyKind,
    pub thresholds: ClassificationThresholds,
    pub scheduler: SchedulerSettings,
    pub database_path: PathBuf,
    pub model_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            strategy: StrategyKind::default(),
            thresholds: ClassificationThresholds::default(),
            scheduler: SchedulerSettings::default(),
            database_path: PathBuf::from("activity.db"),
            model_path: None,
        }
    }
}

impl Settings {
    /// Applies environment overrides through `lookup` so callers and tests
    /// can supply their own source.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(DB_PATH_ENV).filter(|value| !value.is_empty()) {
            self.database_path = PathBuf::from(path);
        }

        if let Some(path) = lookup(MODEL_PATH_ENV).filter(|value| !value.is_empty()) {
            self.model_path = Some(PathBuf::from(path));
        }

        if let Some(value) = lookup(STRATEGY_ENV) {
            match value.trim().to_ascii_lowercase().as_str() {
                "model" => self.strategy = StrategyKind::Model,
                "threshold" => self.strategy = StrategyKind::Threshold,
                other => warn!("ignoring unknown {STRATEGY_ENV} value {other:?}"),
            }
        }

        let debug_mode = lookup(DEBUG_ENV)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug_mode {
            self.scheduler = SchedulerSettings::debug();
        }
    }

    pub fn backup_policy(&self) -> BackupPolicy {
        BackupPolicy {
            window_size: self.window_size.max(1),
            dead_time: Duration::from_secs(self.scheduler.dead_time_secs),
            thresholds: self.thresholds,
        }
    }

    pub fn scheduler_timing(&self) -> SchedulerTiming {
        SchedulerTiming {
            tick_interval: Duration::from_secs(self.scheduler.tick_interval_secs.max(1)),
            storage_timeout: Duration::from_secs(self.scheduler.storage_timeout_secs.max(1)),
        }
    }

    /// Builds the primary-path classifier. A model that cannot be loaded
    /// yields `ModelUnavailable` rather than silently switching strategy.
    pub fn build_strategy(&self) -> ClassifierStrategy {
        match self.strategy {
            StrategyKind::Threshold => {
                ClassifierStrategy::Threshold(ThresholdClassifier::new(self.thresholds))
            }
            StrategyKind::Model => {
                let Some(path) = self.model_path.as_deref() else {
                    warn!("model strategy selected but no model path configured");
                    return ClassifierStrategy::ModelUnavailable(
                        "no model path configured".into(),
                    );
                };

                match ModelClassifier::from_artifact_path(path, self.window_size) {
                    Ok(model) => ClassifierStrategy::Model(model),
                    Err(err) => {
                        warn!("model unavailable, primary path will fail closed: {err}");
                        ClassifierStrategy::ModelUnavailable(err.to_string())
                    }
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    /// Loads settings from `path` (defaults when absent) and applies
    /// environment overrides.
    pub fn new(path: PathBuf) -> Result<Self> {
        Self::with_overrides(path, |key| std::env::var(key).ok())
    }

    pub fn with_overrides<F>(path: PathBuf, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?
        } else {
            Settings::default()
        };

        data.apply_overrides(lookup);
        if !data.thresholds.matches_device() {
            warn!(
                "configured thresholds (version {}) differ from the device firmware; \
                 backup and device labels may disagree",
                data.thresholds.version
            );
        }

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> Settings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, settings: Settings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: Settings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", self.path.display()))?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = data;
        Ok(())
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
