use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::PipelineError;

/// How the remote API is queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// One `GET current.json?q=<target>` per target.
    Single,
    /// One `POST current.json?q=bulk` per batch of up to `chunk_size` targets.
    #[default]
    Bulk,
}

/// Where the set of query targets comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateMode {
    /// Reuse `saved_coordinates_file`; falls back to generation when the
    /// file does not exist yet.
    #[default]
    Saved,
    /// Fibonacci-sphere sampling of `required_sample_count` points.
    Generated,
    /// Static city list from `cities_file`.
    Cities,
}

/// Pipeline configuration, stored on disk as TOML.
///
/// Every field has a default so a partial (or absent) file works; only the
/// API key must be supplied before a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// weatherapi.com API key.
    pub api_key: Option<String>,

    /// Folder the timestamped snapshot artifacts are written to.
    pub data_folder: PathBuf,

    /// Targets per bulk request. The remote bulk endpoint accepts at most
    /// 50 locations per call; values above that are not clamped and will
    /// fail at fetch time.
    pub chunk_size: usize,

    /// Upper bound on concurrent in-flight requests.
    pub worker_limit: usize,

    /// Per-request timeout, seconds.
    pub request_timeout_secs: u64,

    pub query_mode: QueryMode,
    pub coordinate_source: CoordinateMode,

    /// Known-good coordinates from a previous run.
    pub saved_coordinates_file: PathBuf,

    /// Static city list (joined strings or structured records).
    pub cities_file: PathBuf,

    /// Number of points to sample when generating coordinates.
    pub required_sample_count: usize,

    /// Write successfully resolved locations back to
    /// `saved_coordinates_file` after the run.
    pub save_coordinates: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            data_folder: PathBuf::from("./data"),
            chunk_size: 50,
            worker_limit: 1000,
            request_timeout_secs: 30,
            query_mode: QueryMode::default(),
            coordinate_source: CoordinateMode::default(),
            saved_coordinates_file: PathBuf::from("./successful_coordinates.json"),
            cities_file: PathBuf::from("./city_info.json"),
            required_sample_count: 100_000,
            save_coordinates: false,
        }
    }
}

impl Config {
    /// Returns the API key, failing the run before any network call when it
    /// is not configured.
    pub fn api_key(&self) -> Result<&str, PipelineError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(PipelineError::MissingApiKey)
    }

    /// Rejects parameter combinations that would misbehave downstream.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.chunk_size == 0 {
            return Err(PipelineError::InvalidArgument(
                "chunk_size must be at least 1".into(),
            ));
        }
        if self.worker_limit == 0 {
            return Err(PipelineError::InvalidArgument(
                "worker_limit must be at least 1".into(),
            ));
        }
        if self.required_sample_count == 0 {
            return Err(PipelineError::InvalidArgument(
                "required_sample_count must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Load config from the platform config dir, or return defaults if no
    /// file exists yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    /// Load config from an explicit path, or return defaults if it doesn't
    /// exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the platform config dir, creating parent directories
    /// as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "rainmap", "rainmap")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
