use serde::Deserialize;
use std::{fs, path::Path};
use tracing::level_filters::LevelFilter;

use crate::errors::ConfigError;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// HTTP port to listen on.
    pub port: u16,

    /// Log level for tracing (e.g. "info", "debug").
    pub log_level: String,

    /// Path to the gadget snapshot JSON file.
    pub snapshot_path: String,

    /// Interval (seconds) between automatic snapshot saves.
    pub snapshot_interval: u64,

    pub server_version: String,
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json(&file)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str::<AppConfig>(text)?)
    }

    /// Unknown levels fall back to INFO.
    pub fn level_filter(&self) -> LevelFilter {
        match self.log_level.to_lowercase().as_str() {
            "trace" => LevelFilter::TRACE,
            "debug" => LevelFilter::DEBUG,
            "info" => LevelFilter::INFO,
            "warn" => LevelFilter::WARN,
            "error" => LevelFilter::ERROR,
            _ => LevelFilter::INFO,
        }
    }
}
