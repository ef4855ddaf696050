//! Configuration loading and validation for mt-core.
//!
//! This module handles:
//! - Loading analysis.json
//! - Config resolution order (CLI > env > XDG > defaults)
//! - Semantic validation (threshold ranges, worker count, imputation steps)
//! - Config snapshot generation for reports

pub mod validation;

pub use validation::{validate_config, ValidationError};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::anomaly::ScanThresholds;
use crate::impute::ImputeConfig;

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Default XDG config directory name.
const CONFIG_DIR_NAME: &str = "movement_triage";

/// Config file name inside the config directory.
const CONFIG_FILE_NAME: &str = "analysis.json";

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid JSON in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl From<ConfigError> for mt_common::Error {
    fn from(err: ConfigError) -> Self {
        mt_common::Error::Config(err.to_string())
    }
}

/// Analysis parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub schema_version: String,
    /// Cells strictly below this probability are impossible transitions.
    pub probability_threshold: f64,
    /// Days are flagged when their impossible count strictly exceeds this.
    pub occurrence_threshold: u32,
    /// Worker threads for per-patient analysis (None = available parallelism).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// Gap imputation applied before modelling (None = disabled).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impute: Option<ImputeConfig>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            schema_version: CONFIG_SCHEMA_VERSION.to_string(),
            probability_threshold: 0.05,
            occurrence_threshold: 0,
            workers: None,
            impute: None,
        }
    }
}

impl AnalysisConfig {
    pub fn thresholds(&self) -> ScanThresholds {
        ScanThresholds {
            probability: self.probability_threshold,
            occurrences: self.occurrence_threshold,
        }
    }

    /// Configured worker count, or the machine's available parallelism.
    pub fn effective_workers(&self) -> usize {
        self.workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

/// Resolved configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: AnalysisConfig,
    /// Path to the config file (None if using defaults).
    pub path: Option<PathBuf>,
    /// SHA-256 of the config file content (None if using defaults).
    pub hash: Option<String>,
    /// The config directory used for resolution.
    pub config_dir: PathBuf,
}

impl ResolvedConfig {
    /// Create a config snapshot for reports.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            path: self.path.clone(),
            hash: self.hash.clone(),
            schema_version: self.config.schema_version.clone(),
            probability_threshold: self.config.probability_threshold,
            occurrence_threshold: self.config.occurrence_threshold,
            imputation: self.config.impute.is_some(),
        }
    }
}

/// Config snapshot embedded in analysis reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub path: Option<PathBuf>,
    pub hash: Option<String>,
    pub schema_version: String,
    pub probability_threshold: f64,
    pub occurrence_threshold: u32,
    pub imputation: bool,
}

/// Configuration resolution options.
#[derive(Debug, Default)]
pub struct ConfigOptions {
    /// Explicit config directory (highest priority).
    pub config_dir: Option<PathBuf>,
    /// Explicit config file path.
    pub config_path: Option<PathBuf>,
}

/// Load configuration with the standard resolution order.
///
/// Resolution order (highest to lowest priority):
/// 1. Explicit CLI flags (via ConfigOptions)
/// 2. Environment variable (MOVEMENT_TRIAGE_CONFIG)
/// 3. XDG config home (~/.config/movement_triage/)
/// 4. Built-in defaults
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    let config_dir = resolve_config_dir(options);

    let (config, path, hash) = match &options.config_path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound { path: path.clone() });
            }
            let (config, hash) = load_config_from_file(path)?;
            (config, Some(path.clone()), Some(hash))
        }
        None => {
            let default_path = config_dir.join(CONFIG_FILE_NAME);
            if default_path.exists() {
                let (config, hash) = load_config_from_file(&default_path)?;
                (config, Some(default_path), Some(hash))
            } else {
                (AnalysisConfig::default(), None, None)
            }
        }
    };

    validate_config(&config)?;

    Ok(ResolvedConfig {
        config,
        path,
        hash,
        config_dir,
    })
}

/// Resolve the config directory using the standard resolution order.
fn resolve_config_dir(options: &ConfigOptions) -> PathBuf {
    if let Some(dir) = &options.config_dir {
        return dir.clone();
    }

    if let Ok(dir) = std::env::var("MOVEMENT_TRIAGE_CONFIG") {
        return PathBuf::from(dir);
    }

    let xdg_config = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
        });

    xdg_config.join(CONFIG_DIR_NAME)
}

/// Load analysis config from a specific file.
fn load_config_from_file(path: &Path) -> Result<(AnalysisConfig, String), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let hash = compute_hash(&content);

    let config: AnalysisConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(ConfigError::VersionMismatch {
            expected: CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    Ok((config, hash))
}

/// SHA-256 of the file content, hex encoded.
fn compute_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options_for(dir: &Path) -> ConfigOptions {
        ConfigOptions {
            config_dir: Some(dir.to_path_buf()),
            config_path: None,
        }
    }

    #[test]
    fn test_defaults_when_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = load_config(&options_for(dir.path())).unwrap();
        assert_eq!(resolved.config, AnalysisConfig::default());
        assert!(resolved.path.is_none());
        assert!(resolved.hash.is_none());
    }

    #[test]
    fn test_loads_from_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"schema_version":"1.0.0","probability_threshold":0.02,"occurrence_threshold":3}"#,
        )
        .unwrap();
        let resolved = load_config(&options_for(dir.path())).unwrap();
        assert_eq!(resolved.config.probability_threshold, 0.02);
        assert_eq!(resolved.config.occurrence_threshold, 3);
        assert_eq!(resolved.hash.as_ref().map(|h| h.len()), Some(64));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        std::fs::write(&path, r#"{"occurrence_threshold":2}"#).unwrap();
        let resolved = load_config(&ConfigOptions {
            config_dir: Some(dir.path().to_path_buf()),
            config_path: Some(path),
        })
        .unwrap();
        assert_eq!(resolved.config.occurrence_threshold, 2);
        assert_eq!(resolved.config.probability_threshold, 0.05);
    }

    #[test]
    fn test_version_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"schema_version":"9.9.9"}"#,
        )
        .unwrap();
        let err = load_config(&options_for(dir.path())).unwrap_err();
        assert!(matches!(err, ConfigError::VersionMismatch { .. }));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"probability_threshold":1.5}"#,
        )
        .unwrap();
        let err = load_config(&options_for(dir.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_explicit_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&ConfigOptions {
            config_dir: None,
            config_path: Some(dir.path().join("nope.json")),
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_snapshot_serializes() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = load_config(&options_for(dir.path())).unwrap();
        let json = serde_json::to_string(&resolved.snapshot()).unwrap();
        assert!(json.contains(r#""probability_threshold":0.05"#));
    }

    #[test]
    fn test_effective_workers_at_least_one() {
        let config = AnalysisConfig {
            workers: Some(3),
            ..Default::default()
        };
        assert_eq!(config.effective_workers(), 3);
        assert!(AnalysisConfig::default().effective_workers() >= 1);
    }
}
