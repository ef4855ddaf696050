//! Structured event vocabulary for logging.
//!
//! Every event emitted through [`crate::log_event!`] carries the run id and
//! the pipeline stage, and uses one of the names in [`event_names`] as its
//! tracing target so JSONL consumers can filter on a stable key.

use serde::{Deserialize, Serialize};

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Stages of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Event log ingestion.
    Load,
    /// Gap imputation.
    Impute,
    /// Transition model construction.
    Build,
    /// Impossible-transition scanning.
    Scan,
    /// Report rendering.
    Report,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Load => "load",
            Stage::Impute => "impute",
            Stage::Build => "build",
            Stage::Scan => "scan",
            Stage::Report => "report",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";

    // Load stage
    pub const LOAD_FINISHED: &str = "load.finished";
    pub const STATES_RESOLVED: &str = "load.states_resolved";

    // Impute stage
    pub const IMPUTE_FINISHED: &str = "impute.finished";

    // Scan stage
    pub const SCAN_STARTED: &str = "scan.started";
    pub const SCAN_PATIENT_FAILED: &str = "scan.patient_failed";
    pub const SCAN_FINISHED: &str = "scan.finished";
}

/// Correlation context shared by every event of one invocation.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
        }
    }
}
