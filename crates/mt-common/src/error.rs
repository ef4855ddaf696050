//! Error types for movement triage.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Unknown Location State
//!   Reason: unknown state: 'Garage'
//!   Fix: Rebuild the state index from the full event log, or add the location to the --states file.
//! ```
//!
//! # Machine-Facing Output
//!
//! ```json
//! {
//!   "code": 30,
//!   "category": "model",
//!   "message": "unknown state: 'Garage'",
//!   "recoverable": true,
//!   "suggested_action": "fix_input",
//!   "context": { "state": "Garage" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for movement triage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file and parameter errors.
    Config,
    /// Event log ingestion errors.
    Input,
    /// Transition model and scan errors.
    Model,
    /// Worker failures and other bugs.
    Internal,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Input => write!(f, "input"),
            ErrorCategory::Model => write!(f, "model"),
            ErrorCategory::Internal => write!(f, "internal"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Suggested actions for automation to take in response to errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Retry the operation.
    Retry,
    /// Run the config check command.
    RunCheck,
    /// Correct the input event log.
    FixInput,
    /// Skip this patient and continue.
    Skip,
    /// Abort the run.
    Abort,
    /// Manual intervention required.
    ManualIntervention,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::RunCheck => write!(f, "run_check"),
            SuggestedAction::FixInput => write!(f, "fix_input"),
            SuggestedAction::Skip => write!(f, "skip"),
            SuggestedAction::Abort => write!(f, "abort"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
        }
    }
}

/// Unified error type for movement triage.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid parameter {name}: {message}")]
    InvalidParameter { name: String, message: String },

    // Input errors (20-29)
    #[error("event log error: {0}")]
    Input(String),

    #[error("invalid record at line {line}: {message}")]
    InvalidRecord { line: u64, message: String },

    #[error("missing required column: {column}")]
    MissingColumn { column: String },

    // Model errors (30-39)
    #[error("unknown state: '{state}'")]
    UnknownState { state: String },

    #[error("patient {patient_id} has no usable transitions ({raw_transitions} raw, 0 after symmetrization)")]
    DegenerateModel {
        patient_id: String,
        raw_transitions: u64,
    },

    #[error("state index mismatch: model built with {expected}, scanned with {actual}")]
    StateIndexMismatch { expected: String, actual: String },

    // Internal errors (40-49)
    #[error("internal error: {0}")]
    Internal(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Input errors
    /// - 30-39: Model errors
    /// - 40-49: Internal errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidParameter { .. } => 11,
            Error::Input(_) => 20,
            Error::InvalidRecord { .. } => 21,
            Error::MissingColumn { .. } => 22,
            Error::UnknownState { .. } => 30,
            Error::DegenerateModel { .. } => 31,
            Error::StateIndexMismatch { .. } => 32,
            Error::Internal(_) => 40,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidParameter { .. } => ErrorCategory::Config,

            Error::Input(_) | Error::InvalidRecord { .. } | Error::MissingColumn { .. } => {
                ErrorCategory::Input
            }

            Error::UnknownState { .. }
            | Error::DegenerateModel { .. }
            | Error::StateIndexMismatch { .. } => ErrorCategory::Model,

            Error::Internal(_) => ErrorCategory::Internal,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) => true,
            Error::InvalidParameter { .. } => true,

            Error::Input(_) => true,
            Error::InvalidRecord { .. } => true,
            Error::MissingColumn { .. } => true,

            Error::UnknownState { .. } => true,
            Error::DegenerateModel { .. } => false, // needs more data, not a retry
            Error::StateIndexMismatch { .. } => false, // programming contract violation

            Error::Internal(_) => false,

            Error::Io(_) => true,
            Error::Json(_) => true,
        }
    }

    /// Returns the suggested action for automation.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Config(_) => SuggestedAction::RunCheck,
            Error::InvalidParameter { .. } => SuggestedAction::RunCheck,

            Error::Input(_) => SuggestedAction::FixInput,
            Error::InvalidRecord { .. } => SuggestedAction::FixInput,
            Error::MissingColumn { .. } => SuggestedAction::FixInput,

            Error::UnknownState { .. } => SuggestedAction::FixInput,
            Error::DegenerateModel { .. } => SuggestedAction::Skip,
            Error::StateIndexMismatch { .. } => SuggestedAction::Abort,

            Error::Internal(_) => SuggestedAction::ManualIntervention,

            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::ManualIntervention,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => {
                "Run 'mt-core check' to validate configuration, or check syntax in analysis.json."
            }
            Error::InvalidParameter { .. } => {
                "Probability threshold must be in [0, 1); worker count must be at least 1."
            }

            Error::Input(_) => "Check that the event log is a readable, comma-separated CSV file.",
            Error::InvalidRecord { .. } => {
                "Fix the offending row: timestamps must look like 'YYYY-MM-DD HH:MM:SS' and locations must be non-empty."
            }
            Error::MissingColumn { .. } => {
                "The event log needs the columns patient_id, timestamp and location_name."
            }

            Error::UnknownState { .. } => {
                "Rebuild the state index from the full event log, or add the location to the --states file."
            }
            Error::DegenerateModel { .. } => {
                "The patient needs repeated transitions in both directions before a baseline can be learned."
            }
            Error::StateIndexMismatch { .. } => {
                "Scan with the same state index that built the model. This is a bug in the caller."
            }

            Error::Internal(_) => "A worker failed unexpectedly. Re-run the analysis; report if persistent.",

            Error::Io(_) => "Check that the file exists and is readable. Retry the operation.",
            Error::Json(_) => "Invalid JSON in file. Check syntax with 'jq .' or restore from backup.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidParameter { .. } => "Invalid Parameter",

            Error::Input(_) => "Event Log Error",
            Error::InvalidRecord { .. } => "Invalid Event Record",
            Error::MissingColumn { .. } => "Missing Column",

            Error::UnknownState { .. } => "Unknown Location State",
            Error::DegenerateModel { .. } => "Degenerate Transition Model",
            Error::StateIndexMismatch { .. } => "State Index Mismatch",

            Error::Internal(_) => "Internal Error",

            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Suggested action for automation.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (e.g., state name, line number).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::InvalidParameter { name, .. } => {
                context.insert("parameter".to_string(), serde_json::json!(name));
            }
            Error::InvalidRecord { line, .. } => {
                context.insert("line".to_string(), serde_json::json!(line));
            }
            Error::MissingColumn { column } => {
                context.insert("column".to_string(), serde_json::json!(column));
            }
            Error::UnknownState { state } => {
                context.insert("state".to_string(), serde_json::json!(state));
            }
            Error::DegenerateModel {
                patient_id,
                raw_transitions,
            } => {
                context.insert("patient_id".to_string(), serde_json::json!(patient_id));
                context.insert(
                    "raw_transitions".to_string(),
                    serde_json::json!(raw_transitions),
                );
            }
            Error::StateIndexMismatch { expected, actual } => {
                context.insert("expected_fingerprint".to_string(), serde_json::json!(expected));
                context.insert("actual_fingerprint".to_string(), serde_json::json!(actual));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// A single failed item in a batch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchError {
    /// Identifier of the failed item (patient id for analysis runs).
    pub item_id: String,

    /// The structured error.
    pub error: StructuredError,
}

impl BatchError {
    pub fn new(item_id: impl Into<String>, error: &Error) -> Self {
        BatchError {
            item_id: item_id.into(),
            error: StructuredError::from(error),
        }
    }
}

/// Result of a batch operation that may have partial success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult<T> {
    /// Successfully completed items.
    pub succeeded: Vec<T>,

    /// Failed items with their errors.
    pub failed: Vec<BatchError>,
}

impl<T> BatchResult<T> {
    /// Record a success.
    pub fn add_success(&mut self, item: T) {
        self.succeeded.push(item);
    }

    /// Record a failure for the given item.
    pub fn add_failure(&mut self, item_id: impl Into<String>, error: &Error) {
        self.failed.push(BatchError::new(item_id, error));
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

impl<T> Default for BatchResult<T> {
    fn default() -> Self {
        BatchResult {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
