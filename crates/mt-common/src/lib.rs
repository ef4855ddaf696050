//! Movement triage common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the workspace:
//! - Patient identity type
//! - Common error taxonomy with stable codes
//! - Batch results with per-item failures
//! - Output format specifications

pub mod error;
pub mod id;
pub mod output;

pub use error::{
    format_error_human, BatchError, BatchResult, Error, ErrorCategory, Result, StructuredError,
    SuggestedAction,
};
pub use id::PatientId;
pub use output::OutputFormat;
