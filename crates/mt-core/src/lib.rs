//! Movement Triage Core Library
//!
//! Per-patient location-transition models and anomaly detection:
//! - Event log ingestion and optional gap imputation
//! - Day sequence extraction over a shared state index
//! - Symmetrized transition probability matrices per patient
//! - Impossible-transition scanning and day flagging
//! - Batch analysis with per-patient failure isolation
//!
//! The binary entry point is in `main.rs`.

pub mod anomaly;
pub mod config;
pub mod engine;
pub mod events;
pub mod exit_codes;
pub mod impute;
pub mod ingest;
pub mod logging;
pub mod output;
pub mod sequence;
pub mod state_index;
pub mod transition;

pub use anomaly::{scan_days, FlaggedDay, ImpossibleSet, ScanThresholds};
pub use engine::{analyze, AnalysisReport, PatientReport};
pub use events::{EventLog, LocationEvent};
pub use sequence::{extract_days, DaySequence};
pub use state_index::StateIndex;
pub use transition::TransitionModel;
