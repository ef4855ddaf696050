//! Patient identity type.
//!
//! Patient identifiers arrive as opaque strings from the sensor export
//! (e.g. `0697d`). They are trimmed on construction and ordered
//! lexicographically so per-patient maps iterate deterministically.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Patient identifier wrapper with display formatting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(pub String);

impl PatientId {
    /// Create a new PatientId, trimming surrounding whitespace.
    pub fn new(id: impl AsRef<str>) -> Self {
        PatientId(id.as_ref().trim().to_string())
    }

    /// Parse a patient id; empty (after trimming) ids are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(PatientId(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PatientId {
    fn from(s: &str) -> Self {
        PatientId::new(s)
    }
}

impl From<String> for PatientId {
    fn from(s: String) -> Self {
        PatientId::new(s)
    }
}
