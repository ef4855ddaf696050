//! Global location state index.
//!
//! Maps location names to dense indices `0..n_state`. The index is built
//! once across *all* patients so every per-patient matrix shares the same
//! axes; a patient who never visits a room simply has an all-zero row and
//! column for it. It is immutable after construction and shared read-only
//! by every per-patient computation.

use std::collections::HashMap;
use std::path::Path;

use mt_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::events::EventLog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateIndex {
    names: Vec<String>,
    lookup: HashMap<String, usize>,
    fingerprint: String,
}

impl StateIndex {
    /// Build from the log, in order of first appearance.
    pub fn from_log(log: &EventLog) -> Self {
        let mut names = Vec::new();
        let mut lookup = HashMap::new();
        for event in log.events() {
            if !lookup.contains_key(&event.location) {
                lookup.insert(event.location.clone(), names.len());
                names.push(event.location.clone());
            }
        }
        let fingerprint = fingerprint_names(&names);
        StateIndex {
            names,
            lookup,
            fingerprint,
        }
    }

    /// Build from a pinned vocabulary. Duplicate or empty names are rejected.
    pub fn from_names(names: Vec<String>) -> Result<Self> {
        let mut lookup = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(Error::Config(format!("state {i} has an empty name")));
            }
            if lookup.insert(name.clone(), i).is_some() {
                return Err(Error::Config(format!("duplicate state name: '{name}'")));
            }
        }
        let fingerprint = fingerprint_names(&names);
        Ok(StateIndex {
            names,
            lookup,
            fingerprint,
        })
    }

    /// Load a pinned vocabulary from a JSON array of names.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let names: Vec<String> = serde_json::from_str(&content)?;
        Self::from_names(names)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    /// Resolve a name, failing fast on locations outside the index.
    pub fn require(&self, name: &str) -> Result<usize> {
        self.index_of(name).ok_or_else(|| Error::UnknownState {
            state: name.to_string(),
        })
    }

    /// Reverse lookup for reporting.
    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// SHA-256 over the ordered names; equal iff both indices assign the
    /// same index to every name.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn summary(&self) -> StateIndexSummary {
        StateIndexSummary {
            n_state: self.len(),
            fingerprint: self.fingerprint.clone(),
            states: self.names.clone(),
        }
    }
}

/// Serializable view of the index for reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateIndexSummary {
    pub n_state: usize,
    pub fingerprint: String,
    pub states: Vec<String>,
}

fn fingerprint_names(names: &[String]) -> String {
    let mut hasher = Sha256::new();
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LocationEvent;
    use chrono::NaiveDateTime;

    fn log(rows: &[(&str, &str)]) -> EventLog {
        let ts = NaiveDateTime::parse_from_str("2019-06-28 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        rows.iter()
            .map(|(p, loc)| LocationEvent::new(*p, ts, *loc))
            .collect()
    }

    #[test]
    fn test_from_log_first_appearance_across_patients() {
        let index = StateIndex::from_log(&log(&[
            ("p1", "Bedroom"),
            ("p2", "Kitchen"),
            ("p1", "Bedroom"),
            ("p2", "Bathroom"),
        ]));
        assert_eq!(index.names(), &["Bedroom", "Kitchen", "Bathroom"]);
        assert_eq!(index.index_of("Kitchen"), Some(1));
        assert_eq!(index.name_of(2), Some("Bathroom"));
        assert_eq!(index.name_of(3), None);
    }

    #[test]
    fn test_require_unknown_state() {
        let index = StateIndex::from_names(vec!["Bedroom".into()]).unwrap();
        let err = index.require("Garage").unwrap_err();
        assert!(matches!(err, Error::UnknownState { ref state } if state == "Garage"));
    }

    #[test]
    fn test_from_names_rejects_duplicates() {
        let err = StateIndex::from_names(vec!["Hall".into(), "Hall".into()]).unwrap_err();
        assert_eq!(err.code(), 10);
    }

    #[test]
    fn test_fingerprint_depends_on_order() {
        let a = StateIndex::from_names(vec!["A".into(), "B".into()]).unwrap();
        let b = StateIndex::from_names(vec!["B".into(), "A".into()]).unwrap();
        let a2 = StateIndex::from_names(vec!["A".into(), "B".into()]).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), a2.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_fingerprint_separates_names() {
        let a = StateIndex::from_names(vec!["AB".into(), "C".into()]).unwrap();
        let b = StateIndex::from_names(vec!["A".into(), "BC".into()]).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("states.json");
        std::fs::write(&path, r#"["Bedroom","Kitchen"]"#).unwrap();
        let index = StateIndex::load(&path).unwrap();
        assert_eq!(index.len(), 2);
    }
}
