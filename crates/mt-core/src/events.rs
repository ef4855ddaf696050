//! Location events and the cleaned event log.
//!
//! One event per sensor ping: which room a patient was seen in, and when.
//! The log is immutable once loaded; analysis never rewrites location names
//! in place (names are resolved to indices through a separate
//! [`StateIndex`](crate::state_index::StateIndex)).

use chrono::{NaiveDate, NaiveDateTime};
use mt_common::PatientId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single room-level location ping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationEvent {
    pub patient_id: PatientId,
    pub timestamp: NaiveDateTime,
    /// Location name as reported by the sensor (e.g. "Kitchen").
    pub location: String,
}

impl LocationEvent {
    pub fn new(
        patient_id: impl Into<PatientId>,
        timestamp: NaiveDateTime,
        location: impl Into<String>,
    ) -> Self {
        LocationEvent {
            patient_id: patient_id.into(),
            timestamp,
            location: location.into(),
        }
    }

    /// Calendar date the event belongs to.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Complete, already-cleaned historical event log for all patients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<LocationEvent>,
}

impl EventLog {
    pub fn new(events: Vec<LocationEvent>) -> Self {
        EventLog { events }
    }

    pub fn events(&self) -> &[LocationEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Distinct patient ids, ordered.
    pub fn patients(&self) -> Vec<PatientId> {
        let mut ids: Vec<PatientId> = self.events.iter().map(|e| e.patient_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Borrow each patient's events, preserving log order within a patient.
    pub fn partition_by_patient(&self) -> BTreeMap<PatientId, Vec<&LocationEvent>> {
        let mut by_patient: BTreeMap<PatientId, Vec<&LocationEvent>> = BTreeMap::new();
        for event in &self.events {
            by_patient
                .entry(event.patient_id.clone())
                .or_default()
                .push(event);
        }
        by_patient
    }
}

impl FromIterator<LocationEvent> for EventLog {
    fn from_iter<I: IntoIterator<Item = LocationEvent>>(iter: I) -> Self {
        EventLog::new(iter.into_iter().collect())
    }
}
