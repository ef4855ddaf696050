//! Batch analysis across patients.
//!
//! Patients are independent: each one's events are extracted into day
//! sequences, modelled, and scanned on its own worker thread. Only the
//! [`StateIndex`] is shared, read-only. Within a patient the work is a
//! strictly sequential fold over days.
//!
//! A failure for one patient (unknown state, degenerate model, worker
//! panic) is recorded against that patient id and never aborts the others.

use std::collections::BTreeMap;
use std::thread;

use chrono::NaiveDate;
use mt_common::{BatchError, BatchResult, Error, PatientId, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::anomaly::{scan_days, FlaggedDay, ScanThresholds};
use crate::events::{EventLog, LocationEvent};
use crate::sequence::extract_days;
use crate::state_index::{StateIndex, StateIndexSummary};
use crate::transition::TransitionModel;

/// One patient's model and flagged days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientReport {
    pub patient_id: PatientId,
    pub days_observed: usize,
    pub model: TransitionModel,
    /// Dates whose impossible count exceeded the occurrence threshold.
    pub flagged_days: Vec<FlaggedDay>,
}

impl PatientReport {
    pub fn is_flagged(&self) -> bool {
        !self.flagged_days.is_empty()
    }
}

/// Flat `(patient, date, count)` row for tabular export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedRow {
    pub patient_id: PatientId,
    pub date: NaiveDate,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub patients_total: usize,
    pub patients_modelled: usize,
    pub patients_failed: usize,
    pub patients_flagged: usize,
    pub days_flagged: usize,
}

/// Result of a full batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub states: StateIndexSummary,
    pub thresholds: ScanThresholds,
    /// Every successfully modelled patient, flagged or not.
    pub patients: BTreeMap<PatientId, PatientReport>,
    /// Per-patient failures, keyed by `item_id` = patient id.
    pub failures: Vec<BatchError>,
    pub summary: AnalysisSummary,
}

impl AnalysisReport {
    /// Patients with at least one flagged day; the others are filtered out.
    pub fn flagged(&self) -> BTreeMap<&PatientId, &[FlaggedDay]> {
        self.patients
            .iter()
            .filter(|(_, report)| report.is_flagged())
            .map(|(id, report)| (id, report.flagged_days.as_slice()))
            .collect()
    }

    pub fn flagged_rows(&self) -> Vec<FlaggedRow> {
        self.flagged()
            .into_iter()
            .flat_map(|(id, days)| {
                days.iter().map(move |d| FlaggedRow {
                    patient_id: id.clone(),
                    date: d.date,
                    count: d.count,
                })
            })
            .collect()
    }

    pub fn has_flags(&self) -> bool {
        self.summary.patients_flagged > 0
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Extract, model and scan a single patient.
pub fn analyze_patient(
    patient_id: &PatientId,
    events: &[&LocationEvent],
    index: &StateIndex,
    thresholds: &ScanThresholds,
) -> Result<PatientReport> {
    let days = extract_days(events, index)?;
    let model = TransitionModel::build(patient_id, &days, index)?;
    let flagged_days = scan_days(&model, index, &days, thresholds)?;

    debug!(
        patient_id = %patient_id,
        days = days.len(),
        flagged = flagged_days.len(),
        "patient analyzed"
    );

    Ok(PatientReport {
        patient_id: patient_id.clone(),
        days_observed: days.len(),
        model,
        flagged_days,
    })
}

/// Analyze every patient in the log.
///
/// Only invalid global parameters fail the whole run; everything
/// patient-specific lands in `AnalysisReport::failures`.
#[instrument(skip(log, index), fields(events = log.len(), n_state = index.len()))]
pub fn analyze(
    log: &EventLog,
    index: &StateIndex,
    thresholds: &ScanThresholds,
    workers: usize,
) -> Result<AnalysisReport> {
    thresholds.validate()?;

    let batch = run_per_patient(log, workers, |id, events| {
        analyze_patient(id, events, index, thresholds)
    });

    let patients: BTreeMap<PatientId, PatientReport> = batch.succeeded.into_iter().collect();
    let failures = batch.failed;
    let patients_flagged = patients.values().filter(|p| p.is_flagged()).count();
    let days_flagged = patients.values().map(|p| p.flagged_days.len()).sum();

    let summary = AnalysisSummary {
        patients_total: patients.len() + failures.len(),
        patients_modelled: patients.len(),
        patients_failed: failures.len(),
        patients_flagged,
        days_flagged,
    };

    info!(
        patients = summary.patients_total,
        failed = summary.patients_failed,
        flagged_patients = summary.patients_flagged,
        flagged_days = summary.days_flagged,
        "analysis finished"
    );

    Ok(AnalysisReport {
        states: index.summary(),
        thresholds: *thresholds,
        patients,
        failures,
        summary,
    })
}

/// Build transition models only, without scanning.
pub fn build_models(
    log: &EventLog,
    index: &StateIndex,
    workers: usize,
) -> BatchResult<(PatientId, TransitionModel)> {
    run_per_patient(log, workers, |id, events| {
        let days = extract_days(events, index)?;
        TransitionModel::build(id, &days, index)
    })
}

/// Run `task` once per patient on scoped worker threads, at most `workers`
/// at a time. Results come back in patient order.
fn run_per_patient<T, F>(log: &EventLog, workers: usize, task: F) -> BatchResult<(PatientId, T)>
where
    T: Send,
    F: Fn(&PatientId, &[&LocationEvent]) -> Result<T> + Sync,
{
    let partitions: Vec<(PatientId, Vec<&LocationEvent>)> =
        log.partition_by_patient().into_iter().collect();
    let workers = workers.max(1);
    info!(patients = partitions.len(), workers, "dispatching patients");

    let task = &task;
    let mut batch = BatchResult::default();
    for chunk in partitions.chunks(workers) {
        let outcomes: Vec<Result<T>> = thread::scope(|s| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|(id, events)| s.spawn(move || task(id, events.as_slice())))
                .collect();

            handles
                .into_iter()
                .map(|h| {
                    h.join().unwrap_or_else(|_| {
                        error!("patient worker thread panicked");
                        Err(Error::Internal("worker thread panicked".to_string()))
                    })
                })
                .collect()
        });

        for ((id, _), outcome) in chunk.iter().zip(outcomes) {
            match outcome {
                Ok(value) => batch.add_success((id.clone(), value)),
                Err(e) => {
                    debug!(patient_id = %id, code = e.code(), error = %e, "patient failed");
                    batch.add_failure(id.to_string(), &e);
                }
            }
        }
    }
    batch
}
