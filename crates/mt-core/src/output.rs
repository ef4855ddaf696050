//! Report rendering for the CLI.
//!
//! Every payload goes to stdout in one of the [`OutputFormat`]s. JSON wraps
//! the payload in an envelope carrying the run id and config provenance so
//! archived reports can be traced back to the parameters that produced them.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use mt_common::{BatchError, Error, OutputFormat, PatientId, Result};
use mt_math::SquareMatrix;
use serde::Serialize;

use crate::anomaly::FlaggedDay;
use crate::config::ConfigSnapshot;
use crate::engine::AnalysisReport;
use crate::state_index::StateIndexSummary;
use crate::transition::TransitionModel;

/// Provenance attached to every JSON payload.
#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub tool_version: &'static str,
    pub config: ConfigSnapshot,
}

impl RunMeta {
    pub fn new(run_id: impl Into<String>, config: ConfigSnapshot) -> Self {
        RunMeta {
            run_id: run_id.into(),
            generated_at: Utc::now(),
            tool_version: env!("CARGO_PKG_VERSION"),
            config,
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    #[serde(flatten)]
    meta: &'a RunMeta,
    #[serde(flatten)]
    payload: &'a T,
}

/// One patient's probability matrix, as exported by `matrix`.
#[derive(Debug, Clone, Serialize)]
pub struct ModelView<'a> {
    pub patient_id: &'a PatientId,
    pub raw_transitions: u64,
    pub probabilities: &'a SquareMatrix<f64>,
}

impl<'a> From<&'a TransitionModel> for ModelView<'a> {
    fn from(model: &'a TransitionModel) -> Self {
        ModelView {
            patient_id: &model.patient_id,
            raw_transitions: model.raw_transitions(),
            probabilities: &model.probabilities,
        }
    }
}

/// Payload of the `matrix` command.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixDocument<'a> {
    pub states: &'a StateIndexSummary,
    pub models: Vec<ModelView<'a>>,
    pub failures: &'a [BatchError],
}

/// JSON payload of `analyze`: the full report plus the flagged-only map.
#[derive(Serialize)]
struct AnalysisDocument<'a> {
    #[serde(flatten)]
    report: &'a AnalysisReport,
    /// Patients with at least one flagged day; quiet patients are omitted.
    flagged: BTreeMap<&'a PatientId, &'a [FlaggedDay]>,
}

const FLAGGED_CSV_HEADER: &str = "patient_id,date,count\n";
const MODELS_CSV_HEADER: &str = "patient_id,from,to,probability\n";

fn to_json<T: Serialize>(meta: &RunMeta, payload: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(&Envelope { meta, payload })?)
}

fn to_csv<T: Serialize>(rows: impl IntoIterator<Item = T>) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for row in rows {
        wtr.serialize(row).map_err(|e| Error::Internal(e.to_string()))?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| Error::Internal(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| Error::Internal(e.to_string()))
}

/// Render the result of `analyze`.
pub fn render_analysis(report: &AnalysisReport, meta: &RunMeta, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(
            meta,
            &AnalysisDocument {
                report,
                flagged: report.flagged(),
            },
        ),
        OutputFormat::Csv => {
            let rows = report.flagged_rows();
            if rows.is_empty() {
                // keep the header so downstream readers see a valid table
                return Ok(FLAGGED_CSV_HEADER.to_string());
            }
            to_csv(rows)
        }
        OutputFormat::Summary => Ok(analysis_summary_line(report)),
        OutputFormat::Md => Ok(analysis_markdown(report, meta)),
    }
}

fn analysis_summary_line(report: &AnalysisReport) -> String {
    let s = &report.summary;
    format!(
        "{} patients: {} flagged ({} days), {} failed\n",
        s.patients_total, s.patients_flagged, s.days_flagged, s.patients_failed
    )
}

fn analysis_markdown(report: &AnalysisReport, meta: &RunMeta) -> String {
    let mut out = String::new();
    let s = &report.summary;

    let _ = writeln!(out, "# Movement triage report\n");
    let _ = writeln!(out, "- Run: `{}`", meta.run_id);
    let _ = writeln!(out, "- States: {}", report.states.n_state);
    let _ = writeln!(
        out,
        "- Thresholds: probability < {}, flag when count > {}",
        report.thresholds.probability, report.thresholds.occurrences
    );
    let _ = writeln!(
        out,
        "- Patients: {} total, {} modelled, {} failed\n",
        s.patients_total, s.patients_modelled, s.patients_failed
    );

    let _ = writeln!(out, "## Flagged days\n");
    let rows = report.flagged_rows();
    if rows.is_empty() {
        let _ = writeln!(out, "No days flagged.");
    } else {
        let _ = writeln!(out, "| Patient | Date | Impossible transitions |");
        let _ = writeln!(out, "|---|---|---|");
        for row in rows {
            let _ = writeln!(out, "| {} | {} | {} |", row.patient_id, row.date, row.count);
        }
    }

    if !report.failures.is_empty() {
        let _ = writeln!(out, "\n## Failures\n");
        out.push_str(&failures_table(&report.failures));
    }
    out
}

fn failures_table(failures: &[BatchError]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "| Patient | Code | Error |");
    let _ = writeln!(out, "|---|---|---|");
    for f in failures {
        let _ = writeln!(out, "| {} | {} | {} |", f.item_id, f.error.code, f.error.message);
    }
    out
}

/// Render the models produced by `matrix`.
pub fn render_models(doc: &MatrixDocument<'_>, meta: &RunMeta, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(meta, doc),
        OutputFormat::Csv => {
            #[derive(Serialize)]
            struct Cell<'a> {
                patient_id: &'a PatientId,
                from: &'a str,
                to: &'a str,
                probability: f64,
            }
            let states = &doc.states.states;
            let cells = doc.models.iter().flat_map(|m| {
                m.probabilities.cells().map(move |(i, j, p)| Cell {
                    patient_id: m.patient_id,
                    from: &states[i],
                    to: &states[j],
                    probability: p,
                })
            });
            if doc.models.is_empty() {
                return Ok(MODELS_CSV_HEADER.to_string());
            }
            to_csv(cells)
        }
        OutputFormat::Summary => Ok(format!(
            "{} states, {} models, {} failed\n",
            doc.states.n_state,
            doc.models.len(),
            doc.failures.len()
        )),
        OutputFormat::Md => {
            let mut out = String::new();
            for m in &doc.models {
                let _ = writeln!(
                    out,
                    "## {} ({} transitions)\n",
                    m.patient_id, m.raw_transitions
                );
                out.push_str(&matrix_table(&doc.states.states, m.probabilities));
                out.push('\n');
            }
            if !doc.failures.is_empty() {
                let _ = writeln!(out, "## Failures\n");
                out.push_str(&failures_table(doc.failures));
            }
            Ok(out)
        }
    }
}

fn matrix_table(states: &[String], p: &SquareMatrix<f64>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "| from \\ to | {} |", states.join(" | "));
    let _ = writeln!(out, "|---|{}", "---|".repeat(states.len()));
    for (i, row) in p.rows().enumerate() {
        let cells: Vec<String> = row.iter().map(|v| format!("{:.4}", v)).collect();
        let _ = writeln!(out, "| {} | {} |", states[i], cells.join(" | "));
    }
    out
}

/// Render the global state index produced by `states`.
pub fn render_states(summary: &StateIndexSummary, meta: &RunMeta, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(meta, summary),
        OutputFormat::Csv => {
            #[derive(Serialize)]
            struct Row<'a> {
                index: usize,
                state: &'a str,
            }
            to_csv(summary.states.iter().enumerate().map(|(index, state)| Row { index, state }))
        }
        OutputFormat::Summary => Ok(format!(
            "{} states ({})\n",
            summary.n_state,
            &summary.fingerprint[..summary.fingerprint.len().min(12)]
        )),
        OutputFormat::Md => {
            let mut out = String::new();
            let _ = writeln!(out, "| Index | State |");
            let _ = writeln!(out, "|---|---|");
            for (i, s) in summary.states.iter().enumerate() {
                let _ = writeln!(out, "| {} | {} |", i, s);
            }
            Ok(out)
        }
    }
}
