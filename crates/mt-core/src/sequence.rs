//! Per-day sequence extraction.
//!
//! Splits one patient's events into calendar days, orders each day by
//! timestamp, resolves location names to state indices, and marks whether
//! a day continues directly from the previous one. The transition builder
//! and the anomaly scanner both consume the output of [`extract_days`], so
//! they always agree on day boundaries and continuity.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use mt_common::Result;
use serde::{Deserialize, Serialize};

use crate::events::LocationEvent;
use crate::state_index::StateIndex;

/// One observed occupancy: state index plus ping time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub state: usize,
    pub timestamp: NaiveDateTime,
}

/// A patient's ordered steps for one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySequence {
    pub date: NaiveDate,
    /// True when the previous observed date is exactly one day earlier.
    /// Always false for the first date.
    pub continues_previous: bool,
    pub steps: Vec<Step>,
}

impl DaySequence {
    pub fn first(&self) -> Option<usize> {
        self.steps.first().map(|s| s.state)
    }

    pub fn last(&self) -> Option<usize> {
        self.steps.last().map(|s| s.state)
    }

    /// Consecutive within-day `(from, to)` pairs; the first step is never a
    /// target.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.steps.windows(2).map(|w| (w[0].state, w[1].state))
    }
}

/// Continuity rule shared by every consumer of day sequences.
pub fn is_consecutive(previous: NaiveDate, next: NaiveDate) -> bool {
    (next - previous).num_days() == 1
}

/// Extract one patient's day sequences, dates ascending.
///
/// Events within a date are ordered by timestamp; ties keep their input
/// order. Fails with `UnknownState` on the first location missing from
/// `index`.
pub fn extract_days(events: &[&LocationEvent], index: &StateIndex) -> Result<Vec<DaySequence>> {
    let mut by_date: BTreeMap<NaiveDate, Vec<Step>> = BTreeMap::new();
    for event in events {
        let state = index.require(&event.location)?;
        by_date.entry(event.date()).or_default().push(Step {
            state,
            timestamp: event.timestamp,
        });
    }

    let mut days = Vec::with_capacity(by_date.len());
    let mut previous: Option<NaiveDate> = None;
    for (date, mut steps) in by_date {
        if steps.is_empty() {
            continue;
        }
        steps.sort_by_key(|s| s.timestamp);
        let continues_previous = previous.is_some_and(|p| is_consecutive(p, date));
        days.push(DaySequence {
            date,
            continues_previous,
            steps,
        });
        previous = Some(date);
    }
    Ok(days)
}
