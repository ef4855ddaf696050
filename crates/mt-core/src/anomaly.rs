//! Impossible-transition scanning.
//!
//! A transition is "impossible" for a patient when its learned probability
//! is strictly below the probability threshold. Each day is re-walked and
//! the impossible transitions inside it are counted; a day is flagged when
//! that count strictly exceeds the occurrence threshold.
//!
//! The impossible set lives in index space, the same space the model was
//! built in. Names are resolved exactly once, by the sequence extractor, and
//! a model is only ever scanned against the index that built it.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use mt_common::{Error, Result};
use mt_math::SquareMatrix;
use serde::{Deserialize, Serialize};

use crate::sequence::DaySequence;
use crate::state_index::StateIndex;
use crate::transition::TransitionModel;

/// Caller-supplied scan parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanThresholds {
    /// Cells with probability strictly below this are impossible. In [0, 1).
    pub probability: f64,
    /// A day is flagged when its impossible count is strictly greater.
    pub occurrences: u32,
}

impl Default for ScanThresholds {
    fn default() -> Self {
        ScanThresholds {
            probability: 0.05,
            occurrences: 0,
        }
    }
}

impl ScanThresholds {
    pub fn new(probability: f64, occurrences: u32) -> Result<Self> {
        let thresholds = ScanThresholds {
            probability,
            occurrences,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.probability) {
            return Err(Error::InvalidParameter {
                name: "probability_threshold".to_string(),
                message: format!("must be in [0, 1) (got {})", self.probability),
            });
        }
        Ok(())
    }
}

/// State pairs whose probability falls below the threshold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpossibleSet {
    pairs: BTreeSet<(usize, usize)>,
}

impl ImpossibleSet {
    pub fn from_matrix(probabilities: &SquareMatrix<f64>, threshold: f64) -> Self {
        let pairs = probabilities
            .cells()
            .filter(|&(_, _, p)| p < threshold)
            .map(|(i, j, _)| (i, j))
            .collect();
        ImpossibleSet { pairs }
    }

    pub fn contains(&self, from: usize, to: usize) -> bool {
        self.pairs.contains(&(from, to))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.pairs.iter().copied()
    }

    /// Resolve pairs back to location names for reporting.
    pub fn named<'a>(&'a self, index: &'a StateIndex) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.iter().filter_map(move |(i, j)| Some((index.name_of(i)?, index.name_of(j)?)))
    }
}

/// Impossible-transition count for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayScore {
    pub date: NaiveDate,
    pub count: u32,
}

/// A day whose impossible count exceeded the occurrence threshold.
pub type FlaggedDay = DayScore;

/// Count impossible transitions per day, without applying the occurrence
/// threshold. Empty days are skipped.
pub fn score_days(impossible: &ImpossibleSet, days: &[DaySequence]) -> Vec<DayScore> {
    days.iter()
        .filter(|day| !day.steps.is_empty())
        .map(|day| {
            let count = day
                .pairs()
                .filter(|&(from, to)| impossible.contains(from, to))
                .count();
            DayScore {
                date: day.date,
                count: u32::try_from(count).unwrap_or(u32::MAX),
            }
        })
        .collect()
}

/// Scan a patient's days against their model and keep the flagged ones.
///
/// Fails with `StateIndexMismatch` when `index` is not the index the model
/// was built with; the pairs would otherwise silently never match.
pub fn scan_days(
    model: &TransitionModel,
    index: &StateIndex,
    days: &[DaySequence],
    thresholds: &ScanThresholds,
) -> Result<Vec<FlaggedDay>> {
    if model.state_fingerprint != index.fingerprint() {
        return Err(Error::StateIndexMismatch {
            expected: model.state_fingerprint.clone(),
            actual: index.fingerprint().to_string(),
        });
    }
    thresholds.validate()?;

    let impossible = ImpossibleSet::from_matrix(&model.probabilities, thresholds.probability);
    Ok(score_days(&impossible, days)
        .into_iter()
        .filter(|score| score.count > thresholds.occurrences)
        .collect())
}
