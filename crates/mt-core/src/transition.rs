//! Per-patient transition model.
//!
//! Counts observed room-to-room transitions over a patient's whole history,
//! then folds the counts into a direction-agnostic probability matrix:
//!
//! 1. count `(from, to)` pairs, carrying the last state across a day
//!    boundary only when the next day continues the previous one
//! 2. symmetrize with `(M + Mᵗ) / 2` (integer floor)
//! 3. divide by the grand total so the whole matrix sums to 1

use mt_common::{Error, PatientId, Result};
use mt_math::{normalize_total, symmetrize_floor, SquareMatrix};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sequence::DaySequence;
use crate::state_index::StateIndex;

/// Learned movement baseline for one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionModel {
    pub patient_id: PatientId,
    /// Raw directed transition counts.
    pub counts: SquareMatrix<u64>,
    /// Floor-symmetrized counts.
    pub symmetrized: SquareMatrix<u64>,
    /// Symmetrized counts over their grand total.
    pub probabilities: SquareMatrix<f64>,
    /// Fingerprint of the state index the matrices are laid out in.
    pub state_fingerprint: String,
}

impl TransitionModel {
    /// Build a patient's model from their day sequences.
    ///
    /// Fails with `DegenerateModel` when the symmetrized matrix is empty;
    /// such a patient has no baseline to scan against.
    pub fn build(
        patient_id: &PatientId,
        days: &[DaySequence],
        index: &StateIndex,
    ) -> Result<TransitionModel> {
        let counts = count_transitions(days, index.len());
        let symmetrized = symmetrize_floor(&counts);
        let probabilities =
            normalize_total(&symmetrized).ok_or_else(|| Error::DegenerateModel {
                patient_id: patient_id.to_string(),
                raw_transitions: counts.sum(),
            })?;

        debug!(
            patient_id = %patient_id,
            days = days.len(),
            raw_transitions = counts.sum(),
            symmetrized_total = symmetrized.sum(),
            "transition model built"
        );

        Ok(TransitionModel {
            patient_id: patient_id.clone(),
            counts,
            symmetrized,
            probabilities,
            state_fingerprint: index.fingerprint().to_string(),
        })
    }

    pub fn n_state(&self) -> usize {
        self.counts.n()
    }

    pub fn raw_transitions(&self) -> u64 {
        self.counts.sum()
    }
}

/// Directed transition counts over all days.
///
/// The carried state is the only data crossing a day boundary: a day that
/// continues the previous one records `carried → first`, any other day
/// restarts from its own first step without an edge.
pub fn count_transitions(days: &[DaySequence], n_state: usize) -> SquareMatrix<u64> {
    let (counts, _) = days.iter().fold(
        (SquareMatrix::zeros(n_state), None::<usize>),
        |(mut counts, carried), day| {
            let Some(first) = day.first() else {
                return (counts, carried);
            };
            if let Some(prev) = carried.filter(|_| day.continues_previous) {
                counts.increment(prev, first);
            }
            for (from, to) in day.pairs() {
                counts.increment(from, to);
            }
            (counts, day.last())
        },
    );
    counts
}
