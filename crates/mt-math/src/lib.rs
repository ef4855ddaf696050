//! Movement triage math utilities.

pub mod math;

pub use math::matrix::SquareMatrix;
pub use math::transition::{normalize_total, symmetrize_floor};
