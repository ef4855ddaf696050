//! Property-based tests for mt-math matrix transforms.
//!
//! Uses proptest to verify the symmetrization and normalization invariants
//! hold across many random count matrices.

use mt_math::{normalize_total, symmetrize_floor, SquareMatrix};
use proptest::prelude::*;

/// Tolerance for floating point sums.
const TOL: f64 = 1e-9;

fn count_matrix_strategy() -> impl Strategy<Value = SquareMatrix<u64>> {
    (1usize..=8).prop_flat_map(|n| {
        prop::collection::vec(0u64..500, n * n).prop_map(move |cells| {
            SquareMatrix::from_fn(n, |i, j| cells[i * n + j])
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Floor-symmetrized matrix equals its own transpose.
    #[test]
    fn symmetrized_is_symmetric(m in count_matrix_strategy()) {
        let s = symmetrize_floor(&m);
        prop_assert!(s.is_symmetric());
        prop_assert_eq!(s.transpose(), s);
    }

    /// Symmetrization never exceeds the larger of the two directions.
    #[test]
    fn symmetrized_cell_bounded(m in count_matrix_strategy()) {
        let s = symmetrize_floor(&m);
        for (i, j, v) in s.cells() {
            prop_assert!(v <= m.get(i, j).max(m.get(j, i)));
        }
    }

    /// Normalized matrix sums to 1 whenever it has any mass.
    #[test]
    fn normalized_sums_to_one(m in count_matrix_strategy()) {
        match normalize_total(&m) {
            Some(p) => prop_assert!((p.sum() - 1.0).abs() < TOL, "sum={}", p.sum()),
            None => prop_assert_eq!(m.sum(), 0),
        }
    }

    /// Every normalized cell lies in [0, 1].
    #[test]
    fn normalized_cells_in_unit_interval(m in count_matrix_strategy()) {
        if let Some(p) = normalize_total(&m) {
            for (_, _, v) in p.cells() {
                prop_assert!((0.0..=1.0).contains(&v), "cell={}", v);
                prop_assert!(v.is_finite());
            }
        }
    }

    /// Transforms are deterministic.
    #[test]
    fn transforms_are_deterministic(m in count_matrix_strategy()) {
        prop_assert_eq!(symmetrize_floor(&m), symmetrize_floor(&m));
        prop_assert_eq!(normalize_total(&m), normalize_total(&m));
    }
}
