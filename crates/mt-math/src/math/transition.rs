//! Count-matrix transforms for direction-agnostic transition models.

use super::matrix::SquareMatrix;

/// Element-wise `(M + Mᵗ) / 2` with integer floor division.
///
/// The result is exactly symmetric. Cells observed only once in a single
/// direction floor to zero.
pub fn symmetrize_floor(counts: &SquareMatrix<u64>) -> SquareMatrix<u64> {
    SquareMatrix::from_fn(counts.n(), |i, j| {
        (counts.get(i, j) + counts.get(j, i)) / 2
    })
}

/// Divide every cell by the grand total so the whole matrix sums to 1.
///
/// Returns `None` when the total is zero instead of producing NaN cells.
pub fn normalize_total(counts: &SquareMatrix<u64>) -> Option<SquareMatrix<f64>> {
    let total = counts.sum();
    if total == 0 {
        return None;
    }
    let total = total as f64;
    Some(SquareMatrix::from_fn(counts.n(), |i, j| {
        counts.get(i, j) as f64 / total
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_symmetrize_floor_divides() {
        let m = SquareMatrix::from_rows(vec![vec![2u64, 3], vec![1, 0]]).unwrap();
        let s = symmetrize_floor(&m);
        // diagonal: (2+2)/2 = 2; off-diagonal: (3+1)/2 = 2
        assert_eq!(s.to_rows(), vec![vec![2, 2], vec![2, 0]]);
        assert!(s.is_symmetric());
    }

    #[test]
    fn test_symmetrize_single_direction_floors_to_zero() {
        let m = SquareMatrix::from_rows(vec![vec![0u64, 1], vec![0, 0]]).unwrap();
        assert_eq!(symmetrize_floor(&m).sum(), 0);
    }

    #[test]
    fn test_normalize_total_sums_to_one() {
        let m = SquareMatrix::from_rows(vec![vec![1u64, 1], vec![1, 1]]).unwrap();
        let p = normalize_total(&m).unwrap();
        assert!(approx_eq(p.get(0, 0), 0.25));
        assert!(approx_eq(p.sum(), 1.0));
    }

    #[test]
    fn test_normalize_total_is_not_row_stochastic() {
        let m = SquareMatrix::from_rows(vec![vec![3u64, 0], vec![0, 1]]).unwrap();
        let p = normalize_total(&m).unwrap();
        assert!(approx_eq(p.get(0, 0), 0.75));
        assert!(approx_eq(p.get(1, 1), 0.25));
    }

    #[test]
    fn test_normalize_total_zero_is_none() {
        let m: SquareMatrix<u64> = SquareMatrix::zeros(3);
        assert!(normalize_total(&m).is_none());
    }
}
