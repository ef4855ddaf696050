//! Dense row-major square matrix.
//!
//! Transition matrices are indexed by the global state index, so every
//! patient's matrix has the same shape even when rows stay all-zero.
//! Serializes as a list of rows.

use serde::de::Error as _;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ops::AddAssign;

#[derive(Debug, Clone, PartialEq)]
pub struct SquareMatrix<T> {
    n: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> SquareMatrix<T> {
    /// `n × n` matrix filled with `T::default()`.
    pub fn zeros(n: usize) -> Self {
        SquareMatrix {
            n,
            data: vec![T::default(); n * n],
        }
    }

    /// Build from rows; `None` unless every row has `rows.len()` entries.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Option<Self> {
        let n = rows.len();
        if rows.iter().any(|r| r.len() != n) {
            return None;
        }
        Some(SquareMatrix {
            n,
            data: rows.into_iter().flatten().collect(),
        })
    }

    /// Build by evaluating `f(i, j)` for every cell.
    pub fn from_fn(n: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                data.push(f(i, j));
            }
        }
        SquareMatrix { n, data }
    }

    /// Number of rows (and columns).
    pub fn n(&self) -> usize {
        self.n
    }

    /// Cell `(i, j)`.
    ///
    /// # Panics
    /// Panics when `i` or `j` is out of range.
    pub fn get(&self, i: usize, j: usize) -> T {
        assert!(i < self.n && j < self.n, "index ({i}, {j}) out of range for {0}x{0}", self.n);
        self.data[i * self.n + j]
    }

    pub fn set(&mut self, i: usize, j: usize, value: T) {
        assert!(i < self.n && j < self.n, "index ({i}, {j}) out of range for {0}x{0}", self.n);
        self.data[i * self.n + j] = value;
    }

    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        // chunks_exact(0) panics; an empty matrix has no rows anyway.
        self.data.chunks_exact(self.n.max(1)).take(self.n)
    }

    /// Iterate `(i, j, value)` in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        let n = self.n;
        self.data
            .iter()
            .enumerate()
            .map(move |(k, v)| (k / n, k % n, *v))
    }

    pub fn transpose(&self) -> Self {
        SquareMatrix::from_fn(self.n, |i, j| self.get(j, i))
    }

    pub fn to_rows(&self) -> Vec<Vec<T>> {
        self.rows().map(|r| r.to_vec()).collect()
    }
}

impl<T: Copy + Default + PartialEq> SquareMatrix<T> {
    pub fn is_symmetric(&self) -> bool {
        (0..self.n).all(|i| (i + 1..self.n).all(|j| self.get(i, j) == self.get(j, i)))
    }
}

impl<T: Copy + Default + AddAssign> SquareMatrix<T> {
    /// Grand total over all cells.
    pub fn sum(&self) -> T {
        let mut total = T::default();
        for v in &self.data {
            total += *v;
        }
        total
    }
}

impl SquareMatrix<u64> {
    /// Add one observation to cell `(i, j)`.
    pub fn increment(&mut self, i: usize, j: usize) {
        assert!(i < self.n && j < self.n, "index ({i}, {j}) out of range for {0}x{0}", self.n);
        self.data[i * self.n + j] += 1;
    }
}

impl<T: Serialize> Serialize for SquareMatrix<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.n))?;
        if self.n > 0 {
            for row in self.data.chunks_exact(self.n) {
                seq.serialize_element(row)?;
            }
        }
        seq.end()
    }
}

impl<'de, T> Deserialize<'de> for SquareMatrix<T>
where
    T: Deserialize<'de> + Copy + Default,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rows = Vec::<Vec<T>>::deserialize(deserializer)?;
        let n = rows.len();
        SquareMatrix::from_rows(rows)
            .ok_or_else(|| D::Error::custom(format!("matrix with {n} rows is not square")))
    }
}
