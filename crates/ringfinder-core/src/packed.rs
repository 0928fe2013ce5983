//! Square symmetric matrix view over a packed upper-triangular slot vector.
//!
//! Slot order is `(0,0), (0,1), .., (0,n-1), (1,1), .., (n-1,n-1)`.

use std::ops::{Deref, DerefMut};

use nalgebra::DMatrix;

/// Number of packed slots for an `n x n` symmetric matrix.
#[inline]
pub const fn packed_len(n: usize) -> usize {
    n * (n + 1) / 2
}

/// Packed slot of entry `(row, col)`; order of the indices does not matter.
#[inline]
pub const fn packed_slot(n: usize, row: usize, col: usize) -> usize {
    let (r, c) = if row <= col { (row, col) } else { (col, row) };
    // r*n - r*(r-1)/2, rearranged to stay in unsigned arithmetic for r = 0.
    r * (2 * n + 1 - r) / 2 + (c - r)
}

/// Non-owning symmetric view: `get(i, j) == get(j, i)` by construction.
#[derive(Clone, Copy, Debug)]
pub struct PackedSymmetricMatrix<S> {
    slots: S,
    n: usize,
}

impl<S: Deref<Target = [f64]>> PackedSymmetricMatrix<S> {
    /// Wrap `slots`; returns `None` unless `slots.len() == n(n+1)/2`.
    pub fn new(slots: S, n: usize) -> Option<Self> {
        (slots.len() == packed_len(n)).then_some(Self { slots, n })
    }

    /// Callers guarantee `slots.len() == n(n+1)/2`.
    #[inline]
    pub(crate) fn from_parts(slots: S, n: usize) -> Self {
        debug_assert_eq!(slots.len(), packed_len(n));
        Self { slots, n }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.n
    }

    /// Entry `(row, col)`.
    ///
    /// # Panics
    /// If `row` or `col` is not below `size()`.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        assert!(
            row < self.n && col < self.n,
            "({row}, {col}) outside {n}x{n} matrix",
            n = self.n
        );
        self.slots[packed_slot(self.n, row, col)]
    }

    /// Checked variant of [`get`](Self::get).
    pub fn try_get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.n && col < self.n).then(|| self.slots[packed_slot(self.n, row, col)])
    }

    /// Dense copy for the general decomposition path.
    pub fn to_dmatrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.n, self.n, |r, c| self.get(r, c))
    }

    #[inline]
    pub fn trace(&self) -> f64 {
        (0..self.n).map(|i| self.get(i, i)).sum()
    }
}

impl<S: DerefMut<Target = [f64]>> PackedSymmetricMatrix<S> {
    /// Write entry `(row, col)`, which also sets `(col, row)`.
    ///
    /// # Panics
    /// If `row` or `col` is not below `size()`.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        assert!(
            row < self.n && col < self.n,
            "({row}, {col}) outside {n}x{n} matrix",
            n = self.n
        );
        self.slots[packed_slot(self.n, row, col)] = value;
    }
}
