//! Per-sample eigenvalues of Hessian tensor fields.
//!
//! The solving strategy is chosen once from the tensor rank: rank 1 copies
//! the single entry, rank 2 uses the closed form, anything larger runs a
//! dense symmetric decomposition. Every path reports eigenvalues in
//! descending order.

use nalgebra::SymmetricEigen;

use crate::field::{FieldError, ScalarField};
use crate::packed::PackedSymmetricMatrix;
use crate::parallel::{build_pool, chunks_along_largest_axis, effective_threads, run_chunks};
use crate::tensor::TensorField;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors returned by [`EigenSolver::eigenvalues`].
#[derive(thiserror::Error, Debug)]
pub enum EigenError {
    #[error("solver built for rank {expected}, tensor field has rank {got}")]
    RankMismatch { expected: usize, got: usize },
    #[error("eigenvalue worker for chunk {chunk} failed")]
    WorkerFailed { chunk: usize },
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Field(#[from] FieldError),
}

/// Per-rank solving path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EigenStrategy {
    /// `n = 1`: the tensor is its own eigenvalue.
    Identity,
    /// `n = 2`: closed-form roots of the characteristic polynomial.
    ClosedForm2x2,
    /// `n > 2`: dense symmetric eigen-decomposition.
    Symmetric,
}

impl EigenStrategy {
    pub fn for_rank(rank: usize) -> Self {
        match rank {
            0 | 1 => EigenStrategy::Identity,
            2 => EigenStrategy::ClosedForm2x2,
            _ => EigenStrategy::Symmetric,
        }
    }
}

/// Eigenvalues of a symmetric 2x2 matrix, larger root first.
#[inline]
pub fn eigenvalues_2x2(a11: f64, a12: f64, a22: f64) -> [f64; 2] {
    let trace = a11 + a22;
    let d = a11 - a22;
    let root = (d * d + 4.0 * a12 * a12).sqrt();
    [0.5 * (trace + root), 0.5 * (trace - root)]
}

/// Eigenvalues of an arbitrary symmetric matrix, sorted descending.
pub fn eigenvalues_symmetric<S>(m: &PackedSymmetricMatrix<S>) -> Vec<f64>
where
    S: std::ops::Deref<Target = [f64]>,
{
    let mut values: Vec<f64> = SymmetricEigen::new(m.to_dmatrix())
        .eigenvalues
        .iter()
        .copied()
        .collect();
    values.sort_by(|a, b| b.total_cmp(a));
    values
}

/// Field of `n` descending eigenvalues per spatial sample.
#[derive(Clone, Debug, PartialEq)]
pub struct EigenField {
    dims: Vec<usize>,
    data: Vec<f64>,
}

impl EigenField {
    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn samples(&self) -> usize {
        self.data.len() / self.ndim()
    }

    /// Eigenvalues of sample `index`, largest first.
    #[inline]
    pub fn values_at(&self, index: usize) -> &[f64] {
        let n = self.ndim();
        &self.data[index * n..(index + 1) * n]
    }

    /// The `k`-th largest eigenvalue at every sample.
    pub fn component(&self, k: usize) -> Result<ScalarField, FieldError> {
        let n = self.ndim();
        if k >= n {
            return Err(FieldError::Rank {
                expected: n,
                got: k + 1,
            });
        }
        let data = self.data.iter().skip(k).step_by(n).copied().collect();
        ScalarField::from_vec(self.dims.clone(), data)
    }
}

/// Parallel per-sample eigenvalue solver.
#[derive(Clone, Debug)]
pub struct EigenSolver {
    rank: usize,
    strategy: EigenStrategy,
    threads: usize,
}

impl EigenSolver {
    /// Solver for tensors of spatial rank `rank`.
    pub fn new(rank: usize) -> Self {
        Self {
            rank,
            strategy: EigenStrategy::for_rank(rank),
            threads: 0,
        }
    }

    /// Number of chunks/workers; `0` = available parallelism.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    #[inline]
    pub fn strategy(&self) -> EigenStrategy {
        self.strategy
    }

    /// Eigenvalues of one packed tensor into `out` (length `rank`).
    pub fn solve_into(&self, slots: &[f64], out: &mut [f64]) {
        match self.strategy {
            EigenStrategy::Identity => out.copy_from_slice(&slots[..out.len()]),
            EigenStrategy::ClosedForm2x2 => {
                out.copy_from_slice(&eigenvalues_2x2(slots[0], slots[1], slots[2]));
            }
            EigenStrategy::Symmetric => {
                let m = PackedSymmetricMatrix::from_parts(slots, self.rank);
                out.copy_from_slice(&eigenvalues_symmetric(&m));
            }
        }
    }

    /// Eigenvalues at every sample of `tensor`.
    ///
    /// The largest spatial axis is split into one contiguous chunk per
    /// worker. Each worker fills a private buffer; buffers are copied into
    /// the result only after all workers joined. A failed worker fails the
    /// whole call without touching other chunks.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, tensor), fields(dims = ?tensor.dims()))
    )]
    pub fn eigenvalues(&self, tensor: &TensorField) -> Result<EigenField, EigenError> {
        if tensor.ndim() != self.rank {
            return Err(EigenError::RankMismatch {
                expected: self.rank,
                got: tensor.ndim(),
            });
        }
        let n = self.rank;
        let dims = tensor.dims();
        let pool = build_pool(self.threads)?;
        let chunks = chunks_along_largest_axis(dims, effective_threads(self.threads));

        let results = run_chunks(&pool, &chunks, |chunk| {
            let len: usize = dims
                .iter()
                .enumerate()
                .map(|(axis, &d)| if axis == chunk.axis { chunk.range.len() } else { d })
                .product();
            let mut buf = vec![0.0; len * n];
            chunk.for_each_index(dims, |local, global| {
                self.solve_into(tensor.slots_at(global), &mut buf[local * n..(local + 1) * n]);
            });
            buf
        });

        let mut data = vec![0.0; tensor.samples() * n];
        for (chunk, result) in chunks.iter().zip(results) {
            let buf = result.map_err(|failed| {
                log::warn!("eigenvalue chunk {failed} panicked; discarding result");
                EigenError::WorkerFailed { chunk: failed }
            })?;
            chunk.for_each_index(dims, |local, global| {
                data[global * n..(global + 1) * n]
                    .copy_from_slice(&buf[local * n..(local + 1) * n]);
            });
        }
        log::debug!(
            "eigenvalues solved: {} samples, {} chunks, {:?}",
            tensor.samples(),
            chunks.len(),
            self.strategy
        );
        Ok(EigenField {
            dims: dims.to_vec(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::TensorFieldBuilder;
    use approx::assert_abs_diff_eq;

    #[test]
    fn strategy_is_selected_by_rank() {
        assert_eq!(EigenStrategy::for_rank(1), EigenStrategy::Identity);
        assert_eq!(EigenStrategy::for_rank(2), EigenStrategy::ClosedForm2x2);
        assert_eq!(EigenStrategy::for_rank(3), EigenStrategy::Symmetric);
    }

    #[test]
    fn closed_form_matches_general_decomposition() {
        let cases = [
            [1.0, 0.0, 1.0],
            [2.0, -1.5, 0.25],
            [-3.0, 4.0, 7.0],
            [0.0, 1e-8, 0.0],
            [1e3, 17.0, -250.0],
            [-0.5, -0.5, -0.5],
        ];
        for slots in cases {
            let closed = eigenvalues_2x2(slots[0], slots[1], slots[2]);
            let m = PackedSymmetricMatrix::new(&slots[..], 2).unwrap();
            let general = eigenvalues_symmetric(&m);
            assert!(closed[0] >= closed[1]);
            for (c, g) in closed.iter().zip(&general) {
                assert_abs_diff_eq!(*c, *g, epsilon = 1e-9 * (1.0 + c.abs()));
            }
        }
    }

    #[test]
    fn general_path_sorts_descending() {
        // diag(1, 5, -2)
        let slots = [1.0, 0.0, 0.0, 5.0, 0.0, -2.0];
        let m = PackedSymmetricMatrix::new(&slots[..], 3).unwrap();
        let v = eigenvalues_symmetric(&m);
        assert_abs_diff_eq!(v[0], 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v[1], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v[2], -2.0, epsilon = 1e-12);
    }

    #[test]
    fn flat_field_yields_zero_eigenvalues() {
        for dims in [vec![16, 11], vec![6, 5, 7]] {
            let n = dims.len();
            let f = ScalarField::filled(dims, -4.0).unwrap();
            let t = TensorFieldBuilder::isotropic(1.0, n).build(&f).unwrap();
            let e = EigenSolver::new(n).with_threads(3).eigenvalues(&t).unwrap();
            assert_eq!(e.samples(), f.len());
            for i in 0..e.samples() {
                for &v in e.values_at(i) {
                    assert_abs_diff_eq!(v, 0.0, epsilon = 1e-9);
                }
            }
        }
    }

    #[test]
    fn chunked_result_is_independent_of_worker_count() {
        let f = ScalarField::from_fn(vec![23, 9], |p| {
            let (x, y) = (p[0] as f64, p[1] as f64);
            (0.3 * x).sin() * (0.2 * y).cos() + 0.01 * x * y
        })
        .unwrap();
        let t = TensorFieldBuilder::isotropic(1.2, 2).build(&f).unwrap();
        let one = EigenSolver::new(2).with_threads(1).eigenvalues(&t).unwrap();
        let five = EigenSolver::new(2).with_threads(5).eigenvalues(&t).unwrap();
        assert_eq!(one, five);
        let smaller = one.component(1).unwrap();
        let larger = one.component(0).unwrap();
        assert!(smaller.data().iter().zip(larger.data()).all(|(s, l)| s <= l));
    }

    #[test]
    fn rank_mismatch_is_rejected() {
        let f = ScalarField::filled(vec![4, 4], 0.0).unwrap();
        let t = TensorFieldBuilder::isotropic(1.0, 2).build(&f).unwrap();
        assert!(matches!(
            EigenSolver::new(3).eigenvalues(&t),
            Err(EigenError::RankMismatch { expected: 3, got: 2 })
        ));
    }
}
