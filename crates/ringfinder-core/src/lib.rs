//! Core numeric building blocks for ring detection.
//!
//! This crate knows nothing about rings. It provides dense n-dimensional
//! fields, Gaussian smoothing, per-sample Hessian tensors and their
//! eigenvalues, a tubeness ridge filter, an automatic threshold, and the
//! worker-pool and cancellation plumbing shared by the detection stages.
//!
//! ```
//! use ringfinder_core::{ScalarField, TubenessFilter};
//!
//! let img = ScalarField::from_fn(vec![32, 32], |p| if p[0] == 16 { 1.0 } else { 0.0 }).unwrap();
//! let ridges = TubenessFilter::new(1.0).apply(&img).unwrap();
//! assert!(ridges.get(&[16, 16]).unwrap() > 0.0);
//! ```

mod context;
mod eigen;
mod field;
mod gauss;
mod logger;
mod packed;
mod parallel;
mod tensor;
mod threshold;
mod tubeness;

pub use context::{CancelToken, RunContext};
pub use eigen::{
    eigenvalues_2x2, eigenvalues_symmetric, EigenError, EigenField, EigenSolver, EigenStrategy,
};
pub use field::{unravel_into, Extension, FieldError, Mask, NdField, ScalarField};
pub use gauss::{gaussian_kernel, gaussian_smooth};
pub use packed::{packed_len, packed_slot, PackedSymmetricMatrix};
pub use parallel::{
    build_pool, chunks_along_largest_axis, effective_threads, largest_axis, run_chunks,
    split_range, Chunk,
};
pub use tensor::{central_difference, TensorField, TensorFieldBuilder};
pub use threshold::{otsu_threshold, OTSU_BINS};
pub use tubeness::{tubeness, tubeness_from_eigenvalues, TubenessFilter};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
