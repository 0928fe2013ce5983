//! Scalar ridge ("tubeness") response derived from sorted Hessian eigenvalues.
//!
//! With eigenvalues sorted descending `l0 >= l1 >= .. >= l(n-1)`, a bright
//! tube of codimension `n-1` has strongly negative `l1..l(n-1)` and a small
//! `l0` along its axis. The response is
//! `sigma^2 * (|l1| * .. * |l(n-1)|)^(1/(n-1))` when all of `l1..l(n-1)` are
//! negative and zero otherwise. A 1-D field uses `sigma^2 * max(-l0, 0)`.

use crate::eigen::{EigenError, EigenField, EigenSolver};
use crate::field::{Extension, FieldError, ScalarField};
use crate::tensor::TensorFieldBuilder;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Tubeness of one sample given its descending eigenvalues.
pub fn tubeness_from_eigenvalues(values: &[f64], sigma: f64) -> f64 {
    let scale = sigma * sigma;
    match values {
        [] => 0.0,
        [l0] => scale * (-l0).max(0.0),
        [_, rest @ ..] => {
            if !rest.iter().all(|&l| l < 0.0) {
                return 0.0;
            }
            let log_mean = rest.iter().map(|l| l.abs().ln()).sum::<f64>() / rest.len() as f64;
            scale * log_mean.exp()
        }
    }
}

/// Map an eigenvalue field to its tubeness field.
pub fn tubeness(eigen: &EigenField, sigma: f64) -> Result<ScalarField, FieldError> {
    let data = (0..eigen.samples())
        .map(|i| tubeness_from_eigenvalues(eigen.values_at(i), sigma))
        .collect();
    ScalarField::from_vec(eigen.dims().to_vec(), data)
}

/// Smoothing, Hessian and eigen-decomposition chained into a ridge filter.
#[derive(Clone, Debug)]
pub struct TubenessFilter {
    sigma: f64,
    extension: Extension,
    threads: usize,
}

impl TubenessFilter {
    /// Filter tuned to tubes of radius about `sigma * sqrt(n)` pixels.
    pub fn new(sigma: f64) -> Self {
        Self {
            sigma,
            extension: Extension::Mirror,
            threads: 0,
        }
    }

    /// Sigma matching a bright band `thickness` pixels wide in `ndim` dimensions.
    pub fn for_thickness(thickness: f64, ndim: usize) -> Self {
        Self::new(thickness / 2.0 / (ndim.max(1) as f64).sqrt())
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extension = extension;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    #[inline]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, source), fields(sigma = self.sigma))
    )]
    pub fn apply(&self, source: &ScalarField) -> Result<ScalarField, EigenError> {
        let n = source.ndim();
        let tensor = TensorFieldBuilder::isotropic(self.sigma, n)
            .with_extension(self.extension)
            .with_threads(self.threads)
            .build(source)?;
        let eigen = EigenSolver::new(n)
            .with_threads(self.threads)
            .eigenvalues(&tensor)?;
        Ok(tubeness(&eigen, self.sigma)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn response_requires_negative_cross_section_curvature() {
        assert_abs_diff_eq!(tubeness_from_eigenvalues(&[0.1, -2.0], 1.0), 2.0);
        assert_eq!(tubeness_from_eigenvalues(&[0.1, 0.0], 1.0), 0.0);
        assert_eq!(tubeness_from_eigenvalues(&[3.0, 1.0], 2.0), 0.0);
        assert_abs_diff_eq!(
            tubeness_from_eigenvalues(&[0.0, -2.0, -8.0], 0.5),
            0.25 * 4.0,
            epsilon = 1e-12
        );
        assert_eq!(tubeness_from_eigenvalues(&[0.0, -2.0, 1.0], 1.0), 0.0);
        assert_abs_diff_eq!(tubeness_from_eigenvalues(&[-3.0], 1.0), 3.0);
    }

    #[test]
    fn bright_line_peaks_on_its_centre() {
        // Vertical bright band, 5 px wide, centred on x = 15.
        let f = ScalarField::from_fn(vec![31, 21], |p| {
            if (p[0] as i64 - 15).abs() <= 2 {
                100.0
            } else {
                0.0
            }
        })
        .unwrap();
        let out = TubenessFilter::for_thickness(5.0, 2).apply(&f).unwrap();
        let row = 10;
        let at = |x: usize| out.get(&[x, row]).unwrap();
        assert!(at(15) > 0.0);
        assert!(at(15) >= at(13));
        assert!(at(15) >= at(17));
        assert!(at(13) > at(11));
        assert_eq!(at(0), 0.0);
        assert_eq!(at(30), 0.0);
    }

    #[test]
    fn flat_field_has_no_ridges() {
        let f = ScalarField::filled(vec![10, 10], 9.0).unwrap();
        let out = TubenessFilter::new(1.0).apply(&f).unwrap();
        assert!(out.data().iter().all(|&v| v.abs() < 1e-9));
    }
}
