//! Per-sample second-derivative tensors of a smoothed scalar field.

use rayon::prelude::*;

use crate::field::{line_starts, Extension, FieldError, ScalarField};
use crate::gauss::gaussian_smooth;
use crate::packed::{packed_len, packed_slot, PackedSymmetricMatrix};
use crate::parallel::build_pool;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Field of packed symmetric Hessians.
///
/// The slot axis is innermost: sample `i` owns
/// `data[i * slots .. (i + 1) * slots]`, so each per-sample tensor can be
/// viewed in place as a [`PackedSymmetricMatrix`].
#[derive(Clone, Debug, PartialEq)]
pub struct TensorField {
    dims: Vec<usize>,
    data: Vec<f64>,
}

impl TensorField {
    /// Assemble from spatial `dims` and interleaved slot data.
    pub fn from_vec(dims: Vec<usize>, data: Vec<f64>) -> Result<Self, FieldError> {
        let samples = crate::field::check_dims(&dims)?;
        let expected = samples * packed_len(dims.len());
        if data.len() != expected {
            return Err(FieldError::LengthMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self { dims, data })
    }

    /// Spatial rank `n`.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Spatial extent.
    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Slots per sample, `n(n+1)/2`.
    #[inline]
    pub fn slots(&self) -> usize {
        packed_len(self.ndim())
    }

    /// Number of spatial samples.
    #[inline]
    pub fn samples(&self) -> usize {
        self.data.len() / self.slots()
    }

    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Packed slots of sample `index`.
    #[inline]
    pub fn slots_at(&self, index: usize) -> &[f64] {
        let k = self.slots();
        &self.data[index * k..(index + 1) * k]
    }

    /// Symmetric matrix view of sample `index`.
    pub fn matrix_at(&self, index: usize) -> PackedSymmetricMatrix<&[f64]> {
        PackedSymmetricMatrix::from_parts(self.slots_at(index), self.ndim())
    }
}

/// Builds a [`TensorField`] by Gaussian smoothing followed by chained
/// central differences.
#[derive(Clone, Debug)]
pub struct TensorFieldBuilder {
    sigmas: Vec<f64>,
    extension: Extension,
    threads: usize,
}

impl TensorFieldBuilder {
    /// Same smoothing sigma (in pixels) on every axis.
    pub fn isotropic(sigma: f64, ndim: usize) -> Self {
        Self::new(vec![sigma; ndim])
    }

    /// Per-axis smoothing sigmas in pixel units.
    pub fn new(sigmas: Vec<f64>) -> Self {
        Self {
            sigmas,
            extension: Extension::Mirror,
            threads: 0,
        }
    }

    /// Border policy used to read one sample past each edge.
    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extension = extension;
        self
    }

    /// Worker count for the derivative passes; `0` = all cores.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Compute the Hessian tensor field of `source`.
    ///
    /// Gradients per axis and derivatives per axis pair write disjoint
    /// buffers and run concurrently.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, source), fields(dims = ?source.dims()))
    )]
    pub fn build(&self, source: &ScalarField) -> Result<TensorField, FieldError> {
        let n = source.ndim();
        if self.sigmas.len() != n {
            return Err(FieldError::Rank {
                expected: n,
                got: self.sigmas.len(),
            });
        }
        let smoothed = gaussian_smooth(source, &self.sigmas, self.extension)?;
        let dims = smoothed.dims().to_vec();
        let ext = self.extension;

        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|d1| (d1..n).map(move |d2| (d1, d2)))
            .collect();

        let compute = || {
            let gradients: Vec<Vec<f64>> = (0..n)
                .into_par_iter()
                .map(|axis| central_difference(smoothed.data(), &dims, axis, ext))
                .collect();
            pairs
                .par_iter()
                .map(|&(d1, d2)| central_difference(&gradients[d1], &dims, d2, ext))
                .collect::<Vec<Vec<f64>>>()
        };
        let second = match build_pool(self.threads) {
            Ok(pool) => pool.install(compute),
            Err(err) => {
                log::warn!("tensor builder falling back to the global pool: {err}");
                compute()
            }
        };

        let k = packed_len(n);
        let samples = smoothed.len();
        let mut data = vec![0.0; samples * k];
        for (&(d1, d2), plane) in pairs.iter().zip(&second) {
            let slot = packed_slot(n, d1, d2);
            for (i, &v) in plane.iter().enumerate() {
                data[i * k + slot] = v;
            }
        }
        log::debug!("tensor field built: dims={dims:?}, slots={k}");
        TensorField::from_vec(dims, data)
    }
}

/// `(f[i+1] - f[i-1]) / 2` along `axis`, reading one sample past each edge.
pub fn central_difference(data: &[f64], dims: &[usize], axis: usize, ext: Extension) -> Vec<f64> {
    let stride: usize = dims[..axis].iter().product();
    let len = dims[axis];
    let mut out = vec![0.0; data.len()];
    let read = |start: usize, i: isize| -> f64 {
        ext.resolve(i, len)
            .map_or(0.0, |q| data[start + q * stride])
    };
    for start in line_starts(dims, axis) {
        for i in 0..len {
            let ii = i as isize;
            out[start + i * stride] = 0.5 * (read(start, ii + 1) - read(start, ii - 1));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn flat_field_has_vanishing_hessian() {
        let f = ScalarField::filled(vec![12, 9], 7.0).unwrap();
        let t = TensorFieldBuilder::isotropic(1.5, 2).build(&f).unwrap();
        assert_eq!(t.slots(), 3);
        assert_eq!(t.samples(), 12 * 9);
        for &v in t.data() {
            assert_abs_diff_eq!(v, 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn quadratic_field_recovers_curvature() {
        // f = x^2 - 3 y^2 + 2 x y  =>  Hxx = 2, Hyy = -6, Hxy = 2
        let f = ScalarField::from_fn(vec![15, 15], |p| {
            let (x, y) = (p[0] as f64, p[1] as f64);
            x * x - 3.0 * y * y + 2.0 * x * y
        })
        .unwrap();
        let t = TensorFieldBuilder::isotropic(0.0, 2).build(&f).unwrap();
        let m = t.matrix_at(7 + 15 * 7);
        assert_abs_diff_eq!(m.get(0, 0), 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(m.get(1, 1), -6.0, epsilon = 1e-9);
        assert_abs_diff_eq!(m.get(0, 1), 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(m.get(1, 0), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn three_dimensional_slots_follow_packed_order() {
        // f = x*z + 4 y^2  =>  Hxz = 1 (slot 2), Hyy = 8 (slot 3)
        let f = ScalarField::from_fn(vec![9, 9, 9], |p| {
            let (x, y, z) = (p[0] as f64, p[1] as f64, p[2] as f64);
            x * z + 4.0 * y * y
        })
        .unwrap();
        let t = TensorFieldBuilder::isotropic(0.0, 3)
            .with_threads(2)
            .build(&f)
            .unwrap();
        let centre = 4 + 9 * 4 + 81 * 4;
        let s = t.slots_at(centre);
        assert_abs_diff_eq!(s[0], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(s[2], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(s[3], 8.0, epsilon = 1e-9);
        assert_abs_diff_eq!(s[5], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn sigma_rank_must_match_source() {
        let f = ScalarField::filled(vec![4, 4], 0.0).unwrap();
        assert!(matches!(
            TensorFieldBuilder::isotropic(1.0, 3).build(&f),
            Err(FieldError::Rank { expected: 2, got: 3 })
        ));
    }
}
