//! Separable Gaussian smoothing of n-D fields.

use crate::field::{check_dims, line_starts, Extension, FieldError, ScalarField};

/// Sampled, normalised 1-D Gaussian with radius `ceil(3 sigma)`, at least 1.
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = ((3.0 * sigma).ceil() as usize).max(1);
    let two_s2 = 2.0 * sigma * sigma;
    let mut k: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_s2).exp()
        })
        .collect();
    let sum: f64 = k.iter().sum();
    for v in &mut k {
        *v /= sum;
    }
    k
}

/// Smooth `src` with an independent sigma per axis (in samples).
///
/// Axes with `sigma == 0` are left untouched. Border samples are synthesised
/// with `ext`.
pub fn gaussian_smooth(
    src: &ScalarField,
    sigmas: &[f64],
    ext: Extension,
) -> Result<ScalarField, FieldError> {
    check_dims(src.dims())?;
    if sigmas.len() != src.ndim() {
        return Err(FieldError::Rank {
            expected: src.ndim(),
            got: sigmas.len(),
        });
    }
    if let Some((axis, &sigma)) = sigmas
        .iter()
        .enumerate()
        .find(|(_, s)| !s.is_finite() || **s < 0.0)
    {
        return Err(FieldError::InvalidSigma { axis, sigma });
    }

    let dims = src.dims().to_vec();
    let mut data = src.data().to_vec();
    for (axis, &sigma) in sigmas.iter().enumerate() {
        if sigma == 0.0 {
            continue;
        }
        let kernel = gaussian_kernel(sigma);
        data = convolve_axis(&data, &dims, axis, &kernel, ext);
    }
    ScalarField::from_vec(dims, data)
}

/// Convolve every line along `axis` with a centred odd-length kernel.
pub(crate) fn convolve_axis(
    data: &[f64],
    dims: &[usize],
    axis: usize,
    kernel: &[f64],
    ext: Extension,
) -> Vec<f64> {
    let stride: usize = dims[..axis].iter().product();
    let len = dims[axis];
    let radius = kernel.len() / 2;
    let mut out = vec![0.0; data.len()];
    let mut padded = vec![0.0; len + 2 * radius];

    for start in line_starts(dims, axis) {
        for (j, slot) in padded.iter_mut().enumerate() {
            let i = j as isize - radius as isize;
            *slot = ext
                .resolve(i, len)
                .map_or(0.0, |q| data[start + q * stride]);
        }
        for i in 0..len {
            let acc: f64 = kernel
                .iter()
                .zip(&padded[i..i + kernel.len()])
                .map(|(k, v)| k * v)
                .sum();
            out[start + i * stride] = acc;
        }
    }
    out
}
