//! Dense n-dimensional sample grids.
//!
//! Storage is a single row-major buffer in which axis 0 varies fastest, so a
//! 2-D field indexes as `x + width * y`, matching the usual image layout.

use serde::{Deserialize, Serialize};

/// Errors raised when a field is constructed with an inconsistent shape.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("field must have at least one axis")]
    NoAxes,
    #[error("axis {axis} has zero extent")]
    EmptyAxis { axis: usize },
    #[error("data length {got} does not match extent product {expected}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("expected a {expected}-dimensional field, got {got} dimensions")]
    Rank { expected: usize, got: usize },
    #[error("sigma must be finite and >= 0 on every axis (axis {axis}: {sigma})")]
    InvalidSigma { axis: usize, sigma: f64 },
}

/// How samples outside the field interval are synthesised.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extension {
    /// Reflect about the edge sample without repeating it: `-1 -> 1`.
    #[default]
    Mirror,
    /// Repeat the edge sample.
    Border,
    /// Out-of-bounds samples read as zero.
    Zero,
}

impl Extension {
    /// Map a possibly out-of-range coordinate into `0..len`.
    ///
    /// Returns `None` only for [`Extension::Zero`] outside the interval.
    #[inline]
    pub fn resolve(self, i: isize, len: usize) -> Option<usize> {
        let n = len as isize;
        if (0..n).contains(&i) {
            return Some(i as usize);
        }
        match self {
            Extension::Zero => None,
            Extension::Border => Some(i.clamp(0, n - 1) as usize),
            Extension::Mirror => {
                if n == 1 {
                    return Some(0);
                }
                let period = 2 * (n - 1);
                let m = i.rem_euclid(period);
                Some(if m < n { m } else { period - m } as usize)
            }
        }
    }
}

/// Dense n-D array with explicit per-axis extent. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct NdField<T> {
    dims: Vec<usize>,
    strides: Vec<usize>,
    data: Vec<T>,
}

/// Real-valued field: channel images, smoothed images, filter responses.
pub type ScalarField = NdField<f64>;

/// Binary foreground mask.
pub type Mask = NdField<bool>;

fn strides_for(dims: &[usize]) -> Vec<usize> {
    let mut strides = Vec::with_capacity(dims.len());
    let mut acc = 1usize;
    for &d in dims {
        strides.push(acc);
        acc *= d;
    }
    strides
}

pub(crate) fn check_dims(dims: &[usize]) -> Result<usize, FieldError> {
    if dims.is_empty() {
        return Err(FieldError::NoAxes);
    }
    if let Some(axis) = dims.iter().position(|&d| d == 0) {
        return Err(FieldError::EmptyAxis { axis });
    }
    Ok(dims.iter().product())
}

impl<T: Copy> NdField<T> {
    /// Wrap an existing buffer. `data.len()` must equal the extent product.
    pub fn from_vec(dims: Vec<usize>, data: Vec<T>) -> Result<Self, FieldError> {
        let expected = check_dims(&dims)?;
        if data.len() != expected {
            return Err(FieldError::LengthMismatch {
                expected,
                got: data.len(),
            });
        }
        let strides = strides_for(&dims);
        Ok(Self {
            dims,
            strides,
            data,
        })
    }

    /// Field with every sample set to `value`.
    pub fn filled(dims: Vec<usize>, value: T) -> Result<Self, FieldError> {
        let len = check_dims(&dims)?;
        Self::from_vec(dims, vec![value; len])
    }

    /// Field whose samples are produced from their integer position.
    pub fn from_fn(dims: Vec<usize>, mut f: impl FnMut(&[usize]) -> T) -> Result<Self, FieldError> {
        let len = check_dims(&dims)?;
        let strides = strides_for(&dims);
        let mut pos = vec![0usize; dims.len()];
        let mut data = Vec::with_capacity(len);
        for index in 0..len {
            unravel_into(index, &dims, &mut pos);
            data.push(f(&pos));
        }
        Ok(Self {
            dims,
            strides,
            data,
        })
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Total number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// Linear index of an in-bounds position. Positions are not checked.
    #[inline]
    pub fn index_of(&self, pos: &[usize]) -> usize {
        pos.iter().zip(&self.strides).map(|(p, s)| p * s).sum()
    }

    /// Sample at `pos`, or `None` when out of bounds or of the wrong rank.
    pub fn get(&self, pos: &[usize]) -> Option<T> {
        if pos.len() != self.dims.len() || pos.iter().zip(&self.dims).any(|(p, d)| p >= d) {
            return None;
        }
        Some(self.data[self.index_of(pos)])
    }

    /// Sample at a signed position, synthesising out-of-bounds values with `ext`.
    pub fn get_extended(&self, pos: &[isize], ext: Extension) -> T
    where
        T: Default,
    {
        let mut index = 0usize;
        for ((&p, &d), &s) in pos.iter().zip(&self.dims).zip(&self.strides) {
            match ext.resolve(p, d) {
                Some(q) => index += q * s,
                None => return T::default(),
            }
        }
        self.data[index]
    }

    /// Apply `f` to every sample, keeping the shape.
    pub fn map<U: Copy>(&self, f: impl Fn(T) -> U) -> NdField<U> {
        NdField {
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }
}

/// Decompose a linear index into a position (axis 0 fastest).
#[inline]
pub fn unravel_into(mut index: usize, dims: &[usize], pos: &mut [usize]) {
    for (p, &d) in pos.iter_mut().zip(dims) {
        *p = index % d;
        index /= d;
    }
}

/// Linear indices of the first sample of every line running along `axis`.
pub(crate) fn line_starts(dims: &[usize], axis: usize) -> impl Iterator<Item = usize> + '_ {
    let stride: usize = dims[..axis].iter().product();
    let total: usize = dims.iter().product();
    let len = dims[axis];
    (0..total).filter(move |i| (i / stride) % len == 0)
}

impl ScalarField {
    /// Smallest and largest finite sample, if any.
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Mask of samples strictly above `cut`.
    pub fn threshold_above(&self, cut: f64) -> Mask {
        self.map(|v| v > cut)
    }
}

impl Mask {
    /// Number of foreground samples.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&b| b).count()
    }
}
