//! Strict local extrema over full n-D neighbourhoods.

use ringfinder_core::{
    build_pool, chunks_along_largest_axis, run_chunks, unravel_into, ScalarField,
};

use crate::error::DetectError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtremumKind {
    Minimum,
    Maximum,
}

impl ExtremumKind {
    /// `value` beats `neighbour` strictly.
    #[inline]
    fn beats(self, value: f64, neighbour: f64) -> bool {
        match self {
            ExtremumKind::Minimum => value < neighbour,
            ExtremumKind::Maximum => value > neighbour,
        }
    }
}

/// Offsets of all `3^n - 1` neighbours of a sample.
pub(crate) fn neighbour_offsets(ndim: usize) -> Vec<Vec<isize>> {
    let total = 3usize.pow(ndim as u32);
    let mut out = Vec::with_capacity(total - 1);
    let cube = vec![3usize; ndim];
    let mut digits = vec![0usize; ndim];
    for i in 0..total {
        unravel_into(i, &cube, &mut digits);
        let off: Vec<isize> = digits.iter().map(|&d| d as isize - 1).collect();
        if off.iter().any(|&o| o != 0) {
            out.push(off);
        }
    }
    out
}

/// Positions of strict local extrema of `field` accepted by `accept(pos, value)`.
///
/// A sample qualifies when all of its `3^n - 1` neighbours exist and are
/// strictly worse, so plateaus produce no extremum. Samples on the border of
/// any axis never qualify, nor do NaN samples. The search runs over `threads` chunks of the largest axis; the
/// result is ordered by linear index.
pub fn local_extrema<F>(
    field: &ScalarField,
    kind: ExtremumKind,
    threads: usize,
    accept: F,
) -> Result<Vec<Vec<usize>>, DetectError>
where
    F: Fn(&[usize], f64) -> bool + Sync,
{
    let dims = field.dims();
    let data = field.data();
    let strides = field.strides();
    let offsets = neighbour_offsets(dims.len());

    let pool = build_pool(threads)?;
    let chunks = chunks_along_largest_axis(dims, pool.current_num_threads());
    let results = run_chunks(&pool, &chunks, |chunk| {
        let mut found = Vec::new();
        let mut pos = vec![0usize; dims.len()];
        chunk.for_each_index(dims, |_, global| {
            let value = data[global];
            if value.is_nan() {
                return;
            }
            unravel_into(global, dims, &mut pos);
            if !accept(&pos, value) {
                return;
            }
            let strict = offsets.iter().all(|off| {
                let mut idx = global as isize;
                for ((&p, &o), (&len, &stride)) in
                    pos.iter().zip(off).zip(dims.iter().zip(strides))
                {
                    let q = p as isize + o;
                    if q < 0 || q >= len as isize {
                        return false;
                    }
                    idx += o * stride as isize;
                }
                kind.beats(value, data[idx as usize])
            });
            if strict {
                found.push(global);
            }
        });
        found
    });

    let mut all = Vec::new();
    for r in results {
        all.extend(r.map_err(|chunk| DetectError::WorkerFailed { chunk })?);
    }
    all.sort_unstable();
    Ok(all
        .into_iter()
        .map(|global| {
            let mut pos = vec![0usize; dims.len()];
            unravel_into(global, dims, &mut pos);
            pos
        })
        .collect())
}
