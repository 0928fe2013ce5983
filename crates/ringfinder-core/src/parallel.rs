//! Fixed-size worker pools and disjoint chunking of n-D volumes.
//!
//! Chunk tasks compute into private buffers; results are only observed after
//! every task of a stage has joined.

use std::ops::Range;
use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

use crate::field::unravel_into;

/// Resolve a requested worker count; `0` means available hardware parallelism.
pub fn effective_threads(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Build a pool with exactly `effective_threads(requested)` workers.
pub fn build_pool(requested: usize) -> Result<ThreadPool, ThreadPoolBuildError> {
    ThreadPoolBuilder::new()
        .num_threads(effective_threads(requested))
        .thread_name(|i| format!("ringfinder-worker-{i}"))
        .build()
}

/// Split `0..len` into `max(parts, 1)` contiguous ranges.
///
/// Every range but the last has `len / parts` elements; the last absorbs the
/// remainder. When `parts > len` the leading ranges are empty.
pub fn split_range(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.max(1);
    let base = len / parts;
    (0..parts)
        .map(|i| {
            let start = i * base;
            let end = if i + 1 == parts { len } else { start + base };
            start..end
        })
        .collect()
}

/// Index of the longest axis; ties resolve to the lowest axis.
pub fn largest_axis(dims: &[usize]) -> usize {
    dims.iter()
        .enumerate()
        .fold((0, 0), |best, (axis, &d)| if d > best.1 { (axis, d) } else { best })
        .0
}

/// Sub-volume of a field restricted along one axis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub axis: usize,
    pub range: Range<usize>,
}

impl Chunk {
    /// Visit every sample of the chunk as `(local, global)` linear indices.
    ///
    /// Local indices enumerate the sub-volume in axis-0-fastest order.
    pub fn for_each_index(&self, dims: &[usize], mut f: impl FnMut(usize, usize)) {
        if self.range.is_empty() {
            return;
        }
        let mut sub = dims.to_vec();
        sub[self.axis] = self.range.len();
        let total: usize = sub.iter().product();
        let mut pos = vec![0usize; dims.len()];
        for local in 0..total {
            unravel_into(local, &sub, &mut pos);
            pos[self.axis] += self.range.start;
            let mut global = 0usize;
            let mut stride = 1usize;
            for (p, d) in pos.iter().zip(dims) {
                global += p * stride;
                stride *= d;
            }
            f(local, global);
        }
    }
}

/// Partition `dims` along its largest axis into `parts` chunks.
pub fn chunks_along_largest_axis(dims: &[usize], parts: usize) -> Vec<Chunk> {
    let axis = largest_axis(dims);
    split_range(dims[axis], parts)
        .into_iter()
        .enumerate()
        .map(|(index, range)| Chunk { index, axis, range })
        .collect()
}

/// Run `task` for every chunk on `pool`, joining before returning.
///
/// A panicking task is caught and reported as `Err(chunk_index)`; sibling
/// chunks still complete and keep their own results.
pub fn run_chunks<R, F>(pool: &ThreadPool, chunks: &[Chunk], task: F) -> Vec<Result<R, usize>>
where
    R: Send,
    F: Fn(&Chunk) -> R + Sync,
{
    pool.install(|| {
        chunks
            .par_iter()
            .map(|chunk| catch_unwind(AssertUnwindSafe(|| task(chunk))).map_err(|_| chunk.index))
            .collect()
    })
}
