//! Radius-augmented Hough voting over a binary mask.
//!
//! Every foreground pixel votes, for every candidate radius, on the pixels of
//! a rasterized circle around itself. A ring of radius `r` in the mask thus
//! concentrates votes on its center in the `r` bin.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use ringfinder_core::{build_pool, split_range, Mask, NdField, RunContext, ScalarField};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::error::HoughError;

/// Candidate radii `min, min + step, ..., <= max` in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadiusRange {
    pub min: u32,
    pub max: u32,
    pub step: u32,
}

impl Default for RadiusRange {
    fn default() -> Self {
        Self {
            min: 50,
            max: 100,
            step: 2,
        }
    }
}

impl RadiusRange {
    pub fn new(min: u32, max: u32, step: u32) -> Self {
        Self { min, max, step }
    }

    /// Swap reversed bounds and reject a zero step or zero minimum.
    pub fn normalized(self) -> Result<Self, HoughError> {
        let (min, max) = if self.max < self.min {
            (self.max, self.min)
        } else {
            (self.min, self.max)
        };
        if self.step == 0 {
            return Err(HoughError::ZeroStep);
        }
        if min == 0 {
            return Err(HoughError::ZeroRadius);
        }
        Ok(Self {
            min,
            max,
            step: self.step,
        })
    }

    /// Number of radius bins, `floor(|max - min| / step) + 1`.
    ///
    /// Reversed bounds count the same bins as their normalized form. A zero
    /// step yields a single bin; `normalized` rejects it.
    #[inline]
    pub fn bins(&self) -> usize {
        (self.max.abs_diff(self.min) / self.step.max(1)) as usize + 1
    }

    /// Integer radius of bin `i`, counted from the smaller bound.
    #[inline]
    pub fn radius_of(&self, bin: usize) -> u32 {
        self.min.min(self.max) + bin as u32 * self.step
    }

    /// Radius at a fractional bin coordinate.
    #[inline]
    pub fn radius_at(&self, bin: f64) -> f64 {
        self.min.min(self.max) as f64 + bin * self.step as f64
    }

    pub fn radii(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.bins()).map(|b| self.radius_of(b))
    }
}

/// First-octant points `(x, y)` with `0 <= x <= y` of the midpoint circle.
pub fn midpoint_octant(radius: u32) -> Vec<(i32, i32)> {
    let r = radius as i32;
    let mut out = vec![(0, r)];
    if r == 0 {
        return out;
    }
    let (mut x, mut y, mut f) = (0i32, r, 1 - r);
    while x < y {
        if f >= 0 {
            y -= 1;
            f -= 2 * y;
        }
        x += 1;
        f += 2 * x + 1;
        if x > y {
            break;
        }
        out.push((x, y));
    }
    out
}

/// Full 8-fold symmetric midpoint circle of `radius` around the origin.
///
/// Points on the axes and diagonals are emitted once; radius 0 is the
/// single point `(0, 0)`.
pub fn midpoint_circle(radius: u32) -> Vec<(i32, i32)> {
    if radius == 0 {
        return vec![(0, 0)];
    }
    let mut out = Vec::new();
    for (x, y) in midpoint_octant(radius) {
        if x == 0 {
            out.extend_from_slice(&[(0, y), (0, -y), (y, 0), (-y, 0)]);
        } else if x == y {
            out.extend_from_slice(&[(x, x), (-x, x), (x, -x), (-x, -x)]);
        } else {
            out.extend_from_slice(&[
                (x, y),
                (-x, y),
                (x, -y),
                (-x, -y),
                (y, x),
                (-y, x),
                (y, -x),
                (-y, -x),
            ]);
        }
    }
    out
}

/// Vote counts over `(x, y, radius bin)`, axis 0 fastest.
#[derive(Clone, Debug)]
pub struct VoteVolume {
    votes: NdField<u32>,
    radii: RadiusRange,
}

impl VoteVolume {
    /// Pair `votes` with the radius range of its last axis.
    ///
    /// The range is normalized; the volume needs at least one spatial axis
    /// and exactly `radii.bins()` samples along the last one.
    pub fn new(votes: NdField<u32>, radii: RadiusRange) -> Result<Self, HoughError> {
        let radii = radii.normalized()?;
        let dims = votes.dims();
        if dims.len() < 2 || dims[dims.len() - 1] != radii.bins() {
            return Err(HoughError::VolumeShape {
                dims: dims.to_vec(),
                bins: radii.bins(),
            });
        }
        Ok(Self { votes, radii })
    }

    #[inline]
    pub fn votes(&self) -> &NdField<u32> {
        &self.votes
    }

    #[inline]
    pub fn radii(&self) -> &RadiusRange {
        &self.radii
    }

    /// Spatial extent (all axes but the last).
    #[inline]
    pub fn spatial_dims(&self) -> &[usize] {
        let dims = self.votes.dims();
        &dims[..dims.len() - 1]
    }

    /// Votes at spatial `pos` in radius `bin`.
    pub fn get(&self, pos: &[usize], bin: usize) -> Option<u32> {
        let mut full = pos.to_vec();
        full.push(bin);
        self.votes.get(&full)
    }

    pub fn total(&self) -> u64 {
        self.votes.data().iter().map(|&v| v as u64).sum()
    }

    /// Votes as reals, for smoothing and sub-pixel fits.
    pub fn to_scalar(&self) -> ScalarField {
        self.votes.map(|v| v as f64)
    }
}

/// Builds a [`VoteVolume`] from a 2-D foreground mask.
#[derive(Clone, Debug)]
pub struct HoughAccumulator {
    radii: RadiusRange,
    threads: usize,
}

impl HoughAccumulator {
    /// Sequential accumulator over `radii`.
    pub fn new(radii: RadiusRange) -> Self {
        Self { radii, threads: 1 }
    }

    /// Split the foreground into `threads` private accumulators summed after
    /// the join. `1` is the sequential scan, `0` uses every available core.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Accumulate votes for every foreground pixel of `mask`.
    ///
    /// Returns `Ok(None)` when `ctx` was cancelled; any partial votes are
    /// dropped. Progress is reported once per foreground pixel.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all, fields(threads = self.threads)))]
    pub fn accumulate(
        &self,
        mask: &Mask,
        ctx: &RunContext,
    ) -> Result<Option<VoteVolume>, HoughError> {
        if mask.ndim() != 2 {
            return Err(HoughError::MaskRank { ndim: mask.ndim() });
        }
        let radii = self.radii.normalized()?;
        let (w, h) = (mask.dims()[0], mask.dims()[1]);
        let bins = radii.bins();
        let circles: Vec<Vec<(i32, i32)>> = radii.radii().map(midpoint_circle).collect();

        let foreground: Vec<(usize, usize)> = mask
            .data()
            .iter()
            .enumerate()
            .filter(|&(_, &on)| on)
            .map(|(i, _)| (i % w, i / w))
            .collect();
        debug!(
            "accumulating {} foreground pixels over {} radius bins ({}..={} step {})",
            foreground.len(),
            bins,
            radii.min,
            radii.max,
            radii.step
        );

        let len = w * h * bins;
        let total = foreground.len();
        let done = AtomicUsize::new(0);
        let scan = |pixels: &[(usize, usize)]| -> Option<Vec<u32>> {
            let mut votes = vec![0u32; len];
            for &(x0, y0) in pixels {
                if ctx.is_cancelled() {
                    return None;
                }
                for (bin, circle) in circles.iter().enumerate() {
                    cast_votes(&mut votes, w, h, bin, x0, y0, circle);
                }
                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                ctx.report(n, total);
            }
            Some(votes)
        };

        let votes = if self.threads == 1 || total < 2 {
            scan(&foreground)
        } else {
            let pool = build_pool(self.threads)?;
            let parts = split_range(total, pool.current_num_threads());
            let partial: Vec<Option<Vec<u32>>> = pool.install(|| {
                parts
                    .into_par_iter()
                    .map(|range| scan(&foreground[range]))
                    .collect()
            });
            merge(partial, len)
        };

        let Some(votes) = votes else {
            info!(
                "vote accumulation cancelled after {} of {} pixels",
                done.load(Ordering::Relaxed),
                total
            );
            return Ok(None);
        };
        let field = NdField::from_vec(vec![w, h, bins], votes)?;
        VoteVolume::new(field, radii).map(Some)
    }
}

/// One-shot sequential accumulation.
pub fn accumulate(
    mask: &Mask,
    radii: RadiusRange,
    ctx: &RunContext,
) -> Result<Option<VoteVolume>, HoughError> {
    HoughAccumulator::new(radii).accumulate(mask, ctx)
}

#[inline]
fn cast_votes(
    votes: &mut [u32],
    w: usize,
    h: usize,
    bin: usize,
    x0: usize,
    y0: usize,
    circle: &[(i32, i32)],
) {
    let plane = bin * w * h;
    for &(dx, dy) in circle {
        let x = x0 as i64 + dx as i64;
        let y = y0 as i64 + dy as i64;
        if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
            continue;
        }
        votes[plane + y as usize * w + x as usize] += 1;
    }
}

fn merge(partial: Vec<Option<Vec<u32>>>, len: usize) -> Option<Vec<u32>> {
    let mut out = vec![0u32; len];
    for part in partial {
        for (o, v) in out.iter_mut().zip(part?) {
            *o += v;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringfinder_core::CancelToken;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn circle_mask(size: usize, cx: i32, cy: i32, r: u32) -> Mask {
        let pts: HashSet<(i32, i32)> = midpoint_circle(r)
            .into_iter()
            .map(|(x, y)| (cx + x, cy + y))
            .collect();
        Mask::from_fn(vec![size, size], |p| pts.contains(&(p[0] as i32, p[1] as i32))).unwrap()
    }

    #[test]
    fn radius_five_point_set() {
        assert_eq!(midpoint_octant(5), vec![(0, 5), (1, 5), (2, 5), (3, 4)]);
        let pts = midpoint_circle(5);
        assert_eq!(pts.len(), 28);
        let set: HashSet<_> = pts.iter().copied().collect();
        assert_eq!(set.len(), 28, "no duplicates");
        for &(x, y) in &pts {
            assert!(set.contains(&(-x, y)) && set.contains(&(x, -y)) && set.contains(&(y, x)));
            let d2 = x * x + y * y;
            assert!((16..=34).contains(&d2), "({x},{y}) is off the circle");
        }
        for axis in [(5, 0), (-5, 0), (0, 5), (0, -5), (3, 4), (4, 3), (-4, -3)] {
            assert!(set.contains(&axis));
        }
    }

    #[test]
    fn degenerate_radii() {
        assert_eq!(midpoint_circle(0), vec![(0, 0)]);
        let one: HashSet<_> = midpoint_circle(1).into_iter().collect();
        assert_eq!(one, HashSet::from([(0, 1), (0, -1), (1, 0), (-1, 0)]));
    }

    #[test]
    fn radius_range_normalisation() {
        let r = RadiusRange::new(20, 10, 3).normalized().unwrap();
        assert_eq!((r.min, r.max), (10, 20));
        assert_eq!(r.bins(), 4);
        assert_eq!(r.radii().collect::<Vec<_>>(), vec![10, 13, 16, 19]);
        assert!(matches!(RadiusRange::new(1, 5, 0).normalized(), Err(HoughError::ZeroStep)));
        assert!(matches!(RadiusRange::new(0, 5, 1).normalized(), Err(HoughError::ZeroRadius)));
        assert_eq!(RadiusRange::default().bins(), 26);
    }

    #[test]
    fn reversed_range_counts_bins_without_normalising() {
        let r = RadiusRange::new(20, 10, 3);
        assert_eq!(r.bins(), 4);
        assert_eq!(r.radii().collect::<Vec<_>>(), vec![10, 13, 16, 19]);
        assert_eq!(r.radius_at(1.5), 14.5);
        assert_eq!(RadiusRange::new(7, 7, 0).bins(), 1);
    }

    #[test]
    fn volume_shape_must_match_the_radius_range() {
        let radii = RadiusRange::new(5, 7, 1);
        let ok = NdField::filled(vec![10, 10, 3], 0u32).unwrap();
        let vol = VoteVolume::new(ok, RadiusRange::new(7, 5, 1)).unwrap();
        assert_eq!(vol.radii(), &radii);
        assert_eq!(vol.spatial_dims(), &[10, 10]);

        let too_many = NdField::filled(vec![10, 10, 6], 0u32).unwrap();
        assert!(matches!(
            VoteVolume::new(too_many, radii),
            Err(HoughError::VolumeShape { bins: 3, .. })
        ));
        let flat = NdField::filled(vec![3], 0u32).unwrap();
        assert!(matches!(
            VoteVolume::new(flat, radii),
            Err(HoughError::VolumeShape { .. })
        ));
        let zero_step = NdField::filled(vec![10, 10, 3], 0u32).unwrap();
        assert!(matches!(
            VoteVolume::new(zero_step, RadiusRange::new(5, 7, 0)),
            Err(HoughError::ZeroStep)
        ));
    }

    #[test]
    fn rejects_non_planar_mask() {
        let mask = Mask::filled(vec![4, 4, 4], true).unwrap();
        let err = accumulate(&mask, RadiusRange::new(1, 2, 1), &RunContext::new()).unwrap_err();
        assert!(matches!(err, HoughError::MaskRank { ndim: 3 }));
    }

    #[test]
    fn perfect_circle_peaks_at_its_center() {
        let mask = circle_mask(64, 30, 33, 12);
        let vol = accumulate(&mask, RadiusRange::new(8, 16, 1), &RunContext::new())
            .unwrap()
            .unwrap();
        assert_eq!(vol.votes().dims(), &[64, 64, 9]);
        let data = vol.votes().data();
        let (best, &max) = data
            .iter()
            .enumerate()
            .max_by_key(|&(_, &v)| v)
            .unwrap();
        assert_eq!(max as usize, midpoint_circle(12).len());
        assert_eq!(best % 64, 30);
        assert_eq!((best / 64) % 64, 33);
        assert_eq!(vol.radii().radius_of(best / (64 * 64)), 12);
    }

    #[test]
    fn out_of_bounds_votes_are_dropped() {
        let mask = Mask::from_fn(vec![5, 5], |p| p == [0, 0]).unwrap();
        let vol = accumulate(&mask, RadiusRange::new(3, 3, 1), &RunContext::new())
            .unwrap()
            .unwrap();
        let inside = midpoint_circle(3)
            .into_iter()
            .filter(|&(x, y)| x >= 0 && y >= 0)
            .count();
        assert_eq!(vol.total(), inside as u64);
    }

    #[test]
    fn parallel_matches_sequential() {
        let mask = circle_mask(48, 20, 24, 9);
        let radii = RadiusRange::new(5, 13, 2);
        let seq = HoughAccumulator::new(radii)
            .accumulate(&mask, &RunContext::new())
            .unwrap()
            .unwrap();
        let par = HoughAccumulator::new(radii)
            .with_threads(4)
            .accumulate(&mask, &RunContext::new())
            .unwrap()
            .unwrap();
        assert_eq!(seq.votes().data(), par.votes().data());
    }

    #[test]
    fn reports_progress_and_honours_cancellation() {
        let mask = circle_mask(32, 16, 16, 6);
        let fg = mask.count();
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&seen);
        let ctx = RunContext::new().with_progress(move |done, total| {
            assert!(done <= total);
            sink.fetch_max(done, Ordering::Relaxed);
        });
        accumulate(&mask, RadiusRange::new(4, 8, 2), &ctx).unwrap().unwrap();
        assert_eq!(seen.load(Ordering::Relaxed), fg);

        let token = CancelToken::new();
        token.cancel();
        let ctx = RunContext::new().with_cancel(token);
        assert!(accumulate(&mask, RadiusRange::new(4, 8, 2), &ctx).unwrap().is_none());
    }
}
