//! Difference-of-Gaussians ring detector.
//!
//! The radius axis is treated as one more scale-space axis. Votes are negated
//! so that strong ring evidence shows up as DoG minima; each minimum is
//! refined to sub-sample precision and its response converted into a vote
//! strength.

use log::{debug, info};

use ringfinder_core::{gaussian_smooth, Extension, RunContext, ScalarField};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::detector::{DetectParams, RingDetector};
use crate::error::DetectError;
use crate::extrema::{local_extrema, ExtremumKind};
use crate::hough::VoteVolume;
use crate::ring::{min_strength, ring_score, score_accepted, Ring, RingSet};
use crate::subpixel::SubpixelRefiner;
use crate::suppression::suppress;

/// Ratio between the outer and inner DoG scale.
pub const DOG_SCALE_RATIO: f64 = 1.6;

#[derive(Clone, Debug)]
pub struct ScaleSpaceDetector {
    ratio: f64,
    refiner: SubpixelRefiner,
    suppress: bool,
    extension: Extension,
    threads: usize,
}

impl Default for ScaleSpaceDetector {
    fn default() -> Self {
        Self {
            ratio: DOG_SCALE_RATIO,
            refiner: SubpixelRefiner::default(),
            suppress: true,
            extension: Extension::Mirror,
            threads: 0,
        }
    }
}

impl ScaleSpaceDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Disable containment suppression of the refined minima.
    pub fn without_suppression(mut self) -> Self {
        self.suppress = false;
        self
    }

    pub fn with_refiner(mut self, refiner: SubpixelRefiner) -> Self {
        self.refiner = refiner;
        self
    }

    /// Inner smoothing scales: `thickness / 2 / sqrt(n + 1)` pixels on the
    /// spatial axes, the same length in bins on the radius axis.
    pub fn inner_sigmas(&self, votes: &VoteVolume, thickness: f64) -> Vec<f64> {
        inner_sigmas(votes, thickness)
    }

    /// `smooth(-votes, s) - smooth(-votes, ratio * s)`.
    pub fn dog(&self, votes: &VoteVolume, thickness: f64) -> Result<ScalarField, DetectError> {
        Ok(dog_response(votes, thickness, self.ratio, self.extension)?.map(|v| -v))
    }
}

pub(crate) fn inner_sigmas(votes: &VoteVolume, thickness: f64) -> Vec<f64> {
    let spatial = votes.spatial_dims().len();
    let sigma = thickness / 2.0 / ((spatial + 1) as f64).sqrt();
    let mut sigmas = vec![sigma; spatial];
    sigmas.push(sigma / votes.radii().step as f64);
    sigmas
}

/// Band-pass response of the votes, `smooth(votes, s) - smooth(votes, ratio * s)`.
///
/// Positive at concentrated vote peaks, near zero along broad vote ridges.
pub(crate) fn dog_response(
    votes: &VoteVolume,
    thickness: f64,
    ratio: f64,
    extension: Extension,
) -> Result<ScalarField, DetectError> {
    let field = votes.to_scalar();
    let inner = inner_sigmas(votes, thickness);
    let outer: Vec<f64> = inner.iter().map(|s| s * ratio).collect();
    let fine = gaussian_smooth(&field, &inner, extension)?;
    let coarse = gaussian_smooth(&field, &outer, extension)?;
    let data = fine
        .data()
        .iter()
        .zip(coarse.data())
        .map(|(a, b)| a - b)
        .collect();
    Ok(ScalarField::from_vec(fine.dims().to_vec(), data)?)
}

impl RingDetector for ScaleSpaceDetector {
    fn name(&self) -> &'static str {
        "scale-space"
    }

    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
    fn detect(
        &self,
        votes: &VoteVolume,
        params: &DetectParams,
        ctx: &RunContext,
    ) -> Result<RingSet, DetectError> {
        params.validate()?;
        if ctx.is_cancelled() {
            return Ok(RingSet::empty());
        }
        let thickness = params.circle_thickness;
        let radii = *votes.radii();
        let k1 = self.ratio - 1.0;
        let cut = -k1 * min_strength(radii.min as f64, thickness, params.sensitivity);

        let dog = self.dog(votes, thickness)?;
        let minima = local_extrema(&dog, ExtremumKind::Minimum, self.threads, |_, v| v <= cut)?;
        if ctx.is_cancelled() {
            info!("scale-space detection cancelled after extremum search");
            return Ok(RingSet::empty());
        }
        debug!("scale-space: {} DoG minima below {:.3}", minima.len(), cut);

        let spatial = votes.spatial_dims().len();
        let max_bin = (radii.bins() - 1) as f64;
        let rings: Vec<Ring> = minima
            .iter()
            .filter_map(|pos| {
                let peak = self.refiner.refine(&dog, pos);
                let radius = radii.radius_at(peak.position[spatial].clamp(0.0, max_bin));
                let strength = -peak.value / k1;
                let score = ring_score(radius, thickness, strength);
                score_accepted(score, params.sensitivity).then(|| {
                    Ring::new(peak.position[..spatial].to_vec(), radius, thickness, score)
                })
            })
            .collect();
        debug!("scale-space: {} rings within score ceiling", rings.len());

        let set = RingSet::from_rings(rings);
        Ok(if self.suppress { suppress(set) } else { set })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hough::{accumulate, RadiusRange};
    use ringfinder_core::{CancelToken, Mask};

    fn annulus_mask(size: usize, c: [f64; 2], r: f64, t: f64) -> Mask {
        Mask::from_fn(vec![size, size], |p| {
            let d = ((p[0] as f64 - c[0]).powi(2) + (p[1] as f64 - c[1]).powi(2)).sqrt();
            (d - r).abs() <= t / 2.0
        })
        .unwrap()
    }

    #[test]
    fn sigmas_follow_thickness_and_step() {
        let mask = annulus_mask(20, [10.0, 10.0], 5.0, 1.0);
        let vol = accumulate(&mask, RadiusRange::new(4, 8, 2), &RunContext::new())
            .unwrap()
            .unwrap();
        let s = ScaleSpaceDetector::new().inner_sigmas(&vol, 6.0);
        let expected = 3.0 / 3f64.sqrt();
        assert_eq!(s.len(), 3);
        assert!((s[0] - expected).abs() < 1e-12 && (s[1] - expected).abs() < 1e-12);
        assert!((s[2] - expected / 2.0).abs() < 1e-12);
    }

    #[test]
    fn finds_a_thick_annulus() {
        let mask = annulus_mask(96, [47.0, 49.0], 24.0, 5.0);
        let vol = accumulate(&mask, RadiusRange::new(16, 34, 2), &RunContext::new())
            .unwrap()
            .unwrap();
        let params = DetectParams::new(5.0, 150.0);
        let rings = ScaleSpaceDetector::new()
            .detect(&vol, &params, &RunContext::new())
            .unwrap();
        assert!(!rings.is_empty());
        let best = &rings.as_slice()[0];
        assert!((best.center()[0] - 47.0).abs() <= 1.0, "{best:?}");
        assert!((best.center()[1] - 49.0).abs() <= 1.0, "{best:?}");
        assert!((best.radius() - 24.0).abs() <= 2.0, "{best:?}");
        assert!(rings.iter().skip(1).all(|r| !best.disk_contains(r.center())));
        let scores: Vec<f64> = rings.iter().map(Ring::score).collect();
        assert!(scores.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn cancelled_context_yields_empty_set() {
        let mask = annulus_mask(40, [20.0, 20.0], 10.0, 3.0);
        let vol = accumulate(&mask, RadiusRange::new(6, 14, 2), &RunContext::new())
            .unwrap()
            .unwrap();
        let token = CancelToken::new();
        token.cancel();
        let ctx = RunContext::new().with_cancel(token);
        let rings = ScaleSpaceDetector::new()
            .detect(&vol, &DetectParams::new(3.0, 150.0), &ctx)
            .unwrap();
        assert!(rings.is_empty());
    }

    #[test]
    fn empty_votes_give_no_rings() {
        let mask = Mask::filled(vec![30, 30], false).unwrap();
        let vol = accumulate(&mask, RadiusRange::new(5, 9, 1), &RunContext::new())
            .unwrap()
            .unwrap();
        let rings = ScaleSpaceDetector::new()
            .detect(&vol, &DetectParams::default(), &RunContext::new())
            .unwrap();
        assert!(rings.is_empty());
    }
}
