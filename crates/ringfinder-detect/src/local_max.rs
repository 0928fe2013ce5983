//! Local-maximum ring detector with containment suppression.

use log::{debug, info};

use ringfinder_core::{Extension, RunContext};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::detector::{DetectParams, RingDetector};
use crate::error::DetectError;
use crate::extrema::{local_extrema, ExtremumKind};
use crate::hough::VoteVolume;
use crate::ring::{min_strength, ring_score, score_accepted, Ring, RingSet};
use crate::scale_space::{dog_response, DOG_SCALE_RATIO};
use crate::subpixel::SubpixelRefiner;
use crate::suppression::suppress;

/// Finds maxima of the band-passed votes above a per-radius gate, suppresses
/// nested candidates and refines the survivors to sub-sample precision.
///
/// The band-pass is the same difference of Gaussians the scale-space
/// detector uses, so both report the same score for the same ring.
#[derive(Clone, Debug)]
pub struct LocalMaxDetector {
    ratio: f64,
    refiner: SubpixelRefiner,
    extension: Extension,
    threads: usize,
}

impl Default for LocalMaxDetector {
    fn default() -> Self {
        Self {
            ratio: DOG_SCALE_RATIO,
            refiner: SubpixelRefiner::default(),
            extension: Extension::Mirror,
            threads: 0,
        }
    }
}

impl LocalMaxDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_refiner(mut self, refiner: SubpixelRefiner) -> Self {
        self.refiner = refiner;
        self
    }
}

impl RingDetector for LocalMaxDetector {
    fn name(&self) -> &'static str {
        "local-max"
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
        let ceiling = params.sensitivity;
        let radii = *votes.radii();
        let spatial = votes.spatial_dims().len();
        let k1 = self.ratio - 1.0;
        let field = dog_response(votes, thickness, self.ratio, self.extension)?;

        // A bin can only yield a ring within the ceiling if its response
        // reaches this.
        let gates: Vec<f64> = radii
            .radii()
            .map(|r| k1 * min_strength(r as f64, thickness, ceiling))
            .collect();
        let maxima = local_extrema(&field, ExtremumKind::Maximum, self.threads, |pos, v| {
            v >= gates[pos[spatial]]
        })?;
        if ctx.is_cancelled() {
            info!("local-max detection cancelled after extremum search");
            return Ok(RingSet::empty());
        }

        let tentative: Vec<Ring> = maxima
            .iter()
            .map(|pos| {
                let radius = radii.radius_of(pos[spatial]) as f64;
                let strength = field.get(pos).unwrap_or(0.0) / k1;
                let center = pos[..spatial].iter().map(|&p| p as f64).collect();
                Ring::new(center, radius, thickness, ring_score(radius, thickness, strength))
            })
            .collect();
        let candidates = tentative.len();
        let kept = suppress(RingSet::from_rings(tentative));
        debug!("local-max: {} maxima, {} after suppression", candidates, kept.len());
        if ctx.is_cancelled() {
            info!("local-max detection cancelled after suppression");
            return Ok(RingSet::empty());
        }

        let max_bin = (radii.bins() - 1) as f64;
        let refined: Vec<Ring> = kept
            .iter()
            .filter_map(|ring| {
                let mut start: Vec<usize> =
                    ring.center().iter().map(|&c| c.round() as usize).collect();
                start.push(((ring.radius() - radii.min as f64) / radii.step as f64).round() as usize);
                let peak = self.refiner.refine(&field, &start);
                let radius = radii.radius_at(peak.position[spatial].clamp(0.0, max_bin));
                let score = ring_score(radius, thickness, peak.value / k1);
                score_accepted(score, ceiling).then(|| {
                    Ring::new(peak.position[..spatial].to_vec(), radius, thickness, score)
                })
            })
            .collect();
        debug!("local-max: {} rings after refinement", refined.len());
        Ok(RingSet::from_rings(refined))
    }
}
