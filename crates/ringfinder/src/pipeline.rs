//! Per-channel ring detection pipeline.
//!
//! enhance (tubeness) -> threshold -> vote -> detect -> cap -> annotate

use log::{debug, info};
use serde::{Deserialize, Serialize};

use ringfinder_core::{
    otsu_threshold, EigenError, FieldError, Mask, RunContext, ScalarField, TubenessFilter,
};
use ringfinder_detect::{
    annotate_all, DetectError, DetectParams, DetectorKind, HoughAccumulator, HoughError,
    RadiusRange, RingSet,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced by [`RingPipeline`].
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("threshold factor must be finite and > 0 (got {0})")]
    InvalidFactor(f64),
    #[error("enhancement sigma must be finite and > 0 (got {0})")]
    InvalidSigma(f64),
    #[error("fixed threshold must be finite (got {0})")]
    InvalidThreshold(f64),
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error(transparent)]
    Eigen(#[from] EigenError),
    #[error(transparent)]
    Hough(#[from] HoughError),
    #[error(transparent)]
    Detect(#[from] DetectError),
}

/// Ridge enhancement applied before thresholding.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceParams {
    pub enabled: bool,
    /// Hessian scale in pixels. `None` derives it from the ring thickness
    /// as `thickness / 2 / sqrt(ndim)`.
    pub sigma: Option<f64>,
}

impl Default for EnhanceParams {
    fn default() -> Self {
        Self {
            enabled: true,
            sigma: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdMethod {
    /// Otsu over a 256-bin histogram, scaled by [`ThresholdParams::factor`].
    #[default]
    Otsu,
    /// Use `value` as the cut directly.
    Fixed { value: f64 },
}

/// Foreground selection: samples strictly above the cut.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdParams {
    pub method: ThresholdMethod,
    /// Multiplier on the automatic threshold.
    pub factor: f64,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            method: ThresholdMethod::Otsu,
            factor: 1.0,
        }
    }
}

/// Full pipeline configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    pub enhance: EnhanceParams,
    pub threshold: ThresholdParams,
    pub radii: RadiusRange,
    pub detector: DetectorKind,
    /// Ring thickness in pixels.
    pub circle_thickness: f64,
    /// Score ceiling.
    pub sensitivity: f64,
    /// Keep at most this many of the strongest rings per channel.
    pub max_detections: Option<usize>,
    /// Worker threads for enhancement and detection (`0` = all cores).
    pub threads: usize,
    /// Worker threads for vote accumulation (`1` = sequential scan).
    pub accumulator_threads: usize,
}

impl Default for PipelineParams {
    fn default() -> Self {
        let detect = DetectParams::default();
        Self {
            enhance: EnhanceParams::default(),
            threshold: ThresholdParams::default(),
            radii: RadiusRange::default(),
            detector: DetectorKind::default(),
            circle_thickness: detect.circle_thickness,
            sensitivity: detect.sensitivity,
            max_detections: None,
            threads: 0,
            accumulator_threads: 1,
        }
    }
}

impl PipelineParams {
    pub fn detect_params(&self) -> DetectParams {
        DetectParams::new(self.circle_thickness, self.sensitivity)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        self.detect_params().validate()?;
        self.radii.normalized()?;
        let factor = self.threshold.factor;
        if !factor.is_finite() || factor <= 0.0 {
            return Err(PipelineError::InvalidFactor(factor));
        }
        if let ThresholdMethod::Fixed { value } = self.threshold.method {
            if !value.is_finite() {
                return Err(PipelineError::InvalidThreshold(value));
            }
        }
        if let Some(sigma) = self.enhance.sigma {
            if !sigma.is_finite() || sigma <= 0.0 {
                return Err(PipelineError::InvalidSigma(sigma));
            }
        }
        Ok(())
    }
}

/// Detection outcome for one channel.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChannelRings {
    pub channel: usize,
    /// Cut applied to the (enhanced) channel; NaN when the run stopped first.
    pub threshold: f64,
    /// Number of foreground samples that voted.
    pub foreground: usize,
    pub rings: RingSet,
    /// The run was cancelled; `rings` is empty.
    pub cancelled: bool,
}

impl ChannelRings {
    fn cancelled(channel: usize, threshold: f64, foreground: usize) -> Self {
        Self {
            channel,
            threshold,
            foreground,
            rings: RingSet::empty(),
            cancelled: true,
        }
    }
}

/// Runs the full detection chain on every channel of an image.
#[derive(Clone, Debug, Default)]
pub struct RingPipeline {
    params: PipelineParams,
}

impl RingPipeline {
    pub fn new(params: PipelineParams) -> Result<Self, PipelineError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    /// Process channels in order. Every channel observes the same context,
    /// so a cancellation stops the remaining channels too.
    pub fn run(
        &self,
        channels: &[ScalarField],
        ctx: &RunContext,
    ) -> Result<Vec<ChannelRings>, PipelineError> {
        channels
            .iter()
            .enumerate()
            .map(|(i, ch)| self.run_channel(i, ch, ctx))
            .collect()
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, channel, ctx), fields(dims = ?channel.dims()))
    )]
    pub fn run_channel(
        &self,
        index: usize,
        channel: &ScalarField,
        ctx: &RunContext,
    ) -> Result<ChannelRings, PipelineError> {
        let p = &self.params;
        if ctx.is_cancelled() {
            return Ok(ChannelRings::cancelled(index, f64::NAN, 0));
        }

        let enhanced = self.enhance(channel)?;
        let cut = self.cut(&enhanced);
        let mask: Mask = enhanced.threshold_above(cut);
        let foreground = mask.count();
        info!(
            "channel {}: threshold {:.4}, {} foreground samples",
            index, cut, foreground
        );

        let Some(votes) = HoughAccumulator::new(p.radii)
            .with_threads(p.accumulator_threads)
            .accumulate(&mask, ctx)?
        else {
            return Ok(ChannelRings::cancelled(index, cut, foreground));
        };

        let detector = p.detector.build(p.threads);
        let mut rings = detector.detect(&votes, &p.detect_params(), ctx)?;
        if ctx.is_cancelled() {
            return Ok(ChannelRings::cancelled(index, cut, foreground));
        }
        if let Some(max) = p.max_detections {
            rings.truncate(max);
        }
        let rings = annotate_all(rings, channel)?;
        info!(
            "channel {}: {} rings ({} detector)",
            index,
            rings.len(),
            detector.name()
        );

        Ok(ChannelRings {
            channel: index,
            threshold: cut,
            foreground,
            rings,
            cancelled: false,
        })
    }

    fn enhance(&self, channel: &ScalarField) -> Result<ScalarField, PipelineError> {
        let p = &self.params;
        if !p.enhance.enabled {
            return Ok(channel.clone());
        }
        let filter = match p.enhance.sigma {
            Some(sigma) => TubenessFilter::new(sigma),
            None => TubenessFilter::for_thickness(p.circle_thickness, channel.ndim()),
        };
        debug!("tubeness enhancement at sigma {:.3}", filter.sigma());
        Ok(filter.with_threads(p.threads).apply(channel)?)
    }

    fn cut(&self, field: &ScalarField) -> f64 {
        let t = &self.params.threshold;
        match t.method {
            ThresholdMethod::Fixed { value } => value,
            // No finite sample: nothing can lie above +inf.
            ThresholdMethod::Otsu => otsu_threshold(field.data())
                .map(|c| c * t.factor)
                .unwrap_or(f64::INFINITY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_and_round_trip_through_json() {
        let params = PipelineParams::default();
        params.validate().unwrap();
        let json = serde_json::to_string(&params).unwrap();
        let back: PipelineParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{
            "radii": { "min": 10, "max": 20 },
            "detector": "local_max",
            "threshold": { "method": { "kind": "fixed", "value": 0.5 } },
            "max_detections": 3
        }"#;
        let params: PipelineParams = serde_json::from_str(json).unwrap();
        assert_eq!(params.radii, RadiusRange::new(10, 20, 2));
        assert_eq!(params.detector, DetectorKind::LocalMax);
        assert_eq!(params.threshold.method, ThresholdMethod::Fixed { value: 0.5 });
        assert_eq!(params.threshold.factor, 1.0);
        assert_eq!(params.max_detections, Some(3));
        assert!(params.enhance.enabled);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut p = PipelineParams::default();
        p.threshold.factor = 0.0;
        assert!(matches!(p.validate(), Err(PipelineError::InvalidFactor(_))));

        let mut p = PipelineParams::default();
        p.radii.step = 0;
        assert!(matches!(p.validate(), Err(PipelineError::Hough(HoughError::ZeroStep))));

        let mut p = PipelineParams::default();
        p.circle_thickness = 0.0;
        assert!(matches!(p.validate(), Err(PipelineError::Detect(_))));

        let mut p = PipelineParams::default();
        p.enhance.sigma = Some(-1.0);
        assert!(RingPipeline::new(p).is_err());
    }

    #[test]
    fn blank_channel_yields_no_rings() {
        let pipeline = RingPipeline::new(PipelineParams {
            radii: RadiusRange::new(4, 8, 2),
            ..PipelineParams::default()
        })
        .unwrap();
        let blank = ScalarField::filled(vec![24, 24], 0.0).unwrap();
        let out = pipeline.run(&[blank], &RunContext::new()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].foreground, 0);
        assert!(out[0].rings.is_empty());
        assert!(!out[0].cancelled);
    }
}
