use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use ringfinder_core::RunContext;

use crate::error::DetectError;
use crate::hough::VoteVolume;
use crate::local_max::LocalMaxDetector;
use crate::ring::RingSet;
use crate::scale_space::ScaleSpaceDetector;

/// Parameters shared by every ring detector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectParams {
    /// Expected ring thickness in pixels (>= 1).
    pub circle_thickness: f64,
    /// Score ceiling; rings scoring above it are dropped (> 0).
    pub sensitivity: f64,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            circle_thickness: 5.0,
            sensitivity: 150.0,
        }
    }
}

impl DetectParams {
    pub fn new(circle_thickness: f64, sensitivity: f64) -> Self {
        Self {
            circle_thickness,
            sensitivity,
        }
    }

    pub fn validate(&self) -> Result<(), DetectError> {
        if !self.circle_thickness.is_finite() || self.circle_thickness < 1.0 {
            return Err(DetectError::InvalidThickness(self.circle_thickness));
        }
        if !self.sensitivity.is_finite() || self.sensitivity <= 0.0 {
            return Err(DetectError::InvalidSensitivity(self.sensitivity));
        }
        Ok(())
    }
}

/// Extracts rings from a vote volume.
///
/// Implementations return a [`RingSet`], i.e. rings sorted by ascending
/// score, and return an empty set when `ctx` is cancelled.
pub trait RingDetector: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(
        &self,
        votes: &VoteVolume,
        params: &DetectParams,
        ctx: &RunContext,
    ) -> Result<RingSet, DetectError>;
}

/// Detector selection for configuration files and the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    /// Difference-of-Gaussians extremum search over space and radius.
    #[default]
    ScaleSpace,
    /// Gated local maxima with containment suppression.
    LocalMax,
}

impl DetectorKind {
    pub fn build(self, threads: usize) -> Box<dyn RingDetector> {
        match self {
            DetectorKind::ScaleSpace => Box::new(ScaleSpaceDetector::new().with_threads(threads)),
            DetectorKind::LocalMax => Box::new(LocalMaxDetector::new().with_threads(threads)),
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DetectorKind::ScaleSpace => "scale-space",
            DetectorKind::LocalMax => "local-max",
        })
    }
}

impl FromStr for DetectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "scale-space" | "dog" => Ok(DetectorKind::ScaleSpace),
            "local-max" | "nms" => Ok(DetectorKind::LocalMax),
            other => Err(format!(
                "unknown detector '{other}' (expected scale-space or local-max)"
            )),
        }
    }
}
