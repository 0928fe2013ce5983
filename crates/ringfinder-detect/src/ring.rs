//! Detected rings and per-channel ring sets.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

/// Cost-like detection score: `2*pi*radius*thickness / strength`.
///
/// Lower is stronger. A zero or negative strength yields an infinite or
/// negative score, which [`score_accepted`] rejects.
#[inline]
pub fn ring_score(radius: f64, thickness: f64, strength: f64) -> f64 {
    TAU * radius * thickness / strength
}

/// Whether a score is finite, non-negative and within `ceiling`.
#[inline]
pub fn score_accepted(score: f64, ceiling: f64) -> bool {
    score.is_finite() && score >= 0.0 && score <= ceiling
}

/// Minimum strength a ring of `radius` needs to score within `ceiling`.
#[inline]
pub fn min_strength(radius: f64, thickness: f64, ceiling: f64) -> f64 {
    TAU * radius * thickness / ceiling
}

/// Intensity summary over a ring's annulus.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntensitySummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (`n - 1` denominator, 0 for one sample).
    pub std: f64,
    /// Middle order statistic; mean of the two middle values for even counts.
    pub median: f64,
}

/// Statistics attached to a ring by annotation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RingStatistics {
    /// The annulus contained no sample of the channel.
    NoData,
    Measured(IntensitySummary),
}

impl RingStatistics {
    pub fn count(&self) -> usize {
        match self {
            RingStatistics::NoData => 0,
            RingStatistics::Measured(s) => s.count,
        }
    }

    pub fn summary(&self) -> Option<&IntensitySummary> {
        match self {
            RingStatistics::NoData => None,
            RingStatistics::Measured(s) => Some(s),
        }
    }
}

/// A detected ring. Immutable; statistics are attached once by annotation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    center: Vec<f64>,
    radius: f64,
    thickness: f64,
    score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    statistics: Option<RingStatistics>,
}

impl Ring {
    pub fn new(center: Vec<f64>, radius: f64, thickness: f64, score: f64) -> Self {
        Self {
            center,
            radius,
            thickness,
            score,
            statistics: None,
        }
    }

    /// Center in pixel coordinates, one entry per image axis.
    #[inline]
    pub fn center(&self) -> &[f64] {
        &self.center
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    #[inline]
    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    #[inline]
    pub fn score(&self) -> f64 {
        self.score
    }

    #[inline]
    pub fn statistics(&self) -> Option<&RingStatistics> {
        self.statistics.as_ref()
    }

    /// Inner and outer radius of the annulus, `radius -/+ thickness / 2`.
    #[inline]
    pub fn annulus(&self) -> (f64, f64) {
        let half = 0.5 * self.thickness;
        ((self.radius - half).max(0.0), self.radius + half)
    }

    /// Squared distance from the center to `point`.
    pub fn distance_sq(&self, point: &[f64]) -> f64 {
        self.center
            .iter()
            .zip(point)
            .map(|(c, p)| (p - c) * (p - c))
            .sum()
    }

    /// Whether `point` lies in the closed disk of radius `radius`.
    #[inline]
    pub fn disk_contains(&self, point: &[f64]) -> bool {
        self.distance_sq(point) <= self.radius * self.radius
    }

    pub(crate) fn with_statistics(mut self, statistics: RingStatistics) -> Self {
        self.statistics = Some(statistics);
        self
    }
}

/// Rings of one channel, sorted by ascending score (strongest first).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RingSet {
    rings: Vec<Ring>,
}

impl RingSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sort `rings` by ascending score; ties keep their input order.
    pub fn from_rings(mut rings: Vec<Ring>) -> Self {
        rings.sort_by(|a, b| a.score.total_cmp(&b.score));
        Self { rings }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Ring] {
        &self.rings
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Ring> {
        self.rings.iter()
    }

    /// Keep only the `max` strongest rings.
    pub fn truncate(&mut self, max: usize) {
        self.rings.truncate(max);
    }

    pub fn into_vec(self) -> Vec<Ring> {
        self.rings
    }
}

impl IntoIterator for RingSet {
    type Item = Ring;
    type IntoIter = std::vec::IntoIter<Ring>;

    fn into_iter(self) -> Self::IntoIter {
        self.rings.into_iter()
    }
}

impl<'a> IntoIterator for &'a RingSet {
    type Item = &'a Ring;
    type IntoIter = std::slice::Iter<'a, Ring>;

    fn into_iter(self) -> Self::IntoIter {
        self.rings.iter()
    }
}
