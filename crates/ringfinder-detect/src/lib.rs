//! Ring detection on binary foreground masks.
//!
//! [`HoughAccumulator`] turns a 2-D mask into a [`VoteVolume`] indexed by
//! `(x, y, radius bin)`. A [`RingDetector`] extracts a score-sorted
//! [`RingSet`] from the votes, and [`annotate_all`] attaches annular
//! intensity statistics measured on the original channel.
//!
//! Two detectors are provided:
//! - [`ScaleSpaceDetector`]: difference-of-Gaussians minima of the negated
//!   votes, with the radius bins as an extra scale axis;
//! - [`LocalMaxDetector`]: gated strict maxima of the same band-passed
//!   votes, containment suppression and quadratic sub-sample refinement.
//!
//! Both report the same score for the same ring.
//!
//! ```
//! use ringfinder_core::{Mask, RunContext};
//! use ringfinder_detect::{DetectParams, HoughAccumulator, LocalMaxDetector, RadiusRange, RingDetector};
//!
//! let mask = Mask::from_fn(vec![40, 40], |p| {
//!     let (dx, dy) = (p[0] as f64 - 20.0, p[1] as f64 - 20.0);
//!     ((dx * dx + dy * dy).sqrt() - 10.0).abs() < 0.5
//! })
//! .unwrap();
//! let ctx = RunContext::new();
//! let votes = HoughAccumulator::new(RadiusRange::new(6, 14, 1))
//!     .accumulate(&mask, &ctx)
//!     .unwrap()
//!     .expect("not cancelled");
//! let rings = LocalMaxDetector::new()
//!     .detect(&votes, &DetectParams::new(1.0, 5.0), &ctx)
//!     .unwrap();
//! assert!((rings.as_slice()[0].radius() - 10.0).abs() < 1.0);
//! ```

mod detector;
mod error;
mod extrema;
mod hough;
mod local_max;
mod ring;
mod scale_space;
mod statistics;
mod subpixel;
mod suppression;

pub use detector::{DetectParams, DetectorKind, RingDetector};
pub use error::{DetectError, HoughError};
pub use extrema::{local_extrema, ExtremumKind};
pub use hough::{
    accumulate, midpoint_circle, midpoint_octant, HoughAccumulator, RadiusRange, VoteVolume,
};
pub use local_max::LocalMaxDetector;
pub use ring::{
    min_strength, ring_score, score_accepted, IntensitySummary, Ring, RingSet, RingStatistics,
};
pub use scale_space::{ScaleSpaceDetector, DOG_SCALE_RATIO};
pub use statistics::{annotate, annotate_all, ring_statistics};
pub use subpixel::{RefinedPeak, SubpixelRefiner};
pub use suppression::{suppress, suppress_contained};
