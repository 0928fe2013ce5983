//! High-level facade for the `ringfinder-*` workspace.
//!
//! This crate provides:
//! - re-exports of the numeric core (`ringfinder_core`) and the detectors
//!   (`ringfinder_detect`)
//! - [`RingPipeline`], which runs enhancement, thresholding, voting,
//!   detection and annotation on every channel of an image
//! - (feature `image`) conversion of `image::DynamicImage` into channels
//!
//! ## Quickstart
//!
//! ```no_run
//! use ringfinder::{channels_from_image, PipelineParams, RingPipeline, RunContext};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = image::open("cells.png")?;
//! let channels = channels_from_image(&img)?;
//! let pipeline = RingPipeline::new(PipelineParams::default())?;
//! for ch in pipeline.run(&channels, &RunContext::new())? {
//!     println!("channel {}: {} rings", ch.channel, ch.rings.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `ringfinder::core`: fields, smoothing, Hessian tensors, eigenvalues,
//!   tubeness, Otsu, worker pools, cancellation.
//! - `ringfinder::detect`: Hough voting, ring detectors, suppression,
//!   annular statistics.
//! - `ringfinder::pipeline`: serde-configurable end-to-end runs.

pub use ringfinder_core as core;
pub use ringfinder_detect as detect;

pub mod pipeline;

#[cfg(feature = "image")]
mod image;

#[cfg(feature = "image")]
pub use crate::image::{channels_from_image, field_from_gray};

pub use pipeline::{
    ChannelRings, EnhanceParams, PipelineError, PipelineParams, RingPipeline, ThresholdMethod,
    ThresholdParams,
};
pub use ringfinder_core::{init_with_level, CancelToken, RunContext, ScalarField};
pub use ringfinder_detect::{DetectorKind, RadiusRange, Ring, RingSet, RingStatistics};

#[cfg(feature = "tracing")]
pub use ringfinder_core::init_tracing;
