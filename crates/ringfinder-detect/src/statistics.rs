//! Intensity statistics over a ring's annulus.

use rayon::prelude::*;

use ringfinder_core::{unravel_into, ScalarField};

use crate::error::DetectError;
use crate::ring::{IntensitySummary, Ring, RingSet, RingStatistics};

/// Summarise `channel` over the annulus of `ring`.
///
/// Only the bounding box of the outer radius, clipped to the channel, is
/// visited. A sample belongs to the annulus when its squared distance to the
/// center lies in `[inner^2, outer^2]` (both ends inclusive). Other rings are
/// ignored, so overlapping annuli share samples.
pub fn ring_statistics(ring: &Ring, channel: &ScalarField) -> Result<RingStatistics, DetectError> {
    let dims = channel.dims();
    let center = ring.center();
    if center.len() != dims.len() {
        return Err(DetectError::DimensionMismatch {
            ring: center.len(),
            channel: dims.len(),
        });
    }
    let (inner, outer) = ring.annulus();
    let (lo_sq, hi_sq) = (inner * inner, outer * outer);

    let mut lo = Vec::with_capacity(dims.len());
    let mut extent = Vec::with_capacity(dims.len());
    for (&c, &len) in center.iter().zip(dims) {
        let first = (c - outer).floor().max(0.0);
        let last = (c + outer).ceil().min(len as f64 - 1.0);
        if !first.is_finite() || !last.is_finite() || last < first {
            return Ok(RingStatistics::NoData);
        }
        lo.push(first as usize);
        extent.push(last as usize - first as usize + 1);
    }

    let total: usize = extent.iter().product();
    let mut local = vec![0usize; dims.len()];
    let mut pos = vec![0usize; dims.len()];
    let mut values = Vec::new();
    for i in 0..total {
        unravel_into(i, &extent, &mut local);
        let mut d2 = 0.0;
        for k in 0..dims.len() {
            pos[k] = lo[k] + local[k];
            let d = pos[k] as f64 - center[k];
            d2 += d * d;
        }
        if d2 >= lo_sq && d2 <= hi_sq {
            if let Some(v) = channel.get(&pos) {
                values.push(v);
            }
        }
    }
    Ok(summarize(values))
}

fn summarize(mut values: Vec<f64>) -> RingStatistics {
    let count = values.len();
    if count == 0 {
        return RingStatistics::NoData;
    }
    let mean = values.iter().sum::<f64>() / count as f64;
    let std = if count > 1 {
        let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
        (ss / (count - 1) as f64).sqrt()
    } else {
        0.0
    };
    values.sort_by(f64::total_cmp);
    let mid = count / 2;
    let median = if count % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    };
    RingStatistics::Measured(IntensitySummary {
        count,
        mean,
        std,
        median,
    })
}

/// Attach statistics of `channel` to `ring`.
///
/// Statistics are written once: a ring that already carries them is returned
/// unchanged.
pub fn annotate(ring: Ring, channel: &ScalarField) -> Result<Ring, DetectError> {
    if ring.statistics().is_some() {
        return Ok(ring);
    }
    let stats = ring_statistics(&ring, channel)?;
    Ok(ring.with_statistics(stats))
}

/// Annotate every ring of `set`, keeping its order.
pub fn annotate_all(set: RingSet, channel: &ScalarField) -> Result<RingSet, DetectError> {
    let rings = set
        .into_vec()
        .into_par_iter()
        .map(|ring| annotate(ring, channel))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RingSet::from_rings(rings))
}
