//! Containment non-maximum suppression.

use log::debug;

use crate::ring::{Ring, RingSet};

/// Indices of the rings that survive containment suppression.
///
/// `rings` must be ordered strongest first. Walking in that order, a ring is
/// kept unless its center lies inside the closed disk of a ring kept before
/// it. Neither the thickness nor the candidate's own radius widen the test.
pub fn suppress_contained(rings: &[Ring]) -> Vec<usize> {
    let mut kept: Vec<usize> = Vec::new();
    for (i, ring) in rings.iter().enumerate() {
        if !kept.iter().any(|&k| rings[k].disk_contains(ring.center())) {
            kept.push(i);
        }
    }
    kept
}

/// Apply [`suppress_contained`] to a sorted ring set.
pub fn suppress(set: RingSet) -> RingSet {
    let before = set.len();
    let rings = set.into_vec();
    let keep = suppress_contained(&rings);
    let mut mask = vec![false; rings.len()];
    for k in keep {
        mask[k] = true;
    }
    let kept: Vec<Ring> = rings
        .into_iter()
        .zip(mask)
        .filter_map(|(r, keep)| keep.then_some(r))
        .collect();
    debug!("suppression kept {} of {} candidates", kept.len(), before);
    RingSet::from_rings(kept)
}
