//! Iterative quadratic sub-sample refinement of extrema.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use ringfinder_core::{Extension, ScalarField};

/// A refined extremum.
#[derive(Clone, Debug, PartialEq)]
pub struct RefinedPeak {
    /// Integer sample the final fit was anchored on.
    pub anchor: Vec<usize>,
    /// `anchor + offset`, in sample coordinates.
    pub position: Vec<f64>,
    /// Interpolated field value at `position`.
    pub value: f64,
    /// Number of anchor relocations performed.
    pub moves: usize,
    /// `false` when the relocation budget ran out and the offset was clamped.
    pub converged: bool,
}

/// Second-order Taylor refinement around an integer extremum.
///
/// Fits `f(p + d) = f + g.d + d'Hd/2` from central differences and solves
/// `H d = -g`. When a component of `d` exceeds half a sample the anchor moves
/// one sample in that direction and the fit is repeated, at most
/// `max_moves` times. Fits whose Hessian does not describe an extremum are
/// still accepted.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubpixelRefiner {
    pub max_moves: usize,
}

impl Default for SubpixelRefiner {
    fn default() -> Self {
        Self { max_moves: 10 }
    }
}

impl SubpixelRefiner {
    pub fn new(max_moves: usize) -> Self {
        Self { max_moves }
    }

    pub fn refine(&self, field: &ScalarField, start: &[usize]) -> RefinedPeak {
        let dims = field.dims();
        let mut anchor = start.to_vec();
        let mut moves = 0usize;
        loop {
            let (g, offset) = fit(field, &anchor);
            let mut moved = false;
            if moves < self.max_moves {
                for (axis, &d) in offset.iter().enumerate() {
                    if d.abs() <= 0.5 {
                        continue;
                    }
                    if d > 0.0 && anchor[axis] + 1 < dims[axis] {
                        anchor[axis] += 1;
                        moved = true;
                    } else if d < 0.0 && anchor[axis] > 0 {
                        anchor[axis] -= 1;
                        moved = true;
                    }
                }
            }
            if moved {
                moves += 1;
                continue;
            }
            let converged = offset.iter().all(|d| d.abs() <= 0.5);
            let offset: Vec<f64> = offset.iter().map(|d| d.clamp(-0.5, 0.5)).collect();
            let f0 = sample(field, &anchor, &[]);
            let value = f0 + 0.5 * g.iter().zip(&offset).map(|(g, d)| g * d).sum::<f64>();
            let position = anchor
                .iter()
                .zip(&offset)
                .map(|(&a, &d)| a as f64 + d)
                .collect();
            return RefinedPeak {
                anchor,
                position,
                value,
                moves,
                converged,
            };
        }
    }
}

/// Field value at `pos` shifted by `(axis, step)` pairs, mirrored at borders.
fn sample(field: &ScalarField, pos: &[usize], shifts: &[(usize, isize)]) -> f64 {
    let mut p: Vec<isize> = pos.iter().map(|&v| v as isize).collect();
    for &(axis, step) in shifts {
        p[axis] += step;
    }
    field.get_extended(&p, Extension::Mirror)
}

/// Gradient and Newton offset at `pos`. A singular or non-finite system
/// yields a zero offset.
fn fit(field: &ScalarField, pos: &[usize]) -> (Vec<f64>, Vec<f64>) {
    let n = pos.len();
    let f0 = sample(field, pos, &[]);
    let mut g = DVector::<f64>::zeros(n);
    let mut h = DMatrix::<f64>::zeros(n, n);
    for a in 0..n {
        let fp = sample(field, pos, &[(a, 1)]);
        let fm = sample(field, pos, &[(a, -1)]);
        g[a] = 0.5 * (fp - fm);
        h[(a, a)] = fp - 2.0 * f0 + fm;
        for b in (a + 1)..n {
            let v = 0.25
                * (sample(field, pos, &[(a, 1), (b, 1)]) - sample(field, pos, &[(a, 1), (b, -1)])
                    - sample(field, pos, &[(a, -1), (b, 1)])
                    + sample(field, pos, &[(a, -1), (b, -1)]));
            h[(a, b)] = v;
            h[(b, a)] = v;
        }
    }
    let offset = h
        .lu()
        .solve(&(-&g))
        .filter(|d| d.iter().all(|v| v.is_finite()))
        .map(|d| d.iter().copied().collect())
        .unwrap_or_else(|| vec![0.0; n]);
    (g.iter().copied().collect(), offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn paraboloid(dims: Vec<usize>, peak: [f64; 2]) -> ScalarField {
        ScalarField::from_fn(dims, |p| {
            let dx = p[0] as f64 - peak[0];
            let dy = p[1] as f64 - peak[1];
            10.0 - dx * dx - 0.5 * dy * dy - 0.2 * dx * dy
        })
        .unwrap()
    }

    #[test]
    fn exact_on_quadratic_surface() {
        let f = paraboloid(vec![15, 15], [6.3, 7.8]);
        let peak = SubpixelRefiner::default().refine(&f, &[6, 8]);
        assert!(peak.converged);
        assert_eq!(peak.moves, 0);
        assert_abs_diff_eq!(peak.position[0], 6.3, epsilon = 1e-9);
        assert_abs_diff_eq!(peak.position[1], 7.8, epsilon = 1e-9);
        assert_abs_diff_eq!(peak.value, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn relocates_from_a_distant_start() {
        let f = paraboloid(vec![20, 20], [11.2, 9.6]);
        let peak = SubpixelRefiner::default().refine(&f, &[8, 12]);
        assert!(peak.moves > 0);
        assert_eq!(peak.anchor, vec![11, 10]);
        assert_abs_diff_eq!(peak.position[0], 11.2, epsilon = 1e-9);
        assert_abs_diff_eq!(peak.position[1], 9.6, epsilon = 1e-9);
    }

    #[test]
    fn exhausted_budget_clamps_offset() {
        let f = ScalarField::from_fn(vec![40], |p| p[0] as f64).unwrap();
        let peak = SubpixelRefiner::new(2).refine(&f, &[10]);
        assert_eq!(peak.moves, 0);
        assert!(peak.converged);
        assert_eq!(peak.position, vec![10.0]);

        let f = ScalarField::from_fn(vec![40], |p| -((p[0] as f64) - 30.0).powi(2)).unwrap();
        let peak = SubpixelRefiner::new(2).refine(&f, &[10]);
        assert_eq!(peak.moves, 2);
        assert!(!peak.converged);
        assert!(peak.position[0] <= 30.0);
        assert!((peak.position[0] - peak.anchor[0] as f64).abs() <= 0.5);
    }
}
