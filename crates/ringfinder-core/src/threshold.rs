//! Automatic intensity thresholds.

/// Histogram resolution used by [`otsu_threshold`].
pub const OTSU_BINS: usize = 256;

/// Otsu cut value for a set of real samples.
///
/// Samples are binned into [`OTSU_BINS`] bins over their finite range and the
/// returned value is the upper edge of the last background bin, so the
/// foreground is every sample strictly above it. Non-finite samples are
/// ignored; `None` is returned when no finite sample exists.
pub fn otsu_threshold(samples: &[f64]) -> Option<f64> {
    let mut min_v = f64::INFINITY;
    let mut max_v = f64::NEG_INFINITY;
    let mut total = 0usize;
    for &v in samples.iter().filter(|v| v.is_finite()) {
        min_v = min_v.min(v);
        max_v = max_v.max(v);
        total += 1;
    }
    if total == 0 {
        return None;
    }
    if min_v == max_v {
        return Some(min_v);
    }

    let width = (max_v - min_v) / OTSU_BINS as f64;
    let mut hist = [0u64; OTSU_BINS];
    for &v in samples.iter().filter(|v| v.is_finite()) {
        let bin = (((v - min_v) / width) as usize).min(OTSU_BINS - 1);
        hist[bin] += 1;
    }
    let nonzero_bins = hist.iter().filter(|&&h| h > 0).count();
    if nonzero_bins <= 2 {
        return Some(0.5 * (min_v + max_v));
    }

    let total = total as f64;
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &h)| i as f64 * h as f64)
        .sum();

    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best_var = -1f64;
    let mut best_t = 0usize;

    for (t, &h) in hist.iter().enumerate() {
        w_b += h as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }

        sum_b += t as f64 * h as f64;
        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;

        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best_var {
            best_var = var_between;
            best_t = t;
        }
    }

    Some(min_v + (best_t + 1) as f64 * width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_two_populations() {
        let mut samples = vec![0.0; 900];
        samples.extend((0..100).map(|i| 50.0 + (i % 7) as f64));
        samples.extend((0..50).map(|i| 3.0 + (i % 3) as f64));
        let cut = otsu_threshold(&samples).unwrap();
        assert!(cut > 5.0 && cut < 50.0, "cut = {cut}");
        assert!(samples.iter().filter(|&&v| v > cut).count() == 100);
    }

    #[test]
    fn degenerate_inputs() {
        assert_eq!(otsu_threshold(&[]), None);
        assert_eq!(otsu_threshold(&[f64::NAN]), None);
        assert_eq!(otsu_threshold(&[2.0, 2.0, 2.0]), Some(2.0));
        assert_eq!(otsu_threshold(&[0.0, 10.0, f64::NAN]), Some(5.0));
    }
}
