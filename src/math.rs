//! Small numeric helpers shared by the detectors and decoders

use std::f32::consts::PI;

/// Numerical stability epsilon
pub const EPSILON: f32 = 1e-10;

/// Arithmetic mean (0.0 for an empty slice)
pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

/// Population standard deviation (0.0 for an empty slice)
pub fn std_dev(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|&v| (v - m) * (v - m)).sum::<f32>() / values.len() as f32;
    var.sqrt()
}

/// Median (0.0 for an empty slice)
pub fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) * 0.5
    } else {
        sorted[mid]
    }
}

/// Centered moving average with the window shrunk symmetrically at the edges
///
/// Output `i` is the mean of the inputs within `min(size / 2, i, n - 1 - i)`
/// positions of it, so the first and last values pass through unchanged and
/// an evenly spaced input comes back exact. A strictly increasing input
/// stays strictly increasing.
pub fn centered_moving_average(values: &[f32], size: usize) -> Vec<f32> {
    let half = size / 2;
    let n = values.len();
    (0..n)
        .map(|i| {
            let h = half.min(i).min(n - 1 - i);
            mean(&values[i - h..=i + h])
        })
        .collect()
}

/// Mean of the inputs within `half` positions of each index, truncated at
/// the edges
fn local_mean(values: &[f32], half: usize) -> Vec<f32> {
    let n = values.len();
    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(n);
            mean(&values[start..end])
        })
        .collect()
}

/// Subtract a local mean (window `2 * half_window + 1`, truncated at the
/// edges) and half-wave rectify, in place
pub fn adaptive_threshold(values: &mut [f32], half_window: usize) {
    if values.is_empty() {
        return;
    }
    let local = local_mean(values, half_window);
    for (v, m) in values.iter_mut().zip(local) {
        *v = (*v - m).max(0.0);
    }
}

/// Scale so the maximum is 1.0 (left untouched when the maximum is ~0)
pub fn normalize_max(values: &mut [f32]) {
    let max = values.iter().copied().fold(0.0f32, f32::max);
    if max > EPSILON {
        for v in values.iter_mut() {
            *v /= max;
        }
    }
}

/// Wrap a phase into (-π, π]
pub fn princarg(phase: f32) -> f32 {
    let two_pi = 2.0 * PI;
    let wrapped = (phase + PI).rem_euclid(two_pi) - PI;
    if wrapped <= -PI {
        wrapped + two_pi
    } else {
        wrapped
    }
}

/// Rayleigh weighting curve of `len` points with its maximum at `peak`
///
/// Used as a tempo prior over lag/period indices.
pub fn rayleigh_weights(len: usize, peak: f32) -> Vec<f32> {
    let peak_sq = peak * peak;
    (0..len)
        .map(|i| {
            let x = i as f32;
            (x / peak_sq) * (-(x * x) / (2.0 * peak_sq)).exp()
        })
        .collect()
}

/// Index of the maximum value; the first occurrence wins ties
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Upsample by an integer factor using linear interpolation
///
/// Output length is `len * factor`; the tail past the last input sample
/// holds the last value.
pub fn upsample_linear(values: &[f32], factor: usize) -> Vec<f32> {
    if factor <= 1 || values.is_empty() {
        return values.to_vec();
    }
    let n = values.len();
    let mut out = Vec::with_capacity(n * factor);
    for i in 0..n {
        let a = values[i];
        let b = if i + 1 < n { values[i + 1] } else { a };
        for k in 0..factor {
            let t = k as f32 / factor as f32;
            out.push(a + (b - a) * t);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_std_median() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!((mean(&values) - 2.5).abs() < 1e-6);
        assert!((std_dev(&values) - 1.118034).abs() < 1e-5);
        assert!((median(&values) - 2.5).abs() < 1e-6);
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_centered_moving_average_preserves_monotonicity() {
        let ticks: Vec<f32> = (0..20).map(|i| i as f32 * 0.5 + (i % 3) as f32 * 0.01).collect();
        let smoothed = centered_moving_average(&ticks, 5);
        assert_eq!(smoothed.len(), ticks.len());
        for w in smoothed.windows(2) {
            assert!(w[1] > w[0], "Smoothed ticks must stay increasing");
        }
        assert_eq!(smoothed[0], ticks[0]);
        assert_eq!(smoothed[19], ticks[19]);
    }

    #[test]
    fn test_centered_moving_average_keeps_uniform_grid() {
        let grid: Vec<f32> = (0..10).map(|i| i as f32 * 0.5).collect();
        let smoothed = centered_moving_average(&grid, 5);
        for (i, (s, g)) in smoothed.iter().zip(grid.iter()).enumerate() {
            assert!((s - g).abs() < 1e-5, "Tick {} moved: {} vs {}", i, s, g);
        }
        assert!(centered_moving_average(&[], 5).is_empty());
        assert_eq!(centered_moving_average(&[2.0], 5), vec![2.0]);
    }

    #[test]
    fn test_adaptive_threshold_rectifies() {
        let mut values = vec![1.0, 1.0, 5.0, 1.0, 1.0];
        adaptive_threshold(&mut values, 2);
        assert!(values.iter().all(|&v| v >= 0.0));
        assert!(values[2] > 0.0);
        assert_eq!(values[0], 0.0);
    }

    #[test]
    fn test_princarg_range() {
        for i in -20..20 {
            let p = princarg(i as f32 * 0.9);
            assert!(p > -PI - 1e-5 && p <= PI + 1e-5);
        }
        assert!((princarg(2.0 * PI + 0.1) - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_rayleigh_peak() {
        let w = rayleigh_weights(128, 43.0);
        assert_eq!(argmax(&w), Some(43));
    }

    #[test]
    fn test_argmax_first_occurrence() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0, 2.0]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_upsample_linear() {
        let up = upsample_linear(&[0.0, 1.0], 2);
        assert_eq!(up, vec![0.0, 0.5, 1.0, 1.0]);
    }
}
