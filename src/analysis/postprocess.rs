//! Tick post-processing for chart generation
//!
//! A stateless final pass over an extracted beat grid:
//!
//! 1. **Leading anomaly**: an irregular interval among the first ticks
//!    (deviation from the mean interval above one standard deviation) marks
//!    an unreliable intro; every tick up to a few beats past it is rebuilt
//!    backwards at the mean interval
//! 2. **Leading trim**: ticks earlier than half a mean interval are dropped
//! 3. **Range fitting**: a BPM outside the requested range is multiplied or
//!    divided by the smallest integer that brings it in, interpolating or
//!    decimating the ticks to match
//! 4. **Beat-aware smoothing**: runs that drift half a beat off the dominant
//!    grid and come back within 30 ticks are put back on the grid, except
//!    where the original ticks were locally stable and close to it
//!
//! # Example
//!
//! ```
//! use tempo_grid::analysis::postprocess::TickPostProcessor;
//!
//! let ticks: Vec<f32> = (0..40).map(|i| 1.0 + i as f32 * 0.75).collect();
//! let (bpm, fitted) = TickPostProcessor::default().process(80.0, &ticks, 140.0, 200.0)?;
//! assert_eq!(bpm, 160.0);
//! assert_eq!(fitted.len(), 80);
//! # Ok::<(), tempo_grid::AnalysisError>(())
//! ```

use std::collections::BTreeMap;

use super::agreement::validate_ticks;
use crate::error::AnalysisError;
use crate::math::{mean, median, std_dev};

/// Post-processor parameters
#[derive(Debug, Clone, PartialEq)]
pub struct PostProcessConfig {
    /// Leading intervals inspected for an anomaly
    pub anomaly_search: usize,

    /// Ticks past the anomalous interval that are also rebuilt
    pub anomaly_margin: usize,

    /// Minimum anomaly deviation as a fraction of the mean interval
    pub anomaly_floor: f32,

    /// Tempo histogram peaks extracted
    pub max_peaks: usize,

    /// Relative half-width of the window cleared around each peak
    pub peak_tolerance: f32,

    /// Drift magnitude range in beats `[min, max)`
    pub drift_range: (f32, f32),

    /// Longest drift run corrected (ticks)
    pub max_drift_run: usize,

    /// Corrected ticks closer than this fraction of a period to the
    /// original may snap back
    pub snap_tolerance: f32,

    /// Interval window for the moving standard deviation
    pub stability_window: usize,

    /// Moving standard deviation below this fraction of a period counts as stable
    pub stability_threshold: f32,

    /// Largest multiplier or divisor range fitting may apply
    pub max_range_factor: usize,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            anomaly_search: 16,
            anomaly_margin: 4,
            anomaly_floor: 0.01,
            max_peaks: 3,
            peak_tolerance: 0.05,
            drift_range: (0.5, 1.0),
            max_drift_run: 30,
            snap_tolerance: 0.1,
            stability_window: 5,
            stability_threshold: 0.02,
            max_range_factor: 16,
        }
    }
}

/// Tick post-processor
#[derive(Debug, Clone, Default)]
pub struct TickPostProcessor {
    config: PostProcessConfig,
}

impl TickPostProcessor {
    /// Create a post-processor
    pub fn new(config: PostProcessConfig) -> Self {
        Self { config }
    }

    /// Post-process a beat grid
    ///
    /// # Arguments
    ///
    /// * `bpm` - Tempo of the grid
    /// * `ticks` - Beat times in seconds, strictly increasing
    /// * `min_bpm`, `max_bpm` - Requested tempo range
    ///
    /// # Returns
    ///
    /// `(bpm, ticks)` after fitting; ticks strictly increasing. Grids with
    /// fewer than two ticks are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidInput` if the ticks are not strictly
    /// increasing and non-negative, the range or BPM is invalid, or fitting
    /// would need a factor above `max_range_factor`.
    pub fn process(
        &self,
        bpm: f32,
        ticks: &[f32],
        min_bpm: f32,
        max_bpm: f32,
    ) -> Result<(f32, Vec<f32>), AnalysisError> {
        validate_ticks(ticks).map_err(AnalysisError::InvalidInput)?;
        if !(min_bpm > 0.0 && max_bpm >= min_bpm) {
            return Err(AnalysisError::InvalidInput(format!(
                "Invalid tempo range: [{}, {}] BPM",
                min_bpm, max_bpm
            )));
        }
        if !bpm.is_finite() || bpm < 0.0 {
            return Err(AnalysisError::InvalidInput(format!("Invalid BPM: {}", bpm)));
        }
        if ticks.len() < 2 || bpm == 0.0 {
            log::warn!("Post-processing skipped: {} ticks at {} BPM", ticks.len(), bpm);
            return Ok((bpm, ticks.to_vec()));
        }

        log::debug!(
            "Post-processing {} ticks at {:.2} BPM into [{}, {}]",
            ticks.len(),
            bpm,
            min_bpm,
            max_bpm
        );

        let mut ticks = ticks.to_vec();
        self.repair_leading_anomaly(&mut ticks);
        drop_leading_ticks(&mut ticks);

        let (bpm, ticks) = fit_range(bpm, &ticks, min_bpm, max_bpm, self.config.max_range_factor)?;
        let ticks = self.beat_aware_smoothing(&ticks);
        let ticks = enforce_increasing(ticks);

        log::debug!("Post-processing done: {:.2} BPM, {} ticks", bpm, ticks.len());
        Ok((bpm, ticks))
    }

    /// Rebuild the intro backwards from a few ticks past the first
    /// anomalous interval
    fn repair_leading_anomaly(&self, ticks: &mut [f32]) {
        let intervals = intervals(ticks);
        if intervals.len() < 2 {
            return;
        }
        let mean_interval = mean(&intervals);
        let threshold = std_dev(&intervals).max(self.config.anomaly_floor * mean_interval);

        let search = self.config.anomaly_search.min(intervals.len());
        let Some(index) = intervals[..search]
            .iter()
            .position(|&iv| (iv - mean_interval).abs() > threshold)
        else {
            return;
        };

        let anchor = (index + self.config.anomaly_margin).min(ticks.len() - 1);
        log::debug!(
            "Leading anomaly at interval {}; rebuilding {} ticks at {:.3}s",
            index,
            anchor,
            mean_interval
        );
        for j in (0..anchor).rev() {
            ticks[j] = ticks[j + 1] - mean_interval;
        }
    }

    /// Dominant tempo peaks of the instantaneous-BPM histogram, strongest first
    fn tempo_peaks(&self, intervals: &[f32]) -> Vec<f32> {
        let mut histogram: BTreeMap<i64, usize> = BTreeMap::new();
        for &iv in intervals.iter().filter(|&&iv| iv > 0.0) {
            *histogram.entry((60.0 / iv).round() as i64).or_insert(0) += 1;
        }

        let mut peaks = Vec::new();
        while peaks.len() < self.config.max_peaks {
            let mut best: Option<(i64, usize)> = None;
            for (&bin, &count) in &histogram {
                if count > 0 && best.map_or(true, |(_, c)| count > c) {
                    best = Some((bin, count));
                }
            }
            let Some((peak, _)) = best else {
                break;
            };
            let peak_bpm = peak as f32;
            let radius = peak_bpm * self.config.peak_tolerance;
            for (&bin, count) in histogram.iter_mut() {
                if (bin as f32 - peak_bpm).abs() <= radius {
                    *count = 0;
                }
            }
            peaks.push(peak_bpm);
        }
        peaks
    }

    /// Put half-beat drift runs back on the dominant grid
    fn beat_aware_smoothing(&self, ticks: &[f32]) -> Vec<f32> {
        let intervals = intervals(ticks);
        let peaks = self.tempo_peaks(&intervals);
        let Some(&dominant) = peaks.first() else {
            return ticks.to_vec();
        };
        log::trace!("Tempo histogram peaks: {:?}", peaks);

        let tolerance = dominant * self.config.peak_tolerance;
        let matching: Vec<f32> = intervals
            .iter()
            .copied()
            .filter(|&iv| iv > 0.0 && (60.0 / iv - dominant).abs() <= tolerance)
            .collect();
        let period = if matching.is_empty() {
            60.0 / dominant
        } else {
            median(&matching)
        };
        if !(period > 0.0) {
            return ticks.to_vec();
        }

        let (drift_min, drift_max) = self.config.drift_range;
        let in_drift = |offset: f32| (drift_min..drift_max).contains(&offset.abs());

        let mut corrected = ticks.to_vec();
        let mut touched = vec![false; ticks.len()];
        let n = ticks.len();
        let mut s = 1;
        while s < n {
            let anchor = corrected[s - 1];
            let offset = |k: usize| (ticks[k] - anchor) / period - (k - s + 1) as f32;

            if in_drift(offset(s)) {
                let limit = (s + self.config.max_drift_run).min(n);
                let mut end = None;
                for k in (s + 1)..limit {
                    let o = offset(k);
                    if o.abs() < drift_min {
                        end = Some(k);
                        break;
                    }
                    if !in_drift(o) {
                        break;
                    }
                }
                if let Some(r) = end {
                    log::debug!("Drift run at ticks {}..{} put back on the grid", s, r);
                    for k in s..r {
                        corrected[k] = anchor + (k - s + 1) as f32 * period;
                        touched[k] = true;
                    }
                    s = r;
                    continue;
                }
            }
            s += 1;
        }

        // Stable original regions close to the grid keep their detected ticks
        let stability = moving_interval_std(ticks, self.config.stability_window);
        for k in 0..n {
            if !touched[k] {
                continue;
            }
            let close = (ticks[k] - corrected[k]).abs() < self.config.snap_tolerance * period;
            let stable = stability[k] < self.config.stability_threshold * period;
            let ordered = (k == 0 || corrected[k - 1] < ticks[k]) && (k + 1 == n || ticks[k] < corrected[k + 1]);
            if close && stable && ordered {
                corrected[k] = ticks[k];
            }
        }

        corrected
    }
}

fn intervals(ticks: &[f32]) -> Vec<f32> {
    ticks.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Drop leading ticks earlier than half the mean interval
fn drop_leading_ticks(ticks: &mut Vec<f32>) {
    let intervals = intervals(ticks);
    if intervals.is_empty() {
        return;
    }
    let half = mean(&intervals) / 2.0;
    let first = ticks.partition_point(|&t| t < half);
    if first > 0 {
        log::debug!("Dropping {} leading tick(s) before {:.3}s", first, half);
        ticks.drain(..first);
    }
}

/// Smallest integer factor ≥ 2 covering `ratio`, capped at `max_factor`
fn range_factor(ratio: f32, max_factor: usize) -> Result<usize, AnalysisError> {
    let factor = ratio.ceil().max(2.0);
    if !(factor <= max_factor as f32) {
        return Err(AnalysisError::InvalidInput(format!(
            "Tempo is {:.1}x outside the requested range (at most {}x supported)",
            ratio, max_factor
        )));
    }
    Ok(factor as usize)
}

/// Multiply or divide the tempo by the smallest integer bringing it into
/// `[min_bpm, max_bpm]`
fn fit_range(
    bpm: f32,
    ticks: &[f32],
    min_bpm: f32,
    max_bpm: f32,
    max_factor: usize,
) -> Result<(f32, Vec<f32>), AnalysisError> {
    if ticks.len() < 2 {
        return Ok((bpm, ticks.to_vec()));
    }
    if bpm < min_bpm {
        let mut m = range_factor(min_bpm / bpm, max_factor)?;
        // ceil() can overshoot by one on rounding
        if m > 2 && bpm * (m - 1) as f32 >= min_bpm {
            m -= 1;
        }
        let mut out = Vec::with_capacity(ticks.len() * m);
        for w in ticks.windows(2) {
            let step = (w[1] - w[0]) / m as f32;
            for k in 0..m {
                out.push(w[0] + k as f32 * step);
            }
        }
        // Trailing subdivisions extrapolate the last interval
        let last = ticks[ticks.len() - 1];
        let step = (last - ticks[ticks.len() - 2]) / m as f32;
        for k in 0..m {
            out.push(last + k as f32 * step);
        }
        log::debug!("Range fit: {:.2} BPM × {}", bpm, m);
        Ok((bpm * m as f32, out))
    } else if bpm > max_bpm {
        let mut d = range_factor(bpm / max_bpm, max_factor)?;
        if d > 2 && bpm / (d - 1) as f32 <= max_bpm {
            d -= 1;
        }
        log::debug!("Range fit: {:.2} BPM / {}", bpm, d);
        Ok((bpm / d as f32, ticks.iter().copied().step_by(d).collect()))
    } else {
        Ok((bpm, ticks.to_vec()))
    }
}

/// Standard deviation of the intervals in a window centred on each tick
fn moving_interval_std(ticks: &[f32], window: usize) -> Vec<f32> {
    let intervals = intervals(ticks);
    let half = window / 2;
    (0..ticks.len())
        .map(|k| {
            if intervals.is_empty() {
                return 0.0;
            }
            let centre = k.min(intervals.len() - 1);
            let start = centre.saturating_sub(half);
            let end = (centre + half + 1).min(intervals.len());
            std_dev(&intervals[start..end])
        })
        .collect()
}

/// Drop any tick that does not exceed its predecessor
fn enforce_increasing(ticks: Vec<f32>) -> Vec<f32> {
    let mut out: Vec<f32> = Vec::with_capacity(ticks.len());
    for t in ticks {
        if t >= 0.0 && out.last().map_or(true, |&last| t > last) {
            out.push(t);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(start: f32, interval: f32, count: usize) -> Vec<f32> {
        (0..count).map(|i| start + i as f32 * interval).collect()
    }

    #[test]
    fn test_slow_tempo_doubled() {
        let ticks = grid(1.0, 0.75, 40);
        let (bpm, out) = TickPostProcessor::default().process(80.0, &ticks, 140.0, 200.0).unwrap();
        assert!((bpm - 160.0).abs() < 1e-3);
        assert_eq!(out.len(), 2 * ticks.len());
        assert!((out[1] - out[0] - 0.375).abs() < 1e-4);
    }

    #[test]
    fn test_fast_tempo_halved() {
        let interval = 60.0 / 170.0;
        let ticks = grid(1.0, interval, 41);
        let (bpm, out) = TickPostProcessor::default().process(170.0, &ticks, 40.0, 100.0).unwrap();
        assert!((bpm - 85.0).abs() < 1e-3);
        assert_eq!(out.len(), 21);
        assert!((out[1] - out[0] - 2.0 * interval).abs() < 1e-4);
    }

    #[test]
    fn test_triple_multiplier() {
        let ticks = grid(1.0, 1.0, 10);
        let (bpm, out) = TickPostProcessor::default().process(60.0, &ticks, 150.0, 200.0).unwrap();
        assert!((bpm - 180.0).abs() < 1e-3);
        assert_eq!(out.len(), 30);
    }

    #[test]
    fn test_range_factor_computed_directly() {
        assert_eq!(range_factor(1.75, 16).unwrap(), 2);
        assert_eq!(range_factor(2.5, 16).unwrap(), 3);
        assert_eq!(range_factor(16.0, 16).unwrap(), 16);
        assert!(range_factor(16.5, 16).is_err());
        assert!(range_factor(f32::INFINITY, 16).is_err());

        // 70 BPM into [140, 200] is exactly 2x
        let ticks = grid(1.0, 60.0 / 70.0, 10);
        let (bpm, out) = TickPostProcessor::default().process(70.0, &ticks, 140.0, 200.0).unwrap();
        assert!((bpm - 140.0).abs() < 1e-3);
        assert_eq!(out.len(), 20);
    }

    #[test]
    fn test_extreme_range_ratio_rejected() {
        let ticks = grid(1.0, 0.5, 20);
        let processor = TickPostProcessor::default();
        let err = processor.process(1e-4, &ticks, 100.0, 200.0).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)), "Unexpected error: {}", err);
        assert!(processor.process(1e6, &ticks, 100.0, 200.0).is_err());
    }

    #[test]
    fn test_in_range_untouched() {
        let ticks = grid(1.0, 0.5, 30);
        let (bpm, out) = TickPostProcessor::default().process(120.0, &ticks, 100.0, 200.0).unwrap();
        assert_eq!(bpm, 120.0);
        assert_eq!(out, ticks);
    }

    #[test]
    fn test_leading_anomaly_rebuilt() {
        let mut ticks = vec![1.0, 1.3, 2.1];
        let mut t = 2.6;
        while ticks.len() < 40 {
            ticks.push(t);
            t += 0.5;
        }
        let (_, out) = TickPostProcessor::default().process(120.0, &ticks, 100.0, 200.0).unwrap();
        let first_interval = out[1] - out[0];
        assert!((first_interval - 0.5).abs() < 0.05, "First interval {}", first_interval);
        assert!(out.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_leading_ticks_dropped() {
        let ticks = grid(0.1, 0.5, 30);
        let (_, out) = TickPostProcessor::default().process(120.0, &ticks, 100.0, 200.0).unwrap();
        assert_eq!(out.len(), 29);
        assert!(out[0] >= 0.25);
    }

    #[test]
    fn test_half_beat_drift_corrected() {
        let mut ticks = grid(1.0, 0.5, 50);
        for t in ticks.iter_mut().take(31).skip(25) {
            *t += 0.3;
        }
        let original = grid(1.0, 0.5, 50);
        let (_, out) = TickPostProcessor::default().process(120.0, &ticks, 100.0, 200.0).unwrap();
        assert_eq!(out.len(), 50);
        for (k, (a, b)) in out.iter().zip(original.iter()).enumerate() {
            assert!((a - b).abs() < 1e-3, "Tick {}: {} vs {}", k, a, b);
        }
    }

    #[test]
    fn test_output_strictly_increasing() {
        let mut ticks = Vec::new();
        let mut t = 0.8;
        for i in 0..120 {
            t += 0.45 + ((i * 7919) % 13) as f32 / 100.0;
            ticks.push(t);
        }
        let (_, out) = TickPostProcessor::default().process(115.0, &ticks, 90.0, 180.0).unwrap();
        assert!(out.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_invalid_input() {
        let processor = TickPostProcessor::default();
        assert!(processor.process(120.0, &[1.0, 0.5], 100.0, 200.0).is_err());
        assert!(processor.process(120.0, &[0.5, 1.0], 200.0, 100.0).is_err());
        assert!(processor.process(f32::NAN, &[0.5, 1.0], 100.0, 200.0).is_err());
    }

    #[test]
    fn test_tempo_peaks() {
        let processor = TickPostProcessor::default();
        let mut intervals = vec![0.5; 20];
        intervals.extend(vec![0.75; 8]);
        intervals.extend(vec![0.49; 3]);
        let peaks = processor.tempo_peaks(&intervals);
        assert_eq!(peaks[0], 120.0);
        assert_eq!(peaks[1], 80.0);
        assert_eq!(peaks.len(), 2);
    }
}
