//! Beat period tracking
//!
//! Estimates a slowly varying beat period along the onset detection function.
//! The ODF is cut into overlapping super-frames (512 samples with a hop of
//! 128 at the 44100/512 Hz reference rate, about 5.94 s and 1.49 s). Every
//! length is scaled by the ODF rate relative to the reference rate, so the
//! super-frame duration does not depend on how the ODF was produced. Each
//! super-frame yields a period distribution:
//!
//! 1. Adaptive threshold on the ODF frame (local mean removed, rectified)
//! 2. Unbiased autocorrelation
//! 3. Rayleigh-weighted comb filterbank, adaptively thresholded again
//! 4. Zeroed outside the configured tempo window, ε added, normalised
//!
//! A Viterbi pass over these distributions with Gaussian transitions along
//! the period axis (σ = 8 reference samples) picks the most likely period
//! per super-frame.
//!
//! Ties in the arg-max steps resolve to the smallest period index, so the
//! decode is deterministic. An optional seeded dither (at most 1e-6 of each
//! frame's peak) can be enabled to break exact ties pseudo-randomly while
//! staying reproducible.
//!
//! # Reference
//!
//! Davies, M. E. P., & Plumbley, M. D. (2007). Context-Dependent Beat Tracking
//! of Musical Audio. *IEEE Transactions on Audio, Speech, and Language
//! Processing*, 15(3), 1009-1020.
//!
//! # Example
//!
//! ```
//! use tempo_grid::features::period::beat_period::{BeatPeriodTracker, PeriodTrackerConfig};
//!
//! // Impulses every 43 samples at 44100/512 Hz: ~120 BPM
//! let mut odf = vec![0.0f32; 2000];
//! for i in (0..2000).step_by(43) {
//!     odf[i] = 1.0;
//! }
//! let tracker = BeatPeriodTracker::new(PeriodTrackerConfig::default());
//! let lags = tracker.track(&odf)?;
//! assert!(lags.iter().all(|&lag| lag == 43));
//! # Ok::<(), tempo_grid::AnalysisError>(())
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::autocorrelation::unbiased_autocorrelation;
use super::comb_filter::{comb_filterbank, tempo_preference, to_distribution, REFERENCE_ODF_RATE};
use crate::error::AnalysisError;
use crate::math::{adaptive_threshold, argmax};

/// Super-frame length at the reference rate (ODF samples, ~6 s)
const REFERENCE_FRAME: usize = 512;

/// Super-frame hop at the reference rate (ODF samples, ~1.5 s)
const REFERENCE_HOP: usize = 128;

/// Number of candidate lags at the reference rate
const REFERENCE_PERIODS: usize = 128;

/// Transition spread along the period axis at the reference rate
const TRANSITION_SIGMA: f32 = 8.0;

/// Half-width of the adaptive threshold at the reference rate
const THRESHOLD_HALF_WINDOW: usize = 7;

/// Dither amplitude relative to each frame's peak
const DITHER_SCALE: f32 = 1e-6;

/// Beat period tracker configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodTrackerConfig {
    /// ODF sample rate in Hz (after any resampling)
    pub odf_rate: f32,

    /// Slowest admissible tempo (BPM)
    pub min_tempo: f32,

    /// Fastest admissible tempo (BPM)
    pub max_tempo: f32,

    /// Seed for tie-breaking dither; `None` disables dither
    pub dither_seed: Option<u64>,
}

impl Default for PeriodTrackerConfig {
    fn default() -> Self {
        Self {
            odf_rate: REFERENCE_ODF_RATE,
            min_tempo: 40.0,
            max_tempo: 208.0,
            dither_seed: None,
        }
    }
}

/// Viterbi beat period tracker
#[derive(Debug, Clone)]
pub struct BeatPeriodTracker {
    config: PeriodTrackerConfig,
}

impl BeatPeriodTracker {
    /// Create a tracker
    pub fn new(config: PeriodTrackerConfig) -> Self {
        Self { config }
    }

    /// Integer ratio of the ODF rate to the reference rate (at least 1)
    pub fn scale(&self) -> usize {
        let ratio = (self.config.odf_rate / REFERENCE_ODF_RATE).round();
        if ratio.is_finite() && ratio > 1.0 {
            ratio as usize
        } else {
            1
        }
    }

    /// Super-frame length in ODF samples
    pub fn frame_len(&self) -> usize {
        REFERENCE_FRAME * self.scale()
    }

    /// Super-frame hop in ODF samples
    pub fn hop_len(&self) -> usize {
        REFERENCE_HOP * self.scale()
    }

    /// Admissible lag range `(first, last)`, inclusive
    fn state_range(&self, n_periods: usize) -> Result<(usize, usize), AnalysisError> {
        let c = &self.config;
        if !(c.min_tempo > 0.0 && c.max_tempo > c.min_tempo) {
            return Err(AnalysisError::InvalidInput(format!(
                "Invalid tempo window: [{}, {}] BPM",
                c.min_tempo, c.max_tempo
            )));
        }
        let lag_min = ((60.0 * c.odf_rate / c.max_tempo).ceil() as usize).max(1);
        let lag_max = ((60.0 * c.odf_rate / c.min_tempo).floor() as usize).min(n_periods - 1);
        if lag_min > lag_max {
            return Err(AnalysisError::InvalidInput(format!(
                "Tempo window [{}, {}] BPM admits no period at {:.2} Hz",
                c.min_tempo, c.max_tempo, c.odf_rate
            )));
        }
        Ok((lag_min, lag_max))
    }

    /// Decode the beat period of every super-frame
    ///
    /// # Arguments
    ///
    /// * `odf` - Non-negative onset detection function at `odf_rate`
    ///
    /// # Returns
    ///
    /// Beat period (lag in ODF samples) per super-frame. An ODF shorter than
    /// one super-frame is zero-padded to one.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidInput` if the ODF is empty or the tempo
    /// window admits no period.
    pub fn track(&self, odf: &[f32]) -> Result<Vec<usize>, AnalysisError> {
        if odf.is_empty() {
            return Err(AnalysisError::InvalidInput("Empty onset detection function".to_string()));
        }

        let factor = self.scale();
        let frame_len = self.frame_len();
        let hop = self.hop_len();
        let n_periods = REFERENCE_PERIODS * factor;
        let (first, last) = self.state_range(n_periods)?;
        let weights = tempo_preference(n_periods, self.config.odf_rate);
        let half_window = THRESHOLD_HALF_WINDOW * factor;

        let n_frames = if odf.len() <= frame_len {
            1
        } else {
            (odf.len() - frame_len + hop - 1) / hop + 1
        };

        log::debug!(
            "Beat period tracking: {} ODF samples, {} super-frames, lags {}..={}",
            odf.len(),
            n_frames,
            first,
            last
        );

        let mut rng = self.config.dither_seed.map(StdRng::seed_from_u64);

        let observations: Vec<Vec<f32>> = (0..n_frames)
            .map(|k| {
                let start = k * hop;
                let mut frame = vec![0.0f32; frame_len];
                let end = (start + frame_len).min(odf.len());
                frame[..end - start].copy_from_slice(&odf[start..end]);
                adaptive_threshold(&mut frame, half_window);

                let acf = unbiased_autocorrelation(&frame);
                let mut rcf = comb_filterbank(&acf, &weights);
                adaptive_threshold(&mut rcf, half_window);
                for (i, v) in rcf.iter_mut().enumerate() {
                    if i < first || i > last {
                        *v = 0.0;
                    }
                }
                to_distribution(&mut rcf);

                // Only the admissible states are decoded
                let mut states = rcf[first..=last].to_vec();
                if let Some(rng) = rng.as_mut() {
                    let peak = states.iter().copied().fold(0.0f32, f32::max);
                    for v in states.iter_mut() {
                        *v += rng.gen::<f32>() * DITHER_SCALE * peak;
                    }
                }
                states
            })
            .collect();

        let path = viterbi(&observations, TRANSITION_SIGMA * factor as f32);
        let lags: Vec<usize> = path.into_iter().map(|state| state + first).collect();

        log::debug!("Beat periods decoded: {:?}", lags);
        Ok(lags)
    }

    /// Spread per-super-frame lags over `n_samples` ODF samples
    ///
    /// Each sample takes the lag of the super-frame whose centre is nearest.
    pub fn lags_per_sample(&self, lags: &[usize], n_samples: usize) -> Vec<usize> {
        if lags.is_empty() {
            return vec![0; n_samples];
        }
        let half = self.frame_len() as f32 / 2.0;
        let hop = self.hop_len() as f32;
        (0..n_samples)
            .map(|t| {
                let k = ((t as f32 - half) / hop).round().max(0.0) as usize;
                lags[k.min(lags.len() - 1)]
            })
            .collect()
    }
}

/// Viterbi decode over per-frame state distributions
///
/// Transitions are Gaussian in the state distance. The smallest index wins
/// every tie.
fn viterbi(observations: &[Vec<f32>], sigma: f32) -> Vec<usize> {
    let n_frames = observations.len();
    let n_states = observations.first().map_or(0, Vec::len);
    if n_frames == 0 || n_states == 0 {
        return Vec::new();
    }

    let two_sigma_sq = 2.0 * sigma * sigma;
    let transition: Vec<f32> = (0..n_states)
        .map(|d| (-((d * d) as f32) / two_sigma_sq).exp())
        .collect();

    let mut delta = observations[0].clone();
    normalize_sum(&mut delta);
    let mut psi = vec![vec![0usize; n_states]; n_frames];
    let mut next = vec![0.0f32; n_states];

    for t in 1..n_frames {
        for j in 0..n_states {
            let mut best_i = 0;
            let mut best = f32::MIN;
            for (i, &d) in delta.iter().enumerate() {
                let v = d * transition[i.abs_diff(j)];
                if v > best {
                    best = v;
                    best_i = i;
                }
            }
            psi[t][j] = best_i;
            next[j] = best * observations[t][j];
        }
        normalize_sum(&mut next);
        std::mem::swap(&mut delta, &mut next);
    }

    let mut path = vec![0usize; n_frames];
    path[n_frames - 1] = argmax(&delta).unwrap_or(0);
    for t in (0..n_frames - 1).rev() {
        path[t] = psi[t + 1][path[t + 1]];
    }
    path
}

fn normalize_sum(values: &mut [f32]) {
    let sum: f32 = values.iter().sum();
    if sum > 0.0 {
        values.iter_mut().for_each(|v| *v /= sum);
    }
}
