//! HMM beat decoder
//!
//! Places beats on an onset detection function given a per-sample beat period.
//! The hidden state is the number of ODF samples since the last beat: state 0
//! means "beat now", and from state `s` the chain either fires a beat (back to
//! state 0) or advances to `s + 1`. The last state always returns to 0.
//!
//! # Algorithm
//!
//! The beat-firing probability is the hazard of a Gaussian inter-beat-interval
//! model centred on the local period `L` (σ = 25 ms):
//!
//! ```text
//! pdf(k)   = exp(-(k - L)² / 2σ²)
//! p(s → 0) = pdf(s + 1) / Σ_{k ≥ s+1} pdf(k)
//! ```
//!
//! Observations are costs on the max-normalised ODF:
//! `-α·ln(odf + ε)` in the beat state and `-α·ln(1 - odf + ε)` elsewhere
//! (α = 0.5). A forward minimum-cost pass keeps back-pointers only for the
//! beat state; every other state has a single predecessor.
//!
//! # Reference
//!
//! Degara, N., Argones Rúa, E., Pena, A., Torres-Guijarro, S., Davies, M. E. P.,
//! & Plumbley, M. D. (2012). Reliability-Informed Beat Tracking of Musical
//! Signals. *IEEE Transactions on Audio, Speech, and Language Processing*,
//! 20(1), 290-301.

use std::collections::HashMap;

use crate::error::AnalysisError;
use crate::math::{normalize_max, EPSILON};

/// Standard deviation of the inter-beat-interval model (seconds)
const IBI_SIGMA_SECONDS: f32 = 0.025;

/// Observation cost weight
const ALPHA: f32 = 0.5;

/// States beyond the longest period, in IBI standard deviations
const STATE_MARGIN_SIGMAS: f32 = 4.0;

/// Transition costs for one integer period
#[derive(Debug, Clone)]
struct Transitions {
    /// `-ln p(s → 0)`
    fire: Vec<f32>,
    /// `-ln p(s → s+1)`
    advance: Vec<f32>,
}

impl Transitions {
    fn new(period: usize, n_states: usize, sigma: f64) -> Self {
        let two_sigma_sq = 2.0 * sigma * sigma;
        // pdf over intervals 1..=n_states
        let pdf: Vec<f64> = (1..=n_states)
            .map(|k| {
                let d = k as f64 - period as f64;
                (-(d * d) / two_sigma_sq).exp()
            })
            .collect();

        let mut tail = vec![0.0f64; n_states + 1];
        for s in (0..n_states).rev() {
            tail[s] = tail[s + 1] + pdf[s];
        }

        let mut fire = Vec::with_capacity(n_states);
        let mut advance = Vec::with_capacity(n_states);
        for s in 0..n_states {
            let hazard = if s + 1 == n_states || tail[s] <= f64::MIN_POSITIVE {
                1.0
            } else {
                (pdf[s] / tail[s]).clamp(0.0, 1.0)
            };
            fire.push(-((hazard as f32) + EPSILON).ln());
            advance.push(-((1.0 - hazard as f32) + EPSILON).ln());
        }

        Self { fire, advance }
    }
}

/// Beat decoder over a per-sample period trajectory
#[derive(Debug, Clone)]
pub struct HmmBeatDecoder {
    /// ODF sample rate in Hz
    pub odf_rate: f32,
}

impl HmmBeatDecoder {
    /// Create a decoder for an ODF sampled at `odf_rate` Hz
    pub fn new(odf_rate: f32) -> Self {
        Self { odf_rate }
    }

    /// Decode beat positions
    ///
    /// # Arguments
    ///
    /// * `odf` - Non-negative onset detection function
    /// * `periods` - Beat period in ODF samples for every ODF sample
    ///
    /// # Returns
    ///
    /// Strictly increasing ODF sample indices of the decoded beats. An ODF
    /// that is empty or all zero yields no beats.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidInput` if `periods` does not match the
    /// ODF length or contains a zero period.
    pub fn decode(&self, odf: &[f32], periods: &[usize]) -> Result<Vec<usize>, AnalysisError> {
        if periods.len() != odf.len() {
            return Err(AnalysisError::InvalidInput(format!(
                "Period trajectory length ({}) does not match ODF length ({})",
                periods.len(),
                odf.len()
            )));
        }
        if periods.iter().any(|&p| p == 0) {
            return Err(AnalysisError::InvalidInput("Beat period must be > 0".to_string()));
        }

        let peak = odf.iter().copied().fold(0.0f32, f32::max);
        if odf.is_empty() || peak <= EPSILON {
            log::warn!("HMM decoder: silent onset detection function, no beats");
            return Ok(Vec::new());
        }

        let mut observed = odf.to_vec();
        normalize_max(&mut observed);

        let sigma = (IBI_SIGMA_SECONDS * self.odf_rate) as f64;
        let max_period = periods.iter().copied().max().unwrap_or(1);
        let n_states = max_period + (STATE_MARGIN_SIGMAS as f64 * sigma).ceil() as usize + 1;

        // One transition table per distinct integer period
        let mut cache: HashMap<usize, Transitions> = HashMap::new();
        for &p in periods {
            cache
                .entry(p)
                .or_insert_with(|| Transitions::new(p, n_states, sigma.max(EPSILON as f64)));
        }

        log::debug!(
            "HMM decoding: {} samples, {} states, {} distinct periods",
            odf.len(),
            n_states,
            cache.len()
        );

        let beat_cost = |v: f32| -ALPHA * (v + EPSILON).ln();
        let rest_cost = |v: f32| -ALPHA * ((1.0 - v).max(0.0) + EPSILON).ln();

        let n = observed.len();
        let mut cost: Vec<f32> = (0..n_states)
            .map(|s| if s == 0 { beat_cost(observed[0]) } else { rest_cost(observed[0]) })
            .collect();
        let mut next = vec![0.0f32; n_states];
        // Predecessor of the beat state at every sample
        let mut beat_from = vec![0u32; n];

        for t in 1..n {
            let table = cache
                .get(&periods[t])
                .ok_or_else(|| AnalysisError::ProcessingError("Missing transition table".to_string()))?;
            let obs_beat = beat_cost(observed[t]);
            let obs_rest = rest_cost(observed[t]);

            let mut best_state = 0usize;
            let mut best = f32::INFINITY;
            for (s, (&c, &f)) in cost.iter().zip(table.fire.iter()).enumerate() {
                let v = c + f;
                if v < best {
                    best = v;
                    best_state = s;
                }
            }
            next[0] = best + obs_beat;
            beat_from[t] = best_state as u32;

            for s in 1..n_states {
                next[s] = cost[s - 1] + table.advance[s - 1] + obs_rest;
            }
            std::mem::swap(&mut cost, &mut next);
        }

        // Backtrack from the cheapest final state
        let mut state = 0usize;
        let mut best = f32::INFINITY;
        for (s, &c) in cost.iter().enumerate() {
            if c < best {
                best = c;
                state = s;
            }
        }

        let mut beats = Vec::new();
        for t in (0..n).rev() {
            if state == 0 {
                beats.push(t);
                if t > 0 {
                    state = beat_from[t] as usize;
                }
            } else {
                state -= 1;
            }
        }
        beats.reverse();

        log::debug!("HMM decoding done: {} beats", beats.len());
        Ok(beats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f32 = 44100.0 / 512.0;

    fn impulses(len: usize, period: usize, offset: usize) -> Vec<f32> {
        let mut odf = vec![0.05f32; len];
        for i in (offset..len).step_by(period) {
            odf[i] = 1.0;
        }
        odf
    }

    #[test]
    fn test_beats_on_impulses() {
        let odf = impulses(600, 43, 10);
        let decoder = HmmBeatDecoder::new(RATE);
        let beats = decoder.decode(&odf, &vec![43; odf.len()]).unwrap();

        let expected: Vec<usize> = (10..600).step_by(43).collect();
        assert_eq!(beats, expected);
    }

    #[test]
    fn test_strictly_increasing() {
        let odf: Vec<f32> = (0..800).map(|i| ((i * 31) % 17) as f32 / 17.0).collect();
        let decoder = HmmBeatDecoder::new(RATE);
        let beats = decoder.decode(&odf, &vec![40; odf.len()]).unwrap();
        assert!(beats.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_period_steers_spacing() {
        // Impulses every 20 samples, period of 40: every other impulse is skipped
        let odf = impulses(800, 20, 0);
        let decoder = HmmBeatDecoder::new(RATE);
        let beats = decoder.decode(&odf, &vec![40; odf.len()]).unwrap();
        for w in beats.windows(2) {
            let gap = w[1] - w[0];
            assert!((36..=44).contains(&gap), "Gap {} should follow the period", gap);
        }
    }

    #[test]
    fn test_silent_odf() {
        let decoder = HmmBeatDecoder::new(RATE);
        assert!(decoder.decode(&[0.0; 100], &[43; 100]).unwrap().is_empty());
        assert!(decoder.decode(&[], &[]).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_periods() {
        let decoder = HmmBeatDecoder::new(RATE);
        assert!(decoder.decode(&[1.0; 10], &[43; 9]).is_err());
        assert!(decoder.decode(&[1.0; 10], &[0; 10]).is_err());
    }

    #[test]
    fn test_hazard_table() {
        let t = Transitions::new(10, 20, 2.0);
        // Firing early is expensive, firing at the period is cheap
        assert!(t.fire[2] > t.fire[9]);
        // The last state always fires
        assert!(t.fire[19] < 1e-6);
    }
}
