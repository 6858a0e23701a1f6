//! Comb filterbank over an autocorrelation function
//!
//! Scores every candidate beat period by summing autocorrelation energy at
//! the period and its first multiples, each comb element normalised by its
//! width, under a Rayleigh tempo-preference weight.
//!
//! # Algorithm
//!
//! For every lag `τ` (in ODF samples):
//!
//! ```text
//! rcf[τ] = w[τ] · Σ_{a=1..4} Σ_{b=1-a..a-1} acf[a·τ + b] / (2a - 1)
//! ```
//!
//! # Reference
//!
//! Davies, M. E. P., & Plumbley, M. D. (2007). Context-Dependent Beat Tracking
//! of Musical Audio. *IEEE Transactions on Audio, Speech, and Language
//! Processing*, 15(3), 1009-1020.

use crate::math::{rayleigh_weights, EPSILON};

/// Number of comb elements (period multiples)
pub const COMB_ELEMENTS: usize = 4;

/// Reference ODF rate the tempo prior is expressed at (44100 / 512 Hz)
pub const REFERENCE_ODF_RATE: f32 = 44100.0 / 512.0;

/// Tempo at which the Rayleigh prior peaks
const PREFERRED_BPM: f32 = 120.0;

/// Rayleigh tempo-preference weights over lags `0..len` for an ODF at
/// `odf_rate` Hz, peaking at 120 BPM
pub fn tempo_preference(len: usize, odf_rate: f32) -> Vec<f32> {
    rayleigh_weights(len, 60.0 * odf_rate / PREFERRED_BPM)
}

/// Weighted comb filterbank response
///
/// Returns one value per lag, as many as `weights` has entries. Comb taps
/// past the end of `acf` are skipped.
pub fn comb_filterbank(acf: &[f32], weights: &[f32]) -> Vec<f32> {
    let mut rcf = vec![0.0f32; weights.len()];
    for (lag, out) in rcf.iter_mut().enumerate() {
        let lag_i = lag as i64;
        let mut acc = 0.0f32;
        for a in 1..=COMB_ELEMENTS as i64 {
            let width = (2 * a - 1) as f32;
            for b in (1 - a)..=(a - 1) {
                let idx = a * lag_i + b;
                if idx >= 0 && (idx as usize) < acf.len() {
                    acc += acf[idx as usize] / width;
                }
            }
        }
        *out = acc * weights[lag];
    }
    rcf
}

/// Normalise to a probability distribution (ε added to every entry)
pub fn to_distribution(values: &mut [f32]) {
    let mut sum = 0.0f32;
    for v in values.iter_mut() {
        *v += EPSILON;
        sum += *v;
    }
    for v in values.iter_mut() {
        *v /= sum + EPSILON;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::period::autocorrelation::unbiased_autocorrelation;

    #[test]
    fn test_comb_prefers_true_period() {
        // Impulses every 43 samples (~120 BPM at the reference rate)
        let mut odf = vec![0.0f32; 512];
        for i in (0..512).step_by(43) {
            odf[i] = 1.0;
        }
        let acf = unbiased_autocorrelation(&odf);
        let weights = tempo_preference(128, REFERENCE_ODF_RATE);
        let rcf = comb_filterbank(&acf, &weights);

        let best = crate::math::argmax(&rcf).unwrap();
        assert_eq!(best, 43, "Best lag should be 43, got {}", best);
    }

    #[test]
    fn test_short_acf_does_not_panic() {
        let rcf = comb_filterbank(&[1.0, 0.5, 0.25], &[1.0; 16]);
        assert_eq!(rcf.len(), 16);
    }

    #[test]
    fn test_to_distribution() {
        let mut values = vec![0.0, 1.0, 3.0];
        to_distribution(&mut values);
        let sum: f32 = values.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(values[0] > 0.0);
    }
}
