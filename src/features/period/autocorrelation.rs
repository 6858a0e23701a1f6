//! Autocorrelation of onset detection functions
//!
//! Finds periodicity in an ODF using FFT-accelerated autocorrelation:
//! `ACF = IFFT(|FFT(signal)|²)`, zero-padded to avoid circular wrap-around.
//!
//! # Reference
//!
//! Ellis, D. P. W., & Pikrakis, A. (2006). Real-time Beat Induction.
//! *Proceedings of the International Conference on Music Information Retrieval*.
//!
//! # Example
//!
//! ```
//! use tempo_grid::features::period::autocorrelation::unbiased_autocorrelation;
//!
//! let odf = vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0];
//! let acf = unbiased_autocorrelation(&odf);
//! assert!(acf[2] > acf[1]);
//! ```

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Unbiased autocorrelation of `signal`
///
/// `ACF[lag] = Σ x[n]·x[n+lag] / (N - lag)`, computed with the FFT in
/// O(n log n). The output has the same length as the input. Normalising by
/// the overlap length keeps long lags from being penalised, which matters
/// when the comb filter bank later sums several multiples of each lag.
pub fn unbiased_autocorrelation(signal: &[f32]) -> Vec<f32> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }

    // FFT size: next power of 2 >= 2*n (for zero-padding)
    let fft_size = (2 * n).next_power_of_two();

    let mut fft_input: Vec<Complex<f32>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    fft_input.resize(fft_size, Complex::new(0.0, 0.0));

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);
    fft.process(&mut fft_input);

    // |FFT|²
    for x in &mut fft_input {
        *x = *x * x.conj();
    }

    let ifft = planner.plan_fft_inverse(fft_size);
    ifft.process(&mut fft_input);

    // Real part, FFT scaling, overlap normalisation
    let scale = 1.0 / (fft_size as f32);
    fft_input[..n]
        .iter()
        .enumerate()
        .map(|(lag, x)| x.re * scale / (n - lag) as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Direct O(n²) reference
    fn direct(signal: &[f32]) -> Vec<f32> {
        let n = signal.len();
        (0..n)
            .map(|lag| {
                (0..n - lag).map(|i| signal[i] * signal[i + lag]).sum::<f32>() / (n - lag) as f32
            })
            .collect()
    }

    #[test]
    fn test_matches_direct_computation() {
        let signal: Vec<f32> = (0..200).map(|i| ((i * 7) % 13) as f32 / 13.0).collect();
        let fast = unbiased_autocorrelation(&signal);
        let slow = direct(&signal);
        assert_eq!(fast.len(), slow.len());
        for (lag, (a, b)) in fast.iter().zip(slow.iter()).enumerate() {
            assert!((a - b).abs() < 1e-3, "lag {}: fft={} direct={}", lag, a, b);
        }
    }

    #[test]
    fn test_periodic_impulses() {
        let mut signal = vec![0.0f32; 430];
        for i in (0..430).step_by(43) {
            signal[i] = 1.0;
        }
        let acf = unbiased_autocorrelation(&signal);
        let peak = (20..60).max_by(|&a, &b| acf[a].partial_cmp(&acf[b]).unwrap()).unwrap();
        assert_eq!(peak, 43);
    }

    #[test]
    fn test_empty() {
        assert!(unbiased_autocorrelation(&[]).is_empty());
    }
}
