//! Energy flux (RMS) onset detection
//!
//! Detects onsets from the frame-by-frame energy derivative:
//! `E_flux[n] = max(0, E[n] - E[n-1])`, with `E` the RMS of the frame's
//! magnitude spectrum. Fast and effective for percussive onsets.
//!
//! # Reference
//!
//! Bello, J. P., Daudet, L., Abdallah, S., Duxbury, C., Davies, M., & Sandler, M. B. (2005).
//! A Tutorial on Onset Detection in Music Signals.
//! *IEEE Transactions on Speech and Audio Processing*, 13(5), 1035-1047.

use super::OnsetDetector;
use crate::features::spectral::Spectrum;

/// Half-rectified RMS difference detector (carries the previous RMS)
#[derive(Debug, Clone, Default)]
pub struct Rms {
    previous_rms: f32,
}

impl Rms {
    /// Create an RMS detector
    pub fn new() -> Self {
        Self::default()
    }
}

impl OnsetDetector for Rms {
    fn process(&mut self, spectrum: &Spectrum) -> f32 {
        let rms = if spectrum.magnitude.is_empty() {
            0.0
        } else {
            let sum_sq: f32 = spectrum.magnitude.iter().map(|&m| m * m).sum();
            (sum_sq / spectrum.magnitude.len() as f32).sqrt()
        };

        let flux = (rms - self.previous_rms).max(0.0);
        self.previous_rms = rms;
        flux
    }

    fn reset(&mut self) {
        self.previous_rms = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::spectral;

    /// Generate a synthetic kick pattern at specified BPM
    fn generate_kick_pattern(duration_seconds: f32, bpm: f32, sample_rate: f32) -> Vec<f32> {
        let num_samples = (duration_seconds * sample_rate) as usize;
        let mut samples = vec![0.0f32; num_samples];
        let beat_interval = (60.0 / bpm * sample_rate) as usize;
        let kick_samples = (0.15 * sample_rate) as usize;

        let mut pos = 0;
        while pos < num_samples {
            let end = (pos + kick_samples).min(num_samples);
            for i in pos..end {
                let t = (i - pos) as f32 / kick_samples as f32;
                samples[i] = 0.8 * (-t * 5.0).exp() * (i as f32 * 0.3).sin();
            }
            pos += beat_interval;
        }
        samples
    }

    #[test]
    fn test_rms_step_function() {
        // Silence, then constant signal from sample 5000
        let mut samples = vec![0.0f32; 44100];
        for s in samples.iter_mut().skip(5000) {
            *s = 0.5;
        }

        let mut rms = Rms::new();
        let odf: Vec<f32> = spectral::spectra(&samples, 2048, 512)
            .map(|s| rms.process(&s))
            .collect();

        let peak = crate::math::argmax(&odf).unwrap();
        let peak_sample = peak * 512;
        assert!(
            (3000..=8000).contains(&peak_sample),
            "Onset should be near step at sample 5000, got {}",
            peak_sample
        );
    }

    #[test]
    fn test_rms_kick_pattern_is_periodic() {
        let samples = generate_kick_pattern(4.0, 120.0, 44100.0);
        let mut rms = Rms::new();
        let odf: Vec<f32> = spectral::spectra(&samples, 2048, 512)
            .map(|s| rms.process(&s))
            .collect();

        // Strong values near each kick (every ~43 frames)
        let max = odf.iter().copied().fold(0.0f32, f32::max);
        let strong: Vec<usize> = (1..odf.len() - 1)
            .filter(|&i| odf[i] > 0.5 * max && odf[i] >= odf[i - 1] && odf[i] >= odf[i + 1])
            .collect();
        assert!(
            (5..=12).contains(&strong.len()),
            "Expected ~8 kicks, got {}",
            strong.len()
        );
    }

    #[test]
    fn test_rms_silence_is_zero() {
        let mut rms = Rms::new();
        let spectrum = Spectrum::from_magnitude(vec![0.0; 513]);
        assert_eq!(rms.process(&spectrum), 0.0);
        assert_eq!(rms.process(&spectrum), 0.0);
    }

    #[test]
    fn test_rms_peaks_at_transient() {
        let mut rms = Rms::new();
        let odf: Vec<f32> = (0..25)
            .map(|i| {
                let level = if i == 9 { 3.0 } else { 0.3 };
                rms.process(&Spectrum::from_magnitude(vec![level; 513]))
            })
            .collect();
        assert_eq!(crate::math::argmax(&odf), Some(9));
    }
}
