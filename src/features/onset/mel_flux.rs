//! Mel-band flux onset detection
//!
//! Half-rectified L1 flux over log-compressed mel band energies. Working on
//! 40 perceptual bands instead of raw bins makes the detector less sensitive
//! to small pitch changes.

use super::spectral_flux::{FluxNorm, FluxState};
use super::OnsetDetector;
use crate::config::SAMPLE_RATE;
use crate::features::spectral::bands::FilterBank;
use crate::features::spectral::Spectrum;

/// Number of mel bands
const MEL_BANDS: usize = 40;

/// Mel-flux detector
///
/// The filter bank is built lazily for the first spectrum size seen.
#[derive(Debug, Clone)]
pub struct MelFlux {
    bank: Option<FilterBank>,
    flux: FluxState,
    first_frame: bool,
}

impl MelFlux {
    /// Create a mel-flux detector
    pub fn new() -> Self {
        Self {
            bank: None,
            flux: FluxState::new(FluxNorm::L1, true),
            first_frame: true,
        }
    }
}

impl Default for MelFlux {
    fn default() -> Self {
        Self::new()
    }
}

impl OnsetDetector for MelFlux {
    fn process(&mut self, spectrum: &Spectrum) -> f32 {
        let n_bins = spectrum.magnitude.len();
        if n_bins == 0 {
            return 0.0;
        }
        let bank = self.bank.get_or_insert_with(|| {
            FilterBank::mel(MEL_BANDS, n_bins, SAMPLE_RATE, 0.0, SAMPLE_RATE as f32 / 2.0)
        });

        let log_bands: Vec<f32> = bank
            .energies(&spectrum.magnitude)
            .into_iter()
            .map(|e| e.ln_1p())
            .collect();
        let value = self.flux.update(&log_bands);

        // Startup transient against the implicit silent frame
        if self.first_frame {
            self.first_frame = false;
            return 0.0;
        }
        value
    }

    fn reset(&mut self) {
        self.flux.reset();
        self.first_frame = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_is_zero() {
        let mut detector = MelFlux::new();
        let loud = Spectrum::from_magnitude(vec![10.0; 1025]);
        assert_eq!(detector.process(&loud), 0.0);

        detector.reset();
        assert_eq!(detector.process(&loud), 0.0);
    }

    #[test]
    fn test_mel_flux_peaks_at_transient() {
        let mut detector = MelFlux::new();
        let odf: Vec<f32> = (0..20)
            .map(|i| {
                let level = if i == 11 { 4.0 } else { 0.5 };
                detector.process(&Spectrum::from_magnitude(vec![level; 1025]))
            })
            .collect();
        assert!(odf.iter().all(|&v| v >= 0.0));
        assert_eq!(crate::math::argmax(&odf), Some(11));
    }
}
