//! High-frequency content (HFC) onset detection
//!
//! Emphasises energy in high bins, where percussive attacks concentrate.
//!
//! # Reference
//!
//! Masri, P. (1996). Computer Modeling of Sound for Transformation and Synthesis
//! of Musical Signals. PhD thesis, University of Bristol.
//!
//! Jensen, K., & Andersen, T. H. (2003). Real-time Beat Estimation Using Feature
//! Extraction. *Computer Music Modeling and Retrieval*.

use super::OnsetDetector;
use crate::config::SAMPLE_RATE;
use crate::features::spectral::Spectrum;

/// How the bin index scales each bin's contribution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HfcWeighting {
    /// `k · |X_k|²` (Masri)
    Linear,
    /// `k² · |X_k|²` (Jensen & Andersen)
    Quadratic,
    /// `|X_k|²`
    Unweighted,
}

/// HFC detector
///
/// Stateless apart from its configuration; one value per spectrum.
#[derive(Debug, Clone)]
pub struct Hfc {
    weighting: HfcWeighting,
    cutoff_hz: f32,
}

impl Hfc {
    /// Create a detector summing bins up to `cutoff_hz`
    pub fn new(weighting: HfcWeighting, cutoff_hz: f32) -> Self {
        Self {
            weighting,
            cutoff_hz,
        }
    }

    fn cutoff_bin(&self, n_bins: usize) -> usize {
        if n_bins < 2 {
            return n_bins;
        }
        let bin_hz = SAMPLE_RATE as f32 / (2.0 * (n_bins - 1) as f32);
        ((self.cutoff_hz / bin_hz).floor() as usize + 1).min(n_bins)
    }
}

impl Default for Hfc {
    fn default() -> Self {
        Self::new(HfcWeighting::Linear, SAMPLE_RATE as f32 / 2.0)
    }
}

impl OnsetDetector for Hfc {
    fn process(&mut self, spectrum: &Spectrum) -> f32 {
        let cutoff = self.cutoff_bin(spectrum.magnitude.len());
        spectrum.magnitude[..cutoff]
            .iter()
            .enumerate()
            .map(|(k, &m)| {
                let power = m * m;
                match self.weighting {
                    HfcWeighting::Linear => k as f32 * power,
                    HfcWeighting::Quadratic => (k * k) as f32 * power,
                    HfcWeighting::Unweighted => power,
                }
            })
            .sum()
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hfc_weighting_order() {
        let spectrum = Spectrum::from_magnitude(vec![1.0; 9]);
        let linear = Hfc::new(HfcWeighting::Linear, 22050.0).process(&spectrum);
        let quadratic = Hfc::new(HfcWeighting::Quadratic, 22050.0).process(&spectrum);
        let flat = Hfc::new(HfcWeighting::Unweighted, 22050.0).process(&spectrum);

        assert_eq!(flat, 9.0);
        assert_eq!(linear, 36.0); // 0+1+...+8
        assert_eq!(quadratic, 204.0); // 0+1+4+...+64
    }

    #[test]
    fn test_hfc_cutoff() {
        let spectrum = Spectrum::from_magnitude(vec![1.0; 1025]);
        let full = Hfc::new(HfcWeighting::Unweighted, 22050.0).process(&spectrum);
        let low = Hfc::new(HfcWeighting::Unweighted, 1000.0).process(&spectrum);
        assert_eq!(full, 1025.0);
        assert!(low < 60.0 && low > 40.0, "~47 bins below 1 kHz, got {}", low);
    }

    #[test]
    fn test_hfc_peaks_at_transient() {
        let mut hfc = Hfc::default();
        let frames: Vec<Spectrum> = (0..20)
            .map(|i| {
                let level = if i == 12 { 5.0 } else { 0.1 };
                Spectrum::from_magnitude(vec![level; 513])
            })
            .collect();
        let odf: Vec<f32> = frames.iter().map(|s| hfc.process(s)).collect();
        assert_eq!(crate::math::argmax(&odf), Some(12));
    }
}
