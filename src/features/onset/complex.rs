//! Complex-domain onset detection
//!
//! Both detectors predict each bin's phase from a constant angular velocity
//! model over the two preceding frames, `φ̂[n] = 2φ[n-1] - φ[n-2]`:
//! - [`ComplexDomain`] measures the distance between the observed complex
//!   value and the prediction `|X[n-1]| · e^{iφ̂}` (magnitude-weighted)
//! - [`ComplexPhase`] sums the squared wrapped phase deviation alone
//!
//! # Reference
//!
//! Duxbury, C., Bello, J. P., Davies, M., & Sandler, M. (2003). Complex Domain
//! Onset Detection for Musical Signals. *Proceedings of the DAFx Conference*.

use rustfft::num_complex::Complex;

use super::OnsetDetector;
use crate::features::spectral::Spectrum;
use crate::math::princarg;

/// Two-frame phase history shared by the complex-domain detectors
#[derive(Debug, Clone, Default)]
pub(crate) struct PhaseHistory {
    previous_magnitude: Vec<f32>,
    previous_phase: Vec<f32>,
    previous_phase_2: Vec<f32>,
}

impl PhaseHistory {
    fn ensure_len(&mut self, n: usize) {
        if self.previous_phase.len() != n {
            self.previous_magnitude = vec![0.0; n];
            self.previous_phase = vec![0.0; n];
            self.previous_phase_2 = vec![0.0; n];
        }
    }

    /// Per-bin complex-domain deviation of `spectrum` against the
    /// prediction; history is advanced afterwards
    pub(crate) fn complex_deviation(&mut self, spectrum: &Spectrum) -> Vec<f32> {
        let n = spectrum.magnitude.len();
        self.ensure_len(n);

        let deviation = (0..n)
            .map(|k| {
                let predicted_phase = 2.0 * self.previous_phase[k] - self.previous_phase_2[k];
                let target = Complex::from_polar(self.previous_magnitude[k], predicted_phase);
                let observed = Complex::from_polar(spectrum.magnitude[k], spectrum.phase[k]);
                (observed - target).norm()
            })
            .collect();

        self.advance(spectrum);
        deviation
    }

    /// Per-bin wrapped phase deviation from the prediction; history is
    /// advanced afterwards
    fn phase_deviation(&mut self, spectrum: &Spectrum) -> Vec<f32> {
        let n = spectrum.magnitude.len();
        self.ensure_len(n);

        let deviation = (0..n)
            .map(|k| {
                let predicted_phase = 2.0 * self.previous_phase[k] - self.previous_phase_2[k];
                princarg(spectrum.phase[k] - predicted_phase)
            })
            .collect();

        self.advance(spectrum);
        deviation
    }

    fn advance(&mut self, spectrum: &Spectrum) {
        std::mem::swap(&mut self.previous_phase_2, &mut self.previous_phase);
        self.previous_phase.copy_from_slice(&spectrum.phase);
        self.previous_magnitude.copy_from_slice(&spectrum.magnitude);
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Complex-domain detector (magnitude-weighted deviation)
#[derive(Debug, Clone, Default)]
pub struct ComplexDomain {
    history: PhaseHistory,
}

impl ComplexDomain {
    /// Create a complex-domain detector
    pub fn new() -> Self {
        Self::default()
    }
}

impl OnsetDetector for ComplexDomain {
    fn process(&mut self, spectrum: &Spectrum) -> f32 {
        self.history.complex_deviation(spectrum).iter().sum()
    }

    fn reset(&mut self) {
        self.history.reset();
    }
}

/// Phase-only detector (sum of squared angular deviation)
#[derive(Debug, Clone, Default)]
pub struct ComplexPhase {
    history: PhaseHistory,
}

impl ComplexPhase {
    /// Create a complex-phase detector
    pub fn new() -> Self {
        Self::default()
    }
}

impl OnsetDetector for ComplexPhase {
    fn process(&mut self, spectrum: &Spectrum) -> f32 {
        self.history
            .phase_deviation(spectrum)
            .iter()
            .map(|d| d * d)
            .sum()
    }

    fn reset(&mut self) {
        self.history.reset();
    }
}
