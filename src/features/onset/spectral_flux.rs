//! Spectral flux onset detection
//!
//! Distance between consecutive magnitude spectra. With half-wave
//! rectification only increases in magnitude (onsets) contribute; decays are
//! ignored.
//!
//! # Reference
//!
//! Bello, J. P., Daudet, L., Abdallah, S., Duxbury, C., Davies, M., & Sandler, M. B. (2005).
//! A Tutorial on Onset Detection in Music Signals.
//! *IEEE Transactions on Speech and Audio Processing*, 13(5), 1035-1047.

use super::OnsetDetector;
use crate::features::spectral::Spectrum;

/// Distance norm between consecutive spectra
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluxNorm {
    /// Sum of absolute differences
    L1,
    /// Euclidean distance
    L2,
}

/// Flux between a vector and the previous one
///
/// Shared by [`Flux`] (bins) and the mel-flux detector (bands).
#[derive(Debug, Clone)]
pub(crate) struct FluxState {
    norm: FluxNorm,
    half_rectify: bool,
    previous: Vec<f32>,
}

impl FluxState {
    pub(crate) fn new(norm: FluxNorm, half_rectify: bool) -> Self {
        Self {
            norm,
            half_rectify,
            previous: Vec::new(),
        }
    }

    /// Flux of `current` against the stored vector, then store `current`
    ///
    /// The first call compares against zeros.
    pub(crate) fn update(&mut self, current: &[f32]) -> f32 {
        if self.previous.len() != current.len() {
            self.previous = vec![0.0; current.len()];
        }

        let mut acc = 0.0f32;
        for (&curr, &prev) in current.iter().zip(self.previous.iter()) {
            let mut diff = curr - prev;
            if self.half_rectify {
                diff = diff.max(0.0);
            }
            acc += match self.norm {
                FluxNorm::L1 => diff.abs(),
                FluxNorm::L2 => diff * diff,
            };
        }

        self.previous.copy_from_slice(current);

        match self.norm {
            FluxNorm::L1 => acc,
            FluxNorm::L2 => acc.sqrt(),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.previous.clear();
    }
}

/// Spectral flux detector (carries one previous magnitude spectrum)
#[derive(Debug, Clone)]
pub struct Flux {
    state: FluxState,
}

impl Flux {
    /// Create a flux detector
    pub fn new(norm: FluxNorm, half_rectify: bool) -> Self {
        Self {
            state: FluxState::new(norm, half_rectify),
        }
    }
}

impl Default for Flux {
    fn default() -> Self {
        Self::new(FluxNorm::L2, true)
    }
}

impl OnsetDetector for Flux {
    fn process(&mut self, spectrum: &Spectrum) -> f32 {
        self.state.update(&spectrum.magnitude)
    }

    fn reset(&mut self) {
        self.state.reset();
    }
}
