//! Spectral front end
//!
//! Frame slicing, windowing and FFT. Everything downstream of the raw signal
//! consumes [`Spectrum`] values produced here:
//! - Frame cutting (zero-centered or start-at-zero)
//! - Windowing (Hann by default, optional zero-padding / zero-phase)
//! - Magnitude/phase spectrum
//! - Triangular filter banks (mel, ERB, log-frequency)

pub mod bands;
pub mod frame_cutter;
pub mod spectrum;
pub mod windowing;

pub use frame_cutter::{FrameCutter, FrameStart};
pub use spectrum::SpectrumAnalyzer;
pub use windowing::{WindowType, Windowing};

/// Magnitude and phase of one analysis frame
///
/// Both vectors have `frame_size / 2 + 1` entries.
#[derive(Debug, Clone, Default)]
pub struct Spectrum {
    /// Magnitude per bin
    pub magnitude: Vec<f32>,

    /// Phase per bin in radians, (-π, π]
    pub phase: Vec<f32>,
}

impl Spectrum {
    /// Spectrum with magnitudes only (phase zeroed)
    pub fn from_magnitude(magnitude: Vec<f32>) -> Self {
        let phase = vec![0.0; magnitude.len()];
        Self { magnitude, phase }
    }

    /// Number of bins
    pub fn len(&self) -> usize {
        self.magnitude.len()
    }

    /// True when the spectrum has no bins
    pub fn is_empty(&self) -> bool {
        self.magnitude.is_empty()
    }
}

/// Iterate the windowed spectra of `signal`
///
/// Convenience pipeline used by the detectors: zero-centered frames,
/// normalized Hann window, forward FFT. Returns a lazy iterator; the
/// analyzer and window are owned by the iterator.
pub fn spectra(
    signal: &[f32],
    frame_size: usize,
    hop_size: usize,
) -> impl Iterator<Item = Spectrum> + '_ {
    let window = Windowing::hann(frame_size);
    let mut analyzer = SpectrumAnalyzer::new(frame_size);
    FrameCutter::new(signal, frame_size, hop_size, FrameStart::ZeroCentered)
        .map(move |frame| analyzer.compute(&window.apply(&frame)))
}
