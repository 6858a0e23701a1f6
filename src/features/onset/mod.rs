//! Onset detection functions (ODFs)
//!
//! Every detector turns a sequence of spectra into one non-negative value per
//! frame. Two kinds exist:
//! - Per-frame detectors ([`OnsetDetector`]): HFC, spectral flux, complex
//!   domain, complex phase, mel flux, RMS, SuperFlux novelty
//! - Whole-track detectors ([`GlobalOnsetDetector`]): information gain and
//!   beat emphasis, which need context beyond the current frame
//!
//! [`compute_odfs`] runs any number of detectors over a single spectral pass.
//!
//! # Example
//!
//! ```
//! use tempo_grid::features::onset::{compute_odf, OnsetMethod};
//!
//! let signal = vec![0.0f32; 44100];
//! let odf = compute_odf(&signal, OnsetMethod::Hfc, 2048, 512).unwrap();
//! // Frame starts run from -1024 up to the last sample
//! assert_eq!(odf.len(), (44100 + 1024 + 511) / 512);
//! ```

pub mod beat_emphasis;
pub mod complex;
pub mod energy_flux;
pub mod hfc;
pub mod infogain;
pub mod mel_flux;
pub mod spectral_flux;
pub mod superflux;

use serde::{Deserialize, Serialize};

use crate::config::SAMPLE_RATE;
use crate::error::AnalysisError;
use crate::features::spectral::{spectra, Spectrum};

pub use beat_emphasis::BeatEmphasis;
pub use complex::{ComplexDomain, ComplexPhase};
pub use energy_flux::Rms;
pub use hfc::{Hfc, HfcWeighting};
pub use infogain::Infogain;
pub use mel_flux::MelFlux;
pub use spectral_flux::{Flux, FluxNorm};
pub use superflux::SuperFluxNovelty;

/// A detector producing one value per spectrum as it arrives
pub trait OnsetDetector: Send {
    /// Detection value for the next frame
    fn process(&mut self, spectrum: &Spectrum) -> f32;

    /// Forget all inter-frame state
    fn reset(&mut self);
}

/// A detector that sees the whole track before producing its output
pub trait GlobalOnsetDetector: Send {
    /// Buffer the next frame
    fn push(&mut self, spectrum: &Spectrum);

    /// Detection values for every buffered frame; clears the buffer
    fn finish(&mut self) -> Vec<f32>;

    /// Forget all buffered frames
    fn reset(&mut self);
}

/// Available onset detection functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OnsetMethod {
    /// High-frequency content (linear weighting)
    Hfc,
    /// L2 half-rectified spectral flux
    Flux,
    /// Complex-domain deviation
    ComplexDomain,
    /// Phase-only complex deviation
    ComplexPhase,
    /// Log mel-band flux
    MelFlux,
    /// Half-rectified RMS difference
    Rms,
    /// SuperFlux novelty (max-filtered log bands)
    SuperFlux,
    /// Information gain (whole track)
    Infogain,
    /// Beat emphasis (whole track)
    BeatEmphasis,
}

impl OnsetMethod {
    /// Short lowercase name, used to label candidates
    pub fn name(self) -> &'static str {
        match self {
            OnsetMethod::Hfc => "hfc",
            OnsetMethod::Flux => "flux",
            OnsetMethod::ComplexDomain => "complex",
            OnsetMethod::ComplexPhase => "complex_phase",
            OnsetMethod::MelFlux => "melflux",
            OnsetMethod::Rms => "rms",
            OnsetMethod::SuperFlux => "superflux",
            OnsetMethod::Infogain => "infogain",
            OnsetMethod::BeatEmphasis => "beat_emphasis",
        }
    }
}

enum Detector {
    Frame(Box<dyn OnsetDetector>),
    Global(Box<dyn GlobalOnsetDetector>),
}

impl Detector {
    fn new(method: OnsetMethod, hop_size: usize) -> Self {
        match method {
            OnsetMethod::Hfc => Detector::Frame(Box::new(Hfc::default())),
            OnsetMethod::Flux => Detector::Frame(Box::new(Flux::default())),
            OnsetMethod::ComplexDomain => Detector::Frame(Box::new(ComplexDomain::new())),
            OnsetMethod::ComplexPhase => Detector::Frame(Box::new(ComplexPhase::new())),
            OnsetMethod::MelFlux => Detector::Frame(Box::new(MelFlux::new())),
            OnsetMethod::Rms => Detector::Frame(Box::new(Rms::new())),
            OnsetMethod::SuperFlux => Detector::Frame(Box::new(SuperFluxNovelty::default())),
            OnsetMethod::Infogain => Detector::Global(Box::new(Infogain::new())),
            OnsetMethod::BeatEmphasis => Detector::Global(Box::new(BeatEmphasis::new(
                SAMPLE_RATE as f32 / hop_size as f32,
            ))),
        }
    }
}

/// Compute a single onset detection function
///
/// See [`compute_odfs`].
pub fn compute_odf(
    signal: &[f32],
    method: OnsetMethod,
    frame_size: usize,
    hop_size: usize,
) -> Result<Vec<f32>, AnalysisError> {
    let mut odfs = compute_odfs(signal, &[method], frame_size, hop_size)?;
    Ok(odfs.pop().unwrap_or_default())
}

/// Compute several onset detection functions over one spectral pass
///
/// # Arguments
///
/// * `signal` - Mono samples at 44.1 kHz
/// * `methods` - Detectors to run; output order matches
/// * `frame_size` - FFT frame size (samples)
/// * `hop_size` - Hop between frames (samples); the ODF rate is `44100 / hop_size`
///
/// # Returns
///
/// One ODF per method, each with one value per zero-centered frame. An empty
/// signal yields empty ODFs.
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` if the frame or hop size is zero,
/// the hop exceeds the frame, or the signal contains non-finite samples.
pub fn compute_odfs(
    signal: &[f32],
    methods: &[OnsetMethod],
    frame_size: usize,
    hop_size: usize,
) -> Result<Vec<Vec<f32>>, AnalysisError> {
    if frame_size == 0 || hop_size == 0 {
        return Err(AnalysisError::InvalidInput(format!(
            "Frame size ({}) and hop size ({}) must be > 0",
            frame_size, hop_size
        )));
    }
    if hop_size > frame_size {
        return Err(AnalysisError::InvalidInput(format!(
            "Hop size ({}) must not exceed frame size ({})",
            hop_size, frame_size
        )));
    }
    if signal.iter().any(|s| !s.is_finite()) {
        return Err(AnalysisError::InvalidInput(
            "Signal contains non-finite samples".to_string(),
        ));
    }

    log::debug!(
        "Computing {} ODF(s): {} samples, frame={}, hop={}",
        methods.len(),
        signal.len(),
        frame_size,
        hop_size
    );

    if signal.is_empty() {
        return Ok(vec![Vec::new(); methods.len()]);
    }

    let mut detectors: Vec<Detector> = methods.iter().map(|&m| Detector::new(m, hop_size)).collect();
    let mut outputs: Vec<Vec<f32>> = vec![Vec::new(); methods.len()];

    for spectrum in spectra(signal, frame_size, hop_size) {
        for (detector, out) in detectors.iter_mut().zip(outputs.iter_mut()) {
            match detector {
                Detector::Frame(d) => out.push(d.process(&spectrum)),
                Detector::Global(d) => d.push(&spectrum),
            }
        }
    }

    for (detector, out) in detectors.iter_mut().zip(outputs.iter_mut()) {
        if let Detector::Global(d) = detector {
            *out = d.finish();
        }
        for v in out.iter_mut() {
            if !v.is_finite() || *v < 0.0 {
                *v = 0.0;
            }
        }
    }

    log::debug!(
        "ODFs computed: {} frames",
        outputs.first().map_or(0, Vec::len)
    );

    Ok(outputs)
}
