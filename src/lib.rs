//! # Tempo Grid
//!
//! Multi-feature tempo and beat-grid estimation for rhythm-game chart
//! generation.
//!
//! ## Features
//!
//! - **Onset detection**: nine onset detection functions over a shared
//!   spectral front end
//! - **Beat tracking**: two-stage decoding (Viterbi over beat periods, then an
//!   HMM over beat phase)
//! - **Multi-feature selection**: the candidate grid agreeing most with the
//!   others wins; the mean agreement is the confidence
//! - **Chart post-processing**: range fitting and drift correction of the grid
//!
//! ## Quick Start
//!
//! ```no_run
//! use tempo_grid::{analyze_tempo, AnalysisConfig};
//!
//! // Mono samples at 44.1 kHz
//! let samples: Vec<f32> = vec![];
//!
//! let result = analyze_tempo(&samples, 44100, &AnalysisConfig::default(), &|stage, percent| {
//!     println!("{}: {}%", stage, percent);
//! })?;
//!
//! println!("BPM: {:.2} (confidence: {:.2})", result.bpm, result.confidence);
//! println!("{} beats", result.ticks.len());
//! # Ok::<(), tempo_grid::AnalysisError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Audio → Spectra → ODFs → TempoTap (Stage A periods → Stage B beats)
//!       → Max agreement → Rhythm statistics → Post-processing → Output
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod config;
pub mod error;
pub mod features;
pub mod math;

// Re-export main types
pub use analysis::postprocess::{PostProcessConfig, TickPostProcessor};
pub use analysis::result::{RhythmMetadata, RhythmResult};
pub use analysis::rhythm::RhythmExtractor;
pub use config::{AnalysisConfig, RhythmMethod, SAMPLE_RATE};
pub use error::AnalysisError;

/// Main analysis function
///
/// Extracts the BPM and beat grid of a mono signal, optionally post-processed
/// into the chart tempo range.
///
/// # Arguments
///
/// * `samples` - Mono audio samples
/// * `sample_rate` - Sample rate in Hz (must be 44100)
/// * `config` - Analysis configuration parameters
/// * `progress` - Progress callback `(stage, percent)`; purely observational
///
/// # Returns
///
/// `RhythmResult` with BPM, ticks, confidence and per-interval estimates.
/// An empty or silent signal yields an empty grid and a BPM of 0.
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` for an unsupported sample rate,
/// non-finite samples or an invalid tempo configuration.
///
/// # Example
///
/// ```no_run
/// use tempo_grid::{analyze_tempo, AnalysisConfig};
///
/// let samples = vec![0.0f32; 44100 * 30]; // 30 seconds of silence
/// let result = analyze_tempo(&samples, 44100, &AnalysisConfig::default(), &|_, _| {})?;
/// assert!(result.ticks.is_empty());
/// # Ok::<(), tempo_grid::AnalysisError>(())
/// ```
pub fn analyze_tempo(
    samples: &[f32],
    sample_rate: u32,
    config: &AnalysisConfig,
    progress: &(dyn Fn(&str, u8) + Sync),
) -> Result<RhythmResult, AnalysisError> {
    use std::time::Instant;
    let start_time = Instant::now();

    log::debug!("Starting tempo analysis: {} samples at {} Hz", samples.len(), sample_rate);

    if sample_rate != SAMPLE_RATE {
        return Err(AnalysisError::InvalidInput(format!(
            "Unsupported sample rate: {} Hz (expected {} Hz)",
            sample_rate, SAMPLE_RATE
        )));
    }
    if let Some(pos) = samples.iter().position(|s| !s.is_finite()) {
        return Err(AnalysisError::InvalidInput(format!(
            "Non-finite sample at index {}",
            pos
        )));
    }
    if !(config.min_tempo > 0.0 && config.max_tempo > config.min_tempo) {
        return Err(AnalysisError::InvalidInput(format!(
            "Invalid tempo window: [{}, {}] BPM",
            config.min_tempo, config.max_tempo
        )));
    }

    let mut result = RhythmExtractor::new(config.clone()).compute(samples, progress)?;

    if config.post_process && result.ticks.len() >= 2 {
        let processor = TickPostProcessor::default();
        let (bpm, ticks) = processor.process(
            result.bpm,
            &result.ticks,
            config.target_min_bpm,
            config.target_max_bpm,
        )?;
        let (_, estimates, intervals) = analysis::rhythm::tempo_statistics(&ticks);
        log::debug!("Post-processed grid: {:.2} → {:.2} BPM", result.bpm, bpm);
        result.bpm = bpm;
        result.ticks = ticks;
        result.estimates = estimates;
        result.bpm_intervals = intervals;
        result.metadata.post_processed = true;
    }

    result.metadata.sample_rate = sample_rate;
    result.metadata.processing_time_ms = start_time.elapsed().as_secs_f32() * 1000.0;

    log::debug!(
        "Tempo analysis complete: {:.2} BPM, {} ticks, confidence {:.2} in {:.2} ms",
        result.bpm,
        result.ticks.len(),
        result.confidence,
        result.metadata.processing_time_ms
    );

    Ok(result)
}
