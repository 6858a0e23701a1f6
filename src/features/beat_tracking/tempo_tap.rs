//! Two-stage tempo tapping
//!
//! Turns one onset detection function into a beat tick sequence:
//!
//! 1. Optional linear upsampling of the ODF (2×, 3× or 4×) so coarse ODFs
//!    decode at a finer temporal grid
//! 2. Beat period trajectory per super-frame ([`BeatPeriodTracker`])
//! 3. Beat placement on the ODF given that trajectory ([`HmmBeatDecoder`])
//!
//! # Example
//!
//! ```
//! use tempo_grid::features::beat_tracking::tempo_tap::{TempoTap, TempoTapConfig};
//!
//! let rate = 44100.0 / 512.0;
//! let mut odf = vec![0.0f32; 1500];
//! for i in (0..1500).step_by(43) {
//!     odf[i] = 1.0;
//! }
//! let ticks = TempoTap::new(TempoTapConfig::default()).compute(&odf)?;
//! assert!(ticks.windows(2).all(|w| w[1] > w[0]));
//! assert!(((ticks[1] - ticks[0]) - 43.0 / rate).abs() < 1e-3);
//! # Ok::<(), tempo_grid::AnalysisError>(())
//! ```

use serde::{Deserialize, Serialize};

use super::hmm::HmmBeatDecoder;
use crate::error::AnalysisError;
use crate::features::period::comb_filter::REFERENCE_ODF_RATE;
use crate::features::period::{BeatPeriodTracker, PeriodTrackerConfig};
use crate::math::upsample_linear;

/// ODF upsampling applied before decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resample {
    /// Decode at the native ODF rate
    #[default]
    None,
    /// Upsample 2×
    X2,
    /// Upsample 3×
    X3,
    /// Upsample 4×
    X4,
}

impl Resample {
    /// Integer upsampling factor
    pub fn factor(self) -> usize {
        match self {
            Resample::None => 1,
            Resample::X2 => 2,
            Resample::X3 => 3,
            Resample::X4 => 4,
        }
    }
}

/// Tempo tapping configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TempoTapConfig {
    /// Slowest admissible tempo (BPM)
    pub min_tempo: f32,

    /// Fastest admissible tempo (BPM)
    pub max_tempo: f32,

    /// Native ODF sample rate (Hz)
    pub odf_rate: f32,

    /// Upsampling applied before decoding
    pub resample: Resample,

    /// Seed for the period tracker's tie-breaking dither
    pub dither_seed: Option<u64>,
}

impl Default for TempoTapConfig {
    fn default() -> Self {
        Self {
            min_tempo: 40.0,
            max_tempo: 208.0,
            odf_rate: REFERENCE_ODF_RATE,
            resample: Resample::None,
            dither_seed: None,
        }
    }
}

/// ODF → beat ticks
#[derive(Debug, Clone, Default)]
pub struct TempoTap {
    config: TempoTapConfig,
}

impl TempoTap {
    /// Create a tempo tapper
    pub fn new(config: TempoTapConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    pub fn config(&self) -> &TempoTapConfig {
        &self.config
    }

    /// ODF rate after resampling (Hz)
    pub fn effective_rate(&self) -> f32 {
        self.config.odf_rate * self.config.resample.factor() as f32
    }

    /// Stage-A tracker at the effective rate
    fn period_tracker(&self) -> BeatPeriodTracker {
        BeatPeriodTracker::new(PeriodTrackerConfig {
            odf_rate: self.effective_rate(),
            min_tempo: self.config.min_tempo,
            max_tempo: self.config.max_tempo,
            dither_seed: self.config.dither_seed,
        })
    }

    /// Compute beat ticks
    ///
    /// # Arguments
    ///
    /// * `odf` - Onset detection function at `odf_rate`
    ///
    /// # Returns
    ///
    /// Strictly increasing beat times in seconds. Empty or silent ODFs give
    /// no ticks.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidInput` if the ODF contains negative or
    /// non-finite values, or the configured rate or tempo window is invalid.
    pub fn compute(&self, odf: &[f32]) -> Result<Vec<f32>, AnalysisError> {
        if let Some(bad) = odf.iter().position(|&v| !(v >= 0.0) || !v.is_finite()) {
            return Err(AnalysisError::InvalidInput(format!(
                "Onset detection function must be non-negative and finite (value {} at {})",
                odf[bad], bad
            )));
        }
        if !(self.config.odf_rate > 0.0) {
            return Err(AnalysisError::InvalidInput(format!(
                "ODF rate must be > 0, got {}",
                self.config.odf_rate
            )));
        }
        if odf.is_empty() || odf.iter().all(|&v| v == 0.0) {
            log::warn!("Tempo tap: empty or silent ODF ({} samples)", odf.len());
            return Ok(Vec::new());
        }

        let rate = self.effective_rate();
        let odf = upsample_linear(odf, self.config.resample.factor());

        log::debug!(
            "Tempo tap: {} ODF samples at {:.2} Hz, tempo [{}, {}]",
            odf.len(),
            rate,
            self.config.min_tempo,
            self.config.max_tempo
        );

        let tracker = self.period_tracker();
        let lags = tracker.track(&odf)?;
        let periods = tracker.lags_per_sample(&lags, odf.len());

        let beats = HmmBeatDecoder::new(rate).decode(&odf, &periods)?;
        let ticks: Vec<f32> = beats.iter().map(|&b| b as f32 / rate).collect();

        log::debug!("Tempo tap: {} ticks", ticks.len());
        Ok(ticks)
    }
}
