//! Rhythm extraction
//!
//! Wraps a beat tracker and derives a robust BPM from the beat intervals:
//!
//! 1. Every inter-beat interval gives an estimate `60 / interval`
//! 2. The halved estimates are histogrammed in 1-BPM bins; twice the centre
//!    of the fullest bin is the closest BPM (halving merges octave errors
//!    into neighbouring bins)
//! 3. The BPM is the mean of all estimates within ±5 BPM of the closest BPM
//!
//! # Example
//!
//! ```
//! use tempo_grid::analysis::rhythm::tempo_statistics;
//!
//! let ticks = vec![0.0, 0.5, 1.0, 1.5, 2.0];
//! let (bpm, estimates, intervals) = tempo_statistics(&ticks);
//! assert!((bpm - 120.0).abs() < 1e-3);
//! assert_eq!(estimates.len(), 4);
//! assert_eq!(intervals.len(), 4);
//! ```

use std::collections::BTreeMap;

use super::multi_feature::{BeatTrackerMultiFeature, MultiFeatureConfig};
use super::result::{RhythmMetadata, RhythmResult};
use crate::config::{AnalysisConfig, RhythmMethod, SAMPLE_RATE};
use crate::error::AnalysisError;
use crate::features::beat_tracking::{Resample, TempoTap, TempoTapConfig};
use crate::features::onset::{compute_odf, OnsetMethod};

/// Estimates within this distance of the closest BPM are averaged
const BPM_TOLERANCE: f32 = 5.0;

/// Frame size of the single-ODF path
const DEGARA_FRAME: usize = 2048;

/// Hop of the single-ODF path
const DEGARA_HOP: usize = 512;

/// Rhythm extractor
#[derive(Debug, Clone, Default)]
pub struct RhythmExtractor {
    config: AnalysisConfig,
}

impl RhythmExtractor {
    /// Create an extractor
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Extract the tempo grid of `signal`
    ///
    /// # Arguments
    ///
    /// * `signal` - Mono samples at 44.1 kHz
    /// * `progress` - Observational progress callback `(stage, percent)`
    ///
    /// # Returns
    ///
    /// [`RhythmResult`] with BPM, ticks and per-interval estimates. Fewer
    /// than two ticks give a BPM of 0.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError` if onset detection or beat tracking fails.
    pub fn compute(
        &self,
        signal: &[f32],
        progress: &(dyn Fn(&str, u8) + Sync),
    ) -> Result<RhythmResult, AnalysisError> {
        log::debug!(
            "Rhythm extraction: {} samples, method {:?}",
            signal.len(),
            self.config.method
        );

        let (ticks, confidence, method, candidates_evaluated) = match self.config.method {
            RhythmMethod::MultiFeature => {
                let tracker = BeatTrackerMultiFeature::new(MultiFeatureConfig::from(&self.config));
                let result = tracker.compute(signal, progress)?;
                (result.ticks, result.confidence, result.method, result.candidates_evaluated)
            }
            RhythmMethod::Degara => {
                progress("onset detection", 0);
                let odf = compute_odf(signal, OnsetMethod::ComplexDomain, DEGARA_FRAME, DEGARA_HOP)?;
                progress("beat tracking", 50);
                let tap = TempoTap::new(TempoTapConfig {
                    min_tempo: self.config.min_tempo,
                    max_tempo: self.config.max_tempo,
                    odf_rate: SAMPLE_RATE as f32 / DEGARA_HOP as f32,
                    resample: Resample::None,
                    dither_seed: self.config.dither_seed,
                });
                let ticks = tap.compute(&odf)?;
                progress("beat tracking", 100);
                (ticks, 0.0, "degara".to_string(), 1)
            }
        };

        let (bpm, estimates, bpm_intervals) = tempo_statistics(&ticks);
        if ticks.len() < 2 {
            log::warn!("Rhythm extraction: {} tick(s), BPM unavailable", ticks.len());
        }
        log::debug!("Rhythm extraction done: {:.2} BPM, {} ticks", bpm, ticks.len());

        Ok(RhythmResult {
            bpm,
            ticks,
            confidence,
            estimates,
            bpm_intervals,
            method,
            metadata: RhythmMetadata {
                duration_seconds: signal.len() as f32 / SAMPLE_RATE as f32,
                candidates_evaluated,
                ..RhythmMetadata::default()
            },
        })
    }
}

/// BPM, per-interval BPM estimates and intervals of a tick sequence
///
/// Returns `(0.0, [], [])` for fewer than two ticks.
pub fn tempo_statistics(ticks: &[f32]) -> (f32, Vec<f32>, Vec<f32>) {
    let intervals: Vec<f32> = ticks.windows(2).map(|w| w[1] - w[0]).collect();
    let estimates: Vec<f32> = intervals
        .iter()
        .filter(|&&i| i > 0.0)
        .map(|&i| 60.0 / i)
        .collect();
    if estimates.is_empty() {
        return (0.0, estimates, intervals);
    }

    // Halved estimates in 1-BPM bins; lowest bin wins ties
    let mut histogram: BTreeMap<u32, usize> = BTreeMap::new();
    for &e in &estimates {
        *histogram.entry((e / 2.0).round() as u32).or_insert(0) += 1;
    }
    let mut closest_bin = 0u32;
    let mut closest_count = 0usize;
    for (&bin, &count) in &histogram {
        if count > closest_count {
            closest_bin = bin;
            closest_count = count;
        }
    }
    let closest = 2.0 * closest_bin as f32;

    let near: Vec<f32> = estimates
        .iter()
        .copied()
        .filter(|e| (e - closest).abs() <= BPM_TOLERANCE)
        .collect();
    let bpm = if near.is_empty() {
        closest
    } else {
        near.iter().sum::<f32>() / near.len() as f32
    };

    (bpm, estimates, intervals)
}
