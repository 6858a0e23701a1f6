//! Configuration parameters for tempo analysis

use serde::{Deserialize, Serialize};

/// Sample rate the engine is calibrated for (Hz)
///
/// All frame/hop sizes, the Stage-A super-frame length and the Rayleigh
/// tempo prior are expressed relative to this rate.
pub const SAMPLE_RATE: u32 = 44100;

/// Beat tracking method used by the rhythm extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RhythmMethod {
    /// Six onset detection functions decoded independently, winner chosen
    /// by maximum mutual agreement (default)
    MultiFeature,
    /// Single complex-domain ODF decoded once; confidence is always 0
    Degara,
}

/// Analysis configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    // Decoder tempo window
    /// Slowest tempo the decoders may report (default: 40.0 BPM)
    pub min_tempo: f32,

    /// Fastest tempo the decoders may report (default: 208.0 BPM)
    pub max_tempo: f32,

    /// Beat tracking method (default: MultiFeature)
    pub method: RhythmMethod,

    // Multi-feature orchestration
    /// Enable the extended candidate sweep (pairwise ODF sums × 9 tempo
    /// windows). Much slower, wider candidate pool. (default: false)
    pub extended: bool,

    /// Worker threads for the extended sweep (default: 12)
    pub max_workers: usize,

    /// Ticks earlier than this are ignored when scoring agreement (default: 5.0 s)
    pub min_tick_time: f32,

    /// Seed for the Stage-A tie-break dither. `None` uses the deterministic
    /// smallest-index rule. (default: None)
    pub dither_seed: Option<u64>,

    // Chart post-processing
    /// Run the tick post-processor on the extracted grid (default: false)
    pub post_process: bool,

    /// Lower bound of the chart tempo range (default: 100.0 BPM)
    pub target_min_bpm: f32,

    /// Upper bound of the chart tempo range (default: 200.0 BPM)
    pub target_max_bpm: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_tempo: 40.0,
            max_tempo: 208.0,
            method: RhythmMethod::MultiFeature,
            extended: false,
            max_workers: 12,
            min_tick_time: 5.0,
            dither_seed: None,
            post_process: false,
            target_min_bpm: 100.0,
            target_max_bpm: 200.0,
        }
    }
}
