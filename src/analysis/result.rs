//! Analysis result types

use serde::{Deserialize, Serialize};

/// Tempo grid extracted from a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RhythmResult {
    /// Tempo estimate in BPM (0.0 when fewer than two beats were found)
    pub bpm: f32,

    /// Beat times in seconds, strictly increasing
    pub ticks: Vec<f32>,

    /// Mean pairwise agreement of the beat candidates, in bits
    /// (0.0 for single-candidate methods)
    pub confidence: f32,

    /// Tempo implied by each inter-beat interval (BPM)
    pub estimates: Vec<f32>,

    /// Inter-beat intervals (seconds)
    pub bpm_intervals: Vec<f32>,

    /// Label of the candidate the ticks came from
    pub method: String,

    /// Analysis metadata
    pub metadata: RhythmMetadata,
}

/// Analysis metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RhythmMetadata {
    /// Audio duration in seconds
    pub duration_seconds: f32,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Processing time in milliseconds
    pub processing_time_ms: f32,

    /// Number of candidate beat sequences scored
    pub candidates_evaluated: usize,

    /// Whether the tick post-processor rewrote the grid
    pub post_processed: bool,

    /// Crate version that produced the result
    pub algorithm_version: String,
}

impl Default for RhythmMetadata {
    fn default() -> Self {
        Self {
            duration_seconds: 0.0,
            sample_rate: crate::config::SAMPLE_RATE,
            processing_time_ms: 0.0,
            candidates_evaluated: 0,
            post_processed: false,
            algorithm_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_serializes() {
        let result = RhythmResult {
            bpm: 120.0,
            ticks: vec![0.5, 1.0, 1.5],
            confidence: 3.2,
            estimates: vec![120.0, 120.0],
            bpm_intervals: vec![0.5, 0.5],
            method: "complex".to_string(),
            metadata: RhythmMetadata::default(),
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"bpm_intervals\""));
        let back: RhythmResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_metadata_default() {
        let metadata = RhythmMetadata::default();
        assert_eq!(metadata.sample_rate, 44100);
        assert!(!metadata.algorithm_version.is_empty());
    }
}
