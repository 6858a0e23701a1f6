//! Multi-feature beat tracking
//!
//! Runs several onset detection functions through independent tempo tappers
//! and keeps the beat sequence the others agree with most.
//!
//! # Pipelines
//!
//! | ODF              | Frame / hop | Decoding      |
//! |------------------|-------------|---------------|
//! | RMS              | 2048 / 1024 | 2× upsampled  |
//! | Complex domain   | 2048 / 1024 | 2× upsampled  |
//! | Mel flux         | 2048 / 1024 | 2× upsampled  |
//! | SuperFlux        | 2048 / 512  | native        |
//! | Information gain | 2048 / 512  | native        |
//! | Beat emphasis    | 2048 / 512  | native        |
//!
//! The three 1024-hop ODFs share one spectral pass, as do the three 512-hop
//! ones. Each decoded sequence is smoothed with a 5-tick centred moving
//! average before scoring.
//!
//! In extended mode the candidate pool also covers pairwise sums of the
//! max-normalised ODFs, and every ODF is additionally decoded inside nine
//! 40-BPM tempo windows starting at 60, 80, ..., 220 BPM. Candidates faster
//! than 250 BPM are dropped. The sweep runs on a dedicated pool of
//! `max_workers` threads. Windowed candidates often lock onto half or double
//! the tempo and still agree almost perfectly with the true grid, so they
//! only vote: the winner is always one of the six full-window candidates.
//!
//! # Reference
//!
//! Zapata, J. R., Davies, M. E. P., & Gómez, E. (2014). Multi-Feature Beat
//! Tracking. *IEEE/ACM Transactions on Audio, Speech, and Language
//! Processing*, 22(4), 816-825.

use rayon::prelude::*;

use super::agreement::{TempoTapMaxAgreement, TickCandidate};
use crate::config::{AnalysisConfig, SAMPLE_RATE};
use crate::error::AnalysisError;
use crate::features::beat_tracking::{Resample, TempoTap, TempoTapConfig};
use crate::features::onset::{compute_odfs, OnsetMethod};
use crate::math::{centered_moving_average, normalize_max, upsample_linear};

/// FFT frame size shared by every pipeline
const FRAME_SIZE: usize = 2048;

/// Hop of the coarse ODFs
const COARSE_HOP: usize = 1024;

/// Hop of the fine ODFs
const FINE_HOP: usize = 512;

/// Tick smoothing window (ticks)
const SMOOTHING_WINDOW: usize = 5;

/// Extended sweep: first window's lower bound, step and width (BPM)
const SWEEP_START: f32 = 60.0;
const SWEEP_STEP: f32 = 20.0;
const SWEEP_WIDTH: f32 = 40.0;
const SWEEP_WINDOWS: usize = 9;

/// Extended sweep: fastest admissible candidate (BPM)
const MAX_CANDIDATE_BPM: f32 = 250.0;

const COARSE_METHODS: [OnsetMethod; 3] = [OnsetMethod::Rms, OnsetMethod::ComplexDomain, OnsetMethod::MelFlux];
const FINE_METHODS: [OnsetMethod; 3] = [OnsetMethod::SuperFlux, OnsetMethod::Infogain, OnsetMethod::BeatEmphasis];

/// Multi-feature tracker configuration
#[derive(Debug, Clone, PartialEq)]
pub struct MultiFeatureConfig {
    /// Slowest admissible tempo (BPM)
    pub min_tempo: f32,

    /// Fastest admissible tempo (BPM)
    pub max_tempo: f32,

    /// Enable the extended candidate sweep
    pub extended: bool,

    /// Threads for the extended sweep
    pub max_workers: usize,

    /// Ticks before this time are ignored by agreement scoring (seconds)
    pub min_tick_time: f32,

    /// Seed for the period tracker's tie-breaking dither
    pub dither_seed: Option<u64>,
}

impl Default for MultiFeatureConfig {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

impl From<&AnalysisConfig> for MultiFeatureConfig {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            min_tempo: config.min_tempo,
            max_tempo: config.max_tempo,
            extended: config.extended,
            max_workers: config.max_workers,
            min_tick_time: config.min_tick_time,
            dither_seed: config.dither_seed,
        }
    }
}

/// Output of the multi-feature tracker
#[derive(Debug, Clone, PartialEq)]
pub struct MultiFeatureResult {
    /// Selected beat times (seconds)
    pub ticks: Vec<f32>,

    /// Mean pairwise agreement of all candidates
    pub confidence: f32,

    /// Label of the selected candidate (empty when nothing was selected)
    pub method: String,

    /// Number of candidates scored
    pub candidates_evaluated: usize,
}

/// One ODF ready for decoding
#[derive(Debug, Clone)]
struct Pipeline {
    label: String,
    odf: Vec<f32>,
    odf_rate: f32,
    resample: Resample,
}

/// One decoding job: a pipeline inside a tempo window
struct Job<'a> {
    pipeline: &'a Pipeline,
    min_tempo: f32,
    max_tempo: f32,
    label: String,
    /// Whether the decoded sequence may be selected (windowed sweep
    /// candidates only vote)
    eligible: bool,
}

impl<'a> Job<'a> {
    fn full_window(pipeline: &'a Pipeline, config: &MultiFeatureConfig) -> Self {
        Self {
            pipeline,
            min_tempo: config.min_tempo,
            max_tempo: config.max_tempo,
            label: pipeline.label.clone(),
            eligible: true,
        }
    }
}

/// Multi-feature beat tracker
#[derive(Debug, Clone, Default)]
pub struct BeatTrackerMultiFeature {
    config: MultiFeatureConfig,
}

impl BeatTrackerMultiFeature {
    /// Create a tracker
    pub fn new(config: MultiFeatureConfig) -> Self {
        Self { config }
    }

    /// Track beats
    ///
    /// # Arguments
    ///
    /// * `signal` - Mono samples at 44.1 kHz
    /// * `progress` - Observational progress callback `(stage, percent)`
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError` if any pipeline fails or the worker pool
    /// cannot be built.
    pub fn compute(
        &self,
        signal: &[f32],
        progress: &(dyn Fn(&str, u8) + Sync),
    ) -> Result<MultiFeatureResult, AnalysisError> {
        log::debug!(
            "Multi-feature tracking: {} samples, extended={}",
            signal.len(),
            self.config.extended
        );

        progress("onset detection", 0);
        let pipelines = self.pipelines(signal)?;

        progress("tempo tapping", 30);
        let (candidates, eligible) = if self.config.extended {
            self.extended_candidates(&pipelines)?
        } else {
            let jobs: Vec<Job> = pipelines
                .iter()
                .map(|p| Job::full_window(p, &self.config))
                .collect();
            (self.run_jobs(&jobs)?, vec![true; jobs.len()])
        };

        // All producers have joined at this point
        progress("agreement", 90);
        let agreement = TempoTapMaxAgreement::new(self.config.min_tick_time).compute_labelled(&candidates)?;
        let winner = select_eligible(&agreement.scores, &eligible).or(agreement.winner);

        let (ticks, method) = match winner {
            Some(i) => (candidates[i].ticks.clone(), candidates[i].label.clone()),
            None => (Vec::new(), String::new()),
        };

        log::debug!(
            "Multi-feature tracking done: {} candidates, winner '{}' with {} ticks, confidence {:.3}",
            candidates.len(),
            method,
            ticks.len(),
            agreement.confidence
        );
        progress("beat tracking", 100);

        Ok(MultiFeatureResult {
            ticks,
            confidence: agreement.confidence,
            method,
            candidates_evaluated: candidates.len(),
        })
    }

    /// Compute the six ODFs, two spectral passes in parallel
    fn pipelines(&self, signal: &[f32]) -> Result<Vec<Pipeline>, AnalysisError> {
        let (coarse, fine) = rayon::join(
            || compute_odfs(signal, &COARSE_METHODS, FRAME_SIZE, COARSE_HOP),
            || compute_odfs(signal, &FINE_METHODS, FRAME_SIZE, FINE_HOP),
        );
        let (coarse, fine) = (coarse?, fine?);

        let mut pipelines = Vec::with_capacity(COARSE_METHODS.len() + FINE_METHODS.len());
        for (method, odf) in COARSE_METHODS.iter().zip(coarse) {
            pipelines.push(Pipeline {
                label: method.name().to_string(),
                odf,
                odf_rate: SAMPLE_RATE as f32 / COARSE_HOP as f32,
                resample: Resample::X2,
            });
        }
        for (method, odf) in FINE_METHODS.iter().zip(fine) {
            pipelines.push(Pipeline {
                label: method.name().to_string(),
                odf,
                odf_rate: SAMPLE_RATE as f32 / FINE_HOP as f32,
                resample: Resample::None,
            });
        }
        Ok(pipelines)
    }

    /// Decode every job in parallel; output order follows `jobs`
    fn run_jobs(&self, jobs: &[Job]) -> Result<Vec<TickCandidate>, AnalysisError> {
        jobs.par_iter()
            .map(|job| {
                let tap = TempoTap::new(TempoTapConfig {
                    min_tempo: job.min_tempo,
                    max_tempo: job.max_tempo,
                    odf_rate: job.pipeline.odf_rate,
                    resample: job.pipeline.resample,
                    dither_seed: self.config.dither_seed,
                });
                let ticks = tap.compute(&job.pipeline.odf)?;
                Ok(TickCandidate::new(
                    job.label.clone(),
                    centered_moving_average(&ticks, SMOOTHING_WINDOW),
                ))
            })
            .collect()
    }

    /// Full-window jobs for the base ODFs, then every sweep ODF in every
    /// tempo window
    fn extended_jobs<'a>(&self, base: &'a [Pipeline], sweep: &'a [Pipeline]) -> Vec<Job<'a>> {
        let mut jobs: Vec<Job> = base.iter().map(|p| Job::full_window(p, &self.config)).collect();
        for p in sweep {
            for k in 0..SWEEP_WINDOWS {
                let low = SWEEP_START + SWEEP_STEP * k as f32;
                let high = low + SWEEP_WIDTH;
                jobs.push(Job {
                    pipeline: p,
                    min_tempo: low,
                    max_tempo: high,
                    label: format!("{}@{}-{}", p.label, low, high),
                    eligible: false,
                });
            }
        }
        jobs
    }

    /// Candidate sweep over summed ODFs and tempo windows
    ///
    /// Returns the candidates and, per candidate, whether it may be selected.
    fn extended_candidates(&self, base: &[Pipeline]) -> Result<(Vec<TickCandidate>, Vec<bool>), AnalysisError> {
        let sweep = sweep_pipelines(base);
        let jobs = self.extended_jobs(base, &sweep);

        log::debug!(
            "Extended sweep: {} jobs on {} workers",
            jobs.len(),
            self.config.max_workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers.max(1))
            .build()
            .map_err(|e| AnalysisError::ProcessingError(format!("Failed to build worker pool: {}", e)))?;
        let candidates = pool.install(|| self.run_jobs(&jobs))?;

        let before = candidates.len();
        let (kept, eligible): (Vec<TickCandidate>, Vec<bool>) = candidates
            .into_iter()
            .zip(jobs.iter().map(|job| job.eligible))
            .filter(|(c, _)| mean_bpm(&c.ticks) <= MAX_CANDIDATE_BPM)
            .unzip();
        if kept.len() < before {
            log::debug!("Extended sweep: dropped {} candidates above {} BPM", before - kept.len(), MAX_CANDIDATE_BPM);
        }
        Ok((kept, eligible))
    }
}

/// Base ODFs brought to the fine rate and max-normalised, followed by every
/// pairwise sum
fn sweep_pipelines(base: &[Pipeline]) -> Vec<Pipeline> {
    let mut aligned: Vec<Pipeline> = base
        .iter()
        .map(|p| {
            let mut odf = upsample_linear(&p.odf, p.resample.factor());
            normalize_max(&mut odf);
            Pipeline {
                label: p.label.clone(),
                odf,
                odf_rate: p.odf_rate * p.resample.factor() as f32,
                resample: Resample::None,
            }
        })
        .collect();
    let common_len = aligned.iter().map(|p| p.odf.len()).min().unwrap_or(0);
    for p in aligned.iter_mut() {
        p.odf.truncate(common_len);
    }

    let mut summed = Vec::new();
    for i in 0..aligned.len() {
        for j in (i + 1)..aligned.len() {
            let odf = aligned[i]
                .odf
                .iter()
                .zip(aligned[j].odf.iter())
                .map(|(a, b)| a + b)
                .collect();
            summed.push(Pipeline {
                label: format!("{}+{}", aligned[i].label, aligned[j].label),
                odf,
                odf_rate: aligned[i].odf_rate,
                resample: Resample::None,
            });
        }
    }

    aligned.extend(summed);
    aligned
}

/// Highest-scoring eligible candidate, first occurrence on ties
///
/// Windowed sweep candidates decoded at half or double the tempo agree almost
/// perfectly with the full-window grid, so they only contribute to the
/// scores.
fn select_eligible(scores: &[f32], eligible: &[bool]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, (&score, &ok)) in scores.iter().zip(eligible).enumerate() {
        if ok && best.map_or(true, |b| score > scores[b]) {
            best = Some(i);
        }
    }
    best
}

/// Mean tempo implied by a tick sequence (0 with fewer than two ticks)
fn mean_bpm(ticks: &[f32]) -> f32 {
    match (ticks.first(), ticks.last()) {
        (Some(&first), Some(&last)) if ticks.len() >= 2 && last > first => {
            60.0 * (ticks.len() - 1) as f32 / (last - first)
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click_track(bpm: f32, seconds: f32) -> Vec<f32> {
        let sr = SAMPLE_RATE as f32;
        let n = (seconds * sr) as usize;
        let period = 60.0 / bpm * sr;
        let mut signal = vec![0.0f32; n];
        let mut beat = 0.0f32;
        while (beat as usize) < n {
            let start = beat as usize;
            for k in 0..1500.min(n - start) {
                let t = k as f32 / sr;
                signal[start + k] += (2.0 * std::f32::consts::PI * 1000.0 * t).sin() * (-t * 60.0).exp();
            }
            beat += period;
        }
        signal
    }

    #[test]
    fn test_mean_bpm() {
        assert_eq!(mean_bpm(&[]), 0.0);
        assert_eq!(mean_bpm(&[1.0]), 0.0);
        assert!((mean_bpm(&[0.0, 0.5, 1.0, 1.5]) - 120.0).abs() < 1e-4);
    }

    #[test]
    fn test_click_track_candidates_agree() {
        let signal = click_track(120.0, 20.0);
        let tracker = BeatTrackerMultiFeature::default();
        let result = tracker.compute(&signal, &|_, _| {}).unwrap();

        assert_eq!(result.candidates_evaluated, 6);
        assert!(!result.method.is_empty());
        assert!(result.ticks.len() > 20);
        assert!(result.ticks.windows(2).all(|w| w[1] > w[0]));
        assert!(result.confidence > 1.0, "Confidence {}", result.confidence);
        let bpm = mean_bpm(&result.ticks);
        assert!((bpm - 120.0).abs() < 2.0, "Mean BPM {}", bpm);
    }

    #[test]
    fn test_progress_reported() {
        use std::sync::Mutex;
        let stages = Mutex::new(Vec::new());
        let signal = click_track(100.0, 8.0);
        BeatTrackerMultiFeature::default()
            .compute(&signal, &|stage, pct| {
                if let Ok(mut s) = stages.lock() {
                    s.push((stage.to_string(), pct));
                }
            })
            .unwrap();
        let stages = stages.into_inner().unwrap();
        assert_eq!(stages.first().map(|s| s.1), Some(0));
        assert_eq!(stages.last().map(|s| s.1), Some(100));
    }

    fn impulse_pipeline(label: &str, len: usize, odf_rate: f32, resample: Resample) -> Pipeline {
        let period = (0.5 * odf_rate).round() as usize;
        let odf = (0..len).map(|i| if i % period == 0 { 1.0 } else { 0.0 }).collect();
        Pipeline {
            label: label.to_string(),
            odf,
            odf_rate,
            resample,
        }
    }

    #[test]
    fn test_extended_job_layout() {
        let coarse_rate = SAMPLE_RATE as f32 / COARSE_HOP as f32;
        let fine_rate = SAMPLE_RATE as f32 / FINE_HOP as f32;
        let mut base = Vec::new();
        for label in ["rms", "complex", "melflux"] {
            base.push(impulse_pipeline(label, 400, coarse_rate, Resample::X2));
        }
        for label in ["superflux", "infogain", "beat_emphasis"] {
            base.push(impulse_pipeline(label, 801, fine_rate, Resample::None));
        }

        let sweep = sweep_pipelines(&base);
        assert_eq!(sweep.len(), 6 + 15);
        let len = sweep[0].odf.len();
        for p in &sweep {
            assert_eq!(p.odf.len(), len, "{} not aligned", p.label);
            assert!((p.odf_rate - fine_rate).abs() < 1e-3);
            assert_eq!(p.resample, Resample::None);
        }
        assert_eq!(sweep[6].label, "rms+complex");
        let peak = sweep[6].odf.iter().copied().fold(0.0f32, f32::max);
        assert!((peak - 2.0).abs() < 1e-5, "Sum of normalised ODFs peaks at {}", peak);

        let tracker = BeatTrackerMultiFeature::new(MultiFeatureConfig {
            extended: true,
            ..MultiFeatureConfig::default()
        });
        let jobs = tracker.extended_jobs(&base, &sweep);
        assert_eq!(jobs.len(), 195);
        assert_eq!(jobs.iter().filter(|j| j.eligible).count(), 6);
        assert!(jobs[..6].iter().all(|j| j.eligible && j.min_tempo == 40.0 && j.max_tempo == 208.0));
        assert_eq!(jobs[6].label, "rms@60-100");
        assert_eq!(jobs[14].label, "rms@220-260");
    }

    #[test]
    fn test_select_eligible() {
        let scores = [3.0, 5.0, 4.0, 4.0];
        assert_eq!(select_eligible(&scores, &[true, false, true, true]), Some(2));
        assert_eq!(select_eligible(&scores, &[true; 4]), Some(1));
        assert_eq!(select_eligible(&scores, &[false; 4]), None);
        assert_eq!(select_eligible(&[], &[]), None);
    }

    #[test]
    fn test_extended_click_track() {
        let signal = click_track(120.0, 15.0);
        let tracker = BeatTrackerMultiFeature::new(MultiFeatureConfig {
            extended: true,
            max_workers: 4,
            ..MultiFeatureConfig::default()
        });

        let pipelines = tracker.pipelines(&signal).unwrap();
        let (candidates, eligible) = tracker.extended_candidates(&pipelines).unwrap();
        assert_eq!(candidates.len(), eligible.len());
        assert!(candidates.len() <= 195 && candidates.len() > 6);
        assert_eq!(eligible.iter().filter(|&&e| e).count(), 6);
        for c in &candidates {
            let bpm = mean_bpm(&c.ticks);
            assert!(bpm <= MAX_CANDIDATE_BPM, "{} kept at {} BPM", c.label, bpm);
        }

        let result = tracker.compute(&signal, &|_, _| {}).unwrap();
        assert_eq!(result.candidates_evaluated, candidates.len());
        assert!(!result.method.contains('@'), "Windowed candidate selected: {}", result.method);
        let bpm = mean_bpm(&result.ticks);
        assert!((bpm - 120.0).abs() < 2.0, "Extended mode gave {} BPM", bpm);
    }

    #[test]
    fn test_silence_gives_empty_ticks() {
        let signal = vec![0.0f32; 44100 * 3];
        let result = BeatTrackerMultiFeature::default().compute(&signal, &|_, _| {}).unwrap();
        assert!(result.ticks.is_empty());
        assert_eq!(result.confidence, 0.0);
    }
}
