//! Maximum-agreement selection among candidate beat sequences
//!
//! Every candidate is compared with every other through the information gain
//! of their beat-error histogram: if two sequences agree, the normalised
//! timing errors of one against the other pile up in a few histogram bins
//! (low entropy, high gain). The candidate with the highest mean gain against
//! the rest wins; the mean of all pairwise gains is the confidence.
//!
//! # Algorithm
//!
//! For reference sequence `i` and compared sequence `j`:
//! 1. Each tick of `j` is matched to its nearest tick of `i`
//! 2. The error is divided by the inter-tick interval of `i` on the side the
//!    error falls, giving a value in [-0.5, 0.5]
//! 3. Errors are counted in 40 circular bins (41 bin centres spanning
//!    [-0.5, 0.5], the last folded onto the first)
//! 4. `gain = log2(40) - entropy` (bits)
//!
//! # Reference
//!
//! Zapata, J. R., Davies, M. E. P., & Gómez, E. (2014). Multi-Feature Beat
//! Tracking. *IEEE/ACM Transactions on Audio, Speech, and Language
//! Processing*, 22(4), 816-825.
//!
//! # Example
//!
//! ```
//! use tempo_grid::analysis::agreement::TempoTapMaxAgreement;
//!
//! let steady: Vec<f32> = (0..40).map(|i| i as f32 * 0.5).collect();
//! let shifted: Vec<f32> = steady.iter().map(|t| t + 0.01).collect();
//! let (confidence, winner) = TempoTapMaxAgreement::new(5.0).compute(&[steady, shifted])?;
//! assert!(confidence > 3.0);
//! assert!(winner.is_some());
//! # Ok::<(), tempo_grid::AnalysisError>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Number of circular histogram bins
const HISTOGRAM_BINS: usize = 40;

/// A candidate beat sequence tagged with its origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickCandidate {
    /// Originating method and tempo window, e.g. `"complex"` or `"rms+flux@80-120"`
    pub label: String,

    /// Beat times in seconds, strictly increasing
    pub ticks: Vec<f32>,
}

impl TickCandidate {
    /// Create a candidate
    pub fn new(label: impl Into<String>, ticks: Vec<f32>) -> Self {
        Self {
            label: label.into(),
            ticks,
        }
    }
}

/// Outcome of an agreement selection
#[derive(Debug, Clone, PartialEq)]
pub struct Agreement {
    /// Index of the selected candidate (`None` when there were no candidates)
    pub winner: Option<usize>,

    /// Mean pairwise information gain (0 with fewer than two candidates)
    pub confidence: f32,

    /// Mean information gain of each candidate against the others
    pub scores: Vec<f32>,
}

/// Maximum-agreement selector
#[derive(Debug, Clone)]
pub struct TempoTapMaxAgreement {
    min_tick_time: f32,
}

impl Default for TempoTapMaxAgreement {
    fn default() -> Self {
        Self::new(5.0)
    }
}

impl TempoTapMaxAgreement {
    /// Create a selector ignoring ticks before `min_tick_time` seconds
    pub fn new(min_tick_time: f32) -> Self {
        Self {
            min_tick_time: min_tick_time.max(0.0),
        }
    }

    /// Select the candidate that agrees most with the others
    ///
    /// # Returns
    ///
    /// `(confidence, winner)`. With no candidates: `(0.0, None)`. With one
    /// candidate: `(0.0, Some(candidate))` unchanged. Otherwise the winner's
    /// full tick sequence, including ticks before `min_tick_time`.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidInput` if any sequence is not strictly
    /// increasing and non-negative.
    pub fn compute(&self, candidates: &[Vec<f32>]) -> Result<(f32, Option<Vec<f32>>), AnalysisError> {
        let views: Vec<&[f32]> = candidates.iter().map(Vec::as_slice).collect();
        let agreement = self.select(&views)?;
        Ok((
            agreement.confidence,
            agreement.winner.map(|i| candidates[i].clone()),
        ))
    }

    /// Select among labelled candidates
    ///
    /// Same scoring as [`compute`](Self::compute), returning the full
    /// [`Agreement`] so callers can report which method won.
    pub fn compute_labelled(&self, candidates: &[TickCandidate]) -> Result<Agreement, AnalysisError> {
        let views: Vec<&[f32]> = candidates.iter().map(|c| c.ticks.as_slice()).collect();
        self.select(&views)
    }

    fn select(&self, candidates: &[&[f32]]) -> Result<Agreement, AnalysisError> {
        for (i, ticks) in candidates.iter().enumerate() {
            validate_ticks(ticks).map_err(|e| {
                AnalysisError::InvalidInput(format!("Candidate {}: {}", i, e))
            })?;
        }

        match candidates.len() {
            0 => {
                return Ok(Agreement {
                    winner: None,
                    confidence: 0.0,
                    scores: Vec::new(),
                })
            }
            1 => {
                return Ok(Agreement {
                    winner: Some(0),
                    confidence: 0.0,
                    scores: vec![0.0],
                })
            }
            _ => {}
        }

        let n = candidates.len();
        let trimmed: Vec<&[f32]> = candidates
            .iter()
            .map(|ticks| {
                let first = ticks.partition_point(|&t| t < self.min_tick_time);
                &ticks[first..]
            })
            .collect();

        log::debug!(
            "Agreement: {} candidates, ticks before {:.1}s ignored",
            n,
            self.min_tick_time
        );

        let mut pair = vec![vec![0.0f32; n]; n];
        let mut pair_sum = 0.0f32;
        for i in 0..n {
            for j in (i + 1)..n {
                let score = information_gain(trimmed[i], trimmed[j])
                    .max(information_gain(trimmed[j], trimmed[i]));
                pair[i][j] = score;
                pair[j][i] = score;
                pair_sum += score;
            }
        }

        let scores: Vec<f32> = (0..n)
            .map(|i| pair[i].iter().sum::<f32>() / (n - 1) as f32)
            .collect();

        let mut winner = 0;
        for (i, &s) in scores.iter().enumerate() {
            if s > scores[winner] {
                winner = i;
            }
        }
        let confidence = pair_sum / (n * (n - 1) / 2) as f32;

        log::debug!(
            "Agreement: winner {} (score {:.3}), confidence {:.3}",
            winner,
            scores[winner],
            confidence
        );

        Ok(Agreement {
            winner: Some(winner),
            confidence,
            scores,
        })
    }
}

/// Check a tick sequence is non-negative, finite and strictly increasing
pub fn validate_ticks(ticks: &[f32]) -> Result<(), String> {
    if let Some(pos) = ticks.iter().position(|&t| !t.is_finite() || t < 0.0) {
        return Err(format!("tick {} is negative or non-finite ({})", pos, ticks[pos]));
    }
    if let Some(pos) = ticks.windows(2).position(|w| w[1] <= w[0]) {
        return Err(format!(
            "ticks not strictly increasing at {} ({} then {})",
            pos,
            ticks[pos],
            ticks[pos + 1]
        ));
    }
    Ok(())
}

/// Information gain of `other`'s beat errors measured against `reference`
///
/// Returns 0 when either sequence has fewer than two ticks.
pub fn information_gain(reference: &[f32], other: &[f32]) -> f32 {
    if reference.len() < 2 || other.len() < 2 {
        return 0.0;
    }

    let mut histogram = [0usize; HISTOGRAM_BINS];
    for &t in other {
        let error = normalized_error(reference, t);
        let bin = ((error + 0.5) * HISTOGRAM_BINS as f32).round() as usize;
        histogram[bin.min(HISTOGRAM_BINS) % HISTOGRAM_BINS] += 1;
    }

    let total = other.len() as f32;
    let entropy: f32 = histogram
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f32 / total;
            -p * p.log2()
        })
        .sum();

    (HISTOGRAM_BINS as f32).log2() - entropy
}

/// Error of `t` against its nearest reference tick, in units of the local
/// reference interval, clamped to [-0.5, 0.5]
fn normalized_error(reference: &[f32], t: f32) -> f32 {
    let n = reference.len();
    let after = reference.partition_point(|&r| r < t);
    let nearest = if after == 0 {
        0
    } else if after == n {
        n - 1
    } else if t - reference[after - 1] <= reference[after] - t {
        after - 1
    } else {
        after
    };

    let error = t - reference[nearest];
    let interval = if error >= 0.0 {
        if nearest + 1 < n {
            reference[nearest + 1] - reference[nearest]
        } else {
            reference[nearest] - reference[nearest - 1]
        }
    } else if nearest > 0 {
        reference[nearest] - reference[nearest - 1]
    } else {
        reference[1] - reference[0]
    };

    (error / interval).clamp(-0.5, 0.5)
}
