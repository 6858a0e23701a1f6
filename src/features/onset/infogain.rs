//! Information-gain onset detection
//!
//! A whole-track detector. Around every frame an 11-frame neighbourhood is
//! split into an "old" half (the five preceding frames) and a "new" half (the
//! frame itself and the five following). Each half is reduced to a
//! triangularly weighted average spectrum, heavier towards the centre, and the
//! detection value is the summed positive log2 gain of new over old within
//! 40 Hz – 5 kHz.
//!
//! Track edges replicate the first and last frames.

use super::GlobalOnsetDetector;
use crate::config::SAMPLE_RATE;
use crate::features::spectral::Spectrum;

/// Frames on each side of the centre
const HALF_BUFFER: usize = 5;

/// Lowest analysed frequency (Hz)
const MIN_FREQUENCY: f32 = 40.0;

/// Highest analysed frequency (Hz)
const MAX_FREQUENCY: f32 = 5000.0;

/// Magnitude floor inside the log ratio
const MAGNITUDE_FLOOR: f32 = 1e-5;

/// Information-gain detector
#[derive(Debug, Clone, Default)]
pub struct Infogain {
    bin_range: Option<(usize, usize)>,
    frames: Vec<Vec<f32>>,
}

impl Infogain {
    /// Create an information-gain detector
    pub fn new() -> Self {
        Self::default()
    }

    fn bin_range(n_bins: usize) -> (usize, usize) {
        let bin_hz = SAMPLE_RATE as f32 / (2.0 * (n_bins.max(2) - 1) as f32);
        let lo = ((MIN_FREQUENCY / bin_hz).ceil() as usize).min(n_bins - 1);
        let hi = ((MAX_FREQUENCY / bin_hz).floor() as usize).clamp(lo, n_bins - 1);
        (lo, hi)
    }
}

/// Triangular weights 1..=n normalised to unit sum, largest first
fn falling_weights(n: usize) -> Vec<f32> {
    let total = (n * (n + 1) / 2) as f32;
    (0..n).map(|j| (n - j) as f32 / total).collect()
}

impl GlobalOnsetDetector for Infogain {
    fn push(&mut self, spectrum: &Spectrum) {
        if spectrum.is_empty() {
            self.frames.push(Vec::new());
            return;
        }
        let (lo, hi) = *self
            .bin_range
            .get_or_insert_with(|| Self::bin_range(spectrum.len()));
        self.frames.push(spectrum.magnitude[lo..=hi].to_vec());
    }

    fn finish(&mut self) -> Vec<f32> {
        let frames = std::mem::take(&mut self.frames);
        let n = frames.len();
        if n == 0 {
            return Vec::new();
        }
        let width = frames.iter().map(Vec::len).max().unwrap_or(0);

        // Old half: offsets 1..=5 back; new half: offsets 0..=5 forward.
        // Both weightings peak next to the centre.
        let old_weights = falling_weights(HALF_BUFFER);
        let new_weights = falling_weights(HALF_BUFFER + 1);

        let mut odf = Vec::with_capacity(n);
        let mut old = vec![0.0f32; width];
        let mut new = vec![0.0f32; width];
        for t in 0..n {
            old.iter_mut().for_each(|v| *v = 0.0);
            new.iter_mut().for_each(|v| *v = 0.0);

            for (j, &w) in old_weights.iter().enumerate() {
                let frame = &frames[t.saturating_sub(j + 1)];
                for (acc, &m) in old.iter_mut().zip(frame.iter()) {
                    *acc += w * m;
                }
            }
            for (j, &w) in new_weights.iter().enumerate() {
                let frame = &frames[(t + j).min(n - 1)];
                for (acc, &m) in new.iter_mut().zip(frame.iter()) {
                    *acc += w * m;
                }
            }

            let gain: f32 = new
                .iter()
                .zip(old.iter())
                .map(|(&a, &b)| ((a + MAGNITUDE_FLOOR) / (b + MAGNITUDE_FLOOR)).log2().max(0.0))
                .sum();
            odf.push(gain);
        }

        log::debug!("Infogain: {} frames, {} bins", n, width);
        odf
    }

    fn reset(&mut self) {
        self.frames.clear();
        self.bin_range = None;
    }
}
