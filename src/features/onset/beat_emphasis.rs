//! Beat-emphasis onset detection
//!
//! A whole-track detector that favours periodic sub-band activity:
//!
//! 1. Per-bin complex-domain deviation, integrated into 40 ERB bands
//! 2. Each band scaled to unit variance, then its 15-sample local mean
//!    subtracted and the result half-wave rectified
//! 3. Band salience: peak of the Rayleigh-weighted comb filterbank over the
//!    band's unbiased autocorrelation
//! 4. The most salient 40% of bands are summed frame by frame
//!
//! # Reference
//!
//! Davies, M. E. P., Plumbley, M. D., & Eck, D. (2009). Towards a musical
//! beat emphasis function. *IEEE Workshop on Applications of Signal
//! Processing to Audio and Acoustics (WASPAA)*.

use super::complex::PhaseHistory;
use super::GlobalOnsetDetector;
use crate::config::SAMPLE_RATE;
use crate::features::period::autocorrelation::unbiased_autocorrelation;
use crate::features::period::comb_filter::{comb_filterbank, tempo_preference, REFERENCE_ODF_RATE};
use crate::features::spectral::bands::FilterBank;
use crate::features::spectral::Spectrum;
use crate::math::{adaptive_threshold, std_dev, EPSILON};

/// Number of ERB bands
const ERB_BANDS: usize = 40;

/// Lowest ERB band edge (Hz)
const MIN_FREQUENCY: f32 = 50.0;

/// Fraction of bands kept after salience ranking
const KEEP_FRACTION: f32 = 0.4;

/// Half-width of the local mean removed from each band (15 samples total)
const SMOOTHING_HALF_WINDOW: usize = 7;

/// Period indices scored at the reference ODF rate
const REFERENCE_PERIODS: usize = 128;

/// Beat-emphasis detector
#[derive(Debug, Clone)]
pub struct BeatEmphasis {
    odf_rate: f32,
    history: PhaseHistory,
    bank: Option<FilterBank>,
    bands: Vec<Vec<f32>>,
}

impl BeatEmphasis {
    /// Create a detector for an ODF sampled at `odf_rate` Hz
    pub fn new(odf_rate: f32) -> Self {
        Self {
            odf_rate,
            history: PhaseHistory::default(),
            bank: None,
            bands: vec![Vec::new(); ERB_BANDS],
        }
    }

    /// Salience of one preprocessed band track
    fn salience(&self, band: &[f32]) -> f32 {
        let periods = ((REFERENCE_PERIODS as f32 * self.odf_rate / REFERENCE_ODF_RATE).round()
            as usize)
            .max(1);
        let weights = tempo_preference(periods, self.odf_rate);
        let acf = unbiased_autocorrelation(band);
        comb_filterbank(&acf, &weights)
            .into_iter()
            .fold(0.0f32, f32::max)
    }
}

impl GlobalOnsetDetector for BeatEmphasis {
    fn push(&mut self, spectrum: &Spectrum) {
        let n_bins = spectrum.len();
        let energies = if n_bins == 0 {
            vec![0.0; ERB_BANDS]
        } else {
            let bank = self.bank.get_or_insert_with(|| {
                FilterBank::erb(ERB_BANDS, n_bins, SAMPLE_RATE, MIN_FREQUENCY, SAMPLE_RATE as f32 / 2.0)
            });
            bank.energies(&self.history.complex_deviation(spectrum))
        };
        for (track, e) in self.bands.iter_mut().zip(energies) {
            track.push(e);
        }
    }

    fn finish(&mut self) -> Vec<f32> {
        let mut bands = std::mem::replace(&mut self.bands, vec![Vec::new(); ERB_BANDS]);
        self.history.reset();
        let n_frames = bands.first().map_or(0, Vec::len);
        if n_frames == 0 {
            return Vec::new();
        }

        for band in bands.iter_mut() {
            let sd = std_dev(band);
            if sd > EPSILON {
                band.iter_mut().for_each(|v| *v /= sd);
            }
            adaptive_threshold(band, SMOOTHING_HALF_WINDOW);
        }

        let mut ranked: Vec<(usize, f32)> = bands
            .iter()
            .enumerate()
            .map(|(i, band)| (i, self.salience(band)))
            .collect();
        // Stable: equal salience keeps the lower band first
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let keep = ((ERB_BANDS as f32 * KEEP_FRACTION).ceil() as usize).min(ranked.len());
        let mut odf = vec![0.0f32; n_frames];
        for &(band_index, _) in &ranked[..keep] {
            for (out, &v) in odf.iter_mut().zip(bands[band_index].iter()) {
                *out += v;
            }
        }

        log::debug!(
            "Beat emphasis: {} frames, kept {} of {} bands",
            n_frames,
            keep,
            ERB_BANDS
        );
        odf
    }

    fn reset(&mut self) {
        self.history.reset();
        self.bands = vec![Vec::new(); ERB_BANDS];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::spectral::spectra;

    fn click_track(bpm: f32, seconds: f32) -> Vec<f32> {
        let n = (seconds * SAMPLE_RATE as f32) as usize;
        let period = (60.0 / bpm * SAMPLE_RATE as f32) as usize;
        let mut signal = vec![0.0f32; n];
        for start in (0..n).step_by(period) {
            for k in 0..200.min(n - start) {
                signal[start + k] = (1.0 - k as f32 / 200.0) * if k % 2 == 0 { 1.0 } else { -1.0 };
            }
        }
        signal
    }

    #[test]
    fn test_output_length_and_sign() {
        let signal = click_track(120.0, 6.0);
        let mut detector = BeatEmphasis::new(SAMPLE_RATE as f32 / 512.0);
        let mut frames = 0;
        for spectrum in spectra(&signal, 2048, 512) {
            detector.push(&spectrum);
            frames += 1;
        }
        let odf = detector.finish();
        assert_eq!(odf.len(), frames);
        assert!(odf.iter().all(|&v| v >= 0.0 && v.is_finite()));
        assert!(odf.iter().any(|&v| v > 0.0));
    }

    #[test]
    fn test_emphasises_clicks() {
        let signal = click_track(120.0, 6.0);
        let mut detector = BeatEmphasis::new(SAMPLE_RATE as f32 / 512.0);
        for spectrum in spectra(&signal, 2048, 512) {
            detector.push(&spectrum);
        }
        let odf = detector.finish();

        // Clicks every 0.5 s = every ~43 frames; frames near clicks dominate
        let hop_seconds = 512.0 / SAMPLE_RATE as f32;
        let near_click = |i: usize| {
            let t = i as f32 * hop_seconds;
            let phase = (t / 0.5).fract();
            phase < 0.05 || phase > 0.95
        };
        let on: f32 = odf.iter().enumerate().filter(|(i, _)| near_click(*i)).map(|(_, v)| v).sum();
        let off: f32 = odf.iter().enumerate().filter(|(i, _)| !near_click(*i)).map(|(_, v)| v).sum();
        assert!(on > off, "Energy near clicks {} should exceed the rest {}", on, off);
    }

    #[test]
    fn test_empty() {
        let mut detector = BeatEmphasis::new(86.13);
        assert!(detector.finish().is_empty());
    }
}
