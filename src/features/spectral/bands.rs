//! Triangular filter banks over a magnitude spectrum
//!
//! Three frequency scales are used by the detectors:
//! - Mel (HTK formula) for the mel-flux detector
//! - ERB rate (Glasberg & Moore) for the beat-emphasis detector
//! - Log frequency (bands per octave) for the SuperFlux novelty detector
//!
//! All banks share one representation: for each band a start bin and a run
//! of weights. Band energy is the weighted sum of squared magnitudes.

/// A bank of triangular filters
#[derive(Debug, Clone)]
pub struct FilterBank {
    /// (first bin, weights) per band
    bands: Vec<(usize, Vec<f32>)>,
}

impl FilterBank {
    /// Build a bank from `n_bands + 2` ascending edge frequencies
    ///
    /// Band k rises from `edges[k]` to `edges[k+1]` and falls to `edges[k+2]`.
    /// Bands narrower than one bin collapse onto the nearest bin so that no
    /// band is empty.
    fn from_edges(edges_hz: &[f32], n_bins: usize, sample_rate: u32) -> Self {
        let bin_hz = sample_rate as f32 / (2.0 * (n_bins.max(2) - 1) as f32);
        let mut bands = Vec::with_capacity(edges_hz.len().saturating_sub(2));

        for w in edges_hz.windows(3) {
            let (lo, center, hi) = (w[0], w[1], w[2]);
            let first = ((lo / bin_hz).ceil() as usize).min(n_bins - 1);
            let last = ((hi / bin_hz).floor() as usize).min(n_bins - 1);

            let mut weights = Vec::new();
            if last >= first {
                for bin in first..=last {
                    let f = bin as f32 * bin_hz;
                    let weight = if f <= center {
                        if center > lo { (f - lo) / (center - lo) } else { 1.0 }
                    } else if hi > center {
                        (hi - f) / (hi - center)
                    } else {
                        1.0
                    };
                    weights.push(weight.max(0.0));
                }
            }

            if weights.iter().all(|&w| w <= 0.0) {
                let nearest = ((center / bin_hz).round() as usize).min(n_bins - 1);
                bands.push((nearest, vec![1.0]));
            } else {
                bands.push((first, weights));
            }
        }

        Self { bands }
    }

    /// Mel filter bank (HTK mel scale) between `low_hz` and `high_hz`
    pub fn mel(n_bands: usize, n_bins: usize, sample_rate: u32, low_hz: f32, high_hz: f32) -> Self {
        let to_mel = |f: f32| 2595.0 * (1.0 + f / 700.0).log10();
        let from_mel = |m: f32| 700.0 * (10f32.powf(m / 2595.0) - 1.0);
        let edges = spaced_edges(n_bands, to_mel(low_hz), to_mel(high_hz), from_mel);
        Self::from_edges(&edges, n_bins, sample_rate)
    }

    /// ERB-rate filter bank between `low_hz` and `high_hz`
    pub fn erb(n_bands: usize, n_bins: usize, sample_rate: u32, low_hz: f32, high_hz: f32) -> Self {
        let to_erb = |f: f32| 21.4 * (1.0 + 0.00437 * f).log10();
        let from_erb = |e: f32| (10f32.powf(e / 21.4) - 1.0) / 0.00437;
        let edges = spaced_edges(n_bands, to_erb(low_hz), to_erb(high_hz), from_erb);
        Self::from_edges(&edges, n_bins, sample_rate)
    }

    /// Log-frequency filter bank with `bands_per_octave` bands from
    /// `low_hz` up to `high_hz`
    pub fn log_frequency(
        bands_per_octave: usize,
        n_bins: usize,
        sample_rate: u32,
        low_hz: f32,
        high_hz: f32,
    ) -> Self {
        let octaves = (high_hz / low_hz).log2();
        let n_bands = ((octaves * bands_per_octave as f32).floor() as usize).saturating_sub(1).max(1);
        let to_log = |f: f32| f.log2();
        let from_log = |l: f32| 2f32.powf(l);
        let edges = spaced_edges(n_bands, to_log(low_hz), to_log(high_hz), from_log);
        Self::from_edges(&edges, n_bins, sample_rate)
    }

    /// Number of bands
    pub fn len(&self) -> usize {
        self.bands.len()
    }

    /// True when the bank has no bands
    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Weighted band energies of a magnitude spectrum
    pub fn energies(&self, magnitude: &[f32]) -> Vec<f32> {
        self.bands
            .iter()
            .map(|(first, weights)| {
                weights
                    .iter()
                    .enumerate()
                    .map(|(k, &w)| {
                        let m = magnitude.get(first + k).copied().unwrap_or(0.0);
                        w * m * m
                    })
                    .sum()
            })
            .collect()
    }
}

/// `n_bands + 2` edges equally spaced on a warped scale, mapped back to Hz
fn spaced_edges(n_bands: usize, lo: f32, hi: f32, unwarp: impl Fn(f32) -> f32) -> Vec<f32> {
    let n_edges = n_bands + 2;
    let step = (hi - lo) / (n_edges - 1) as f32;
    (0..n_edges).map(|i| unwarp(lo + step * i as f32)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mel_bank_band_count() {
        let bank = FilterBank::mel(40, 1025, 44100, 0.0, 22050.0);
        assert_eq!(bank.len(), 40);
        let energies = bank.energies(&vec![1.0; 1025]);
        assert!(energies.iter().all(|&e| e > 0.0), "No mel band may be empty");
    }

    #[test]
    fn test_erb_bank_band_count() {
        let bank = FilterBank::erb(40, 1025, 44100, 50.0, 22050.0);
        assert_eq!(bank.len(), 40);
        assert!(bank.energies(&vec![1.0; 1025]).iter().all(|&e| e > 0.0));
    }

    #[test]
    fn test_log_bank_responds_to_tone() {
        let bank = FilterBank::log_frequency(24, 1025, 44100, 27.5, 16000.0);
        assert!(bank.len() > 100);

        // Single-bin "tone" at bin 100 (~2153 Hz) excites only nearby bands
        let mut magnitude = vec![0.0; 1025];
        magnitude[100] = 1.0;
        let energies = bank.energies(&magnitude);
        let active = energies.iter().filter(|&&e| e > 0.0).count();
        assert!(active >= 1 && active <= 4, "Tone should excite few bands, got {}", active);
    }
}
