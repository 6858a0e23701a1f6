//! Forward FFT producing magnitude and phase spectra

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::Spectrum;

/// Magnitude/phase spectrum analyzer for fixed-size real frames
///
/// Owns its FFT plan and scratch buffers. Each pipeline constructs its own
/// analyzer; instances are cheap to build and never shared across tasks.
pub struct SpectrumAnalyzer {
    size: usize,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer").field("size", &self.size).finish()
    }
}

impl SpectrumAnalyzer {
    /// Create an analyzer for frames of `size` samples
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size.max(1));
        let scratch_len = fft.get_inplace_scratch_len();
        Self {
            size,
            fft,
            buffer: vec![Complex::new(0.0, 0.0); size.max(1)],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        }
    }

    /// FFT size
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of bins in the returned spectrum (`size / 2 + 1`)
    pub fn bin_count(&self) -> usize {
        self.size / 2 + 1
    }

    /// Compute magnitude and phase of `frame`
    ///
    /// The frame is zero-extended or truncated to the analyzer size.
    pub fn compute(&mut self, frame: &[f32]) -> Spectrum {
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            *slot = Complex::new(frame.get(i).copied().unwrap_or(0.0), 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let bins = self.bin_count();
        let mut magnitude = Vec::with_capacity(bins);
        let mut phase = Vec::with_capacity(bins);
        for c in &self.buffer[..bins] {
            magnitude.push(c.norm());
            phase.push(c.im.atan2(c.re));
        }
        Spectrum { magnitude, phase }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_sinusoid_peak_bin() {
        let size = 1024;
        let bin = 32;
        let frame: Vec<f32> = (0..size)
            .map(|i| (2.0 * PI * bin as f32 * i as f32 / size as f32).sin())
            .collect();

        let mut analyzer = SpectrumAnalyzer::new(size);
        let spectrum = analyzer.compute(&frame);

        assert_eq!(spectrum.magnitude.len(), 513);
        assert_eq!(spectrum.phase.len(), 513);
        let peak = crate::math::argmax(&spectrum.magnitude).unwrap();
        assert_eq!(peak, bin);
        assert!((spectrum.magnitude[bin] - size as f32 / 2.0).abs() < 1.0);
    }

    #[test]
    fn test_silence() {
        let mut analyzer = SpectrumAnalyzer::new(256);
        let spectrum = analyzer.compute(&[0.0; 256]);
        assert!(spectrum.magnitude.iter().all(|&m| m == 0.0));
    }
}
