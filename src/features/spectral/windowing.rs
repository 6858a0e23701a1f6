//! Window functions applied to frames before the FFT

use std::f32::consts::PI;

/// Supported window shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    /// Hann (raised cosine), the default
    Hann,
    /// Hamming
    Hamming,
    /// Triangular (Bartlett without zero endpoints)
    Triangular,
    /// Rectangular
    Square,
    /// 4-term Blackman-Harris, 92 dB sidelobe rejection
    BlackmanHarris92,
}

/// Precomputed window with optional zero-padding and zero-phase reordering
#[derive(Debug, Clone)]
pub struct Windowing {
    window: Vec<f32>,
    zero_padding: usize,
    zero_phase: bool,
}

impl Windowing {
    /// Create a window of `size` samples
    ///
    /// # Arguments
    ///
    /// * `window_type` - Window shape
    /// * `size` - Frame size the window is applied to
    /// * `normalized` - Scale the window by `2 / sum(window)` so a full-scale
    ///   sinusoid keeps unit peak magnitude after the FFT
    pub fn new(window_type: WindowType, size: usize, normalized: bool) -> Self {
        let mut window: Vec<f32> = (0..size).map(|i| window_value(window_type, i, size)).collect();

        if normalized {
            let sum: f32 = window.iter().sum();
            if sum > 0.0 {
                let scale = 2.0 / sum;
                for w in &mut window {
                    *w *= scale;
                }
            }
        }

        Self {
            window,
            zero_padding: 0,
            zero_phase: false,
        }
    }

    /// Hann window, normalized, no padding
    pub fn hann(size: usize) -> Self {
        Self::new(WindowType::Hann, size, true)
    }

    /// Append `zeros` trailing zeros to every windowed frame
    pub fn with_zero_padding(mut self, zeros: usize) -> Self {
        self.zero_padding = zeros;
        self
    }

    /// Rotate the windowed frame so its second half comes first
    pub fn with_zero_phase(mut self, zero_phase: bool) -> Self {
        self.zero_phase = zero_phase;
        self
    }

    /// Length of the frames produced by [`Windowing::apply`]
    pub fn output_size(&self) -> usize {
        self.window.len() + self.zero_padding
    }

    /// Apply the window to `frame`
    ///
    /// Frames shorter than the window are treated as zero-extended; extra
    /// samples are ignored.
    pub fn apply(&self, frame: &[f32]) -> Vec<f32> {
        let size = self.window.len();
        let mut out = vec![0.0f32; size + self.zero_padding];

        if self.zero_phase {
            // [second half | zeros | first half]
            let half = size / 2;
            let total = out.len();
            for (i, &w) in self.window.iter().enumerate() {
                let x = frame.get(i).copied().unwrap_or(0.0) * w;
                let pos = if i < half { total - half + i } else { i - half };
                out[pos] = x;
            }
        } else {
            for (i, &w) in self.window.iter().enumerate() {
                out[i] = frame.get(i).copied().unwrap_or(0.0) * w;
            }
        }
        out
    }
}

fn window_value(window_type: WindowType, i: usize, size: usize) -> f32 {
    if size <= 1 {
        return 1.0;
    }
    let n = i as f32;
    let m = (size - 1) as f32;
    match window_type {
        WindowType::Hann => 0.5 - 0.5 * (2.0 * PI * n / m).cos(),
        WindowType::Hamming => 0.54 - 0.46 * (2.0 * PI * n / m).cos(),
        WindowType::Triangular => {
            let half = size as f32 / 2.0;
            1.0 - ((n - m / 2.0) / half).abs()
        }
        WindowType::Square => 1.0,
        WindowType::BlackmanHarris92 => {
            let x = 2.0 * PI * n / m;
            0.35875 - 0.48829 * x.cos() + 0.14128 * (2.0 * x).cos() - 0.01168 * (3.0 * x).cos()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_shape() {
        let w = Windowing::new(WindowType::Hann, 1024, false);
        let out = w.apply(&vec![1.0f32; 1024]);
        assert!(out[0].abs() < 1e-6);
        assert!(out[1023].abs() < 1e-6);
        assert!(out[511] > 0.99);
    }

    #[test]
    fn test_normalized_sum() {
        let w = Windowing::new(WindowType::Hann, 2048, true);
        let sum: f32 = w.apply(&vec![1.0f32; 2048]).iter().sum();
        assert!((sum - 2.0).abs() < 1e-3, "Normalized window should sum to 2, got {}", sum);
    }

    #[test]
    fn test_zero_padding() {
        let w = Windowing::new(WindowType::Square, 4, false).with_zero_padding(4);
        assert_eq!(w.apply(&[1.0, 2.0, 3.0, 4.0]), vec![1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_zero_phase() {
        let w = Windowing::new(WindowType::Square, 4, false).with_zero_phase(true);
        assert_eq!(w.apply(&[1.0, 2.0, 3.0, 4.0]), vec![3.0, 4.0, 1.0, 2.0]);

        let padded = Windowing::new(WindowType::Square, 4, false)
            .with_zero_padding(2)
            .with_zero_phase(true);
        assert_eq!(padded.apply(&[1.0, 2.0, 3.0, 4.0]), vec![3.0, 4.0, 0.0, 0.0, 1.0, 2.0]);
    }
}
