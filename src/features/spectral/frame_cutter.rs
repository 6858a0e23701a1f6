//! Frame slicing
//!
//! Splits a signal into fixed-size, possibly zero-padded frames. The cutter
//! is a lazy, finite, single-pass iterator that borrows the signal and yields
//! a fresh buffer per frame.
//!
//! # Example
//!
//! ```
//! use tempo_grid::features::spectral::frame_cutter::{FrameCutter, FrameStart};
//!
//! let signal = vec![1.0f32; 2048];
//! let frames: Vec<Vec<f32>> = FrameCutter::new(&signal, 1024, 512, FrameStart::ZeroCentered).collect();
//! assert_eq!(frames.len(), 5);
//! assert!(frames[0][..512].iter().all(|&x| x == 0.0));
//! ```

/// Where the first frame is placed relative to sample 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStart {
    /// First frame is centered on t=0; its first half is zero-filled
    ZeroCentered,
    /// First frame begins at sample 0
    StartAtZero,
}

/// Lazy frame iterator over a borrowed signal
#[derive(Debug, Clone)]
pub struct FrameCutter<'a> {
    signal: &'a [f32],
    frame_size: usize,
    hop_size: usize,
    /// Start index of the next frame (may be negative when zero-centered)
    next_start: i64,
    valid_frame_threshold_ratio: f32,
}

impl<'a> FrameCutter<'a> {
    /// Create a frame cutter
    ///
    /// `frame_size` and `hop_size` of 0 yield no frames.
    pub fn new(signal: &'a [f32], frame_size: usize, hop_size: usize, start: FrameStart) -> Self {
        let next_start = match start {
            FrameStart::ZeroCentered => -((frame_size / 2) as i64),
            FrameStart::StartAtZero => 0,
        };
        Self {
            signal,
            frame_size,
            hop_size,
            next_start,
            valid_frame_threshold_ratio: 0.0,
        }
    }

    /// Discard trailing frames whose share of real (non-padded) samples is
    /// below `ratio` (0.0 keeps every frame)
    pub fn with_valid_frame_threshold_ratio(mut self, ratio: f32) -> Self {
        self.valid_frame_threshold_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Number of frames this cutter will still produce
    pub fn frame_count(&self) -> usize {
        self.clone().count()
    }
}

impl Iterator for FrameCutter<'_> {
    type Item = Vec<f32>;

    fn next(&mut self) -> Option<Vec<f32>> {
        if self.frame_size == 0 || self.hop_size == 0 {
            return None;
        }
        let len = self.signal.len() as i64;
        let start = self.next_start;
        if start >= len {
            return None;
        }

        let end = start + self.frame_size as i64;
        let valid_start = start.max(0);
        let valid_end = end.min(len);
        let valid = (valid_end - valid_start).max(0) as usize;

        // Only trailing frames (running past the end) are subject to the ratio
        if end > len
            && (valid as f32) < self.valid_frame_threshold_ratio * self.frame_size as f32
        {
            self.next_start = len;
            return None;
        }

        let mut frame = vec![0.0f32; self.frame_size];
        if valid > 0 {
            let offset = (valid_start - start) as usize;
            frame[offset..offset + valid]
                .copy_from_slice(&self.signal[valid_start as usize..valid_end as usize]);
        }

        self.next_start += self.hop_size as i64;
        Some(frame)
    }
}
