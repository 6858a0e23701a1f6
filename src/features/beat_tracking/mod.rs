//! Beat tracking modules
//!
//! Generate a beat grid from an onset detection function:
//! - Two-stage tempo tapping (period trajectory, then beat placement)
//! - HMM beat decoder over samples-since-last-beat states

pub mod hmm;
pub mod tempo_tap;

pub use hmm::HmmBeatDecoder;
pub use tempo_tap::{Resample, TempoTap, TempoTapConfig};
