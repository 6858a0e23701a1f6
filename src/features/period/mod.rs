//! Period estimation modules
//!
//! Turn an onset detection function into a beat period trajectory:
//! - Unbiased autocorrelation
//! - Rayleigh-weighted comb filterbank
//! - Viterbi decoding of the period per super-frame

pub mod autocorrelation;
pub mod beat_period;
pub mod comb_filter;

pub use beat_period::{BeatPeriodTracker, PeriodTrackerConfig};
