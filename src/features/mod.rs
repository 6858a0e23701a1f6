//! Feature extraction modules
//!
//! - Spectral front end (framing, windowing, magnitude/phase, filter banks)
//! - Onset detection functions (9 methods)
//! - Beat period estimation (Stage A)
//! - Beat tracking (Stage B HMM and the TempoTap wrapper)

pub mod beat_tracking;
pub mod onset;
pub mod period;
pub mod spectral;
