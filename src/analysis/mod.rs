//! Candidate selection and result aggregation
//!
//! - Maximum-agreement selection among beat candidates
//! - Multi-feature beat tracking orchestration
//! - Rhythm extraction (BPM statistics over the winning grid)
//! - Chart post-processing of the grid
//! - Result types

pub mod agreement;
pub mod multi_feature;
pub mod postprocess;
pub mod result;
pub mod rhythm;

pub use agreement::{Agreement, TempoTapMaxAgreement, TickCandidate};
pub use multi_feature::{BeatTrackerMultiFeature, MultiFeatureConfig, MultiFeatureResult};
pub use postprocess::{PostProcessConfig, TickPostProcessor};
pub use result::{RhythmMetadata, RhythmResult};
pub use rhythm::{tempo_statistics, RhythmExtractor};
