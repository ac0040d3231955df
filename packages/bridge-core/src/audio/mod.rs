//! Audio codec, resampling, and pipeline pacing (§4.5).

pub mod alaw;
pub mod pipeline;
pub mod resample;

pub use pipeline::{run_egress_loop, EgressPipeline, IngressConverter, PipelineStats};
pub use resample::Resampler;
