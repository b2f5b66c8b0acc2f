//! Row stream plumbing, the N-way sorted merge-join step, and the pipeline
//! host that runs it over JSON Lines inputs.

#![warn(clippy::pedantic)]

pub mod config;
pub mod errors;
pub mod join;
pub mod orchestrator;
pub mod output;
pub mod result;
pub mod source;
pub mod stream;

// Re-export public API for convenience
pub use errors::PipelineError;
pub use join::{JoinMetrics, JoinOutcome, MultiMergeJoin, Progress};
pub use orchestrator::{check_pipeline, run_pipeline};
pub use result::{CheckResult, InputMetric, PipelineResult};
pub use stream::{
    row_channel, ChannelInput, ChannelSink, CollectSink, Frame, InputLink, RowInput, RowSink,
    VecInput,
};
