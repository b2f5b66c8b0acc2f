//! Pipeline configuration: YAML types, parsing, and semantic validation.

pub mod parser;
pub mod types;
pub mod validator;

pub use parser::{parse_pipeline, parse_pipeline_str};
pub use types::{InputConfig, JoinConfig, OutputConfig, PipelineConfig, ResourceConfig};
pub use validator::validate_pipeline;
