//! Pipeline YAML configuration types.

use std::path::{Path, PathBuf};

use rowflow_types::{Field, MergeJoinSettings, RowLayout};
use serde::{Deserialize, Serialize};

/// Default bounded queue size for every step-to-step edge.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub version: String,
    pub pipeline: String,
    pub join: JoinConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub resources: ResourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinConfig {
    /// `inner` or `full outer`, case-insensitive.
    #[serde(rename = "type")]
    pub join_type: String,
    pub inputs: Vec<InputConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub name: String,
    /// JSON Lines file, sorted on `key`.
    pub path: PathBuf,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Comma-separated key field names.
    pub key: String,
    pub fields: Vec<Field>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON Lines destination; stdout when omitted.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl InputConfig {
    #[must_use]
    pub fn layout(&self) -> RowLayout {
        RowLayout::new(self.fields.clone())
    }
}

impl JoinConfig {
    /// Step settings in configuration order, disabled inputs included.
    #[must_use]
    pub fn settings(&self) -> MergeJoinSettings {
        MergeJoinSettings {
            streams: self.inputs.iter().map(|i| i.name.clone()).collect(),
            keys: self.inputs.iter().map(|i| i.key.clone()).collect(),
            join_type: self.join_type.clone(),
        }
    }
}

impl PipelineConfig {
    /// Resolve relative input and output paths against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for input in &mut self.join.inputs {
            if input.path.is_relative() {
                input.path = base.join(&input.path);
            }
        }
        if let Some(path) = self.output.path.as_mut() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}
