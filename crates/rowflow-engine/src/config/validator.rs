//! Semantic validation for parsed pipeline configuration values.

use std::collections::HashSet;

use anyhow::{bail, Result};
use rowflow_types::join::split_key_list;
use rowflow_types::JoinType;

use crate::config::types::{InputConfig, PipelineConfig};

/// Validate one input's name, fields and key list.
fn validate_input(i: usize, input: &InputConfig, errors: &mut Vec<String>) {
    if input.name.trim().is_empty() {
        errors.push(format!("Input {i} has an empty name"));
    }
    let context = format!("Input '{}'", input.name);

    if input.fields.is_empty() {
        errors.push(format!("{context} must declare at least one field"));
    }
    let mut seen = HashSet::new();
    for field in &input.fields {
        if field.name.trim().is_empty() {
            errors.push(format!("{context} has a field with an empty name"));
        } else if !seen.insert(field.name.as_str()) {
            errors.push(format!("{context} declares field '{}' twice", field.name));
        }
    }

    let key = split_key_list(&input.key);
    if key.is_empty() {
        errors.push(format!("{context} has an empty key"));
    }
    for part in &key {
        if !seen.contains(part.as_str()) {
            errors.push(format!(
                "{context}: key field '{part}' is not a declared field"
            ));
        }
    }
}

/// Validate a parsed pipeline configuration.
/// Returns `Ok(())` if valid, Err with all validation errors if not.
///
/// # Errors
///
/// Returns an error listing all validation failures found in the pipeline config.
pub fn validate_pipeline(config: &PipelineConfig) -> Result<()> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(format!(
            "Unsupported pipeline version '{}', expected '1.0'",
            config.version
        ));
    }

    if config.pipeline.trim().is_empty() {
        errors.push("Pipeline name must not be empty".to_string());
    }

    if let Err(e) = config.join.join_type.parse::<JoinType>() {
        errors.push(e.message);
    }

    if config.join.inputs.is_empty() {
        errors.push("Join must define at least one input".to_string());
    }

    let mut names = HashSet::new();
    for (i, input) in config.join.inputs.iter().enumerate() {
        if !input.name.trim().is_empty() && !names.insert(input.name.as_str()) {
            errors.push(format!("Duplicate input name '{}'", input.name));
        }
        validate_input(i, input, &mut errors);
    }

    let enabled: Vec<&InputConfig> = config.join.inputs.iter().filter(|i| i.enabled).collect();
    if !config.join.inputs.is_empty() && enabled.is_empty() {
        errors.push("At least one input must be enabled".to_string());
    }
    if let Some(first) = enabled.first() {
        let arity = split_key_list(&first.key).len();
        for input in &enabled[1..] {
            let other = split_key_list(&input.key).len();
            if other != arity {
                errors.push(format!(
                    "Input '{}' has {other} key field(s) but '{}' has {arity}",
                    input.name, first.name
                ));
            }
        }
    }

    if config.resources.channel_capacity == 0 {
        errors.push("channel_capacity must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("Pipeline validation failed:\n  - {}", errors.join("\n  - "));
    }
}
