use std::path::Path;

use anyhow::{Context, Result};
use rowflow_types::{ValidationResult, ValidationStatus};

use rowflow_engine::config::{parser, validator};
use rowflow_engine::orchestrator;

/// Execute the `check` command: validate pipeline config and input files.
pub async fn execute(pipeline_path: &Path) -> Result<()> {
    // 1. Parse pipeline YAML
    let config = parser::parse_pipeline(pipeline_path)
        .with_context(|| format!("Failed to parse pipeline: {}", pipeline_path.display()))?;

    // 2. Validate pipeline structure
    validator::validate_pipeline(&config)?;
    println!("Pipeline structure: OK");

    // 3. Check join registration, inputs and output
    let result = orchestrator::check_pipeline(&config).await?;

    // 4. Report results
    print_validation("Join", &result.join);
    for (name, validation) in &result.inputs {
        print_validation(&format!("Input '{name}'"), validation);
    }
    print_validation("Output", &result.output);

    if result.all_passed() {
        println!("\nAll checks passed.");
        Ok(())
    } else {
        anyhow::bail!("One or more checks failed")
    }
}

fn print_validation(label: &str, result: &ValidationResult) {
    let status = match result.status {
        ValidationStatus::Success => "OK",
        ValidationStatus::Failed => "FAILED",
        ValidationStatus::Warning => "WARNING",
    };
    println!("{:22} {}", format!("{label}:"), status);
    if !result.message.is_empty() {
        println!("  {}", result.message);
    }
}
