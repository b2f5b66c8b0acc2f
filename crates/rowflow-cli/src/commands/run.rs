use std::path::Path;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use rowflow_engine::config::{parser, validator};
use rowflow_engine::{orchestrator, JoinOutcome};

/// Execute the `run` command: parse, validate, and run a pipeline.
pub async fn execute(pipeline_path: &Path) -> Result<()> {
    // 1. Parse pipeline YAML
    let config = parser::parse_pipeline(pipeline_path)
        .with_context(|| format!("Failed to parse pipeline: {}", pipeline_path.display()))?;

    // 2. Validate
    validator::validate_pipeline(&config)?;

    tracing::info!(
        pipeline = config.pipeline,
        join_type = config.join.join_type,
        inputs = config.join.inputs.len(),
        "Pipeline validated"
    );

    // 3. Ctrl-C stops the join cleanly; rows already written stay valid.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling pipeline");
            on_signal.cancel();
        }
    });

    // 4. Run
    let result = orchestrator::run_pipeline(&config, cancel).await?;

    let status = match result.outcome {
        JoinOutcome::Completed => "completed successfully",
        JoinOutcome::Cancelled => "was cancelled",
    };
    eprintln!("Pipeline '{}' {status}.", result.pipeline);
    eprintln!("  Join type:       {}", result.join_type);
    for input in &result.inputs {
        eprintln!("  Read {:<12} {} rows", format!("{}:", input.name), input.rows_read);
    }
    eprintln!("  Rounds:          {}", result.rounds);
    eprintln!("  Rows written:    {}", result.rows_written);
    if result.rows_skipped > 0 {
        eprintln!("  Rows skipped:    {}", result.rows_skipped);
    }
    if result.placeholders > 0 {
        eprintln!("  NULL padded:     {}", result.placeholders);
    }
    eprintln!("  Duration:        {:.2}s", result.duration_secs);

    Ok(())
}
