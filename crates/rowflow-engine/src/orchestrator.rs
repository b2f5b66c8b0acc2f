//! Pipeline orchestration: wires JSON Lines readers, the merge-join step and
//! the output writer together over bounded channels.
//!
//! Every stage runs on its own blocking thread. The first stage to fail
//! cancels the others.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use rowflow_types::{JoinType, RowLayout, StepError, ValidationResult};
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::types::{InputConfig, PipelineConfig};
use crate::errors::PipelineError;
use crate::join::{JoinMetrics, JoinOutcome, MultiMergeJoin};
use crate::output::write_jsonl;
use crate::result::{CheckResult, PipelineResult};
use crate::source::{read_jsonl, JsonlInput};
use crate::stream::{row_channel, ChannelSink, InputLink, RowInput, VecInput};

/// What the join worker hands back, successful or not.
struct JoinReport {
    result: Result<JoinOutcome, StepError>,
    metrics: JoinMetrics,
    join_type: Option<JoinType>,
}

fn panicked(task: &str, e: &tokio::task::JoinError) -> PipelineError {
    PipelineError::Infrastructure(anyhow::anyhow!("{task} task panicked: {e}"))
}

/// Run a pipeline to completion or cancellation.
///
/// A cancelled run is not an error: the result reports
/// [`JoinOutcome::Cancelled`] and the output holds a prefix of the full join.
///
/// # Errors
///
/// Returns the root-cause failure: input read or decode errors first, then
/// output errors, then join step errors.
#[allow(clippy::too_many_lines)]
pub async fn run_pipeline(
    config: &PipelineConfig,
    cancel: CancellationToken,
) -> Result<PipelineResult, PipelineError> {
    let start = Instant::now();
    let capacity = config.resources.channel_capacity;
    tracing::info!(
        pipeline = config.pipeline,
        join_type = config.join.join_type,
        inputs = config.join.inputs.len(),
        capacity,
        "Starting pipeline run"
    );

    // 1. One reader per enabled input
    let mut readers: JoinSet<(String, Result<u64, PipelineError>)> = JoinSet::new();
    let mut links = Vec::with_capacity(config.join.inputs.len());
    for input in &config.join.inputs {
        if !input.enabled {
            links.push(InputLink::new(input.name.clone(), input.layout(), VecInput::default()).disabled());
            continue;
        }
        let (tx, rx) = row_channel(capacity);
        links.push(InputLink::new(input.name.clone(), input.layout(), rx));

        let name = input.name.clone();
        let path = input.path.clone();
        let layout = input.layout();
        let cancel = cancel.clone();
        readers.spawn_blocking(move || {
            let result = read_jsonl(&path, layout, &tx, &cancel);
            if let Err(ref e) = result {
                tracing::error!(input = name, error = %e, "Input reader failed");
                cancel.cancel();
            }
            (name, result)
        });
    }

    // 2. Join worker
    let (layout_tx, layout_rx) = oneshot::channel::<RowLayout>();
    let (out_tx, out_rx) = tokio::sync::mpsc::channel(capacity.max(1));
    let settings = config.join.settings();
    let join_cancel = cancel.clone();
    let join_handle = tokio::task::spawn_blocking(move || {
        let mut join = MultiMergeJoin::new(settings, links, join_cancel.clone());
        let result = match join.activate() {
            Ok(layout) => {
                let _ = layout_tx.send(layout.clone());
                let mut sink = ChannelSink::new(out_tx);
                let result = join.run(&mut sink);
                sink.close();
                result
            }
            Err(e) => Err(e),
        };
        if let Err(ref e) = result {
            join_cancel.cancel();
            tracing::debug!(code = %e.code, "Join worker stopped on error");
        }
        JoinReport {
            result,
            metrics: join.metrics().clone(),
            join_type: join.join_type(),
        }
    });

    // 3. Output writer
    let dest = config.output.path.clone();
    let writer_cancel = cancel.clone();
    let writer_handle = tokio::task::spawn_blocking(move || {
        let result = write_jsonl(dest.as_deref(), layout_rx, out_rx);
        if let Err(ref e) = result {
            tracing::error!(error = %e, "Output writer failed");
            writer_cancel.cancel();
        }
        result
    });

    // 4. Collect, root cause first
    let report = join_handle.await.map_err(|e| panicked("Join", &e))?;
    let written = writer_handle.await.map_err(|e| panicked("Writer", &e))?;

    let mut reader_error = None;
    while let Some(joined) = readers.join_next().await {
        let (name, result) = joined.map_err(|e| panicked("Reader", &e))?;
        match result {
            Ok(rows) => tracing::debug!(input = name, rows, "Input reader finished"),
            Err(e) => {
                reader_error.get_or_insert(e);
            }
        }
    }
    if let Some(e) = reader_error {
        return Err(e);
    }
    let rows_written = written?;
    let outcome = report.result.map_err(|e| {
        tracing::error!(category = %e.category, code = %e.code, "Merge join failed");
        PipelineError::Step(e)
    })?;

    // A reader that stopped on cancellation looks like end of stream to the
    // join, so a join that "completed" under a cancelled token is a prefix.
    let outcome = if cancel.is_cancelled() {
        JoinOutcome::Cancelled
    } else {
        outcome
    };
    let join_type = report
        .join_type
        .ok_or_else(|| anyhow::anyhow!("join type unavailable after run"))?;

    let duration_secs = start.elapsed().as_secs_f64();
    let result = PipelineResult::new(
        config.pipeline.clone(),
        join_type,
        outcome,
        &report.metrics,
        rows_written,
        duration_secs,
    );
    tracing::info!(
        pipeline = config.pipeline,
        outcome = ?result.outcome,
        rows_read = result.rows_read(),
        rows_written = result.rows_written,
        duration_secs,
        "Pipeline run finished"
    );
    Ok(result)
}

/// Check one input: open the file and decode its first row.
fn check_input(input: &InputConfig) -> ValidationResult {
    if !input.enabled {
        return ValidationResult::warning("disabled; skipped by the join");
    }
    let mut reader = match JsonlInput::open(&input.path, input.layout()) {
        Ok(reader) => reader,
        Err(e) => return ValidationResult::failed(format!("{e:#}")),
    };
    match reader.pull() {
        Ok(Some(_)) => ValidationResult::success(),
        Ok(None) => ValidationResult::warning(format!("{} is empty", input.path.display())),
        Err(e) => ValidationResult::failed(e.to_string()),
    }
}

/// Check the output destination's directory exists or can be created.
fn check_output(path: Option<&Path>) -> ValidationResult {
    let Some(path) = path else {
        return ValidationResult::success();
    };
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) if dir.exists() && !dir.is_dir() => {
            ValidationResult::failed(format!("{} is not a directory", dir.display()))
        }
        _ if path.is_dir() => ValidationResult::failed(format!("{} is a directory", path.display())),
        _ => ValidationResult::success(),
    }
}

/// Check the join step's registration against the declared layouts without
/// reading any row.
fn check_join(config: &PipelineConfig) -> ValidationResult {
    let links = config
        .join
        .inputs
        .iter()
        .map(|input| {
            let link = InputLink::new(input.name.clone(), input.layout(), VecInput::default());
            if input.enabled {
                link
            } else {
                link.disabled()
            }
        })
        .collect();
    let mut join = MultiMergeJoin::new(config.join.settings(), links, CancellationToken::new());
    match join.activate() {
        Ok(layout) => ValidationResult {
            message: format!("{} output field(s)", layout.len()),
            ..ValidationResult::success()
        },
        Err(e) => ValidationResult::failed(e.to_string()),
    }
}

/// Check a pipeline: join registration, input readability and the output
/// destination, without running the join.
///
/// # Errors
///
/// Returns an error if a check task panics.
pub async fn check_pipeline(config: &PipelineConfig) -> Result<CheckResult> {
    tracing::info!(
        pipeline = config.pipeline,
        "Checking pipeline configuration"
    );

    let join = check_join(config);

    let mut tasks = Vec::with_capacity(config.join.inputs.len());
    for input in &config.join.inputs {
        let input = input.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            let result = check_input(&input);
            (input.name, result)
        }));
    }
    let mut inputs = Vec::with_capacity(tasks.len());
    for task in tasks {
        inputs.push(
            task.await
                .map_err(|e| anyhow::anyhow!("Input check task panicked: {e}"))?,
        );
    }

    Ok(CheckResult {
        join,
        inputs,
        output: check_output(config.output.path.as_deref()),
    })
}
