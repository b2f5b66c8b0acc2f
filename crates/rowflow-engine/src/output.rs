//! JSON Lines output.
//!
//! One object per joined row, keyed by merged field names. Decimals are
//! written as strings, timestamps as RFC 3339 strings, binary as byte arrays.
//! Non-finite floats have no JSON literal and are written as strings.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use rowflow_types::{Row, RowLayout, Value};
use serde_json::{Map, Number};
use tokio::sync::{mpsc, oneshot};

use crate::errors::PipelineError;
use crate::stream::Frame;

/// JSON representation of one value.
#[must_use]
pub fn encode_value(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        Value::Null => Json::Null,
        Value::Integer(v) => Json::from(*v),
        Value::Number(v) => Number::from_f64(*v).map_or_else(|| Json::String(v.to_string()), Json::Number),
        Value::Decimal(v) => Json::String(v.to_string()),
        Value::String(v) => Json::String(v.clone()),
        Value::Timestamp(v) => Json::String(v.to_rfc3339()),
        Value::Binary(v) => Json::Array(v.iter().map(|b| Json::from(*b)).collect()),
        Value::Boolean(v) => Json::Bool(*v),
    }
}

/// JSON object for one row, keyed by `layout`'s field names.
#[must_use]
pub fn encode_row(row: &Row, layout: &RowLayout) -> serde_json::Value {
    let object: Map<String, serde_json::Value> = layout
        .fields()
        .iter()
        .zip(row.values())
        .map(|(field, value)| (field.name.clone(), encode_value(value)))
        .collect();
    serde_json::Value::Object(object)
}

/// Buffered JSON Lines writer over any [`Write`].
pub struct JsonlWriter<W: Write> {
    layout: RowLayout,
    out: BufWriter<W>,
    rows: u64,
}

impl<W: Write> JsonlWriter<W> {
    #[must_use]
    pub fn new(layout: RowLayout, out: W) -> Self {
        Self {
            layout,
            out: BufWriter::new(out),
            rows: 0,
        }
    }

    /// Append one row.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the underlying write fails.
    pub fn write_row(&mut self, row: &Row) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.out, &encode_row(row, &self.layout))
            .context("Failed to write output row")?;
        self.out.write_all(b"\n").context("Failed to write output row")?;
        self.rows += 1;
        Ok(())
    }

    /// Flush buffered output and return the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn finish(mut self) -> anyhow::Result<u64> {
        self.out.flush().context("Failed to flush output")?;
        Ok(self.rows)
    }
}

fn drain<W: Write>(
    mut writer: JsonlWriter<W>,
    frames: &mut mpsc::Receiver<Frame>,
) -> anyhow::Result<u64> {
    while let Some(Frame::Row(row)) = frames.blocking_recv() {
        writer.write_row(&row)?;
    }
    writer.finish()
}

/// Write every joined row arriving on `frames` to `dest`, or stdout when
/// `dest` is `None`.
///
/// Runs on a blocking thread. The merged layout arrives on `layout` once the
/// join has registered its inputs; if the join fails first, nothing is
/// written and no output file is created. Returns the number of rows written.
///
/// # Errors
///
/// Returns an error if the destination cannot be created or written.
pub fn write_jsonl(
    dest: Option<&Path>,
    layout: oneshot::Receiver<RowLayout>,
    mut frames: mpsc::Receiver<Frame>,
) -> Result<u64, PipelineError> {
    let Ok(layout) = layout.blocking_recv() else {
        tracing::debug!("Join ended before producing a layout; no output written");
        return Ok(0);
    };

    let rows = match dest {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory: {}", parent.display())
                })?;
            }
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            drain(JsonlWriter::new(layout, file), &mut frames)?
        }
        None => drain(JsonlWriter::new(layout, std::io::stdout().lock()), &mut frames)?,
    };
    tracing::debug!(rows, "Output written");
    Ok(rows)
}
