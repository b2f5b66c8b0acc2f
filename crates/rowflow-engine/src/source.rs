//! JSON Lines input files.
//!
//! One JSON object per line, decoded into a [`Row`] following the declared
//! layout. Missing or `null` members are NULL; members not in the layout are
//! ignored. Blank lines are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use rowflow_types::{Field, Row, RowLayout, StepError, Value, ValueKind};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::errors::PipelineError;
use crate::stream::{Frame, RowInput};

/// Decode one JSON member as a value of `kind`.
///
/// # Errors
///
/// Returns a description of the mismatch if the JSON value cannot represent
/// `kind`.
pub fn decode_value(kind: ValueKind, raw: &serde_json::Value) -> Result<Value, String> {
    use serde_json::Value as Json;

    let mismatch = || format!("expected {kind}, got {raw}");
    let value = match (kind, raw) {
        (_, Json::Null) => Value::Null,
        (ValueKind::Integer, Json::Number(n)) => Value::Integer(n.as_i64().ok_or_else(mismatch)?),
        (ValueKind::Number, Json::Number(n)) => Value::Number(n.as_f64().ok_or_else(mismatch)?),
        // Non-finite floats have no JSON literal.
        (ValueKind::Number, Json::String(s)) => {
            Value::Number(f64::from_str(s.trim()).map_err(|_| mismatch())?)
        }
        (ValueKind::Decimal, Json::Number(n)) => {
            Value::Decimal(BigDecimal::from_str(&n.to_string()).map_err(|_| mismatch())?)
        }
        (ValueKind::Decimal, Json::String(s)) => {
            Value::Decimal(BigDecimal::from_str(s.trim()).map_err(|_| mismatch())?)
        }
        (ValueKind::String, Json::String(s)) => Value::String(s.clone()),
        (ValueKind::Timestamp, Json::String(s)) => Value::Timestamp(
            DateTime::parse_from_rfc3339(s)
                .map_err(|e| format!("invalid RFC 3339 timestamp '{s}': {e}"))?
                .with_timezone(&Utc),
        ),
        (ValueKind::Binary, Json::Array(items)) => Value::Binary(
            items
                .iter()
                .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(|| format!("expected binary as an array of bytes, got {raw}"))?,
        ),
        (ValueKind::Boolean, Json::Bool(b)) => Value::Boolean(*b),
        _ => return Err(mismatch()),
    };
    Ok(value)
}

/// Decode one line into a row shaped like `layout`.
///
/// # Errors
///
/// Returns a data error if the line is not a JSON object or any declared
/// member has the wrong type.
pub fn decode_line(line: &str, layout: &RowLayout) -> Result<Row, StepError> {
    let parsed: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| StepError::data("INVALID_JSON", format!("invalid JSON: {e}")))?;
    let serde_json::Value::Object(object) = parsed else {
        return Err(StepError::data(
            "INVALID_RECORD",
            "expected a JSON object per line",
        ));
    };

    layout
        .fields()
        .iter()
        .map(|Field { name, kind, .. }| match object.get(name) {
            None => Ok(Value::Null),
            Some(raw) => decode_value(*kind, raw).map_err(|msg| {
                StepError::data("INVALID_VALUE", format!("field '{name}': {msg}"))
                    .with_details(json!({ "field": name }))
            }),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Row::new)
}

// ---------------------------------------------------------------------------
// JsonlInput
// ---------------------------------------------------------------------------

/// Pull-side reader over a JSON Lines stream.
pub struct JsonlInput<R> {
    label: String,
    layout: RowLayout,
    reader: R,
    line_no: u64,
    buf: String,
}

impl JsonlInput<BufReader<File>> {
    /// Open a JSON Lines file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path, layout: RowLayout) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open input file: {}", path.display()))?;
        Ok(Self::from_reader(
            path.display().to_string(),
            BufReader::new(file),
            layout,
        ))
    }
}

impl<R: BufRead> JsonlInput<R> {
    /// Wrap any buffered reader. `label` names the source in error messages.
    #[must_use]
    pub fn from_reader(label: impl Into<String>, reader: R, layout: RowLayout) -> Self {
        Self {
            label: label.into(),
            layout,
            reader,
            line_no: 0,
            buf: String::new(),
        }
    }

    /// 1-based number of the last line read.
    #[must_use]
    pub fn line_no(&self) -> u64 {
        self.line_no
    }
}

impl<R: BufRead + Send> RowInput for JsonlInput<R> {
    fn pull(&mut self) -> Result<Option<Row>, StepError> {
        loop {
            self.buf.clear();
            let read = self.reader.read_line(&mut self.buf).map_err(|e| {
                StepError::internal("INPUT_READ", format!("{}: {e}", self.label))
            })?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let line = self.buf.trim();
            if line.is_empty() {
                continue;
            }
            return decode_line(line, &self.layout).map(Some).map_err(|mut e| {
                e.message = format!("{}:{}: {}", self.label, self.line_no, e.message);
                let mut details = json!({ "source": self.label, "line": self.line_no });
                if let Some(field) = e.details.as_ref().and_then(|d| d.get("field")) {
                    details["field"] = field.clone();
                }
                e.with_details(details)
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Channel feed
// ---------------------------------------------------------------------------

/// Stream a JSON Lines file into `sender`, ending with [`Frame::EndStream`].
///
/// Runs on a blocking thread. Stops quietly on cancellation or once the
/// consumer has gone away, which happens when an inner join ends before this
/// input is drained. Returns the number of rows sent.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a line fails to decode.
pub fn read_jsonl(
    path: &Path,
    layout: RowLayout,
    sender: &mpsc::Sender<Frame>,
    cancel: &CancellationToken,
) -> Result<u64, PipelineError> {
    let mut input = JsonlInput::open(path, layout)?;
    let mut sent = 0_u64;
    loop {
        if cancel.is_cancelled() {
            tracing::debug!(path = %path.display(), sent, "Input reader cancelled");
            return Ok(sent);
        }
        let Some(row) = input.pull()? else {
            break;
        };
        if sender.blocking_send(Frame::Row(row)).is_err() {
            tracing::debug!(path = %path.display(), sent, "Input consumer closed early");
            return Ok(sent);
        }
        sent += 1;
    }
    let _ = sender.blocking_send(Frame::EndStream);
    tracing::debug!(path = %path.display(), rows = sent, lines = input.line_no(), "Input fully read");
    Ok(sent)
}
