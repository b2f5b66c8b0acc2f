//! Row streams between steps: bounded channels, blocking pull/emit, and the
//! input links a step binds at activation.

use rowflow_types::{Row, RowLayout, StepError};
use tokio::sync::mpsc;

/// Unit of transfer on a step-to-step edge.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Row(Row),
    EndStream,
}

/// Blocking pull side of a row stream.
pub trait RowInput: Send {
    /// Next row, or `None` once the stream has ended.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream transport failed.
    fn pull(&mut self) -> Result<Option<Row>, StepError>;
}

/// Blocking push side of a row stream.
pub trait RowSink {
    /// Hand one row downstream, waiting for queue capacity if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the downstream consumer has gone away.
    fn emit(&mut self, row: Row) -> Result<(), StepError>;
}

impl<T: RowInput + ?Sized> RowInput for Box<T> {
    fn pull(&mut self) -> Result<Option<Row>, StepError> {
        self.as_mut().pull()
    }
}

impl<T: RowSink + ?Sized> RowSink for &mut T {
    fn emit(&mut self, row: Row) -> Result<(), StepError> {
        (**self).emit(row)
    }
}

// ---------------------------------------------------------------------------
// Channel-backed streams
// ---------------------------------------------------------------------------

/// Create a bounded row channel of `capacity` frames.
#[must_use]
pub fn row_channel(capacity: usize) -> (mpsc::Sender<Frame>, ChannelInput) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, ChannelInput::new(rx))
}

/// Pull side of a bounded channel. Must be driven from a blocking thread.
#[derive(Debug)]
pub struct ChannelInput {
    receiver: mpsc::Receiver<Frame>,
    finished: bool,
}

impl ChannelInput {
    #[must_use]
    pub fn new(receiver: mpsc::Receiver<Frame>) -> Self {
        Self {
            receiver,
            finished: false,
        }
    }
}

impl RowInput for ChannelInput {
    fn pull(&mut self) -> Result<Option<Row>, StepError> {
        if self.finished {
            return Ok(None);
        }
        // A closed channel is treated like an explicit end of stream.
        match self.receiver.blocking_recv() {
            Some(Frame::Row(row)) => Ok(Some(row)),
            Some(Frame::EndStream) | None => {
                self.finished = true;
                Ok(None)
            }
        }
    }
}

/// Push side of a bounded channel. Must be driven from a blocking thread.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<Frame>,
}

impl ChannelSink {
    #[must_use]
    pub fn new(sender: mpsc::Sender<Frame>) -> Self {
        Self { sender }
    }

    /// Signal end of stream. A consumer that already left is not an error.
    pub fn close(self) {
        let _ = self.sender.blocking_send(Frame::EndStream);
    }
}

impl RowSink for ChannelSink {
    fn emit(&mut self, row: Row) -> Result<(), StepError> {
        self.sender
            .blocking_send(Frame::Row(row))
            .map_err(|e| StepError::internal("CHANNEL_SEND", e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// In-memory streams
// ---------------------------------------------------------------------------

/// Adapter exposing a materialized row vector as a [`RowInput`].
#[derive(Debug, Default)]
pub struct VecInput {
    rows: std::vec::IntoIter<Row>,
}

impl VecInput {
    #[must_use]
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

impl RowInput for VecInput {
    fn pull(&mut self) -> Result<Option<Row>, StepError> {
        Ok(self.rows.next())
    }
}

/// Sink that keeps every emitted row in memory.
#[derive(Debug, Default)]
pub struct CollectSink {
    rows: Vec<Row>,
}

impl CollectSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl RowSink for CollectSink {
    fn emit(&mut self, row: Row) -> Result<(), StepError> {
        self.rows.push(row);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Input links
// ---------------------------------------------------------------------------

/// One upstream edge offered to a step: its logical name, row layout, whether
/// the hop is enabled, and the pull side of the stream.
pub struct InputLink {
    pub name: String,
    pub layout: RowLayout,
    pub enabled: bool,
    pub input: Box<dyn RowInput>,
}

impl InputLink {
    #[must_use]
    pub fn new(name: impl Into<String>, layout: RowLayout, input: impl RowInput + 'static) -> Self {
        Self {
            name: name.into(),
            layout,
            enabled: true,
            input: Box::new(input),
        }
    }

    /// Mark the hop as disabled; the step will skip it at registration.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl std::fmt::Debug for InputLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputLink")
            .field("name", &self.name)
            .field("fields", &self.layout.len())
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}
