//! N-way sorted merge-join step.
//!
//! Every input must arrive sorted on its composite key. Each round pops the
//! minimum current row from a priority queue together with every stream tied
//! on that key, then either expands the tied groups into their cross product
//! or, for an inner join missing some streams, discards the tied key runs.

mod cartesian;
mod compare;
mod group;
mod queue;
mod registration;

use std::cmp::Ordering;

use rowflow_types::{JoinType, MergeJoinSettings, Row, RowLayout, StepError};
use tokio_util::sync::CancellationToken;

use crate::stream::{InputLink, RowSink};
use cartesian::{combination_count, emit_product, Emission};
use compare::KeyComparator;
use group::{materialize, placeholder, skip, RunEnd};
use queue::{KeyQueue, QueueEntry};
use registration::{register, Registration, StreamState};

/// Terminal state of a merge join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// All required input was consumed and every combination emitted.
    Completed,
    /// Stopped early on request; output so far is a prefix of the full result.
    Cancelled,
}

/// Result of one [`MultiMergeJoin::step`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Continue,
    Finished(JoinOutcome),
}

/// Counters kept while the join runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinMetrics {
    pub rounds: u64,
    pub rows_emitted: u64,
    /// Rows discarded by the mismatch skipper (inner join only).
    pub rows_skipped: u64,
    /// All-NULL placeholder groups substituted in outer rounds.
    pub placeholders: u64,
    /// Rows pulled per registered stream, in registration order.
    pub rows_read: Vec<(String, u64)>,
}

enum JoinState {
    Pending(Vec<InputLink>),
    Active(Box<ActiveJoin>),
    Done(JoinOutcome),
    Failed,
}

/// The merge-join step. Registration happens lazily on the first call to
/// [`activate`](Self::activate), [`step`](Self::step) or [`run`](Self::run).
pub struct MultiMergeJoin {
    settings: MergeJoinSettings,
    cancel: CancellationToken,
    state: JoinState,
    merged: Option<RowLayout>,
    metrics: JoinMetrics,
}

impl MultiMergeJoin {
    #[must_use]
    pub fn new(
        settings: MergeJoinSettings,
        links: Vec<InputLink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            settings,
            cancel,
            state: JoinState::Pending(links),
            merged: None,
            metrics: JoinMetrics::default(),
        }
    }

    /// Register the inputs and seed the queue if not done yet, returning the
    /// merged output layout.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if registration fails, or any error
    /// raised while pulling the seed rows.
    pub fn activate(&mut self) -> Result<&RowLayout, StepError> {
        // Left as `Failed` if registration or seeding errors out.
        match std::mem::replace(&mut self.state, JoinState::Failed) {
            JoinState::Pending(links) => {
                let registration = register(&self.settings, links)?;
                let merged = registration.merged.clone();
                let mut active = ActiveJoin::new(registration);
                if active.seed(&self.cancel)? {
                    self.state = JoinState::Active(Box::new(active));
                } else {
                    self.metrics.rows_read = active.rows_read();
                    self.state = JoinState::Done(JoinOutcome::Cancelled);
                }
                self.merged = Some(merged);
            }
            JoinState::Failed => return Err(failed()),
            other => self.state = other,
        }
        self.merged
            .as_ref()
            .ok_or_else(|| StepError::internal("NOT_REGISTERED", "merged layout missing"))
    }

    /// Run one advancement round.
    ///
    /// # Errors
    ///
    /// Returns the first configuration, comparison, data or sink error. The
    /// step cannot be resumed after an error.
    pub fn step(&mut self, sink: &mut dyn RowSink) -> Result<Progress, StepError> {
        self.activate()?;
        let active = match &mut self.state {
            JoinState::Active(active) => active,
            JoinState::Done(outcome) => return Ok(Progress::Finished(*outcome)),
            JoinState::Pending(_) | JoinState::Failed => return Err(failed()),
        };

        let progress = match active.round(sink, &self.cancel, &mut self.metrics) {
            Ok(progress) => progress,
            Err(err) => {
                tracing::error!(error = %err, "Merge join failed");
                self.metrics.rows_read = active.rows_read();
                self.state = JoinState::Failed;
                return Err(err);
            }
        };

        if let Progress::Finished(outcome) = progress {
            self.metrics.rows_read = active.rows_read();
            tracing::info!(
                outcome = ?outcome,
                rounds = self.metrics.rounds,
                emitted = self.metrics.rows_emitted,
                skipped = self.metrics.rows_skipped,
                "Merge join finished"
            );
            // Dropping the active state releases every input stream.
            self.state = JoinState::Done(outcome);
        }
        Ok(progress)
    }

    /// Run rounds until the join completes or is cancelled.
    ///
    /// # Errors
    ///
    /// See [`step`](Self::step).
    pub fn run(&mut self, sink: &mut dyn RowSink) -> Result<JoinOutcome, StepError> {
        loop {
            if let Progress::Finished(outcome) = self.step(sink)? {
                return Ok(outcome);
            }
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &JoinMetrics {
        &self.metrics
    }

    /// Join type, once registered.
    #[must_use]
    pub fn join_type(&self) -> Option<JoinType> {
        match &self.state {
            JoinState::Active(active) => Some(active.join_type),
            _ => self.settings.join_type.parse().ok(),
        }
    }
}

fn failed() -> StepError {
    StepError::internal("STEP_FAILED", "merge join already failed")
}

/// Registered, seeded join state. Dropped as soon as the join finishes.
struct ActiveJoin {
    join_type: JoinType,
    streams: Vec<StreamState>,
    comparator: KeyComparator,
    queue: KeyQueue,
    width: usize,
}

/// Total queue order: key first, stream index as the tie-break.
fn entry_order<'a>(
    comparator: &'a KeyComparator,
    streams: &'a [StreamState],
) -> impl Fn(&QueueEntry, &QueueEntry) -> Result<Ordering, StepError> + 'a {
    move |a, b| {
        let ord = comparator.compare_rows(
            &a.row,
            &streams[a.stream].key_ordinals,
            &b.row,
            &streams[b.stream].key_ordinals,
        )?;
        Ok(ord.then(a.stream.cmp(&b.stream)))
    }
}

impl ActiveJoin {
    fn new(registration: Registration) -> Self {
        let Registration {
            join_type,
            streams,
            comparator,
            merged,
        } = registration;
        tracing::info!(
            join_type = %join_type,
            streams = streams.len(),
            key_parts = comparator.arity(),
            fields = merged.len(),
            "Merge join activated"
        );
        Self {
            join_type,
            queue: KeyQueue::with_capacity(streams.len()),
            streams,
            comparator,
            width: merged.len(),
        }
    }

    fn rows_read(&self) -> Vec<(String, u64)> {
        self.streams
            .iter()
            .map(|s| (s.name.clone(), s.rows_read))
            .collect()
    }

    /// Pull the first row of every stream. Returns `false` if cancelled.
    fn seed(&mut self, cancel: &CancellationToken) -> Result<bool, StepError> {
        for stream in 0..self.streams.len() {
            if cancel.is_cancelled() {
                return Ok(false);
            }
            match self.streams[stream].pull()? {
                Some(row) => self.requeue(QueueEntry { row, stream })?,
                None => {
                    tracing::debug!(stream = %self.streams[stream].name, "Input stream is empty");
                }
            }
        }
        Ok(true)
    }

    fn requeue(&mut self, entry: QueueEntry) -> Result<(), StepError> {
        let order = entry_order(&self.comparator, &self.streams);
        self.queue.push(entry, &order)
    }

    fn keys_equal(&self, a: &QueueEntry, b: &QueueEntry) -> Result<bool, StepError> {
        let ord = self.comparator.compare_rows(
            &a.row,
            &self.streams[a.stream].key_ordinals,
            &b.row,
            &self.streams[b.stream].key_ordinals,
        )?;
        Ok(ord == Ordering::Equal)
    }

    /// Pop the minimum entry and every entry tied with it on key.
    fn pop_tied(&mut self) -> Result<Vec<QueueEntry>, StepError> {
        let order = entry_order(&self.comparator, &self.streams);
        let Some(min) = self.queue.pop(&order)? else {
            return Ok(Vec::new());
        };
        let mut tied = vec![min];
        while let Some(head) = self.queue.peek() {
            if !self.keys_equal(head, &tied[0])? {
                break;
            }
            match self.queue.pop(&order)? {
                Some(entry) => tied.push(entry),
                None => break,
            }
        }
        Ok(tied)
    }

    fn round(
        &mut self,
        sink: &mut dyn RowSink,
        cancel: &CancellationToken,
        metrics: &mut JoinMetrics,
    ) -> Result<Progress, StepError> {
        if cancel.is_cancelled() {
            return Ok(Progress::Finished(JoinOutcome::Cancelled));
        }
        if self.join_type == JoinType::Inner && self.streams.iter().any(|s| s.exhausted) {
            return Ok(Progress::Finished(JoinOutcome::Completed));
        }

        let tied = self.pop_tied()?;
        if tied.is_empty() {
            return Ok(Progress::Finished(JoinOutcome::Completed));
        }
        metrics.rounds += 1;
        tracing::trace!(
            round = metrics.rounds,
            tied = tied.len(),
            streams = self.streams.len(),
            "Advancing merge join"
        );

        if tied.len() < self.streams.len() && self.join_type == JoinType::Inner {
            return self.skip_round(tied, cancel, metrics);
        }
        self.emit_round(tied, sink, cancel, metrics)
    }

    /// Inner join, key missing from some stream: drop the tied key runs.
    fn skip_round(
        &mut self,
        tied: Vec<QueueEntry>,
        cancel: &CancellationToken,
        metrics: &mut JoinMetrics,
    ) -> Result<Progress, StepError> {
        for QueueEntry { row, stream } in tied {
            let (end, dropped) = skip(&mut self.streams[stream], &self.comparator, &row, cancel)?;
            metrics.rows_skipped += dropped;
            match end {
                RunEnd::Next(next) => self.requeue(QueueEntry { row: next, stream })?,
                RunEnd::Exhausted => return Ok(Progress::Finished(JoinOutcome::Completed)),
                RunEnd::Cancelled => return Ok(Progress::Finished(JoinOutcome::Cancelled)),
            }
        }
        Ok(Progress::Continue)
    }

    /// Materialize one group per stream and emit their cross product.
    fn emit_round(
        &mut self,
        tied: Vec<QueueEntry>,
        sink: &mut dyn RowSink,
        cancel: &CancellationToken,
        metrics: &mut JoinMetrics,
    ) -> Result<Progress, StepError> {
        let mut groups: Vec<Option<Vec<Row>>> = vec![None; self.streams.len()];
        for QueueEntry { row, stream } in tied {
            let (group, end) = materialize(&mut self.streams[stream], &self.comparator, row, cancel)?;
            match end {
                RunEnd::Next(next) => self.requeue(QueueEntry { row: next, stream })?,
                RunEnd::Exhausted => {}
                RunEnd::Cancelled => return Ok(Progress::Finished(JoinOutcome::Cancelled)),
            }
            groups[stream] = Some(group);
        }

        let groups: Vec<Vec<Row>> = groups
            .into_iter()
            .zip(&self.streams)
            .map(|(group, state)| {
                group.unwrap_or_else(|| {
                    metrics.placeholders += 1;
                    placeholder(state)
                })
            })
            .collect();

        tracing::trace!(combinations = combination_count(&groups), "Emitting key groups");
        match emit_product(&groups, self.width, sink, cancel)? {
            Emission::Complete { rows } => {
                metrics.rows_emitted += rows;
                Ok(Progress::Continue)
            }
            Emission::Cancelled { rows } => {
                metrics.rows_emitted += rows;
                Ok(Progress::Finished(JoinOutcome::Cancelled))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{CollectSink, VecInput};
    use rowflow_types::{row, Field, Value, ValueKind};

    fn kv_layout() -> RowLayout {
        vec![
            Field::new("k", ValueKind::Integer),
            Field::new("v", ValueKind::String),
        ]
        .into_iter()
        .collect()
    }

    fn join(join_type: &str, inputs: Vec<Vec<Row>>) -> MultiMergeJoin {
        let names: Vec<String> = (0..inputs.len()).map(|i| format!("s{i}")).collect();
        let links = names
            .iter()
            .zip(inputs)
            .map(|(name, rows)| InputLink::new(name.clone(), kv_layout(), VecInput::new(rows)))
            .collect();
        MultiMergeJoin::new(
            MergeJoinSettings {
                keys: vec!["k".to_string(); names.len()],
                streams: names,
                join_type: join_type.to_string(),
            },
            links,
            CancellationToken::new(),
        )
    }

    #[test]
    fn activation_is_lazy_and_idempotent() {
        let mut j = join("inner", vec![vec![row![1_i64, "a"]], vec![row![1_i64, "b"]]]);
        assert!(j.merged.is_none());
        let names: Vec<String> = j
            .activate()
            .unwrap()
            .fields()
            .iter()
            .map(|f| f.name.clone())
            .collect();
        assert_eq!(names, vec!["k", "v", "k_1", "v_1"]);
        assert_eq!(j.activate().unwrap().len(), 4);
        assert_eq!(j.join_type(), Some(JoinType::Inner));
    }

    #[test]
    fn step_reports_progress_per_round() {
        let mut j = join(
            "inner",
            vec![
                vec![row![1_i64, "a"], row![2_i64, "b"]],
                vec![row![1_i64, "c"], row![2_i64, "d"]],
            ],
        );
        let mut sink = CollectSink::new();
        assert_eq!(j.step(&mut sink).unwrap(), Progress::Continue);
        assert_eq!(sink.rows().len(), 1);
        assert_eq!(j.step(&mut sink).unwrap(), Progress::Continue);
        assert_eq!(
            j.step(&mut sink).unwrap(),
            Progress::Finished(JoinOutcome::Completed)
        );
        // Finished joins stay finished.
        assert_eq!(
            j.step(&mut sink).unwrap(),
            Progress::Finished(JoinOutcome::Completed)
        );
        assert_eq!(j.metrics().rounds, 2);
        assert_eq!(
            j.metrics().rows_read,
            vec![("s0".to_string(), 2), ("s1".to_string(), 2)]
        );
    }

    #[test]
    fn inner_join_with_empty_stream_emits_nothing() {
        let mut j = join("inner", vec![vec![row![1_i64, "a"]], vec![]]);
        let mut sink = CollectSink::new();
        assert_eq!(j.run(&mut sink).unwrap(), JoinOutcome::Completed);
        assert!(sink.rows().is_empty());
        assert_eq!(j.metrics().rounds, 0);
    }

    #[test]
    fn outer_join_with_empty_stream_pads_with_nulls() {
        let mut j = join("full outer", vec![vec![row![1_i64, "a"]], vec![]]);
        let mut sink = CollectSink::new();
        j.run(&mut sink).unwrap();
        assert_eq!(sink.into_rows(), vec![row![1_i64, "a", Value::Null, Value::Null]]);
        assert_eq!(j.metrics().placeholders, 1);
    }

    #[test]
    fn failed_join_cannot_resume() {
        let mut j = join("inner", vec![vec![row![2_i64, "a"], row![1_i64, "b"]], vec![row![2_i64, "c"]]]);
        let mut sink = CollectSink::new();
        let err = j.run(&mut sink).unwrap_err();
        assert_eq!(err.code, "UNSORTED_INPUT");
        assert_eq!(j.step(&mut sink).unwrap_err().code, "STEP_FAILED");
    }

    #[test]
    fn cancelled_before_activation_pulls_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut j = MultiMergeJoin::new(
            MergeJoinSettings {
                streams: vec!["s0".into()],
                keys: vec!["k".into()],
                join_type: "INNER".into(),
            },
            vec![InputLink::new("s0", kv_layout(), VecInput::new(vec![row![1_i64, "a"]]))],
            cancel,
        );
        let mut sink = CollectSink::new();
        assert_eq!(j.run(&mut sink).unwrap(), JoinOutcome::Cancelled);
        assert_eq!(j.metrics().rows_read, vec![("s0".to_string(), 0)]);
    }
}
