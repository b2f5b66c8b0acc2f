//! Key-run draining shared by the group materializer and the mismatch skipper.

use std::cmp::Ordering;

use rowflow_types::{Row, StepError};
use tokio_util::sync::CancellationToken;

use super::compare::KeyComparator;
use super::registration::StreamState;

/// How a key run ended.
#[derive(Debug, PartialEq)]
pub(crate) enum RunEnd {
    /// First row of the next key; goes back into the queue.
    Next(Row),
    /// The stream has no more rows.
    Exhausted,
    /// Cancellation was observed before a pull.
    Cancelled,
}

/// Pull rows from `state` while they compare equal to `anchor` on the
/// stream's own key, handing each to `keep`. Cancellation is polled before
/// every pull.
pub(crate) fn drain_run(
    state: &mut StreamState,
    comparator: &KeyComparator,
    anchor: &Row,
    cancel: &CancellationToken,
    mut keep: impl FnMut(Row),
) -> Result<RunEnd, StepError> {
    loop {
        if cancel.is_cancelled() {
            return Ok(RunEnd::Cancelled);
        }
        let Some(row) = state.pull()? else {
            return Ok(RunEnd::Exhausted);
        };
        match comparator.compare_rows(&row, &state.key_ordinals, anchor, &state.key_ordinals)? {
            Ordering::Equal => keep(row),
            Ordering::Greater => return Ok(RunEnd::Next(row)),
            Ordering::Less => {
                return Err(StepError::data(
                    "UNSORTED_INPUT",
                    format!(
                        "stream '{}' is not sorted on its key (row {} sorts before its predecessor)",
                        state.name, state.rows_read
                    ),
                ));
            }
        }
    }
}

/// Materialize the group for one tied stream: `first` followed by every
/// consecutive row sharing its key.
pub(crate) fn materialize(
    state: &mut StreamState,
    comparator: &KeyComparator,
    first: Row,
    cancel: &CancellationToken,
) -> Result<(Vec<Row>, RunEnd), StepError> {
    let mut tail = Vec::new();
    let end = drain_run(state, comparator, &first, cancel, |row| tail.push(row))?;
    let mut group = Vec::with_capacity(tail.len() + 1);
    group.push(first);
    group.extend(tail);
    Ok((group, end))
}

/// Discard the key run that starts at `tied`. Returns how it ended and how
/// many rows were dropped, `tied` included.
pub(crate) fn skip(
    state: &mut StreamState,
    comparator: &KeyComparator,
    tied: &Row,
    cancel: &CancellationToken,
) -> Result<(RunEnd, u64), StepError> {
    let mut dropped = 1;
    let end = drain_run(state, comparator, tied, cancel, |_| dropped += 1)?;
    Ok((end, dropped))
}

/// Single all-NULL placeholder group for a stream absent from an outer round.
pub(crate) fn placeholder(state: &StreamState) -> Vec<Row> {
    vec![Row::nulls(&state.layout)]
}
