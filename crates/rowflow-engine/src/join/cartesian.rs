//! Cross-product emission over per-stream groups.

use rowflow_types::{Row, StepError};
use tokio_util::sync::CancellationToken;

use crate::stream::RowSink;

/// Outcome of emitting one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Emission {
    Complete { rows: u64 },
    Cancelled { rows: u64 },
}

/// Number of combinations `groups` expands to.
pub(crate) fn combination_count(groups: &[Vec<Row>]) -> u64 {
    groups.iter().map(|g| g.len() as u64).product()
}

/// Emit every combination of one row per group, concatenated in group order.
///
/// Combinations are enumerated with an odometer whose position 0 varies
/// fastest. Cancellation is polled before every emit.
pub(crate) fn emit_product(
    groups: &[Vec<Row>],
    width: usize,
    sink: &mut dyn RowSink,
    cancel: &CancellationToken,
) -> Result<Emission, StepError> {
    let mut rows = 0;
    if groups.is_empty() || groups.iter().any(Vec::is_empty) {
        return Ok(Emission::Complete { rows });
    }

    let mut idx = vec![0_usize; groups.len()];
    loop {
        if cancel.is_cancelled() {
            return Ok(Emission::Cancelled { rows });
        }

        let mut out = Row::new(Vec::with_capacity(width));
        for (group, &i) in groups.iter().zip(&idx) {
            out.extend_from(&group[i]);
        }
        sink.emit(out)?;
        rows += 1;

        let mut pos = 0;
        loop {
            idx[pos] += 1;
            if idx[pos] < groups[pos].len() {
                break;
            }
            idx[pos] = 0;
            pos += 1;
            if pos == groups.len() {
                return Ok(Emission::Complete { rows });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::CollectSink;
    use rowflow_types::row;

    #[test]
    fn odometer_order_stream_zero_fastest() {
        let groups = vec![
            vec![row!["a"], row!["b"]],
            vec![row!["c"]],
            vec![row!["d"], row!["e"]],
        ];
        let mut sink = CollectSink::new();
        let emitted =
            emit_product(&groups, 3, &mut sink, &CancellationToken::new()).unwrap();
        assert_eq!(emitted, Emission::Complete { rows: 4 });
        assert_eq!(combination_count(&groups), 4);
        assert_eq!(
            sink.into_rows(),
            vec![
                row!["a", "c", "d"],
                row!["b", "c", "d"],
                row!["a", "c", "e"],
                row!["b", "c", "e"],
            ]
        );
    }

    #[test]
    fn single_group_passes_rows_through() {
        let groups = vec![vec![row![1_i64, "x"], row![1_i64, "y"]]];
        let mut sink = CollectSink::new();
        emit_product(&groups, 2, &mut sink, &CancellationToken::new()).unwrap();
        assert_eq!(sink.rows(), &[row![1_i64, "x"], row![1_i64, "y"]]);
    }

    #[test]
    fn cancelled_before_first_emit() {
        let groups = vec![vec![row![1_i64]], vec![row![2_i64]]];
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut sink = CollectSink::new();
        let emitted = emit_product(&groups, 2, &mut sink, &cancel).unwrap();
        assert_eq!(emitted, Emission::Cancelled { rows: 0 });
        assert!(sink.rows().is_empty());
    }

    #[test]
    fn empty_group_emits_nothing() {
        let groups = vec![vec![row![1_i64]], vec![]];
        let mut sink = CollectSink::new();
        let emitted = emit_product(&groups, 2, &mut sink, &CancellationToken::new()).unwrap();
        assert_eq!(emitted, Emission::Complete { rows: 0 });
    }
}
