//! Behavioral tests for the merge-join step over in-memory streams.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rowflow_engine::{CollectSink, InputLink, JoinOutcome, MultiMergeJoin, RowInput, VecInput};
use rowflow_types::{row, ErrorCategory, Field, MergeJoinSettings, Row, RowLayout, StepError, Value, ValueKind};
use rstest::rstest;
use tokio_util::sync::CancellationToken;

fn layout(key: ValueKind, value: &str) -> RowLayout {
    vec![Field::new("k", key), Field::new(value, ValueKind::String)]
        .into_iter()
        .collect()
}

fn settings(streams: &[&str], join_type: &str) -> MergeJoinSettings {
    MergeJoinSettings {
        streams: streams.iter().map(|s| (*s).to_string()).collect(),
        keys: vec!["k".to_string(); streams.len()],
        join_type: join_type.to_string(),
    }
}

/// Run a join over `(name, rows)` inputs keyed on an integer `k`.
fn run(join_type: &str, inputs: Vec<(&str, Vec<Row>)>) -> (Result<JoinOutcome, StepError>, Vec<Row>) {
    let names: Vec<&str> = inputs.iter().map(|(n, _)| *n).collect();
    let links = inputs
        .into_iter()
        .map(|(name, rows)| InputLink::new(name, layout(ValueKind::Integer, name), VecInput::new(rows)))
        .collect();
    let mut join = MultiMergeJoin::new(settings(&names, join_type), links, CancellationToken::new());
    let mut sink = CollectSink::new();
    let outcome = join.run(&mut sink);
    (outcome, sink.into_rows())
}

// ---------------------------------------------------------------------------
// Worked scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_inner_join_repeated_key() {
    let (outcome, rows) = run(
        "INNER",
        vec![
            ("s1", vec![row![1_i64, "x"], row![1_i64, "y"], row![2_i64, "z"]]),
            ("s2", vec![row![1_i64, "p"]]),
        ],
    );
    assert_eq!(outcome.unwrap(), JoinOutcome::Completed);
    assert_eq!(
        rows,
        vec![row![1_i64, "x", 1_i64, "p"], row![1_i64, "y", 1_i64, "p"]]
    );
}

#[test]
fn test_full_outer_join_pads_missing_stream() {
    let (outcome, rows) = run(
        " full outer ",
        vec![
            ("s1", vec![row![1_i64, "x"], row![1_i64, "y"], row![2_i64, "z"]]),
            ("s2", vec![row![1_i64, "p"]]),
        ],
    );
    assert_eq!(outcome.unwrap(), JoinOutcome::Completed);
    assert_eq!(
        rows,
        vec![
            row![1_i64, "x", 1_i64, "p"],
            row![1_i64, "y", 1_i64, "p"],
            row![2_i64, "z", Value::Null, Value::Null],
        ]
    );
}

#[test]
fn test_three_way_inner_tie_emits_cross_product() {
    let (_, rows) = run(
        "inner",
        vec![
            ("a", vec![row![5_i64, "a1"], row![5_i64, "a2"]]),
            ("b", vec![row![5_i64, "b1"]]),
            ("c", vec![row![5_i64, "c1"], row![5_i64, "c2"]]),
        ],
    );
    assert_eq!(
        rows,
        vec![
            row![5_i64, "a1", 5_i64, "b1", 5_i64, "c1"],
            row![5_i64, "a2", 5_i64, "b1", 5_i64, "c1"],
            row![5_i64, "a1", 5_i64, "b1", 5_i64, "c2"],
            row![5_i64, "a2", 5_i64, "b1", 5_i64, "c2"],
        ]
    );
}

#[test]
fn test_outer_join_interleaves_keys_in_order() {
    let (_, rows) = run(
        "FULL OUTER",
        vec![
            ("a", vec![row![1_i64, "a1"], row![3_i64, "a3"]]),
            ("b", vec![row![2_i64, "b2"], row![3_i64, "b3"]]),
        ],
    );
    assert_eq!(
        rows,
        vec![
            row![1_i64, "a1", Value::Null, Value::Null],
            row![Value::Null, Value::Null, 2_i64, "b2"],
            row![3_i64, "a3", 3_i64, "b3"],
        ]
    );
}

#[test]
fn test_inner_join_terminates_on_disjoint_streams() {
    let (outcome, rows) = run(
        "INNER",
        vec![
            ("a", (0..50_i64).map(|i| row![i * 2, "even"]).collect()),
            ("b", (0..50_i64).map(|i| row![i * 2 + 1, "odd"]).collect()),
        ],
    );
    assert_eq!(outcome.unwrap(), JoinOutcome::Completed);
    assert!(rows.is_empty());
}

#[test]
fn test_null_keys_join_with_each_other() {
    let (_, rows) = run(
        "INNER",
        vec![
            ("a", vec![row![Value::Null, "a0"], row![1_i64, "a1"]]),
            ("b", vec![row![Value::Null, "b0"]]),
        ],
    );
    assert_eq!(rows, vec![row![Value::Null, "a0", Value::Null, "b0"]]);
}

#[test]
fn test_disabled_link_is_left_out_of_output() {
    let links = vec![
        InputLink::new("a", layout(ValueKind::Integer, "a"), VecInput::new(vec![row![1_i64, "a1"]])),
        InputLink::new("b", layout(ValueKind::Integer, "b"), VecInput::new(vec![row![9_i64, "b9"]]))
            .disabled(),
        InputLink::new("c", layout(ValueKind::Integer, "c"), VecInput::new(vec![row![1_i64, "c1"]])),
    ];
    let mut join = MultiMergeJoin::new(settings(&["a", "b", "c"], "inner"), links, CancellationToken::new());
    let mut sink = CollectSink::new();
    join.run(&mut sink).unwrap();
    assert_eq!(sink.into_rows(), vec![row![1_i64, "a1", 1_i64, "c1"]]);
    assert_eq!(join.metrics().rows_read.len(), 2);
}

#[test]
fn test_descending_keys_merge_in_declared_order() {
    let desc: RowLayout = vec![
        Field::new("k", ValueKind::Integer).descending(),
        Field::new("v", ValueKind::String),
    ]
    .into_iter()
    .collect();
    let links = vec![
        InputLink::new("a", desc.clone(), VecInput::new(vec![row![3_i64, "a3"], row![1_i64, "a1"]])),
        InputLink::new("b", desc, VecInput::new(vec![row![2_i64, "b2"], row![1_i64, "b1"]])),
    ];
    let mut join = MultiMergeJoin::new(settings(&["a", "b"], "full outer"), links, CancellationToken::new());
    let mut sink = CollectSink::new();
    join.run(&mut sink).unwrap();
    let keys: Vec<Value> = sink
        .into_rows()
        .iter()
        .map(|r| {
            let key = if r.get(0) == Some(&Value::Null) { r.get(2) } else { r.get(0) };
            key.cloned().unwrap()
        })
        .collect();
    assert_eq!(keys, vec![Value::Integer(3), Value::Integer(2), Value::Integer(1)]);
}

#[test]
fn test_mixed_numeric_kinds_join() {
    let int_layout = layout(ValueKind::Integer, "i");
    let num_layout = layout(ValueKind::Number, "n");
    let links = vec![
        InputLink::new("i", int_layout, VecInput::new(vec![row![2_i64, "two"]])),
        InputLink::new("n", num_layout, VecInput::new(vec![row![2.0_f64, "2.0"]])),
    ];
    let mut join = MultiMergeJoin::new(settings(&["i", "n"], "inner"), links, CancellationToken::new());
    let mut sink = CollectSink::new();
    join.run(&mut sink).unwrap();
    assert_eq!(sink.into_rows(), vec![row![2_i64, "two", 2.0_f64, "2.0"]]);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[rstest]
#[case::unknown_join_type(settings(&["a", "b"], "LEFT OUTER"), "UNKNOWN_JOIN_TYPE")]
#[case::missing_stream(settings(&["a", "zzz"], "INNER"), "STREAM_NOT_FOUND")]
#[case::duplicate_stream(settings(&["a", "a"], "INNER"), "DUPLICATE_STREAM")]
#[case::key_count(
    MergeJoinSettings { keys: vec!["k".into()], ..settings(&["a", "b"], "INNER") },
    "KEY_LIST_COUNT_MISMATCH"
)]
#[case::missing_key_field(
    MergeJoinSettings { keys: vec!["k".into(), "nope".into()], ..settings(&["a", "b"], "INNER") },
    "KEY_FIELD_NOT_FOUND"
)]
#[case::empty_key(
    MergeJoinSettings { keys: vec!["k".into(), " , ".into()], ..settings(&["a", "b"], "INNER") },
    "EMPTY_KEY"
)]
#[case::arity(
    MergeJoinSettings { keys: vec!["k".into(), "k, b".into()], ..settings(&["a", "b"], "INNER") },
    "KEY_ARITY_MISMATCH"
)]
fn test_configuration_errors(#[case] settings: MergeJoinSettings, #[case] code: &str) {
    let links = vec![
        InputLink::new("a", layout(ValueKind::Integer, "a"), VecInput::new(vec![row![1_i64, "x"]])),
        InputLink::new("b", layout(ValueKind::Integer, "b"), VecInput::new(vec![row![1_i64, "y"]])),
    ];
    let mut join = MultiMergeJoin::new(settings, links, CancellationToken::new());
    let mut sink = CollectSink::new();
    let err = join.run(&mut sink).unwrap_err();
    assert_eq!(err.category, ErrorCategory::Config);
    assert_eq!(err.code, code);
    assert!(sink.rows().is_empty());
}

#[test]
fn test_incomparable_key_kinds_fail_at_runtime() {
    let links = vec![
        InputLink::new("a", layout(ValueKind::Integer, "a"), VecInput::new(vec![row![1_i64, "x"]])),
        InputLink::new("b", layout(ValueKind::String, "b"), VecInput::new(vec![row!["1", "y"]])),
    ];
    let mut join = MultiMergeJoin::new(settings(&["a", "b"], "INNER"), links, CancellationToken::new());
    let mut sink = CollectSink::new();
    let err = join.run(&mut sink).unwrap_err();
    assert_eq!(err.category, ErrorCategory::IncomparableKeys);
    assert_eq!(err.code, "KEY_KINDS_INCOMPATIBLE");
}

#[test]
fn test_incomparable_kinds_with_only_null_keys_do_not_fail() {
    let links = vec![
        InputLink::new("a", layout(ValueKind::Integer, "a"), VecInput::new(vec![row![Value::Null, "x"]])),
        InputLink::new("b", layout(ValueKind::String, "b"), VecInput::new(vec![row![Value::Null, "y"]])),
    ];
    let mut join = MultiMergeJoin::new(settings(&["a", "b"], "INNER"), links, CancellationToken::new());
    let mut sink = CollectSink::new();
    assert_eq!(join.run(&mut sink).unwrap(), JoinOutcome::Completed);
    assert_eq!(sink.rows().len(), 1);
}

#[test]
fn test_unsorted_input_is_a_data_error() {
    let (outcome, _) = run(
        "FULL OUTER",
        vec![
            ("a", vec![row![1_i64, "a"], row![3_i64, "b"], row![2_i64, "c"]]),
            ("b", vec![row![1_i64, "d"]]),
        ],
    );
    let err = outcome.unwrap_err();
    assert_eq!(err.category, ErrorCategory::Data);
    assert_eq!(err.code, "UNSORTED_INPUT");
}

#[rstest]
#[case::long_row(row![1_i64, "x", "EXTRA", "EXTRA2"])]
#[case::short_row(row![1_i64])]
fn test_row_width_must_match_layout(#[case] bad: Row) {
    for join_type in ["INNER", "FULL OUTER"] {
        let (outcome, rows) = run(
            join_type,
            vec![("a", vec![bad.clone()]), ("b", vec![row![1_i64, "y"]])],
        );
        let err = outcome.unwrap_err();
        assert_eq!(err.category, ErrorCategory::Data);
        assert_eq!(err.code, "ROW_WIDTH_MISMATCH");
        assert!(rows.is_empty());
    }
}

#[test]
fn test_wrong_width_row_after_valid_rows_stops_the_join() {
    let (outcome, rows) = run(
        "INNER",
        vec![
            ("a", vec![row![1_i64, "a1"], row![2_i64]]),
            ("b", vec![row![1_i64, "b1"], row![2_i64, "b2"]]),
        ],
    );
    assert_eq!(outcome.unwrap_err().code, "ROW_WIDTH_MISMATCH");
    assert!(rows.iter().all(|r| r.len() == 4));
}

#[test]
fn test_signed_zero_keys_are_one_key() {
    let links = vec![
        InputLink::new("a", layout(ValueKind::Number, "a"), VecInput::new(vec![row![-0.0_f64, "neg"]])),
        InputLink::new("b", layout(ValueKind::Integer, "b"), VecInput::new(vec![row![0_i64, "int"]])),
        InputLink::new("c", layout(ValueKind::Number, "c"), VecInput::new(vec![row![0.0_f64, "pos"]])),
    ];
    let mut join = MultiMergeJoin::new(settings(&["a", "b", "c"], "INNER"), links, CancellationToken::new());
    let mut sink = CollectSink::new();
    assert_eq!(join.run(&mut sink).unwrap(), JoinOutcome::Completed);
    assert_eq!(sink.rows().len(), 1);
    assert_eq!(sink.rows()[0].get(3), Some(&Value::String("int".into())));
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Equal-key input that trips the cancellation token after `cancel_after`
/// pulls and counts every pull.
struct CancellingInput {
    remaining: usize,
    pulls: Arc<AtomicUsize>,
    cancel_after: usize,
    cancel: CancellationToken,
}

impl RowInput for CancellingInput {
    fn pull(&mut self) -> Result<Option<Row>, StepError> {
        let n = self.pulls.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.cancel_after {
            self.cancel.cancel();
        }
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(row![7_i64, "dup"]))
    }
}

#[test]
fn test_cancellation_mid_drain_stops_pulling_and_emitting() {
    let cancel = CancellationToken::new();
    let pulls = Arc::new(AtomicUsize::new(0));
    let big = CancellingInput {
        remaining: 10_000,
        pulls: Arc::clone(&pulls),
        cancel_after: 100,
        cancel: cancel.clone(),
    };
    let links = vec![
        InputLink::new("big", layout(ValueKind::Integer, "big"), big),
        InputLink::new("small", layout(ValueKind::Integer, "small"), VecInput::new(vec![row![7_i64, "one"]])),
    ];
    let mut join = MultiMergeJoin::new(settings(&["big", "small"], "INNER"), links, cancel);
    let mut sink = CollectSink::new();

    assert_eq!(join.run(&mut sink).unwrap(), JoinOutcome::Cancelled);
    assert!(pulls.load(Ordering::SeqCst) <= 101);
    assert!(sink.rows().is_empty());
    assert_eq!(join.metrics().rows_emitted, 0);
}

#[test]
fn test_cancellation_during_emission_leaves_prefix() {
    let cancel = CancellationToken::new();
    let links = vec![
        InputLink::new("a", layout(ValueKind::Integer, "a"), VecInput::new(vec![row![1_i64, "a1"], row![1_i64, "a2"]])),
        InputLink::new("b", layout(ValueKind::Integer, "b"), VecInput::new(vec![row![1_i64, "b1"], row![1_i64, "b2"]])),
    ];

    /// Sink that cancels after its first row.
    struct StopAfterFirst {
        rows: Vec<Row>,
        cancel: CancellationToken,
    }
    impl rowflow_engine::RowSink for StopAfterFirst {
        fn emit(&mut self, row: Row) -> Result<(), StepError> {
            self.rows.push(row);
            self.cancel.cancel();
            Ok(())
        }
    }

    let mut sink = StopAfterFirst {
        rows: Vec::new(),
        cancel: cancel.clone(),
    };
    let mut join = MultiMergeJoin::new(settings(&["a", "b"], "INNER"), links, cancel);
    assert_eq!(join.run(&mut sink).unwrap(), JoinOutcome::Cancelled);
    assert_eq!(sink.rows, vec![row![1_i64, "a1", 1_i64, "b1"]]);
}
