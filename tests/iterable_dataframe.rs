//! Single-pass adapters: row streams and streams of local frames.

mod common;

use polyframe::{
    AnyDataFrame, ArrayDataFrame, DataFrame, DataInput, FrameError, FrameIterableDataFrame,
    IterableDataFrame, Value,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn stream(n: i64) -> DataInput {
    DataInput::stream((0..n).map(|i| vec![Value::Long(i), Value::from(i.to_string())]))
}

fn frame(rows: Vec<Vec<Value>>, schema: &str) -> AnyDataFrame {
    Arc::new(ArrayDataFrame::new(DataInput::Rows(rows), Some(&common::schema(schema))).unwrap())
}

#[test]
fn stream_is_unbounded_and_single_pass() {
    let df = IterableDataFrame::new(stream(3), Some(&common::schema("a:int,b:str"))).unwrap();
    assert!(df.is_local());
    assert!(!df.is_bounded());
    assert!(matches!(df.count(), Err(FrameError::InvalidOperation(_))));
    assert!(!df.is_empty().unwrap());
    assert_eq!(df.peek_array().unwrap(), vec![Value::Int(0), Value::from("0")]);
    // peeking doesn't consume the row
    let rows = df.as_array(None, false).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2], vec![Value::Int(2), Value::from("2")]);
    assert!(matches!(df.as_array(None, true), Err(FrameError::InvalidOperation(_))));
    assert!(df.is_empty().unwrap());
}

#[test]
fn stream_rows_are_coerced_when_pulled() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&pulled);
    let input = DataInput::stream((0..5).map(move |i: i32| {
        counter.fetch_add(1, Ordering::SeqCst);
        vec![Value::from(i)]
    }));
    let df = IterableDataFrame::new(input, Some(&common::schema("a:str"))).unwrap();
    assert_eq!(pulled.load(Ordering::SeqCst), 0);
    assert_eq!(df.peek_array().unwrap(), vec![Value::from("0")]);
    assert_eq!(pulled.load(Ordering::SeqCst), 1);
    let head = df.head(2, None).unwrap();
    assert_eq!(head.count().unwrap(), 2);
    assert!(pulled.load(Ordering::SeqCst) < 5);
}

#[test]
fn stream_coercion_error_surfaces_on_read() {
    let input = DataInput::stream(vec![vec![Value::from("1")], vec![Value::from("x")]]);
    let df = IterableDataFrame::new(input, Some(&common::schema("a:int"))).unwrap();
    let results: Vec<_> = df.as_array_iterable(None, true).unwrap().collect();
    assert_eq!(results[0].as_ref().unwrap(), &vec![Value::Int(1)]);
    assert!(matches!(results[1], Err(FrameError::TypeCoercion(_))));
}

#[test]
fn stream_needs_schema() {
    let err = IterableDataFrame::new(stream(1), None).unwrap_err();
    assert!(matches!(err, FrameError::InvalidArgument(_)));
}

#[test]
fn stream_shape_changes_are_lazy() {
    let df = IterableDataFrame::new(stream(2), Some(&common::schema("a:long,b:str"))).unwrap();
    let renamed = df
        .rename(&HashMap::from([("b".to_string(), "c".to_string())]))
        .unwrap();
    let selected = renamed.select_columns(&["c"]).unwrap();
    let altered = selected.alter_columns(&common::schema("c:int")).unwrap();
    assert_eq!(altered.schema(), &common::schema("c:int"));
    let local = altered.as_local_bounded().unwrap();
    assert!(local.is_bounded());
    assert_eq!(
        local.as_array(None, true).unwrap(),
        vec![vec![Value::Int(0)], vec![Value::Int(1)]]
    );
    // the source moved into the derived frame
    assert!(matches!(df.as_array(None, true), Err(FrameError::InvalidOperation(_))));
}

#[test]
fn bounded_input_becomes_a_stream() {
    let df = IterableDataFrame::new(
        common::json(serde_json::json!([[1], [2]])),
        Some(&common::schema("a:double")),
    )
    .unwrap();
    assert_eq!(
        df.as_array(Some(&["a"][..]), true).unwrap(),
        vec![vec![Value::Double(1.0)], vec![Value::Double(2.0)]]
    );
}

#[test]
fn frame_stream_skips_empty_frames_and_conforms() {
    let frames = vec![
        frame(vec![], "a:int,b:str"),
        frame(vec![vec![Value::from(1), Value::from("x")]], "a:int,b:str"),
        frame(vec![vec![Value::from("y"), Value::from(2)]], "b:str,a:int"),
    ];
    let df = FrameIterableDataFrame::new(DataInput::frames(frames), Some(&common::schema("a:int,b:str")))
        .unwrap();
    assert!(!df.is_bounded());
    assert!(!df.is_empty().unwrap());
    assert_eq!(df.peek_array().unwrap(), vec![Value::Int(1), Value::from("x")]);
    let parts: Vec<AnyDataFrame> = df
        .as_frame_iterable()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[1].peek_array().unwrap(), vec![Value::Int(2), Value::from("y")]);
    assert!(matches!(df.as_frame_iterable(), Err(FrameError::InvalidOperation(_))));
}

#[test]
fn frame_stream_schema_from_first_frame() {
    let frames = vec![
        frame(vec![vec![Value::from(1)]], "a:int"),
        frame(vec![vec![Value::from(2)], vec![Value::from(3)]], "a:int"),
    ];
    let df = FrameIterableDataFrame::new(DataInput::frames(frames), None).unwrap();
    assert_eq!(df.schema(), &common::schema("a:int"));
    let local = df.as_local_bounded().unwrap();
    assert_eq!(local.count().unwrap(), 3);

    let empty = FrameIterableDataFrame::new(DataInput::frames(Vec::<AnyDataFrame>::new()), None).unwrap_err();
    assert!(matches!(empty, FrameError::InvalidArgument(_)));
    let empty = FrameIterableDataFrame::new(
        DataInput::frames(Vec::<AnyDataFrame>::new()),
        Some(&common::schema("a:int")),
    )
    .unwrap();
    assert!(empty.is_empty().unwrap());
    assert!(matches!(empty.peek_array(), Err(FrameError::InvalidOperation(_))));
}

#[test]
fn frame_stream_select_reads_each_frame() {
    let frames = vec![
        frame(vec![vec![Value::from(1), Value::from("x")]], "a:int,b:str"),
        frame(vec![vec![Value::from(2), Value::from("y")]], "a:int,b:str"),
    ];
    let df = FrameIterableDataFrame::new(DataInput::frames(frames), None).unwrap();
    let selected = df.select_columns(&["b"]).unwrap();
    assert_eq!(
        selected.as_array(None, true).unwrap(),
        vec![vec![Value::from("x")], vec![Value::from("y")]]
    );
}

#[test]
fn peeking_a_consumed_stream_reports_consumption() {
    let consumed = |e: &FrameError| matches!(e, FrameError::InvalidOperation(m) if m.contains("consumed"));

    let df = IterableDataFrame::new(stream(2), Some(&common::schema("a:int,b:str"))).unwrap();
    assert_eq!(df.as_array(None, true).unwrap().len(), 2);
    assert!(consumed(&df.peek_array().unwrap_err()));

    let empty = IterableDataFrame::new(stream(0), Some(&common::schema("a:int,b:str"))).unwrap();
    let err = empty.peek_array().unwrap_err();
    assert!(matches!(err, FrameError::InvalidOperation(ref m) if m.contains("empty")));

    let frames = vec![frame(vec![vec![Value::from(1), Value::from("x")]], "a:int,b:str")];
    let df = FrameIterableDataFrame::new(DataInput::frames(frames), None).unwrap();
    assert_eq!(df.as_array(None, true).unwrap().len(), 1);
    assert!(consumed(&df.peek_array().unwrap_err()));
}
