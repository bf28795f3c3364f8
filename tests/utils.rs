//! Free helpers: column names, renames, normalization, locality and equality.

mod common;

use polars::prelude::df;
use polyframe::utils::{
    get_column_names, normalize_dataframe_column_names, rename, to_local_bounded_df, to_local_df,
};
use polyframe::{
    frames_equal, AnyDataFrame, ArrayDataFrame, DataFrame, DataFrames, DataInput,
    EqualityOptions, ExecutionEngine, FrameError, IterableDataFrame, Value,
};
use polyframe::execution::EngineConf;
use polyframe::spark::SparkExecutionEngine;
use std::collections::HashMap;
use std::sync::Arc;

fn frame(json: serde_json::Value, schema: &str) -> AnyDataFrame {
    Arc::new(ArrayDataFrame::new(common::json(json), Some(&common::schema(schema))).unwrap())
}

#[test]
fn column_names_of_frames_and_native_data() {
    let df = frame(serde_json::json!([[1, "x"]]), "a:int,b:str");
    assert_eq!(get_column_names(&df).unwrap(), vec!["a", "b"]);
    let native = df!["x" => &[1i64], "y" => &[2.0]].unwrap();
    assert_eq!(get_column_names(&native).unwrap(), vec!["x", "y"]);
    assert!(matches!(get_column_names(&1u8), Err(FrameError::UnsupportedInput(_))));
}

#[test]
fn empty_rename_keeps_the_frame() {
    let df = frame(serde_json::json!([[1]]), "a:int");
    let same = rename(&df, &HashMap::new()).unwrap();
    assert!(Arc::ptr_eq(&df, &same));
    let renamed = rename(&df, &HashMap::from([("a".to_string(), "b".to_string())])).unwrap();
    assert_eq!(renamed.schema().names(), vec!["b"]);
}

#[test]
fn normalizing_frame_columns() {
    let df = frame(serde_json::json!([[1, 2]]), "`a b`:int,`1`:int");
    let (normalized, mapping) = normalize_dataframe_column_names(&df).unwrap();
    assert_eq!(normalized.schema().names(), vec!["a_b", "_1"]);
    assert_eq!(mapping.get("a_b").map(String::as_str), Some("a b"));
    assert_eq!(mapping.get("_1").map(String::as_str), Some("1"));
    assert_eq!(normalized.peek_array().unwrap(), vec![Value::Int(1), Value::Int(2)]);

    let clean = frame(serde_json::json!([[1]]), "a:int");
    let (same, mapping) = normalize_dataframe_column_names(&clean).unwrap();
    assert!(mapping.is_empty());
    assert!(Arc::ptr_eq(&clean, &same));
}

#[test]
fn local_conversions() {
    let df = frame(serde_json::json!([[1]]), "a:int");
    assert!(Arc::ptr_eq(&df, &to_local_df(&df).unwrap()));
    assert!(Arc::ptr_eq(&df, &to_local_bounded_df(&df).unwrap()));

    let stream: AnyDataFrame = Arc::new(
        IterableDataFrame::new(
            DataInput::stream(vec![vec![Value::from(1)]]),
            Some(&common::schema("a:int")),
        )
        .unwrap(),
    );
    assert!(Arc::ptr_eq(&stream, &to_local_df(&stream).unwrap()));
    let bounded = to_local_bounded_df(&stream).unwrap();
    assert!(bounded.is_bounded());
    assert_eq!(bounded.count().unwrap(), 1);

    let engine = SparkExecutionEngine::with_session(common::spark(2), EngineConf::new());
    let spark = engine.to_df(DataInput::Frame(df), None).unwrap();
    let local = to_local_df(&spark).unwrap();
    assert!(local.is_local());
    assert_eq!(local.count().unwrap(), 1);
}

#[test]
fn equality_ignores_order_and_backend() {
    let a = frame(serde_json::json!([[1, 0.1], [2, 0.2]]), "a:int,b:double");
    let b = frame(serde_json::json!([[2, 0.2000000000001], [1, 0.1]]), "a:int,b:double");
    let options = EqualityOptions::default();
    assert!(frames_equal(a.as_ref(), b.as_ref(), &options).unwrap());

    let ordered = EqualityOptions {
        check_order: true,
        ..EqualityOptions::default()
    };
    assert!(!frames_equal(a.as_ref(), b.as_ref(), &ordered).unwrap());

    let engine = SparkExecutionEngine::with_session(common::spark(2), EngineConf::new());
    let spark = engine.to_df(DataInput::Frame(Arc::clone(&a)), None).unwrap();
    assert!(frames_equal(a.as_ref(), spark.as_ref(), &ordered).unwrap());
}

#[test]
fn equality_checks_schema_unless_disabled() {
    let a = frame(serde_json::json!([[1]]), "a:int");
    let b = frame(serde_json::json!([[1]]), "a:long");
    assert!(!frames_equal(a.as_ref(), b.as_ref(), &EqualityOptions::default()).unwrap());
    let loose = EqualityOptions {
        check_schema: false,
        ..EqualityOptions::default()
    };
    // content is read against the left schema, so long 1 equals int 1
    assert!(frames_equal(a.as_ref(), b.as_ref(), &loose).unwrap());
    let throwing = EqualityOptions {
        throw: true,
        ..EqualityOptions::default()
    };
    let err = frames_equal(a.as_ref(), b.as_ref(), &throwing).unwrap_err();
    assert!(matches!(err, FrameError::InvalidOperation(_)));
}

#[test]
fn equality_without_schema_check_compares_column_names() {
    let loose = EqualityOptions {
        check_schema: false,
        ..EqualityOptions::default()
    };
    let a = frame(serde_json::json!([[1, "x"]]), "a:int,b:str");
    let renamed = frame(serde_json::json!([[1, "x"]]), "a:int,c:str");
    assert!(!frames_equal(a.as_ref(), renamed.as_ref(), &loose).unwrap());
    let narrower = frame(serde_json::json!([[1]]), "a:int");
    assert!(!frames_equal(a.as_ref(), narrower.as_ref(), &loose).unwrap());
    let reordered = frame(serde_json::json!([["x", 1]]), "b:str,a:long");
    assert!(frames_equal(a.as_ref(), reordered.as_ref(), &loose).unwrap());

    let throwing = EqualityOptions { throw: true, ..loose };
    let err = frames_equal(a.as_ref(), renamed.as_ref(), &throwing).unwrap_err();
    assert!(matches!(err, FrameError::InvalidOperation(ref m) if m.contains("columns")));
}

#[test]
fn dataframes_collection() {
    let mut dfs = DataFrames::from_list([
        frame(serde_json::json!([[1]]), "a:int"),
        frame(serde_json::json!([[2]]), "a:int"),
    ]);
    dfs.insert("extra", frame(serde_json::json!([[3]]), "a:int")).unwrap();
    assert_eq!(dfs.len(), 3);
    assert_eq!(dfs.keys().collect::<Vec<_>>(), vec!["_0", "_1", "extra"]);
    assert!(dfs.has_key());
    let local = dfs.convert(to_local_bounded_df).unwrap();
    let counts: Vec<usize> = local.values().map(|df| df.count().unwrap()).collect();
    assert_eq!(counts, vec![1, 1, 1]);
}
