//! The observable dataframe contract, run against every adapter.
//!
//! Each `check_*` function takes a constructor; [`dataframe_suite!`] expands
//! them into `#[test]` functions for one adapter.

use super::{json, schema, Ctor};
use chrono::{NaiveDate, NaiveDateTime};
use polyframe::{DataFrame, DataInput, FrameError, Value};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

macro_rules! dataframe_suite {
    ($ctor:expr) => {
        dataframe_suite!(@tests $ctor;
            check_init_basic,
            check_coerce_to_str,
            check_coerce_to_double,
            check_null_columns_str_double,
            check_null_columns_int_bool,
            check_as_array_reorders_columns,
            check_peek,
            check_dict_reads,
            check_empty_frame,
            check_unsupported_input,
            check_rows_without_schema,
            check_row_width_mismatch,
            check_coercion_error,
            check_select_and_drop,
            check_rename,
            check_alter_columns,
            check_nested_decode,
            check_temporal_text,
            check_head,
            check_local_conversions,
            check_wrap_existing_frame,
            check_polars_input,
        );
    };
    (@tests $ctor:expr; $($name:ident),* $(,)?) => {
        $(
            #[test]
            fn $name() {
                crate::common::suite::$name($ctor);
            }
        )*
    };
}

fn ab_rows() -> DataInput {
    json(json!([["a", 1], ["b", 2]]))
}

pub fn check_init_basic(make: Ctor) {
    let df = make(ab_rows(), Some("a:str,b:int")).unwrap();
    assert_eq!(df.schema(), &schema("a:str,b:int"));
    assert!(df.is_bounded());
    assert!(!df.is_empty().unwrap());
    assert_eq!(df.count().unwrap(), 2);
    assert!(df.num_partitions() >= 1);
}

pub fn check_coerce_to_str(make: Ctor) {
    let df = make(ab_rows(), Some("a:str,b:str")).unwrap();
    let rows = df.as_array(None, true).unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::from("a"), Value::from("1")],
            vec![Value::from("b"), Value::from("2")],
        ]
    );
}

pub fn check_coerce_to_double(make: Ctor) {
    let df = make(ab_rows(), Some("a:str,b:double")).unwrap();
    for type_safe in [true, false] {
        let rows = df.as_array(None, type_safe).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::from("a"), Value::Double(1.0)],
                vec![Value::from("b"), Value::Double(2.0)],
            ]
        );
    }
}

pub fn check_null_columns_str_double(make: Ctor) {
    let df = make(json(json!([[null, null]])), Some("b:str,c:double")).unwrap();
    assert_eq!(df.as_array(None, true).unwrap(), vec![vec![Value::Null, Value::Null]]);
    let fast = df.as_array(None, false).unwrap();
    assert_eq!(fast.len(), 1);
    assert_eq!(fast[0][0], Value::Null);
    assert!(fast[0][1].is_missing());
}

pub fn check_null_columns_int_bool(make: Ctor) {
    let df = make(json(json!([[null, null]])), Some("b:int,c:bool")).unwrap();
    assert_eq!(df.as_array(None, true).unwrap(), vec![vec![Value::Null, Value::Null]]);
    assert_eq!(df.peek_array().unwrap(), vec![Value::Null, Value::Null]);
}

pub fn check_as_array_reorders_columns(make: Ctor) {
    let df = make(ab_rows(), Some("a:str,b:int")).unwrap();
    let rows = df.as_array(Some(&["b", "a"][..]), true).unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::Int(1), Value::from("a")],
            vec![Value::Int(2), Value::from("b")],
        ]
    );
    let iterated = df
        .as_array_iterable(Some(&["b"][..]), false)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(iterated, vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
    let err = df.as_array(Some(&["x"][..]), true).unwrap_err();
    assert!(matches!(err, FrameError::MissingColumn(_)));
}

pub fn check_peek(make: Ctor) {
    let df = make(ab_rows(), Some("a:str,b:int")).unwrap();
    assert_eq!(df.peek_array().unwrap(), vec![Value::from("a"), Value::Int(1)]);
    let dict = df.peek_dict().unwrap();
    assert_eq!(dict.len(), 2);
    assert_eq!(dict["a"], Value::from("a"));
    assert_eq!(dict["b"], Value::Int(1));
}

pub fn check_dict_reads(make: Ctor) {
    let df = make(ab_rows(), Some("a:str,b:int")).unwrap();
    let dicts = df
        .as_dict_iterable(Some(&["b"][..]))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(dicts.len(), 2);
    assert_eq!(dicts[1]["b"], Value::Int(2));
    assert!(!dicts[1].contains_key("a"));
}

pub fn check_empty_frame(make: Ctor) {
    for input in [DataInput::Empty, json(json!(null)), DataInput::Rows(vec![])] {
        let df = make(input, Some("a:int,b:str")).unwrap();
        assert!(df.is_empty().unwrap());
        assert_eq!(df.count().unwrap(), 0);
        assert!(df.as_array(None, true).unwrap().is_empty());
        assert!(matches!(df.peek_array(), Err(FrameError::InvalidOperation(_))));
        assert_eq!(df.schema(), &schema("a:int,b:str"));
    }
}

pub fn check_unsupported_input(make: Ctor) {
    let err = make(json(json!(42)), Some("a:int")).unwrap_err();
    assert!(matches!(err, FrameError::UnsupportedInput(_)), "{err}");
    let err = make(json(json!({"a": 1})), Some("a:int")).unwrap_err();
    assert!(matches!(err, FrameError::UnsupportedInput(_)), "{err}");
}

pub fn check_rows_without_schema(make: Ctor) {
    let err = make(ab_rows(), None).unwrap_err();
    assert!(matches!(err, FrameError::InvalidArgument(_)), "{err}");
    let err = make(DataInput::Empty, None).unwrap_err();
    assert!(matches!(err, FrameError::InvalidArgument(_)), "{err}");
}

pub fn check_row_width_mismatch(make: Ctor) {
    let err = make(json(json!([["a", 1, 2]])), Some("a:str,b:int")).unwrap_err();
    assert!(matches!(err, FrameError::InvalidArgument(_)), "{err}");
}

pub fn check_coercion_error(make: Ctor) {
    let err = make(json(json!([["x"]])), Some("a:int")).unwrap_err();
    assert!(matches!(err, FrameError::TypeCoercion(_)), "{err}");
    let err = make(json(json!([[1]])), Some("a:date")).unwrap_err();
    assert!(matches!(err, FrameError::TypeCoercion(_)), "{err}");
}

pub fn check_select_and_drop(make: Ctor) {
    let df = make(json(json!([["a", 1, true]])), Some("a:str,b:int,c:bool")).unwrap();
    let selected = df.select_columns(&["c", "a"]).unwrap();
    assert_eq!(selected.schema(), &schema("c:bool,a:str"));
    assert_eq!(
        selected.as_array(None, true).unwrap(),
        vec![vec![Value::Bool(true), Value::from("a")]]
    );
    let dropped = df.drop_columns(&["b"]).unwrap();
    assert_eq!(dropped.schema(), &schema("a:str,c:bool"));
    assert_eq!(dropped.count().unwrap(), 1);
    assert!(matches!(df.select_columns(&["x"]), Err(FrameError::MissingColumn(_))));
    assert!(matches!(df.drop_columns(&["x"]), Err(FrameError::MissingColumn(_))));
    // the source frame is unchanged
    assert_eq!(df.schema(), &schema("a:str,b:int,c:bool"));
}

pub fn check_rename(make: Ctor) {
    let df = make(ab_rows(), Some("a:str,b:int")).unwrap();
    let mapping = HashMap::from([("a".to_string(), "b".to_string()), ("b".to_string(), "a".to_string())]);
    let renamed = df.rename(&mapping).unwrap();
    assert_eq!(renamed.schema(), &schema("b:str,a:int"));
    assert_eq!(renamed.peek_dict().unwrap()["a"], Value::Int(1));
    assert_eq!(renamed.peek_dict().unwrap()["b"], Value::from("a"));
    let missing = HashMap::from([("x".to_string(), "y".to_string())]);
    assert!(matches!(df.rename(&missing), Err(FrameError::MissingColumn(_))));
    let clash = HashMap::from([("a".to_string(), "b".to_string())]);
    assert!(matches!(df.rename(&clash), Err(FrameError::InvalidSchema(_))));
}

pub fn check_alter_columns(make: Ctor) {
    let df = make(ab_rows(), Some("a:str,b:int")).unwrap();
    let altered = df.alter_columns(&schema("b:str")).unwrap();
    assert_eq!(altered.schema(), &schema("a:str,b:str"));
    assert_eq!(
        altered.as_array(None, true).unwrap(),
        vec![
            vec![Value::from("a"), Value::from("1")],
            vec![Value::from("b"), Value::from("2")],
        ]
    );
    let doubled = df.alter_columns(&schema("b:double")).unwrap();
    assert_eq!(doubled.peek_array().unwrap(), vec![Value::from("a"), Value::Double(1.0)]);
    assert!(matches!(
        df.alter_columns(&schema("x:int")),
        Err(FrameError::MissingColumn(_))
    ));
    assert!(matches!(
        df.alter_columns(&schema("a:int")),
        Err(FrameError::TypeCoercion(_))
    ));
}

pub fn check_nested_decode(make: Ctor) {
    let input = json(json!([
        [{"x": 1, "y": "a"}, [1, 2]],
        ["{\"x\": 2}", "[3]"],
        [null, null],
    ]));
    let df = make(input, Some("s:{x:int,y:str},l:[int]")).unwrap();
    let rows = df.as_array(None, true).unwrap();
    assert_eq!(
        rows[0],
        vec![
            Value::Struct(vec![("x".into(), Value::Int(1)), ("y".into(), Value::from("a"))]),
            Value::List(vec![Value::Int(1), Value::Int(2)]),
        ]
    );
    assert_eq!(
        rows[1],
        vec![
            Value::Struct(vec![("x".into(), Value::Int(2)), ("y".into(), Value::Null)]),
            Value::List(vec![Value::Int(3)]),
        ]
    );
    assert_eq!(rows[2], vec![Value::Null, Value::Null]);
    // fast reads decode nested storage too
    assert_eq!(df.as_array(None, false).unwrap()[0], rows[0]);
    let err = make(json(json!([["{not json", null]])), Some("s:{x:int},l:[int]")).unwrap_err();
    assert!(matches!(err, FrameError::TypeCoercion(_)), "{err}");
}

pub fn check_temporal_text(make: Ctor) {
    let df = make(
        json(json!([["2020-01-02", "2020-01-02 03:04:05"]])),
        Some("d:date,t:datetime"),
    )
    .unwrap();
    let date = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    let ts: NaiveDateTime = date.and_hms_opt(3, 4, 5).unwrap();
    assert_eq!(
        df.as_array(None, true).unwrap(),
        vec![vec![Value::Date(date), Value::Datetime(ts)]]
    );
}

pub fn check_head(make: Ctor) {
    let df = make(ab_rows(), Some("a:str,b:int")).unwrap();
    let head = df.head(1, None).unwrap();
    assert_eq!(head.as_array(None, true).unwrap(), vec![vec![Value::from("a"), Value::Int(1)]]);
    let head = df.head(5, Some(&["b"][..])).unwrap();
    assert_eq!(head.schema(), &schema("b:int"));
    assert_eq!(head.count().unwrap(), 2);
}

pub fn check_local_conversions(make: Ctor) {
    let df = make(ab_rows(), Some("a:str,b:int")).unwrap();
    let local = df.as_local().unwrap();
    assert!(local.is_local());
    assert_eq!(local.as_array(None, true).unwrap(), df.as_array(None, true).unwrap());
    let bounded = df.as_local_bounded().unwrap();
    assert!(bounded.is_local() && bounded.is_bounded());
    assert_eq!(df.as_polars().unwrap().height(), 2);
    assert_eq!(df.as_arrow().unwrap().num_rows(), 2);
}

pub fn check_wrap_existing_frame(make: Ctor) {
    let df = make(ab_rows(), Some("a:str,b:int")).unwrap();
    let same = make(DataInput::Frame(Arc::clone(&df)), None).unwrap();
    assert_eq!(same.schema(), df.schema());
    assert_eq!(same.as_array(None, true).unwrap(), df.as_array(None, true).unwrap());
    let reshaped = make(DataInput::Frame(df), Some("b:str")).unwrap();
    assert_eq!(
        reshaped.as_array(None, true).unwrap(),
        vec![vec![Value::from("1")], vec![Value::from("2")]]
    );
}

pub fn check_polars_input(make: Ctor) {
    use polars::prelude::df;
    let native = df!["a" => &["x", "y"], "b" => &[1i64, 2]].unwrap();
    let inferred = make(DataInput::from(native.clone()), None).unwrap();
    assert_eq!(inferred.schema(), &schema("a:str,b:long"));
    let typed = make(DataInput::from(native), Some("b:int,a:str")).unwrap();
    assert_eq!(
        typed.as_array(None, true).unwrap(),
        vec![
            vec![Value::Int(1), Value::from("x")],
            vec![Value::Int(2), Value::from("y")],
        ]
    );
}
