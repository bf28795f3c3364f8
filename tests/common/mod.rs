//! Shared helpers for integration tests (schemas, inputs and the dataframe suite).

#![allow(dead_code)]

#[macro_use]
pub mod suite;

use polyframe::{DataInput, FrameError, Row, Schema, Value};
use polyframe::spark::SparkSession;
use serde_json::Value as JsonValue;

/// Builds a dataframe from raw input and an optional schema expression.
pub type Ctor = fn(DataInput, Option<&str>) -> Result<polyframe::AnyDataFrame, FrameError>;

pub fn schema(expr: &str) -> Schema {
    expr.parse().unwrap()
}

/// Parse an optional schema expression for a constructor.
pub fn schema_opt(expr: Option<&str>) -> Result<Option<Schema>, FrameError> {
    expr.map(str::parse).transpose()
}

pub fn json(value: JsonValue) -> DataInput {
    DataInput::Json(value)
}

pub fn row<const N: usize>(values: [Value; N]) -> Row {
    values.to_vec()
}

/// An isolated session so tests don't share the active one.
pub fn spark(parallelism: usize) -> SparkSession {
    SparkSession::builder()
        .app_name("polyframe_tests")
        .master(format!("local[{parallelism}]"))
        .create()
}
