//! Inputs a dataframe can be built from.

use super::{AnyDataFrame, DataFrame};
use crate::arrow_conversion::{from_arrow_schema, record_batch_to_rows};
use arrow::record_batch::RecordBatch;
use polyframe_core::coercion::coerce_row;
use polyframe_core::{FrameError, Result, Row, Schema, Value};
use polyframe_polars::{frame_to_rows, infer_schema, polars_to_frame_error, PlColumn, PlDataFrame, Series};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// Lazily produced rows for the iterable adapter.
pub type RowStream = Box<dyn Iterator<Item = Row> + Send>;

/// Lazily produced local frames for the frame-iterable adapter.
pub type FrameStream = Box<dyn Iterator<Item = AnyDataFrame> + Send>;

/// Everything an adapter constructor accepts.
///
/// Each adapter consumes the variants it understands and rejects the rest
/// with [`FrameError::UnsupportedInput`].
pub enum DataInput {
    /// No data; requires a schema.
    Empty,
    /// Rows in schema order; requires a schema.
    Rows(Vec<Row>),
    /// `null` or an array of arrays; requires a schema.
    Json(JsonValue),
    Polars(Arc<PlDataFrame>),
    /// A single named column.
    Series(Series),
    Arrow(Arc<RecordBatch>),
    /// Another dataframe of any adapter.
    Frame(AnyDataFrame),
    /// Single-pass row source; requires a schema.
    Stream(RowStream),
    /// Single-pass source of frames sharing one schema.
    Frames(FrameStream),
}

impl DataInput {
    pub fn kind(&self) -> &'static str {
        match self {
            DataInput::Empty => "empty",
            DataInput::Rows(_) => "rows",
            DataInput::Json(_) => "json",
            DataInput::Polars(_) => "polars",
            DataInput::Series(_) => "series",
            DataInput::Arrow(_) => "arrow",
            DataInput::Frame(_) => "frame",
            DataInput::Stream(_) => "stream",
            DataInput::Frames(_) => "frames",
        }
    }

    pub fn stream<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = Row>,
        I::IntoIter: Send + 'static,
    {
        DataInput::Stream(Box::new(rows.into_iter()))
    }

    pub fn frames<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = AnyDataFrame>,
        I::IntoIter: Send + 'static,
    {
        DataInput::Frames(Box::new(frames.into_iter()))
    }

    /// Materialize bounded input as rows coerced to the resulting schema.
    ///
    /// With `schema`, columns of native tables are selected by name and each
    /// value is coerced; without it the schema is inferred from the native
    /// table or taken from the wrapped frame.
    pub(crate) fn into_rows(self, schema: Option<&Schema>) -> Result<(Vec<Row>, Schema)> {
        match self {
            DataInput::Empty => Ok((Vec::new(), required(schema, "empty")?.clone())),
            DataInput::Rows(rows) => {
                let schema = required(schema, "rows")?;
                Ok((coerce_rows(rows, schema)?, schema.clone()))
            }
            DataInput::Json(json) => {
                let rows = json_rows(json)?;
                let schema = required(schema, "json")?;
                Ok((coerce_rows(rows, schema)?, schema.clone()))
            }
            DataInput::Polars(df) => polars_rows(&df, schema),
            DataInput::Series(series) => {
                let df = series_frame(series)?;
                polars_rows(&df, schema)
            }
            DataInput::Arrow(batch) => {
                let source = from_arrow_schema(batch.schema().as_ref())?;
                let target = match schema {
                    Some(s) => {
                        source.indices_of(&s.names())?;
                        s.clone()
                    }
                    None => source,
                };
                let all: Vec<usize> = (0..target.len()).collect();
                Ok((record_batch_to_rows(&batch, &target, &all, true)?, target))
            }
            DataInput::Frame(df) => frame_rows(df.as_ref(), schema),
            DataInput::Stream(rows) => {
                let schema = required(schema, "stream")?;
                Ok((coerce_rows(rows.collect(), schema)?, schema.clone()))
            }
            DataInput::Frames(frames) => {
                let mut out = Vec::new();
                let mut resolved = schema.cloned();
                for df in frames {
                    let (rows, s) = frame_rows(df.as_ref(), resolved.as_ref())?;
                    out.extend(rows);
                    resolved = Some(s);
                }
                let schema = resolved.ok_or_else(|| {
                    FrameError::InvalidArgument("schema is required for an empty frame stream".into())
                })?;
                Ok((out, schema))
            }
        }
    }
}

impl fmt::Debug for DataInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataInput::{}", self.kind())
    }
}

impl From<Vec<Row>> for DataInput {
    fn from(rows: Vec<Row>) -> Self {
        DataInput::Rows(rows)
    }
}

impl From<JsonValue> for DataInput {
    fn from(json: JsonValue) -> Self {
        DataInput::Json(json)
    }
}

impl From<PlDataFrame> for DataInput {
    fn from(df: PlDataFrame) -> Self {
        DataInput::Polars(Arc::new(df))
    }
}

impl From<Arc<PlDataFrame>> for DataInput {
    fn from(df: Arc<PlDataFrame>) -> Self {
        DataInput::Polars(df)
    }
}

impl From<Series> for DataInput {
    fn from(series: Series) -> Self {
        DataInput::Series(series)
    }
}

impl From<RecordBatch> for DataInput {
    fn from(batch: RecordBatch) -> Self {
        DataInput::Arrow(Arc::new(batch))
    }
}

impl From<AnyDataFrame> for DataInput {
    fn from(df: AnyDataFrame) -> Self {
        DataInput::Frame(df)
    }
}

pub(crate) fn required<'a>(schema: Option<&'a Schema>, kind: &str) -> Result<&'a Schema> {
    schema.ok_or_else(|| FrameError::InvalidArgument(format!("schema is required for {kind} input")))
}

pub(crate) fn coerce_rows(rows: Vec<Row>, schema: &Schema) -> Result<Vec<Row>> {
    rows.into_iter().map(|r| coerce_row(r, schema)).collect()
}

/// Rows of a JSON document: `null` or an array of arrays.
pub(crate) fn json_rows(json: JsonValue) -> Result<Vec<Row>> {
    match json {
        JsonValue::Null => Ok(Vec::new()),
        JsonValue::Array(items) => items
            .into_iter()
            .map(|item| match item {
                JsonValue::Array(cells) => Ok(cells.into_iter().map(Value::from).collect()),
                other => Err(FrameError::UnsupportedInput(format!(
                    "json rows must be arrays, got {other}"
                ))),
            })
            .collect(),
        other => Err(FrameError::UnsupportedInput(format!(
            "json input must be null or an array of arrays, got {other}"
        ))),
    }
}

pub(crate) fn series_frame(series: Series) -> Result<PlDataFrame> {
    PlDataFrame::new(vec![PlColumn::from(series)]).map_err(polars_to_frame_error)
}

fn polars_rows(df: &PlDataFrame, schema: Option<&Schema>) -> Result<(Vec<Row>, Schema)> {
    let target = match schema {
        Some(s) => {
            infer_schema(df)?.indices_of(&s.names())?;
            s.clone()
        }
        None => infer_schema(df)?,
    };
    let all: Vec<usize> = (0..target.len()).collect();
    Ok((frame_to_rows(df, &target, &all, true)?, target))
}

fn frame_rows(df: &dyn DataFrame, schema: Option<&Schema>) -> Result<(Vec<Row>, Schema)> {
    match schema {
        Some(s) => {
            let names = s.names();
            let rows = df.as_array(Some(names.as_slice()), true)?;
            Ok((coerce_rows(rows, s)?, s.clone()))
        }
        None => Ok((df.as_array(None, true)?, df.schema().clone())),
    }
}
