//! Column codec: polyframe values <-> Polars columns.
//!
//! Storage follows the pandas conventions the Polars adapter emulates: a
//! missing double is written as `NaN`, nested values are written as encoded
//! text, date/datetime use Polars temporal types (microsecond precision).

use crate::error::polars_to_frame_error;
use crate::schema_conv::data_type_to_polars_type;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::{Column, DataFrame as PlDataFrame, DataType as PlDataType, NamedFrom, Series, TimeUnit};
use polyframe_core::coercion::{coerce_value, encode_nested};
use polyframe_core::{DataType, Field, FrameError, Result, Row, Schema, Value};

/// Days from 0001-01-01 (CE) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Build a Polars column from values already coerced to `field`'s type.
pub fn values_to_column(field: &Field, values: &[Value]) -> Result<Column> {
    let name = field.name.as_str().into();
    let series = match &field.data_type {
        DataType::Str => {
            let v: Vec<Option<&str>> = values.iter().map(Value::as_str).collect();
            Series::new(name, v)
        }
        DataType::Bool => {
            let v: Vec<Option<bool>> = values.iter().map(Value::as_bool).collect();
            Series::new(name, v)
        }
        DataType::Int => {
            let v: Vec<Option<i32>> = values
                .iter()
                .map(|x| match x {
                    Value::Int(i) => Some(*i),
                    _ => None,
                })
                .collect();
            Series::new(name, v)
        }
        DataType::Long => {
            let v: Vec<Option<i64>> = values.iter().map(Value::as_i64).collect();
            Series::new(name, v)
        }
        DataType::Double => {
            let v: Vec<f64> = values
                .iter()
                .map(|x| x.as_f64().unwrap_or(f64::NAN))
                .collect();
            Series::new(name, v)
        }
        DataType::Date => {
            let v: Vec<Option<i32>> = values
                .iter()
                .map(|x| match x {
                    Value::Date(d) => Some(d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE),
                    _ => None,
                })
                .collect();
            Series::new(name, v)
                .cast(&PlDataType::Date)
                .map_err(polars_to_frame_error)?
        }
        DataType::Datetime => {
            let v: Vec<Option<i64>> = values
                .iter()
                .map(|x| match x {
                    Value::Datetime(dt) => Some(dt.and_utc().timestamp_micros()),
                    _ => None,
                })
                .collect();
            Series::new(name, v)
                .cast(&data_type_to_polars_type(&DataType::Datetime))
                .map_err(polars_to_frame_error)?
        }
        DataType::List(_) | DataType::Struct(_) => {
            let encoded: Vec<Option<String>> = values
                .iter()
                .map(|x| (!x.is_null()).then(|| encode_nested(x)))
                .collect();
            let v: Vec<Option<&str>> = encoded.iter().map(|s| s.as_deref()).collect();
            Series::new(name, v)
        }
    };
    Ok(Column::from(series))
}

/// Build a Polars frame from rows already coerced to `schema`.
pub fn rows_to_frame(rows: &[Row], schema: &Schema) -> Result<PlDataFrame> {
    let columns = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let values: Vec<Value> = rows.iter().map(|r| r[i].clone()).collect();
            values_to_column(field, &values)
        })
        .collect::<Result<Vec<_>>>()?;
    PlDataFrame::new(columns).map_err(polars_to_frame_error)
}

/// Read a column's storage values without any normalization.
pub fn column_values(column: &Column) -> Result<Vec<Value>> {
    series_values(column.as_materialized_series())
}

fn series_values(series: &Series) -> Result<Vec<Value>> {
    let err = polars_to_frame_error;
    let values = match series.dtype() {
        PlDataType::String => series
            .str()
            .map_err(err)?
            .into_iter()
            .map(|v| v.map(|s| Value::Str(s.to_string())).unwrap_or(Value::Null))
            .collect(),
        PlDataType::Boolean => series
            .bool()
            .map_err(err)?
            .into_iter()
            .map(Value::from)
            .collect(),
        PlDataType::Int32 => series
            .i32()
            .map_err(err)?
            .into_iter()
            .map(Value::from)
            .collect(),
        PlDataType::Int8
        | PlDataType::Int16
        | PlDataType::Int64
        | PlDataType::UInt8
        | PlDataType::UInt16
        | PlDataType::UInt32
        | PlDataType::UInt64 => {
            let cast = series.cast(&PlDataType::Int64).map_err(err)?;
            cast.i64().map_err(err)?.into_iter().map(Value::from).collect()
        }
        PlDataType::Float32 | PlDataType::Float64 => {
            let cast = series.cast(&PlDataType::Float64).map_err(err)?;
            cast.f64().map_err(err)?.into_iter().map(Value::from).collect()
        }
        PlDataType::Date => {
            let cast = series.cast(&PlDataType::Int32).map_err(err)?;
            cast.i32()
                .map_err(err)?
                .into_iter()
                .map(|v| v.and_then(date_from_days).map(Value::Date).unwrap_or(Value::Null))
                .collect()
        }
        PlDataType::Datetime(unit, _) => {
            let per_second = match unit {
                TimeUnit::Nanoseconds => 1_000_000_000,
                TimeUnit::Microseconds => 1_000_000,
                TimeUnit::Milliseconds => 1_000,
            };
            let cast = series.cast(&PlDataType::Int64).map_err(err)?;
            cast.i64()
                .map_err(err)?
                .into_iter()
                .map(|v| {
                    v.and_then(|x| datetime_from_epoch(x, per_second))
                        .map(Value::Datetime)
                        .unwrap_or(Value::Null)
                })
                .collect()
        }
        PlDataType::List(_) => series
            .list()
            .map_err(err)?
            .into_iter()
            .map(|item| match item {
                Some(inner) => series_values(&inner).map(Value::List),
                None => Ok(Value::Null),
            })
            .collect::<Result<Vec<_>>>()?,
        PlDataType::Null => vec![Value::Null; series.len()],
        other => {
            return Err(FrameError::UnsupportedInput(format!(
                "column '{}' has unsupported Polars type {other}",
                series.name()
            )));
        }
    };
    Ok(values)
}

/// Read a column for `field`.
///
/// Type-safe reads coerce every value to the declared type (a `NaN` double
/// becomes `Null`). Fast reads return storage values, only decoding encoded
/// nested text.
pub fn read_column(column: &Column, field: &Field, type_safe: bool) -> Result<Vec<Value>> {
    let values = column_values(column)?;
    if type_safe {
        return values
            .into_iter()
            .map(|v| coerce_value(v, &field.data_type))
            .collect();
    }
    if field.data_type.is_nested() {
        return values
            .into_iter()
            .map(|v| match v {
                Value::Str(_) => coerce_value(v, &field.data_type),
                other => Ok(other),
            })
            .collect();
    }
    Ok(values)
}

/// Read `columns` (indices into `schema`) of `df` as rows.
pub fn frame_to_rows(
    df: &PlDataFrame,
    schema: &Schema,
    columns: &[usize],
    type_safe: bool,
) -> Result<Vec<Row>> {
    let mut cols = Vec::with_capacity(columns.len());
    for &i in columns {
        let field = &schema.fields()[i];
        let column = df.column(&field.name).map_err(polars_to_frame_error)?;
        cols.push(read_column(column, field, type_safe)?);
    }
    Ok(transpose(cols, df.height()))
}

pub(crate) fn transpose(columns: Vec<Vec<Value>>, height: usize) -> Vec<Row> {
    let mut rows: Vec<Row> = (0..height).map(|_| Vec::with_capacity(columns.len())).collect();
    for col in columns {
        for (row, v) in rows.iter_mut().zip(col) {
            row.push(v);
        }
    }
    rows
}

fn date_from_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

fn datetime_from_epoch(value: i64, per_second: i64) -> Option<NaiveDateTime> {
    let secs = value.div_euclid(per_second);
    let sub = value.rem_euclid(per_second);
    let nanos = u32::try_from(sub * (1_000_000_000 / per_second)).ok()?;
    DateTime::from_timestamp(secs, nanos).map(|d| d.naive_utc())
}
