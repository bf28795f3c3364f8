//! Conversion between polyframe schemas/values and Arrow record batches.
//!
//! Storage layout: `str` -> Utf8, `bool` -> Boolean, `int` -> Int32,
//! `long` -> Int64, `double` -> Float64 (missing as null), `date` -> Date32,
//! `datetime` -> Timestamp(us), nested types -> Utf8 holding encoded text.

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Date32Array, Float64Array, Int32Array, Int64Array,
    StringArray, TimestampMicrosecondArray,
};
use arrow::compute::cast;
use arrow::datatypes::{
    DataType as ArrowDataType, Date32Type, Field as ArrowField, Float64Type, Int32Type, Int64Type,
    Schema as ArrowSchema, TimeUnit, TimestampMicrosecondType,
};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use polyframe_core::coercion::{coerce_value, encode_nested};
use polyframe_core::{DataType, Field, FrameError, Result, Row, Schema, Value};
use std::sync::Arc;

/// Days from 0001-01-01 (CE) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub fn arrow_to_frame_error(e: ArrowError) -> FrameError {
    match e {
        ArrowError::CastError(msg) => FrameError::TypeCoercion(msg),
        ArrowError::SchemaError(msg) => FrameError::InvalidSchema(msg),
        ArrowError::InvalidArgumentError(msg) => FrameError::InvalidArgument(msg),
        other => FrameError::Backend(other.to_string()),
    }
}

/// Map an Arrow type to a polyframe type; `None` when unsupported.
pub fn arrow_type_to_data_type(dt: &ArrowDataType) -> Option<DataType> {
    Some(match dt {
        ArrowDataType::Utf8 | ArrowDataType::LargeUtf8 | ArrowDataType::Utf8View | ArrowDataType::Null => {
            DataType::Str
        }
        ArrowDataType::Boolean => DataType::Bool,
        ArrowDataType::Int8
        | ArrowDataType::Int16
        | ArrowDataType::Int32
        | ArrowDataType::UInt8
        | ArrowDataType::UInt16 => DataType::Int,
        ArrowDataType::Int64 | ArrowDataType::UInt32 | ArrowDataType::UInt64 => DataType::Long,
        ArrowDataType::Float16 | ArrowDataType::Float32 | ArrowDataType::Float64 => DataType::Double,
        ArrowDataType::Date32 | ArrowDataType::Date64 => DataType::Date,
        ArrowDataType::Timestamp(_, _) => DataType::Datetime,
        ArrowDataType::List(f) | ArrowDataType::LargeList(f) => {
            DataType::List(Box::new(arrow_type_to_data_type(f.data_type())?))
        }
        ArrowDataType::Struct(fields) => DataType::Struct(
            fields
                .iter()
                .map(|f| arrow_type_to_data_type(f.data_type()).map(|t| Field::new(f.name(), t)))
                .collect::<Option<Vec<_>>>()?,
        ),
        _ => return None,
    })
}

/// Storage type of a polyframe type in an [`ArrowDataFrame`](crate::ArrowDataFrame).
pub fn data_type_to_arrow_type(dt: &DataType) -> ArrowDataType {
    match dt {
        DataType::Str | DataType::List(_) | DataType::Struct(_) => ArrowDataType::Utf8,
        DataType::Bool => ArrowDataType::Boolean,
        DataType::Int => ArrowDataType::Int32,
        DataType::Long => ArrowDataType::Int64,
        DataType::Double => ArrowDataType::Float64,
        DataType::Date => ArrowDataType::Date32,
        DataType::Datetime => ArrowDataType::Timestamp(TimeUnit::Microsecond, None),
    }
}

pub fn from_arrow_schema(schema: &ArrowSchema) -> Result<Schema> {
    let fields = schema
        .fields()
        .iter()
        .map(|f| {
            arrow_type_to_data_type(f.data_type())
                .map(|t| Field::new(f.name(), t))
                .ok_or_else(|| {
                    FrameError::UnsupportedInput(format!(
                        "column '{}' has unsupported Arrow type {}",
                        f.name(),
                        f.data_type()
                    ))
                })
        })
        .collect::<Result<Vec<_>>>()?;
    Schema::new(fields)
}

pub fn to_arrow_schema(schema: &Schema) -> ArrowSchema {
    ArrowSchema::new(
        schema
            .fields()
            .iter()
            .map(|f| ArrowField::new(f.name.as_str(), data_type_to_arrow_type(&f.data_type), true))
            .collect::<Vec<_>>(),
    )
}

/// Build an Arrow array from values already coerced to `field`'s type.
pub fn values_to_array(field: &Field, values: &[Value]) -> ArrayRef {
    match &field.data_type {
        DataType::Str => Arc::new(StringArray::from(
            values.iter().map(Value::as_str).collect::<Vec<_>>(),
        )),
        DataType::Bool => Arc::new(BooleanArray::from(
            values.iter().map(Value::as_bool).collect::<Vec<_>>(),
        )),
        DataType::Int => Arc::new(Int32Array::from(
            values
                .iter()
                .map(|v| match v {
                    Value::Int(i) => Some(*i),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Long => Arc::new(Int64Array::from(
            values.iter().map(Value::as_i64).collect::<Vec<_>>(),
        )),
        DataType::Double => Arc::new(Float64Array::from(
            values
                .iter()
                .map(|v| v.as_f64().filter(|x| !x.is_nan()))
                .collect::<Vec<_>>(),
        )),
        DataType::Date => Arc::new(Date32Array::from(
            values
                .iter()
                .map(|v| match v {
                    Value::Date(d) => Some(d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Datetime => Arc::new(TimestampMicrosecondArray::from(
            values
                .iter()
                .map(|v| match v {
                    Value::Datetime(dt) => Some(dt.and_utc().timestamp_micros()),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        DataType::List(_) | DataType::Struct(_) => {
            let encoded: Vec<Option<String>> = values
                .iter()
                .map(|v| (!v.is_null()).then(|| encode_nested(v)))
                .collect();
            Arc::new(StringArray::from(
                encoded.iter().map(|s| s.as_deref()).collect::<Vec<_>>(),
            ))
        }
    }
}

/// Build a record batch from rows already coerced to `schema`.
///
/// The row count is carried explicitly so zero-column batches keep their height.
pub fn rows_to_record_batch(rows: &[Row], schema: &Schema) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let values: Vec<Value> = rows.iter().map(|r| r[i].clone()).collect();
            values_to_array(field, &values)
        })
        .collect();
    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    RecordBatch::try_new_with_options(Arc::new(to_arrow_schema(schema)), columns, &options)
        .map_err(arrow_to_frame_error)
}

/// Storage values of an Arrow array, without normalization.
pub fn array_values(array: &dyn Array) -> Result<Vec<Value>> {
    let err = arrow_to_frame_error;
    let values = match array.data_type() {
        ArrowDataType::Null => vec![Value::Null; array.len()],
        ArrowDataType::Utf8 => array.as_string::<i32>().iter().map(Value::from).collect(),
        ArrowDataType::LargeUtf8 | ArrowDataType::Utf8View => {
            let utf8 = cast(array, &ArrowDataType::Utf8).map_err(err)?;
            return array_values(utf8.as_ref());
        }
        ArrowDataType::Boolean => array.as_boolean().iter().map(Value::from).collect(),
        ArrowDataType::Int32 => array
            .as_primitive::<Int32Type>()
            .iter()
            .map(Value::from)
            .collect(),
        ArrowDataType::Int8 | ArrowDataType::Int16 | ArrowDataType::UInt8 | ArrowDataType::UInt16 => {
            let widened = cast(array, &ArrowDataType::Int32).map_err(err)?;
            return array_values(widened.as_ref());
        }
        ArrowDataType::Int64 => array
            .as_primitive::<Int64Type>()
            .iter()
            .map(Value::from)
            .collect(),
        ArrowDataType::UInt32 | ArrowDataType::UInt64 => {
            let widened = cast(array, &ArrowDataType::Int64).map_err(err)?;
            return array_values(widened.as_ref());
        }
        ArrowDataType::Float64 => array
            .as_primitive::<Float64Type>()
            .iter()
            .map(Value::from)
            .collect(),
        ArrowDataType::Float16 | ArrowDataType::Float32 => {
            let widened = cast(array, &ArrowDataType::Float64).map_err(err)?;
            return array_values(widened.as_ref());
        }
        ArrowDataType::Date32 => array
            .as_primitive::<Date32Type>()
            .iter()
            .map(|v| v.and_then(date_from_days).map(Value::Date).unwrap_or(Value::Null))
            .collect(),
        ArrowDataType::Date64 => {
            let days = cast(array, &ArrowDataType::Date32).map_err(err)?;
            return array_values(days.as_ref());
        }
        ArrowDataType::Timestamp(TimeUnit::Microsecond, None) => array
            .as_primitive::<TimestampMicrosecondType>()
            .iter()
            .map(|v| {
                v.and_then(datetime_from_micros)
                    .map(Value::Datetime)
                    .unwrap_or(Value::Null)
            })
            .collect(),
        ArrowDataType::Timestamp(_, _) => {
            let micros = cast(array, &ArrowDataType::Timestamp(TimeUnit::Microsecond, None))
                .map_err(err)?;
            return array_values(micros.as_ref());
        }
        ArrowDataType::List(_) => array
            .as_list::<i32>()
            .iter()
            .map(|item| match item {
                Some(inner) => array_values(inner.as_ref()).map(Value::List),
                None => Ok(Value::Null),
            })
            .collect::<Result<Vec<_>>>()?,
        ArrowDataType::LargeList(_) => array
            .as_list::<i64>()
            .iter()
            .map(|item| match item {
                Some(inner) => array_values(inner.as_ref()).map(Value::List),
                None => Ok(Value::Null),
            })
            .collect::<Result<Vec<_>>>()?,
        ArrowDataType::Struct(fields) => {
            let strct = array.as_struct();
            let children = strct
                .columns()
                .iter()
                .map(|c| array_values(c.as_ref()))
                .collect::<Result<Vec<_>>>()?;
            (0..strct.len())
                .map(|i| {
                    if strct.is_null(i) {
                        return Value::Null;
                    }
                    Value::Struct(
                        fields
                            .iter()
                            .zip(&children)
                            .map(|(f, col)| (f.name().clone(), col[i].clone()))
                            .collect(),
                    )
                })
                .collect()
        }
        other => {
            return Err(FrameError::UnsupportedInput(format!(
                "unsupported Arrow type {other}"
            )))
        }
    };
    Ok(values)
}

/// Read `columns` (indices into `schema`) of `batch` as rows, looking columns up by name.
pub fn record_batch_to_rows(
    batch: &RecordBatch,
    schema: &Schema,
    columns: &[usize],
    type_safe: bool,
) -> Result<Vec<Row>> {
    let mut rows: Vec<Row> = (0..batch.num_rows())
        .map(|_| Vec::with_capacity(columns.len()))
        .collect();
    for &i in columns {
        let field = &schema.fields()[i];
        let array = batch.column_by_name(&field.name).ok_or_else(|| {
            let available: Vec<String> =
                batch.schema().fields().iter().map(|f| f.name().clone()).collect();
            FrameError::missing_column(&field.name, &available)
        })?;
        for (row, value) in rows.iter_mut().zip(array_values(array.as_ref())?) {
            row.push(normalize(value, &field.data_type, type_safe)?);
        }
    }
    Ok(rows)
}

fn normalize(value: Value, dtype: &DataType, type_safe: bool) -> Result<Value> {
    match value {
        Value::Str(_) if dtype.is_nested() => coerce_value(value, dtype),
        v if type_safe => coerce_value(v, dtype),
        v => Ok(v),
    }
}

fn date_from_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

fn datetime_from_micros(us: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_micros(us).map(|dt| dt.naive_utc())
}
