//! Value-level coercion against a declared [`DataType`].
//!
//! These are pure functions over owned values; adapters call them when building
//! storage and again on type-safe reads. Coercing `Null` (or a floating `NaN`)
//! never fails and always yields `Value::Null`.

use crate::error::{FrameError, Result};
use crate::schema::{DataType, Field, Schema};
use crate::value::{format_datetime, Row, Value};
use chrono::{NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Coerce `value` so it satisfies `dtype`.
pub fn coerce_value(value: Value, dtype: &DataType) -> Result<Value> {
    if value.is_missing() {
        return Ok(Value::Null);
    }
    match dtype {
        DataType::Str => to_str(value),
        DataType::Bool => to_bool(value),
        DataType::Int => {
            let v = to_i64(value, dtype)?;
            i32::try_from(v)
                .map(Value::Int)
                .map_err(|_| FrameError::coercion(format!("{v} is out of range for int")))
        }
        DataType::Long => to_i64(value, dtype).map(Value::Long),
        DataType::Double => to_f64(value),
        DataType::Date => to_date(value),
        DataType::Datetime => to_datetime(value),
        DataType::List(inner) => to_list(value, inner),
        DataType::Struct(fields) => to_struct(value, fields),
    }
}

/// Coerce every value of `row` against the matching schema field.
pub fn coerce_row(row: Row, schema: &Schema) -> Result<Row> {
    if row.len() != schema.len() {
        return Err(FrameError::InvalidArgument(format!(
            "row has {} values but schema '{}' has {} columns",
            row.len(),
            schema,
            schema.len()
        )));
    }
    row.into_iter()
        .zip(schema.fields())
        .map(|(v, f)| {
            coerce_value(v, &f.data_type)
                .map_err(|e| FrameError::coercion(format!("column '{}': {}", f.name, strip(e))))
        })
        .collect()
}

/// Coerce a whole column of values.
pub fn coerce_column(values: Vec<Value>, field: &Field) -> Result<Vec<Value>> {
    values
        .into_iter()
        .map(|v| {
            coerce_value(v, &field.data_type)
                .map_err(|e| FrameError::coercion(format!("column '{}': {}", field.name, strip(e))))
        })
        .collect()
}

/// Decode the encoded-record text format (JSON) and coerce it to `dtype`.
pub fn decode_encoded(text: &str, dtype: &DataType) -> Result<Value> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    coerce_value(Value::from(json), dtype)
}

/// Encode a nested value as text, the inverse of [`decode_encoded`].
pub fn encode_nested(value: &Value) -> String {
    value.to_json().to_string()
}

pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| parse_date_only(text).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    parse_date_only(text).or_else(|| parse_datetime(text).map(|dt| dt.date()))
}

fn parse_date_only(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

fn strip(e: FrameError) -> String {
    match e {
        FrameError::TypeCoercion(msg) => msg,
        other => other.to_string(),
    }
}

fn unable(value: &Value, dtype: &DataType) -> FrameError {
    FrameError::coercion(format!(
        "can't convert {} value {} to {}",
        value.type_name(),
        value,
        dtype
    ))
}

fn to_str(value: Value) -> Result<Value> {
    Ok(Value::Str(match value {
        Value::Str(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Long(v) => v.to_string(),
        Value::Double(v) => format!("{v:?}"),
        Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        Value::Datetime(dt) => format_datetime(&dt),
        nested @ (Value::List(_) | Value::Struct(_)) => encode_nested(&nested),
        Value::Null => return Ok(Value::Null),
    }))
}

fn to_bool(value: Value) -> Result<Value> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(b)),
        Value::Int(v) => Ok(Value::Bool(v != 0)),
        Value::Long(v) => Ok(Value::Bool(v != 0)),
        Value::Double(v) => Ok(Value::Bool(v != 0.0)),
        Value::Str(ref s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
            "false" | "f" | "no" | "n" | "0" => Ok(Value::Bool(false)),
            _ => Err(unable(&value, &DataType::Bool)),
        },
        other => Err(unable(&other, &DataType::Bool)),
    }
}

fn to_i64(value: Value, dtype: &DataType) -> Result<i64> {
    match value {
        Value::Bool(b) => Ok(i64::from(b)),
        Value::Int(v) => Ok(i64::from(v)),
        Value::Long(v) => Ok(v),
        Value::Double(v) => float_to_i64(v).ok_or_else(|| unable(&value, dtype)),
        Value::Str(ref s) => {
            let t = s.trim();
            t.parse::<i64>()
                .ok()
                .or_else(|| {
                    t.parse::<f64>()
                        .ok()
                        .filter(|f| f.fract() == 0.0)
                        .and_then(float_to_i64)
                })
                .ok_or_else(|| unable(&value, dtype))
        }
        other => Err(unable(&other, dtype)),
    }
}

fn float_to_i64(v: f64) -> Option<i64> {
    let t = v.trunc();
    if t.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64 {
        Some(t as i64)
    } else {
        None
    }
}

fn to_f64(value: Value) -> Result<Value> {
    match value {
        Value::Double(v) => Ok(Value::Double(v)),
        Value::Int(v) => Ok(Value::Double(f64::from(v))),
        Value::Long(v) => Ok(Value::Double(v as f64)),
        Value::Bool(b) => Ok(Value::Double(if b { 1.0 } else { 0.0 })),
        Value::Str(ref s) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_nan() => Ok(Value::Null),
            Ok(v) => Ok(Value::Double(v)),
            Err(_) => Err(unable(&value, &DataType::Double)),
        },
        other => Err(unable(&other, &DataType::Double)),
    }
}

fn to_date(value: Value) -> Result<Value> {
    match value {
        Value::Date(d) => Ok(Value::Date(d)),
        Value::Datetime(dt) => Ok(Value::Date(dt.date())),
        Value::Str(ref s) => parse_date(s)
            .map(Value::Date)
            .ok_or_else(|| unable(&value, &DataType::Date)),
        other => Err(unable(&other, &DataType::Date)),
    }
}

fn to_datetime(value: Value) -> Result<Value> {
    match value {
        Value::Datetime(dt) => Ok(Value::Datetime(dt)),
        Value::Date(d) => d
            .and_hms_opt(0, 0, 0)
            .map(Value::Datetime)
            .ok_or_else(|| unable(&value, &DataType::Datetime)),
        Value::Str(ref s) => parse_datetime(s)
            .map(Value::Datetime)
            .ok_or_else(|| unable(&value, &DataType::Datetime)),
        other => Err(unable(&other, &DataType::Datetime)),
    }
}

fn to_list(value: Value, inner: &DataType) -> Result<Value> {
    match value {
        Value::List(items) => items
            .into_iter()
            .map(|v| coerce_value(v, inner))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        Value::Str(s) => decode_encoded(&s, &DataType::List(Box::new(inner.clone()))),
        other => Err(unable(&other, &DataType::List(Box::new(inner.clone())))),
    }
}

fn to_struct(value: Value, fields: &[Field]) -> Result<Value> {
    match value {
        Value::Struct(mut entries) => {
            let mut out = Vec::with_capacity(fields.len());
            for f in fields {
                let v = entries
                    .iter()
                    .position(|(k, _)| *k == f.name)
                    .map(|i| entries.swap_remove(i).1)
                    .unwrap_or(Value::Null);
                out.push((f.name.clone(), coerce_value(v, &f.data_type)?));
            }
            Ok(Value::Struct(out))
        }
        Value::Str(s) => decode_encoded(&s, &DataType::Struct(fields.to_vec())),
        other => Err(unable(&other, &DataType::Struct(fields.to_vec()))),
    }
}
