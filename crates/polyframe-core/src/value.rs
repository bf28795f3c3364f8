//! Cell values shared by every backend.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;
use std::fmt;

/// A single cell. `Null` is the canonical "no value" for every type.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Str(String),
    Date(NaiveDate),
    Datetime(NaiveDateTime),
    List(Vec<Value>),
    /// Record fields in schema order.
    Struct(Vec<(String, Value)>),
}

pub type Row = Vec<Value>;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for `Null` and for a floating `NaN`, the two physical "no value" markers.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Double(v) => v.is_nan(),
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::Str(_) => "str",
            Value::Date(_) => "date",
            Value::Datetime(_) => "datetime",
            Value::List(_) => "list",
            Value::Struct(_) => "struct",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Look up a struct field by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// JSON form used by the encoded-record text format. `NaN` becomes `null`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(v) => JsonValue::from(*v),
            Value::Long(v) => JsonValue::from(*v),
            Value::Double(v) => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Str(s) => JsonValue::String(s.clone()),
            Value::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            Value::Datetime(dt) => JsonValue::String(format_datetime(dt)),
            Value::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Struct(fields) => JsonValue::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

pub(crate) fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Datetime(dt) => write!(f, "{}", format_datetime(dt)),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Long(i)
                } else {
                    Value::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => Value::Str(s),
            JsonValue::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(map) => {
                Value::Struct(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

macro_rules! impl_from_primitive {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_primitive!(
    bool => Bool,
    i32 => Int,
    i64 => Long,
    f64 => Double,
    String => Str,
    NaiveDate => Date,
    NaiveDateTime => Datetime,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_numbers() {
        assert_eq!(Value::from(json!(1)), Value::Long(1));
        assert_eq!(Value::from(json!(1.5)), Value::Double(1.5));
        assert_eq!(Value::from(json!(null)), Value::Null);
        assert_eq!(
            Value::from(json!(["a", true])),
            Value::List(vec![Value::Str("a".into()), Value::Bool(true)])
        );
    }

    #[test]
    fn missing_markers() {
        assert!(Value::Null.is_missing());
        assert!(Value::Double(f64::NAN).is_missing());
        assert!(!Value::Double(0.0).is_missing());
        assert!(!Value::Str(String::new()).is_missing());
    }

    #[test]
    fn to_json_handles_nan_and_dates() {
        assert_eq!(Value::Double(f64::NAN).to_json(), JsonValue::Null);
        let d = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert_eq!(Value::Date(d).to_json(), json!("2020-01-01"));
        let dt = d.and_hms_opt(1, 2, 3).unwrap();
        assert_eq!(Value::Datetime(dt).to_json(), json!("2020-01-01 01:02:03"));
    }

    #[test]
    fn option_and_vec_conversions() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Str("x".into()));
        assert_eq!(Value::from(vec![1i64, 2]), Value::List(vec![Value::Long(1), Value::Long(2)]));
    }
}
