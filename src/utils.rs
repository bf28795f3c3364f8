//! Free functions over any dataframe or native dataset.

use crate::dataframe::{AnyDataFrame, DataFrame};
use crate::registry::as_frame;
use arrow::record_batch::RecordBatch;
use polyframe_core::coercion::coerce_row;
use polyframe_core::{FrameError, Result, Row, Value};
use polyframe_polars::PlDataFrame;
use std::any::Any;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Column names of a dataframe or any convertible native dataset.
pub fn get_column_names(obj: &dyn Any) -> Result<Vec<String>> {
    if let Some(df) = obj.downcast_ref::<AnyDataFrame>() {
        return Ok(names_of(df.as_ref()));
    }
    if let Some(df) = obj.downcast_ref::<PlDataFrame>() {
        return Ok(df.get_column_names().iter().map(|n| n.to_string()).collect());
    }
    if let Some(batch) = obj.downcast_ref::<RecordBatch>() {
        return Ok(batch.schema().fields().iter().map(|f| f.name().clone()).collect());
    }
    Ok(names_of(as_frame(obj, None)?.as_ref()))
}

fn names_of(df: &dyn DataFrame) -> Vec<String> {
    df.schema().names().iter().map(|s| s.to_string()).collect()
}

/// Rename columns; an empty mapping returns the same frame.
pub fn rename(df: &AnyDataFrame, columns: &HashMap<String, String>) -> Result<AnyDataFrame> {
    if columns.is_empty() {
        return Ok(Arc::clone(df));
    }
    df.rename(columns)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

fn sanitize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if !out.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_') {
        out.insert(0, '_');
    }
    out
}

/// Make every name a unique identifier.
///
/// Valid names are kept; others have invalid characters replaced by `_`
/// (with a leading `_` if they start with a digit) and get a numeric suffix
/// on collision. Returns the new names and a map from each changed name to
/// its original.
pub fn normalize_column_names<S: AsRef<str>>(names: &[S]) -> (Vec<String>, HashMap<String, String>) {
    let mut used: HashSet<String> = names
        .iter()
        .map(|n| n.as_ref())
        .filter(|n| is_identifier(n))
        .map(str::to_string)
        .collect();
    let mut seen_valid = HashSet::new();
    let mut mapping = HashMap::new();
    let normalized = names
        .iter()
        .map(|n| {
            let name = n.as_ref();
            if is_identifier(name) && seen_valid.insert(name.to_string()) {
                return name.to_string();
            }
            let base = sanitize(name);
            let mut candidate = base.clone();
            let mut i = 1;
            while used.contains(&candidate) {
                candidate = format!("{base}_{i}");
                i += 1;
            }
            used.insert(candidate.clone());
            mapping.insert(candidate.clone(), name.to_string());
            candidate
        })
        .collect();
    (normalized, mapping)
}

/// Rename a frame's columns to normalized names; see [`normalize_column_names`].
pub fn normalize_dataframe_column_names(
    df: &AnyDataFrame,
) -> Result<(AnyDataFrame, HashMap<String, String>)> {
    let names = df.schema().names();
    let (_, mapping) = normalize_column_names(&names);
    if mapping.is_empty() {
        return Ok((Arc::clone(df), mapping));
    }
    let forward: HashMap<String, String> =
        mapping.iter().map(|(new, old)| (old.clone(), new.clone())).collect();
    Ok((df.rename(&forward)?, mapping))
}

/// `df` itself when local, otherwise its local form.
pub fn to_local_df(df: &AnyDataFrame) -> Result<AnyDataFrame> {
    if df.is_local() {
        return Ok(Arc::clone(df));
    }
    df.as_local()
}

/// `df` itself when local and bounded, otherwise a local bounded copy.
pub fn to_local_bounded_df(df: &AnyDataFrame) -> Result<AnyDataFrame> {
    if df.is_local() && df.is_bounded() {
        return Ok(Arc::clone(df));
    }
    df.as_local_bounded()
}

/// Options for [`frames_equal`].
#[derive(Debug, Clone)]
pub struct EqualityOptions {
    /// Decimal digits compared for doubles.
    pub digits: i32,
    pub check_order: bool,
    pub check_schema: bool,
    pub check_content: bool,
    /// Return an error describing the first difference instead of `false`.
    pub throw: bool,
}

impl Default for EqualityOptions {
    fn default() -> Self {
        EqualityOptions {
            digits: 8,
            check_order: false,
            check_schema: true,
            check_content: true,
            throw: false,
        }
    }
}

/// Compare two frames by schema and type-safe content.
///
/// Both frames must have the same column names even when types are not
/// checked. Content of `b` is read in `a`'s column order and coerced to `a`'s
/// schema.
pub fn frames_equal(a: &dyn DataFrame, b: &dyn DataFrame, options: &EqualityOptions) -> Result<bool> {
    let differ = |msg: String| {
        if options.throw {
            Err(FrameError::InvalidOperation(format!("dataframes are not equal: {msg}")))
        } else {
            Ok(false)
        }
    };
    if options.check_schema && a.schema() != b.schema() {
        return differ(format!("schema {} != {}", a.schema(), b.schema()));
    }
    if !options.check_content {
        return Ok(true);
    }
    let names = a.schema().names();
    if b.schema().len() != names.len() || !names.iter().all(|n| b.schema().contains(n)) {
        return differ(format!("columns {:?} != {:?}", names, b.schema().names()));
    }
    let mut left = a.as_array(None, true)?;
    let right = b.as_array(Some(names.as_slice()), true)?;
    let mut right = match right
        .into_iter()
        .map(|r| coerce_row(r, a.schema()))
        .collect::<Result<Vec<_>>>()
    {
        Ok(rows) => rows,
        Err(e) => return differ(e.to_string()),
    };
    if left.len() != right.len() {
        return differ(format!("{} rows != {} rows", left.len(), right.len()));
    }
    if !options.check_order {
        left.sort_by(compare_rows);
        right.sort_by(compare_rows);
    }
    for (i, (l, r)) in left.iter().zip(&right).enumerate() {
        if !rows_close(l, r, options.digits) {
            return differ(format!("row {i}: {l:?} != {r:?}"));
        }
    }
    Ok(true)
}

fn compare_rows(a: &Row, b: &Row) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| compare_values(x, y))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Double(x), Value::Double(y)) => x.total_cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Long(x), Value::Long(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        (Value::Datetime(x), Value::Datetime(y)) => x.cmp(y),
        (x, y) => x.to_json().to_string().cmp(&y.to_json().to_string()),
    }
}

fn rows_close(a: &Row, b: &Row, digits: i32) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_close(x, y, digits))
}

fn values_close(a: &Value, b: &Value, digits: i32) -> bool {
    match (a, b) {
        (Value::Double(x), Value::Double(y)) => (x - y).abs() < 10f64.powi(-digits),
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| values_close(p, q, digits))
        }
        (Value::Struct(x), Value::Struct(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y)
                    .all(|((kp, p), (kq, q))| kp == kq && values_close(p, q, digits))
        }
        (x, y) => x == y,
    }
}
