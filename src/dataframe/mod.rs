//! DataFrame module: the common dataframe contract and its backend adapters.

mod array;
mod arrow;
mod frame_iterable;
mod input;
mod iterable;
mod polars;

pub use self::array::ArrayDataFrame;
pub use self::arrow::ArrowDataFrame;
pub use self::frame_iterable::FrameIterableDataFrame;
pub use self::input::DataInput;
pub use self::iterable::IterableDataFrame;
pub use self::polars::PolarsDataFrame;

use crate::arrow_conversion::rows_to_record_batch;
use ::arrow::record_batch::RecordBatch;
use polyframe_core::coercion::coerce_row;
use polyframe_core::{FrameError, Result, Row, Schema, Value};
use polyframe_polars::{rows_to_frame, PlDataFrame};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A row as a column-name -> value map.
pub type RowDict = HashMap<String, Value>;

/// Lazily produced rows; each item may fail if a type-safe read can't coerce a value.
pub type RowIter<'a> = Box<dyn Iterator<Item = Result<Row>> + 'a>;

pub type DictIter<'a> = Box<dyn Iterator<Item = Result<RowDict>> + 'a>;

/// Shared handle to any dataframe implementation.
pub type AnyDataFrame = Arc<dyn DataFrame>;

/// Behavior every backend adapter provides.
///
/// Frames are immutable after construction: every value read back through
/// the accessors satisfies [`schema`](DataFrame::schema). Operations that
/// change shape (rename, select, alter) return new frames that share storage
/// where the backend allows it.
///
/// `type_safe` reads re-normalize every value against the schema. Fast reads
/// return storage values and may surface backend null encodings, e.g. the
/// Polars adapter returns `Value::Double(NaN)` for a missing double.
pub trait DataFrame: Send + Sync + fmt::Debug {
    /// For downcasting to the concrete adapter (e.g. to share storage on re-wrap).
    fn as_any(&self) -> &(dyn Any + Send + Sync);

    fn schema(&self) -> &Schema;

    fn is_local(&self) -> bool {
        true
    }

    fn is_bounded(&self) -> bool {
        true
    }

    fn num_partitions(&self) -> usize {
        1
    }

    fn is_empty(&self) -> Result<bool>;

    fn count(&self) -> Result<usize>;

    /// First row in schema order; fails on an empty frame.
    fn peek_array(&self) -> Result<Row>;

    fn peek_dict(&self) -> Result<RowDict> {
        let row = self.peek_array()?;
        Ok(to_dict(&self.schema().names(), row))
    }

    fn as_array_iterable(&self, columns: Option<&[&str]>, type_safe: bool) -> Result<RowIter<'_>>;

    fn as_array(&self, columns: Option<&[&str]>, type_safe: bool) -> Result<Vec<Row>> {
        self.as_array_iterable(columns, type_safe)?.collect()
    }

    /// Rows as name -> value maps, always read type-safe.
    fn as_dict_iterable(&self, columns: Option<&[&str]>) -> Result<DictIter<'_>> {
        let names: Vec<String> = match columns {
            Some(cols) => self.schema().extract(cols)?.names().iter().map(|s| s.to_string()).collect(),
            None => self.schema().names().iter().map(|s| s.to_string()).collect(),
        };
        let rows = self.as_array_iterable(columns, true)?;
        Ok(Box::new(rows.map(move |r| {
            r.map(|row| names.iter().cloned().zip(row).collect())
        })))
    }

    /// New frame with only `columns`, in that order.
    fn select_columns(&self, columns: &[&str]) -> Result<AnyDataFrame>;

    fn drop_columns(&self, columns: &[&str]) -> Result<AnyDataFrame> {
        let remaining = self.schema().exclude(columns)?;
        if remaining.is_empty() {
            return Err(FrameError::InvalidOperation(
                "can't drop all columns of a dataframe".into(),
            ));
        }
        self.select_columns(&remaining.names())
    }

    fn rename(&self, columns: &HashMap<String, String>) -> Result<AnyDataFrame>;

    /// Change the types of some columns, coercing their values.
    fn alter_columns(&self, changes: &Schema) -> Result<AnyDataFrame>;

    /// First `n` rows as a local bounded frame.
    fn head(&self, n: usize, columns: Option<&[&str]>) -> Result<AnyDataFrame> {
        let schema = match columns {
            Some(cols) => self.schema().extract(cols)?,
            None => self.schema().clone(),
        };
        let rows = self
            .as_array_iterable(columns, true)?
            .take(n)
            .collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(ArrayDataFrame::from_coerced(rows, schema)))
    }

    /// A local frame with the same content (may be unbounded).
    fn as_local(&self) -> Result<AnyDataFrame>;

    /// A local bounded frame with the same content.
    fn as_local_bounded(&self) -> Result<AnyDataFrame> {
        self.as_local()
    }

    fn as_polars(&self) -> Result<PlDataFrame> {
        let rows = self.as_array(None, true)?;
        rows_to_frame(&rows, self.schema())
    }

    fn as_arrow(&self) -> Result<RecordBatch> {
        let rows = self.as_array(None, true)?;
        rows_to_record_batch(&rows, self.schema())
    }
}

pub(crate) fn to_dict(names: &[&str], row: Row) -> RowDict {
    names.iter().map(|n| n.to_string()).zip(row).collect()
}

/// Indices of `columns` in `schema`, or all columns.
pub(crate) fn column_indices(schema: &Schema, columns: Option<&[&str]>) -> Result<Vec<usize>> {
    match columns {
        Some(cols) => schema.indices_of(cols),
        None => Ok((0..schema.len()).collect()),
    }
}

/// Project `row` to `indices`, re-coercing against `schema` when `type_safe`.
pub(crate) fn project_row(
    row: &[Value],
    indices: &[usize],
    projected: &Schema,
    type_safe: bool,
) -> Result<Row> {
    let out: Row = indices.iter().map(|&i| row[i].clone()).collect();
    if type_safe {
        coerce_row(out, projected)
    } else {
        Ok(out)
    }
}

pub(crate) fn empty_error() -> FrameError {
    FrameError::InvalidOperation("dataframe is empty".into())
}

/// Schema for a rename, checking every key exists.
pub(crate) fn renamed_schema(schema: &Schema, columns: &HashMap<String, String>) -> Result<Schema> {
    schema.rename(columns)
}
