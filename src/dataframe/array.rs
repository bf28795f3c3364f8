//! In-memory row array adapter.

use super::input::coerce_rows;
use super::{
    column_indices, empty_error, project_row, renamed_schema, AnyDataFrame, DataFrame, DataInput,
    RowIter,
};
use polyframe_core::{Result, Row, Schema};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Rows held in memory; local and bounded.
#[derive(Clone)]
pub struct ArrayDataFrame {
    rows: Arc<Vec<Row>>,
    schema: Schema,
}

impl ArrayDataFrame {
    /// Build from any bounded input. See [`DataInput`] for the schema rules.
    pub fn new(input: DataInput, schema: Option<&Schema>) -> Result<Self> {
        if let DataInput::Frame(df) = &input {
            if let Some(same) = df.as_any().downcast_ref::<ArrayDataFrame>() {
                if schema.map_or(true, |s| s == &same.schema) {
                    return Ok(same.clone());
                }
            }
        }
        let (rows, schema) = input.into_rows(schema)?;
        trace!(rows = rows.len(), schema = %schema, "built array dataframe");
        Ok(Self::from_coerced(rows, schema))
    }

    /// Wrap rows already normalized against `schema`.
    pub(crate) fn from_coerced(rows: Vec<Row>, schema: Schema) -> Self {
        ArrayDataFrame {
            rows: Arc::new(rows),
            schema,
        }
    }

    /// The backing rows.
    pub fn native(&self) -> &Arc<Vec<Row>> {
        &self.rows
    }
}

impl fmt::Debug for ArrayDataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayDataFrame")
            .field("schema", &self.schema.to_string())
            .field("rows", &self.rows.len())
            .finish()
    }
}

impl DataFrame for ArrayDataFrame {
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.rows.is_empty())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.rows.len())
    }

    fn peek_array(&self) -> Result<Row> {
        self.rows.first().cloned().ok_or_else(empty_error)
    }

    fn as_array_iterable(&self, columns: Option<&[&str]>, type_safe: bool) -> Result<RowIter<'_>> {
        let indices = column_indices(&self.schema, columns)?;
        if columns.is_none() && !type_safe {
            return Ok(Box::new(self.rows.iter().cloned().map(Ok)));
        }
        let projected = match columns {
            Some(cols) => self.schema.extract(cols)?,
            None => self.schema.clone(),
        };
        Ok(Box::new(self.rows.iter().map(move |row| {
            project_row(row, &indices, &projected, type_safe)
        })))
    }

    fn select_columns(&self, columns: &[&str]) -> Result<AnyDataFrame> {
        let schema = self.schema.extract(columns)?;
        let indices = self.schema.indices_of(columns)?;
        let rows = self
            .rows
            .iter()
            .map(|r| indices.iter().map(|&i| r[i].clone()).collect())
            .collect();
        Ok(Arc::new(Self::from_coerced(rows, schema)))
    }

    fn rename(&self, columns: &HashMap<String, String>) -> Result<AnyDataFrame> {
        let schema = renamed_schema(&self.schema, columns)?;
        Ok(Arc::new(ArrayDataFrame {
            rows: Arc::clone(&self.rows),
            schema,
        }))
    }

    fn alter_columns(&self, changes: &Schema) -> Result<AnyDataFrame> {
        let schema = self.schema.alter(changes)?;
        if schema == self.schema {
            return Ok(Arc::new(self.clone()));
        }
        let rows = coerce_rows(self.rows.as_ref().clone(), &schema)?;
        Ok(Arc::new(Self::from_coerced(rows, schema)))
    }

    fn as_local(&self) -> Result<AnyDataFrame> {
        Ok(Arc::new(self.clone()))
    }
}
