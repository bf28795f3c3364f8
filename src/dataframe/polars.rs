//! Polars-backed adapter, following pandas storage conventions.

use super::input::series_frame;
use super::{column_indices, empty_error, AnyDataFrame, DataFrame, DataInput, RowIter};
use polyframe_core::{FrameError, Result, Row, Schema};
use polyframe_polars::schema_conv::data_type_to_polars_type;
use polyframe_polars::{
    frame_to_rows, infer_schema, polars_to_frame_error, read_column, rows_to_frame,
    values_to_column, PlDataFrame,
};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// A dataframe stored as a Polars frame.
///
/// Storage mirrors pandas: a missing double is `NaN` and nested values are
/// encoded text. Fast reads return those storage values as is.
#[derive(Clone)]
pub struct PolarsDataFrame {
    native: Arc<PlDataFrame>,
    schema: Schema,
}

impl PolarsDataFrame {
    pub fn new(input: DataInput, schema: Option<&Schema>) -> Result<Self> {
        match input {
            DataInput::Polars(df) => Self::from_native(df, schema),
            DataInput::Series(series) => Self::from_native(Arc::new(series_frame(series)?), schema),
            DataInput::Frame(df) => {
                if let Some(same) = df.as_any().downcast_ref::<PolarsDataFrame>() {
                    return match schema {
                        None => Ok(same.clone()),
                        Some(s) if s == &same.schema => Ok(same.clone()),
                        Some(s) => Self::from_native(Arc::clone(&same.native), Some(s)),
                    };
                }
                Self::from_rows(DataInput::Frame(df), schema)
            }
            other => Self::from_rows(other, schema),
        }
    }

    fn from_rows(input: DataInput, schema: Option<&Schema>) -> Result<Self> {
        let (rows, schema) = input.into_rows(schema)?;
        let native = rows_to_frame(&rows, &schema)?;
        trace!(rows = rows.len(), schema = %schema, "built polars dataframe");
        Ok(PolarsDataFrame {
            native: Arc::new(native),
            schema,
        })
    }

    /// Wrap a native frame, converting only the columns whose storage doesn't
    /// already match `schema`. A frame that matches entirely is shared.
    pub(crate) fn from_native(df: Arc<PlDataFrame>, schema: Option<&Schema>) -> Result<Self> {
        let schema = match schema {
            Some(s) => s.clone(),
            None => infer_schema(&df)?,
        };
        let available: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        let mut shared = available.len() == schema.len();
        let mut columns = Vec::with_capacity(schema.len());
        for (i, field) in schema.fields().iter().enumerate() {
            let column = df
                .column(&field.name)
                .map_err(|_| FrameError::missing_column(&field.name, &available))?;
            if column.dtype() == &data_type_to_polars_type(&field.data_type)
                && !field.data_type.is_nested()
            {
                shared &= available.get(i) == Some(&field.name);
                columns.push(column.clone());
            } else {
                shared = false;
                debug!(column = %field.name, to = %field.data_type, "coercing polars column");
                let values = read_column(column, field, true)?;
                columns.push(values_to_column(field, &values)?);
            }
        }
        if shared {
            return Ok(PolarsDataFrame { native: df, schema });
        }
        let native = PlDataFrame::new(columns).map_err(polars_to_frame_error)?;
        Ok(PolarsDataFrame {
            native: Arc::new(native),
            schema,
        })
    }

    /// Wrap storage already laid out for `schema`.
    pub(crate) fn from_parts(native: Arc<PlDataFrame>, schema: Schema) -> Self {
        PolarsDataFrame { native, schema }
    }

    /// The backing Polars frame.
    pub fn native(&self) -> &Arc<PlDataFrame> {
        &self.native
    }

    fn with_native(&self, native: PlDataFrame, schema: Schema) -> AnyDataFrame {
        Arc::new(PolarsDataFrame {
            native: Arc::new(native),
            schema,
        })
    }
}

impl fmt::Debug for PolarsDataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolarsDataFrame")
            .field("schema", &self.schema.to_string())
            .field("height", &self.native.height())
            .finish()
    }
}

impl DataFrame for PolarsDataFrame {
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.native.height() == 0)
    }

    fn count(&self) -> Result<usize> {
        Ok(self.native.height())
    }

    fn peek_array(&self) -> Result<Row> {
        if self.native.height() == 0 {
            return Err(empty_error());
        }
        let first = self.native.head(Some(1));
        let all: Vec<usize> = (0..self.schema.len()).collect();
        frame_to_rows(&first, &self.schema, &all, true)?
            .pop()
            .ok_or_else(empty_error)
    }

    fn as_array_iterable(&self, columns: Option<&[&str]>, type_safe: bool) -> Result<RowIter<'_>> {
        let indices = column_indices(&self.schema, columns)?;
        let rows = frame_to_rows(&self.native, &self.schema, &indices, type_safe)?;
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn as_array(&self, columns: Option<&[&str]>, type_safe: bool) -> Result<Vec<Row>> {
        let indices = column_indices(&self.schema, columns)?;
        frame_to_rows(&self.native, &self.schema, &indices, type_safe)
    }

    fn select_columns(&self, columns: &[&str]) -> Result<AnyDataFrame> {
        let schema = self.schema.extract(columns)?;
        let native = self
            .native
            .select(columns.iter().copied())
            .map_err(polars_to_frame_error)?;
        Ok(self.with_native(native, schema))
    }

    fn rename(&self, columns: &HashMap<String, String>) -> Result<AnyDataFrame> {
        let schema = self.schema.rename(columns)?;
        let mut native = self.native.as_ref().clone();
        native
            .set_column_names(schema.names())
            .map_err(polars_to_frame_error)?;
        Ok(self.with_native(native, schema))
    }

    fn alter_columns(&self, changes: &Schema) -> Result<AnyDataFrame> {
        let schema = self.schema.alter(changes)?;
        if schema == self.schema {
            return Ok(Arc::new(self.clone()));
        }
        Ok(Arc::new(Self::from_native(Arc::clone(&self.native), Some(&schema))?))
    }

    fn as_local(&self) -> Result<AnyDataFrame> {
        Ok(Arc::new(self.clone()))
    }

    fn as_polars(&self) -> Result<PlDataFrame> {
        Ok(self.native.as_ref().clone())
    }
}
