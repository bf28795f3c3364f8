//! Arrow record batch adapter.

use super::{column_indices, empty_error, AnyDataFrame, DataFrame, DataInput, RowIter};
use crate::arrow_conversion::{
    array_values, arrow_to_frame_error, data_type_to_arrow_type, from_arrow_schema,
    record_batch_to_rows, rows_to_record_batch, to_arrow_schema, values_to_array,
};
use ::arrow::array::{Array, ArrayRef};
use ::arrow::record_batch::{RecordBatch, RecordBatchOptions};
use polyframe_core::coercion::coerce_value;
use polyframe_core::{FrameError, Result, Row, Schema};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// A dataframe stored as one Arrow record batch. Missing values are Arrow nulls.
#[derive(Clone)]
pub struct ArrowDataFrame {
    native: Arc<RecordBatch>,
    schema: Schema,
}

impl ArrowDataFrame {
    pub fn new(input: DataInput, schema: Option<&Schema>) -> Result<Self> {
        match input {
            DataInput::Arrow(batch) => Self::from_native(batch, schema),
            DataInput::Frame(df) => {
                if let Some(same) = df.as_any().downcast_ref::<ArrowDataFrame>() {
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
        let native = rows_to_record_batch(&rows, &schema)?;
        trace!(rows = rows.len(), schema = %schema, "built arrow dataframe");
        Ok(ArrowDataFrame {
            native: Arc::new(native),
            schema,
        })
    }

    fn from_native(batch: Arc<RecordBatch>, schema: Option<&Schema>) -> Result<Self> {
        let schema = match schema {
            Some(s) => s.clone(),
            None => from_arrow_schema(batch.schema().as_ref())?,
        };
        let source = batch.schema();
        let available: Vec<String> = source.fields().iter().map(|f| f.name().clone()).collect();
        let mut shared = available.len() == schema.len();
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.len());
        for (i, field) in schema.fields().iter().enumerate() {
            let array = batch
                .column_by_name(&field.name)
                .ok_or_else(|| FrameError::missing_column(&field.name, &available))?;
            if array.data_type() == &data_type_to_arrow_type(&field.data_type)
                && !field.data_type.is_nested()
            {
                shared &= available.get(i) == Some(&field.name);
                columns.push(Arc::clone(array));
            } else {
                shared = false;
                debug!(column = %field.name, to = %field.data_type, "coercing arrow column");
                let values = array_values(array.as_ref())?
                    .into_iter()
                    .map(|v| coerce_value(v, &field.data_type))
                    .collect::<Result<Vec<_>>>()?;
                columns.push(values_to_array(field, &values));
            }
        }
        if shared {
            return Ok(ArrowDataFrame {
                native: batch,
                schema,
            });
        }
        let native = build_batch(&schema, columns, batch.num_rows())?;
        Ok(ArrowDataFrame {
            native: Arc::new(native),
            schema,
        })
    }

    /// The backing record batch.
    pub fn native(&self) -> &Arc<RecordBatch> {
        &self.native
    }
}

fn build_batch(schema: &Schema, columns: Vec<ArrayRef>, rows: usize) -> Result<RecordBatch> {
    let options = RecordBatchOptions::new().with_row_count(Some(rows));
    RecordBatch::try_new_with_options(Arc::new(to_arrow_schema(schema)), columns, &options)
        .map_err(arrow_to_frame_error)
}

impl fmt::Debug for ArrowDataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrowDataFrame")
            .field("schema", &self.schema.to_string())
            .field("rows", &self.native.num_rows())
            .finish()
    }
}

impl DataFrame for ArrowDataFrame {
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.native.num_rows() == 0)
    }

    fn count(&self) -> Result<usize> {
        Ok(self.native.num_rows())
    }

    fn peek_array(&self) -> Result<Row> {
        if self.native.num_rows() == 0 {
            return Err(empty_error());
        }
        let first = self.native.slice(0, 1);
        let all: Vec<usize> = (0..self.schema.len()).collect();
        record_batch_to_rows(&first, &self.schema, &all, true)?
            .pop()
            .ok_or_else(empty_error)
    }

    fn as_array_iterable(&self, columns: Option<&[&str]>, type_safe: bool) -> Result<RowIter<'_>> {
        Ok(Box::new(self.as_array(columns, type_safe)?.into_iter().map(Ok)))
    }

    fn as_array(&self, columns: Option<&[&str]>, type_safe: bool) -> Result<Vec<Row>> {
        let indices = column_indices(&self.schema, columns)?;
        record_batch_to_rows(&self.native, &self.schema, &indices, type_safe)
    }

    fn select_columns(&self, columns: &[&str]) -> Result<AnyDataFrame> {
        let schema = self.schema.extract(columns)?;
        let indices = self.schema.indices_of(columns)?;
        let native = self.native.project(&indices).map_err(arrow_to_frame_error)?;
        Ok(Arc::new(ArrowDataFrame {
            native: Arc::new(native),
            schema,
        }))
    }

    fn rename(&self, columns: &HashMap<String, String>) -> Result<AnyDataFrame> {
        let schema = self.schema.rename(columns)?;
        let native = build_batch(&schema, self.native.columns().to_vec(), self.native.num_rows())?;
        Ok(Arc::new(ArrowDataFrame {
            native: Arc::new(native),
            schema,
        }))
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

    fn as_arrow(&self) -> Result<RecordBatch> {
        Ok(self.native.as_ref().clone())
    }
}
