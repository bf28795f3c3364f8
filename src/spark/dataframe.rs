//! Partitioned frames of the spark engine.

use super::session::SparkSession;
use crate::dataframe::{
    AnyDataFrame, DataFrame, DataInput, PolarsDataFrame, RowIter,
};
use polyframe_core::coercion::coerce_row;
use polyframe_core::{FrameError, Result, Row, Schema};
use polyframe_polars::{frame_to_rows, polars_to_frame_error, rows_to_frame, PlDataFrame};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Native spark dataset: a schema plus Polars partitions laid out for it.
#[derive(Clone)]
pub struct SparkNativeFrame {
    session: SparkSession,
    schema: Schema,
    partitions: Vec<Arc<PlDataFrame>>,
}

impl SparkNativeFrame {
    /// Conform each partition to `schema`.
    pub fn new(session: SparkSession, schema: Schema, partitions: Vec<PlDataFrame>) -> Result<Self> {
        let partitions = partitions
            .into_iter()
            .map(|p| {
                PolarsDataFrame::from_native(Arc::new(p), Some(&schema))
                    .map(|df| Arc::clone(df.native()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(SparkNativeFrame {
            session,
            schema,
            partitions,
        })
    }

    /// Coerce `rows` to `schema` and split them into `num_partitions` even slices.
    pub fn from_rows(
        session: SparkSession,
        rows: Vec<Row>,
        schema: &Schema,
        num_partitions: usize,
    ) -> Result<Self> {
        let rows = rows
            .into_iter()
            .map(|r| coerce_row(r, schema))
            .collect::<Result<Vec<_>>>()?;
        let local = rows_to_frame(&rows, schema)?;
        Ok(Self::split(session, schema.clone(), &local, num_partitions))
    }

    pub(crate) fn from_local(session: SparkSession, local: &PolarsDataFrame, num_partitions: usize) -> Self {
        Self::split(session, local.schema().clone(), local.native(), num_partitions)
    }

    fn split(session: SparkSession, schema: Schema, df: &PlDataFrame, num_partitions: usize) -> Self {
        let partitions = even_bounds(df.height(), num_partitions)
            .into_iter()
            .map(|(offset, len)| Arc::new(df.slice(offset as i64, len)))
            .collect();
        SparkNativeFrame {
            session,
            schema,
            partitions,
        }
    }

    pub fn session(&self) -> &SparkSession {
        &self.session
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn partitions(&self) -> &[Arc<PlDataFrame>] {
        &self.partitions
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn count(&self) -> usize {
        self.partitions.iter().map(|p| p.height()).sum()
    }

    /// All rows, type-safe, in partition order.
    pub fn collect(&self) -> Result<Vec<Row>> {
        let all: Vec<usize> = (0..self.schema.len()).collect();
        let mut rows = Vec::with_capacity(self.count());
        for p in &self.partitions {
            rows.extend(frame_to_rows(p, &self.schema, &all, true)?);
        }
        Ok(rows)
    }

    /// Rows without schema, keeping the partitioning.
    pub fn rdd(&self) -> Result<RowRdd> {
        self.rdd_with(true)
    }

    /// Like [`rdd`](Self::rdd); fast reads keep stored `NaN` for missing doubles.
    pub fn rdd_with(&self, type_safe: bool) -> Result<RowRdd> {
        let all: Vec<usize> = (0..self.schema.len()).collect();
        let partitions = self
            .partitions
            .iter()
            .map(|p| frame_to_rows(p, &self.schema, &all, type_safe))
            .collect::<Result<Vec<_>>>()?;
        Ok(RowRdd::new(self.session.clone(), partitions))
    }

    pub fn repartition(&self, num_partitions: usize) -> Result<Self> {
        let local = self.combine()?;
        Ok(Self::split(self.session.clone(), self.schema.clone(), &local, num_partitions))
    }

    /// All partitions stacked into one frame.
    fn combine(&self) -> Result<PlDataFrame> {
        let mut parts = self.partitions.iter();
        let Some(first) = parts.next() else {
            return rows_to_frame(&[], &self.schema);
        };
        let mut acc = first.as_ref().clone();
        for p in parts {
            acc.vstack_mut(p).map_err(polars_to_frame_error)?;
        }
        Ok(acc)
    }

    fn map_partitions(
        &self,
        schema: Schema,
        f: impl Fn(&PolarsDataFrame) -> Result<AnyDataFrame>,
    ) -> Result<SparkNativeFrame> {
        let partitions = self
            .partitions
            .iter()
            .map(|p| {
                let part = PolarsDataFrame::from_parts(Arc::clone(p), self.schema.clone());
                let out = f(&part)?;
                out.as_any()
                    .downcast_ref::<PolarsDataFrame>()
                    .map(|df| Arc::clone(df.native()))
                    .ok_or_else(|| FrameError::Internal("partition changed backend".into()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(SparkNativeFrame {
            session: self.session.clone(),
            schema,
            partitions,
        })
    }
}

impl fmt::Debug for SparkNativeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparkNativeFrame")
            .field("schema", &self.schema.to_string())
            .field("partitions", &self.partitions.len())
            .finish()
    }
}

/// `(offset, len)` of `parts` slices covering `total` rows; sizes differ by at most one.
pub(crate) fn even_bounds(total: usize, parts: usize) -> Vec<(usize, usize)> {
    let parts = parts.max(1);
    let base = total / parts;
    let extra = total % parts;
    let mut offset = 0;
    (0..parts)
        .map(|i| {
            let len = base + usize::from(i < extra);
            let bounds = (offset, len);
            offset += len;
            bounds
        })
        .collect()
}

/// Partitioned rows with no schema attached.
#[derive(Debug, Clone)]
pub struct RowRdd {
    session: SparkSession,
    partitions: Vec<Arc<Vec<Row>>>,
}

impl RowRdd {
    pub fn new(session: SparkSession, partitions: Vec<Vec<Row>>) -> Self {
        RowRdd {
            session,
            partitions: partitions.into_iter().map(Arc::new).collect(),
        }
    }

    /// Split `rows` into `num_partitions` even partitions.
    pub fn parallelize(session: SparkSession, rows: Vec<Row>, num_partitions: usize) -> Self {
        let mut rest = rows.into_iter();
        let partitions = even_bounds(rest.len(), num_partitions)
            .into_iter()
            .map(|(_, len)| rest.by_ref().take(len).collect())
            .collect();
        Self::new(session, partitions)
    }

    pub fn session(&self) -> &SparkSession {
        &self.session
    }

    pub fn partitions(&self) -> &[Arc<Vec<Row>>] {
        &self.partitions
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn count(&self) -> usize {
        self.partitions.iter().map(|p| p.len()).sum()
    }

    pub fn collect(&self) -> Vec<Row> {
        self.partitions.iter().flat_map(|p| p.iter().cloned()).collect()
    }
}

/// Dataframe over a [`SparkNativeFrame`]; not local, bounded.
#[derive(Clone)]
pub struct SparkDataFrame {
    native: SparkNativeFrame,
}

impl SparkDataFrame {
    pub fn new(native: SparkNativeFrame) -> Self {
        SparkDataFrame { native }
    }

    pub fn native(&self) -> &SparkNativeFrame {
        &self.native
    }

    fn wrap(native: SparkNativeFrame) -> AnyDataFrame {
        Arc::new(SparkDataFrame { native })
    }

    /// Same partitions conformed to `schema` (select by name, then coerce).
    pub(crate) fn conform(&self, schema: &Schema) -> Result<SparkDataFrame> {
        let native = self.native.map_partitions(schema.clone(), |p| {
            Ok(Arc::new(PolarsDataFrame::new(
                DataInput::Polars(Arc::clone(p.native())),
                Some(schema),
            )?) as AnyDataFrame)
        })?;
        Ok(SparkDataFrame { native })
    }
}

impl fmt::Debug for SparkDataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SparkDataFrame").field(&self.native).finish()
    }
}

impl DataFrame for SparkDataFrame {
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn schema(&self) -> &Schema {
        &self.native.schema
    }

    fn is_local(&self) -> bool {
        false
    }

    fn num_partitions(&self) -> usize {
        self.native.num_partitions()
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.native.partitions.iter().all(|p| p.height() == 0))
    }

    fn count(&self) -> Result<usize> {
        Ok(self.native.count())
    }

    fn peek_array(&self) -> Result<Row> {
        let first = self
            .native
            .partitions
            .iter()
            .find(|p| p.height() > 0)
            .ok_or_else(|| FrameError::InvalidOperation("dataframe is empty".into()))?;
        PolarsDataFrame::from_parts(Arc::clone(first), self.native.schema.clone()).peek_array()
    }

    fn as_array_iterable(&self, columns: Option<&[&str]>, type_safe: bool) -> Result<RowIter<'_>> {
        let schema = &self.native.schema;
        let indices = match columns {
            Some(cols) => schema.indices_of(cols)?,
            None => (0..schema.len()).collect(),
        };
        Ok(Box::new(self.native.partitions.iter().flat_map(
            move |p| -> Box<dyn Iterator<Item = Result<Row>>> {
                match frame_to_rows(p, schema, &indices, type_safe) {
                    Ok(rows) => Box::new(rows.into_iter().map(Ok)),
                    Err(e) => Box::new(std::iter::once(Err(e))),
                }
            },
        )))
    }

    fn select_columns(&self, columns: &[&str]) -> Result<AnyDataFrame> {
        let schema = self.native.schema.extract(columns)?;
        let native = self.native.map_partitions(schema, |p| p.select_columns(columns))?;
        Ok(Self::wrap(native))
    }

    fn rename(&self, columns: &HashMap<String, String>) -> Result<AnyDataFrame> {
        let schema = self.native.schema.rename(columns)?;
        let native = self.native.map_partitions(schema, |p| p.rename(columns))?;
        Ok(Self::wrap(native))
    }

    fn alter_columns(&self, changes: &Schema) -> Result<AnyDataFrame> {
        let schema = self.native.schema.alter(changes)?;
        let native = self.native.map_partitions(schema, |p| p.alter_columns(changes))?;
        Ok(Self::wrap(native))
    }

    fn as_local(&self) -> Result<AnyDataFrame> {
        let local = self.native.combine()?;
        Ok(Arc::new(PolarsDataFrame::from_parts(
            Arc::new(local),
            self.native.schema.clone(),
        )))
    }

    fn as_polars(&self) -> Result<PlDataFrame> {
        self.native.combine()
    }
}
