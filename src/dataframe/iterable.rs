//! Single-pass, lazily produced rows.

use super::input::required;
use super::{
    column_indices, empty_error, project_row, renamed_schema, AnyDataFrame, ArrayDataFrame,
    DataFrame, DataInput, RowIter,
};
use polyframe_core::coercion::coerce_row;
use polyframe_core::{FrameError, Result, Row, Schema};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

type Source = Box<dyn Iterator<Item = Result<Row>> + Send>;

#[derive(Default)]
struct State {
    /// Row pulled by a peek, returned first by the next iteration.
    buffered: Option<Row>,
    source: Option<Source>,
}

/// Rows produced on demand and coerced as they are pulled.
///
/// Local and unbounded: `count` is an invalid operation and the rows can be
/// iterated once. Shape-changing operations move the remaining rows into the
/// new frame.
pub struct IterableDataFrame {
    schema: Schema,
    state: Mutex<State>,
}

impl IterableDataFrame {
    pub fn new(input: DataInput, schema: Option<&Schema>) -> Result<Self> {
        match input {
            DataInput::Stream(rows) => {
                let target = required(schema, "stream")?.clone();
                let s = target.clone();
                Ok(Self::from_source(
                    Box::new(rows.map(move |r| coerce_row(r, &s))),
                    target,
                ))
            }
            other => {
                let (rows, target) = other.into_rows(schema)?;
                Ok(Self::from_source(Box::new(rows.into_iter().map(Ok)), target))
            }
        }
    }

    fn from_source(source: Source, schema: Schema) -> Self {
        IterableDataFrame {
            schema,
            state: Mutex::new(State {
                buffered: None,
                source: Some(source),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| FrameError::Internal("iterable dataframe lock poisoned".into()))
    }

    /// Take the remaining rows, buffered row first.
    fn take_source(&self) -> Result<Source> {
        let mut state = self.lock()?;
        let source = state.source.take().ok_or_else(consumed_error)?;
        let first = state.buffered.take().map(Ok);
        Ok(Box::new(first.into_iter().chain(source)))
    }

    /// Pull one row into the buffer if there is none; returns whether a row is available.
    fn fill(&self, state: &mut State) -> Result<bool> {
        if state.buffered.is_some() {
            return Ok(true);
        }
        let Some(source) = state.source.as_mut() else {
            return Ok(false);
        };
        match source.next() {
            Some(row) => {
                state.buffered = Some(row?);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn derive(&self, schema: Schema, map: impl Fn(Row) -> Result<Row> + Send + 'static) -> Result<AnyDataFrame> {
        let source = self.take_source()?;
        Ok(Arc::new(Self::from_source(
            Box::new(source.map(move |r| r.and_then(&map))),
            schema,
        )))
    }
}

fn consumed_error() -> FrameError {
    FrameError::InvalidOperation("iterable dataframe has already been consumed".into())
}

impl fmt::Debug for IterableDataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterableDataFrame")
            .field("schema", &self.schema.to_string())
            .finish_non_exhaustive()
    }
}

impl DataFrame for IterableDataFrame {
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn is_bounded(&self) -> bool {
        false
    }

    fn is_empty(&self) -> Result<bool> {
        let mut state = self.lock()?;
        Ok(!self.fill(&mut state)?)
    }

    fn count(&self) -> Result<usize> {
        Err(FrameError::InvalidOperation(
            "count is not supported on an unbounded dataframe".into(),
        ))
    }

    fn peek_array(&self) -> Result<Row> {
        let mut state = self.lock()?;
        if state.buffered.is_none() && state.source.is_none() {
            return Err(consumed_error());
        }
        if !self.fill(&mut state)? {
            return Err(empty_error());
        }
        state.buffered.clone().ok_or_else(empty_error)
    }

    fn as_array_iterable(&self, columns: Option<&[&str]>, _type_safe: bool) -> Result<RowIter<'_>> {
        let indices = column_indices(&self.schema, columns)?;
        let projected = match columns {
            Some(cols) => self.schema.extract(cols)?,
            None => self.schema.clone(),
        };
        let source = self.take_source()?;
        if columns.is_none() {
            return Ok(source);
        }
        // rows are coerced when pulled
        Ok(Box::new(source.map(move |r| {
            r.and_then(|row| project_row(&row, &indices, &projected, false))
        })))
    }

    fn select_columns(&self, columns: &[&str]) -> Result<AnyDataFrame> {
        let schema = self.schema.extract(columns)?;
        let indices = self.schema.indices_of(columns)?;
        self.derive(schema, move |row| {
            Ok(indices.iter().map(|&i| row[i].clone()).collect())
        })
    }

    fn rename(&self, columns: &HashMap<String, String>) -> Result<AnyDataFrame> {
        let schema = renamed_schema(&self.schema, columns)?;
        self.derive(schema, Ok)
    }

    fn alter_columns(&self, changes: &Schema) -> Result<AnyDataFrame> {
        let schema = self.schema.alter(changes)?;
        let target = schema.clone();
        self.derive(schema, move |row| coerce_row(row, &target))
    }

    fn as_local(&self) -> Result<AnyDataFrame> {
        self.derive(self.schema.clone(), Ok)
    }

    fn as_local_bounded(&self) -> Result<AnyDataFrame> {
        let rows = self.take_source()?.collect::<Result<Vec<_>>>()?;
        debug!(rows = rows.len(), "materialized iterable dataframe");
        Ok(Arc::new(ArrayDataFrame::from_coerced(rows, self.schema.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyframe_core::Value;

    fn stream(n: i64) -> IterableDataFrame {
        let rows = (0..n).map(|i| vec![Value::Long(i), Value::from(i.to_string())]);
        IterableDataFrame::new(DataInput::stream(rows.collect::<Vec<_>>()), Some(&"a:int,b:str".parse().unwrap()))
            .unwrap()
    }

    #[test]
    fn test_peek_does_not_lose_rows() {
        let df = stream(3);
        assert!(!df.is_empty().unwrap());
        assert_eq!(df.peek_array().unwrap(), vec![Value::Int(0), Value::from("0")]);
        assert_eq!(df.as_array(None, true).unwrap().len(), 3);
    }

    #[test]
    fn test_single_pass() {
        let df = stream(2);
        df.as_array(None, true).unwrap();
        let err = df.as_array(None, true).unwrap_err();
        assert!(matches!(err, FrameError::InvalidOperation(_)));
    }

    #[test]
    fn test_count_not_supported() {
        assert!(matches!(stream(1).count(), Err(FrameError::InvalidOperation(_))));
    }

    #[test]
    fn test_empty_stream() {
        let df = stream(0);
        assert!(df.is_empty().unwrap());
        assert!(df.peek_array().is_err());
    }

    #[test]
    fn test_select_is_lazy() {
        let df = stream(2);
        let selected = df.select_columns(&["b"]).unwrap();
        assert_eq!(
            selected.as_array(None, false).unwrap(),
            vec![vec![Value::from("0")], vec![Value::from("1")]]
        );
    }
}
