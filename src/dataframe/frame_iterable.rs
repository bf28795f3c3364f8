//! Single-pass stream of local frames sharing one schema.

use super::{AnyDataFrame, ArrayDataFrame, DataFrame, DataInput, RowIter};
use polyframe_core::{FrameError, Result, Row, Schema};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Frames as they come out of a [`FrameIterableDataFrame`].
pub type Frames = Box<dyn Iterator<Item = Result<AnyDataFrame>> + Send>;

struct State {
    buffered: Option<AnyDataFrame>,
    source: Option<Frames>,
}

/// A lazily produced sequence of local frames.
///
/// Each frame is re-wrapped to the stream schema when pulled and empty frames
/// are skipped. Local, unbounded and single pass.
pub struct FrameIterableDataFrame {
    schema: Schema,
    state: Mutex<State>,
}

impl FrameIterableDataFrame {
    /// Build from [`DataInput::Frames`]; other inputs become a single frame.
    ///
    /// Without a schema the first frame's schema is used, so an empty stream
    /// needs an explicit schema.
    pub fn new(input: DataInput, schema: Option<&Schema>) -> Result<Self> {
        let mut frames: Box<dyn Iterator<Item = AnyDataFrame> + Send> = match input {
            DataInput::Frames(frames) => frames,
            DataInput::Frame(df) if df.is_local() => Box::new(std::iter::once(df)),
            other => {
                let df: AnyDataFrame = Arc::new(ArrayDataFrame::new(other, schema)?);
                Box::new(std::iter::once(df))
            }
        };
        let mut buffered = None;
        let schema = match schema {
            Some(s) => s.clone(),
            None => {
                let first = frames.next().ok_or_else(|| {
                    FrameError::InvalidArgument(
                        "schema is required for an empty frame stream".into(),
                    )
                })?;
                let s = first.schema().clone();
                buffered = Some(first);
                s
            }
        };
        let target = schema.clone();
        let rest = frames.map(move |df| conform(df, &target));
        let source: Frames = Box::new(buffered.map(Ok).into_iter().chain(rest));
        Ok(Self::from_frames(source, schema))
    }

    fn from_frames(source: Frames, schema: Schema) -> Self {
        FrameIterableDataFrame {
            schema,
            state: Mutex::new(State {
                buffered: None,
                source: Some(Box::new(source.filter(|f| match f {
                    Ok(df) => !matches!(df.is_empty(), Ok(true)),
                    Err(_) => true,
                }))),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| FrameError::Internal("frame iterable lock poisoned".into()))
    }

    /// Take the remaining non-empty frames.
    pub fn as_frame_iterable(&self) -> Result<Frames> {
        let mut state = self.lock()?;
        let source = state.source.take().ok_or_else(consumed_error)?;
        let first = state.buffered.take().map(Ok);
        Ok(Box::new(first.into_iter().chain(source)))
    }

    fn first_frame(&self) -> Result<Option<AnyDataFrame>> {
        let mut state = self.lock()?;
        if state.buffered.is_none() {
            if let Some(source) = state.source.as_mut() {
                state.buffered = source.next().transpose()?;
            }
        }
        Ok(state.buffered.clone())
    }

    fn derive(
        &self,
        schema: Schema,
        map: impl Fn(AnyDataFrame) -> Result<AnyDataFrame> + Send + 'static,
    ) -> Result<AnyDataFrame> {
        let source = self.as_frame_iterable()?;
        Ok(Arc::new(Self::from_frames(
            Box::new(source.map(move |f| f.and_then(&map))),
            schema,
        )))
    }
}

fn consumed_error() -> FrameError {
    FrameError::InvalidOperation("frame iterable has already been consumed".into())
}

/// Re-wrap `df` so it carries exactly `schema`.
fn conform(df: AnyDataFrame, schema: &Schema) -> Result<AnyDataFrame> {
    if df.schema() == schema {
        return Ok(df);
    }
    Ok(Arc::new(ArrayDataFrame::new(DataInput::Frame(df), Some(schema))?))
}

impl fmt::Debug for FrameIterableDataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameIterableDataFrame")
            .field("schema", &self.schema.to_string())
            .finish_non_exhaustive()
    }
}

impl DataFrame for FrameIterableDataFrame {
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
        Ok(self.first_frame()?.is_none())
    }

    fn count(&self) -> Result<usize> {
        Err(FrameError::InvalidOperation(
            "count is not supported on an unbounded dataframe".into(),
        ))
    }

    fn peek_array(&self) -> Result<Row> {
        {
            let state = self.lock()?;
            if state.buffered.is_none() && state.source.is_none() {
                return Err(consumed_error());
            }
        }
        match self.first_frame()? {
            Some(df) => df.peek_array(),
            None => Err(super::empty_error()),
        }
    }

    fn as_array_iterable(&self, columns: Option<&[&str]>, type_safe: bool) -> Result<RowIter<'_>> {
        if let Some(cols) = columns {
            self.schema.indices_of(cols)?;
        }
        let cols: Option<Vec<String>> = columns.map(|c| c.iter().map(|s| s.to_string()).collect());
        let frames = self.as_frame_iterable()?;
        Ok(Box::new(frames.flat_map(
            move |frame| -> Box<dyn Iterator<Item = Result<Row>> + Send> {
                let names: Option<Vec<&str>> =
                    cols.as_ref().map(|c| c.iter().map(String::as_str).collect());
                match frame.and_then(|df| df.as_array(names.as_deref(), type_safe)) {
                    Ok(rows) => Box::new(rows.into_iter().map(Ok)),
                    Err(e) => Box::new(std::iter::once(Err(e))),
                }
            },
        )))
    }

    fn select_columns(&self, columns: &[&str]) -> Result<AnyDataFrame> {
        let schema = self.schema.extract(columns)?;
        let names: Vec<String> = columns.iter().map(|s| s.to_string()).collect();
        self.derive(schema, move |df| {
            let cols: Vec<&str> = names.iter().map(String::as_str).collect();
            df.select_columns(&cols)
        })
    }

    fn rename(&self, columns: &HashMap<String, String>) -> Result<AnyDataFrame> {
        let schema = self.schema.rename(columns)?;
        let mapping = columns.clone();
        self.derive(schema, move |df| df.rename(&mapping))
    }

    fn alter_columns(&self, changes: &Schema) -> Result<AnyDataFrame> {
        let schema = self.schema.alter(changes)?;
        let changes = changes.clone();
        self.derive(schema, move |df| df.alter_columns(&changes))
    }

    fn as_local(&self) -> Result<AnyDataFrame> {
        self.derive(self.schema.clone(), Ok)
    }

    fn as_local_bounded(&self) -> Result<AnyDataFrame> {
        let rows = self.as_array(None, true)?;
        debug!(rows = rows.len(), "materialized frame stream");
        Ok(Arc::new(ArrayDataFrame::from_coerced(rows, self.schema.clone())))
    }
}
