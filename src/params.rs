//! Parameter adapters: how user functions receive engine objects and
//! native datasets, and how native outputs come back as dataframes.

use crate::dataframe::{AnyDataFrame, DataInput};
use crate::execution::{ExecutionEngine, NativeExecutionEngine};
use arrow::record_batch::RecordBatch;
use polyframe_core::{FrameError, Result, Row, Schema};
use polyframe_polars::PlDataFrame;
use std::any::{Any, TypeId};
use std::sync::Arc;

/// A boxed native value crossing the function boundary.
pub type NativeValue = Box<dyn Any + Send + Sync>;

/// Supplies an engine-side object (the engine itself, a session, a context).
pub trait EngineParam: Send + Sync {
    fn to_input(&self, engine: &dyn ExecutionEngine) -> Result<NativeValue>;
}

/// Converts dataframes to and from a native dataset type.
pub trait DataFrameParam: Send + Sync {
    fn to_input_data(&self, df: &AnyDataFrame, engine: &dyn ExecutionEngine) -> Result<NativeValue>;

    fn to_output_df(
        &self,
        output: NativeValue,
        schema: Option<&Schema>,
        engine: &dyn ExecutionEngine,
    ) -> Result<AnyDataFrame>;

    fn count(&self, _output: &dyn Any) -> Result<usize> {
        Err(FrameError::NotImplemented(
            "counting this output type is not allowed".into(),
        ))
    }

    /// `Some(true)` when outputs carry no schema of their own.
    fn need_schema(&self) -> Option<bool> {
        None
    }
}

#[derive(Clone)]
pub enum ParamAdapter {
    Engine(Arc<dyn EngineParam>),
    DataFrame(Arc<dyn DataFrameParam>),
}

impl ParamAdapter {
    pub fn as_engine(&self) -> Result<&dyn EngineParam> {
        match self {
            ParamAdapter::Engine(p) => Ok(p.as_ref()),
            ParamAdapter::DataFrame(_) => Err(FrameError::InvalidArgument(
                "parameter is a dataframe, not an engine object".into(),
            )),
        }
    }

    pub fn as_dataframe(&self) -> Result<&dyn DataFrameParam> {
        match self {
            ParamAdapter::DataFrame(p) => Ok(p.as_ref()),
            ParamAdapter::Engine(_) => Err(FrameError::InvalidArgument(
                "parameter is an engine object, not a dataframe".into(),
            )),
        }
    }
}

/// Downcast an engine to its concrete type or fail with a uniform message.
pub fn engine_as<E: ExecutionEngine + 'static>(engine: &dyn ExecutionEngine) -> Result<&E> {
    engine.as_any().downcast_ref::<E>().ok_or_else(|| {
        FrameError::InvalidArgument(format!(
            "expected a {} engine, got '{}'",
            std::any::type_name::<E>(),
            engine.name()
        ))
    })
}

/// Take a native output of type `T` out of its box.
pub fn downcast_output<T: Any>(output: NativeValue) -> Result<T> {
    output.downcast::<T>().map(|b| *b).map_err(|_| {
        FrameError::InvalidArgument(format!(
            "expected output of type {}",
            std::any::type_name::<T>()
        ))
    })
}

struct NativeEngineParam;

impl EngineParam for NativeEngineParam {
    fn to_input(&self, engine: &dyn ExecutionEngine) -> Result<NativeValue> {
        Ok(Box::new(engine_as::<NativeExecutionEngine>(engine)?.clone()))
    }
}

struct PolarsParam;

impl DataFrameParam for PolarsParam {
    fn to_input_data(&self, df: &AnyDataFrame, engine: &dyn ExecutionEngine) -> Result<NativeValue> {
        let local = engine.to_df(DataInput::Frame(Arc::clone(df)), None)?;
        Ok(Box::new(local.as_polars()?))
    }

    fn to_output_df(
        &self,
        output: NativeValue,
        schema: Option<&Schema>,
        engine: &dyn ExecutionEngine,
    ) -> Result<AnyDataFrame> {
        let df = downcast_output::<PlDataFrame>(output)?;
        engine.to_df(DataInput::Polars(Arc::new(df)), schema)
    }

    fn count(&self, output: &dyn Any) -> Result<usize> {
        output
            .downcast_ref::<PlDataFrame>()
            .map(PlDataFrame::height)
            .ok_or_else(|| FrameError::InvalidArgument("expected a Polars frame".into()))
    }
}

struct ArrowParam;

impl DataFrameParam for ArrowParam {
    fn to_input_data(&self, df: &AnyDataFrame, _engine: &dyn ExecutionEngine) -> Result<NativeValue> {
        Ok(Box::new(df.as_arrow()?))
    }

    fn to_output_df(
        &self,
        output: NativeValue,
        schema: Option<&Schema>,
        engine: &dyn ExecutionEngine,
    ) -> Result<AnyDataFrame> {
        let batch = downcast_output::<RecordBatch>(output)?;
        engine.to_df(DataInput::Arrow(Arc::new(batch)), schema)
    }

    fn count(&self, output: &dyn Any) -> Result<usize> {
        output
            .downcast_ref::<RecordBatch>()
            .map(RecordBatch::num_rows)
            .ok_or_else(|| FrameError::InvalidArgument("expected a record batch".into()))
    }
}

struct RowsParam;

impl DataFrameParam for RowsParam {
    fn to_input_data(&self, df: &AnyDataFrame, engine: &dyn ExecutionEngine) -> Result<NativeValue> {
        Ok(Box::new(df.as_array(None, engine.type_safe_reads())?))
    }

    fn to_output_df(
        &self,
        output: NativeValue,
        schema: Option<&Schema>,
        engine: &dyn ExecutionEngine,
    ) -> Result<AnyDataFrame> {
        let rows = downcast_output::<Vec<Row>>(output)?;
        engine.to_df(DataInput::Rows(rows), schema)
    }

    fn count(&self, output: &dyn Any) -> Result<usize> {
        output
            .downcast_ref::<Vec<Row>>()
            .map(Vec::len)
            .ok_or_else(|| FrameError::InvalidArgument("expected rows".into()))
    }

    fn need_schema(&self) -> Option<bool> {
        Some(true)
    }
}

struct FrameParam;

impl DataFrameParam for FrameParam {
    fn to_input_data(&self, df: &AnyDataFrame, _engine: &dyn ExecutionEngine) -> Result<NativeValue> {
        Ok(Box::new(Arc::clone(df)))
    }

    fn to_output_df(
        &self,
        output: NativeValue,
        schema: Option<&Schema>,
        engine: &dyn ExecutionEngine,
    ) -> Result<AnyDataFrame> {
        let df = downcast_output::<AnyDataFrame>(output)?;
        engine.to_df(DataInput::Frame(df), schema)
    }

    fn count(&self, output: &dyn Any) -> Result<usize> {
        output
            .downcast_ref::<AnyDataFrame>()
            .ok_or_else(|| FrameError::InvalidArgument("expected a dataframe".into()))?
            .count()
    }
}

pub(crate) fn builtin_params() -> Vec<(TypeId, ParamAdapter)> {
    vec![
        (
            TypeId::of::<NativeExecutionEngine>(),
            ParamAdapter::Engine(Arc::new(NativeEngineParam)),
        ),
        (TypeId::of::<PlDataFrame>(), ParamAdapter::DataFrame(Arc::new(PolarsParam))),
        (TypeId::of::<RecordBatch>(), ParamAdapter::DataFrame(Arc::new(ArrowParam))),
        (TypeId::of::<Vec<Row>>(), ParamAdapter::DataFrame(Arc::new(RowsParam))),
        (TypeId::of::<AnyDataFrame>(), ParamAdapter::DataFrame(Arc::new(FrameParam))),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyframe_core::Value;

    #[test]
    fn test_rows_param_needs_schema() {
        assert_eq!(RowsParam.need_schema(), Some(true));
        assert_eq!(PolarsParam.need_schema(), None);
        let rows: Vec<Row> = vec![vec![Value::from(1)]];
        assert_eq!(RowsParam.count(&rows).unwrap(), 1);
    }

    #[test]
    fn test_wrong_engine_type() {
        #[derive(Debug)]
        struct Other(crate::execution::EngineConf);
        impl ExecutionEngine for Other {
            fn name(&self) -> &str {
                "other"
            }
            fn conf(&self) -> &crate::execution::EngineConf {
                &self.0
            }
            fn to_df(&self, _: DataInput, _: Option<&Schema>) -> Result<AnyDataFrame> {
                Err(FrameError::NotImplemented("to_df".into()))
            }
            fn as_any(&self) -> &(dyn Any + Send + Sync) {
                self
            }
        }
        let other = Other(Default::default());
        let err = NativeEngineParam.to_input(&other).err().unwrap();
        assert!(matches!(err, FrameError::InvalidArgument(ref m) if m.contains("other")));
    }

    #[test]
    fn test_adapter_kind_checks() {
        let adapter = ParamAdapter::DataFrame(Arc::new(RowsParam));
        assert!(adapter.as_dataframe().is_ok());
        assert!(adapter.as_engine().is_err());
    }
}
