//! Run plain functions over native datasets on any engine.
//!
//! The parameter adapters registered for the function's input and output
//! types do the conversion, so the same function works whichever engine the
//! dataframe lives on.

use crate::dataframe::AnyDataFrame;
use crate::execution::ExecutionEngine;
use crate::params::downcast_output;
use crate::registry::param_adapter;
use polyframe_core::{FrameError, Result, Schema};
use std::any::Any;
use tracing::trace;

/// Convert `df` to `I`, apply `f`, and bring the `O` result back as a dataframe.
///
/// `schema` is required when the output adapter says `O` carries no schema.
pub fn call_with_native<I, O, F>(
    engine: &dyn ExecutionEngine,
    df: &AnyDataFrame,
    schema: Option<&Schema>,
    f: F,
) -> Result<AnyDataFrame>
where
    I: Any + Send + Sync,
    O: Any + Send + Sync,
    F: FnOnce(I) -> O,
{
    let input_adapter = param_adapter::<I>()?;
    let output_adapter = param_adapter::<O>()?;
    let output_param = output_adapter.as_dataframe()?;
    if output_param.need_schema() == Some(true) && schema.is_none() {
        return Err(FrameError::InvalidArgument(format!(
            "output type {} needs an explicit schema",
            std::any::type_name::<O>()
        )));
    }
    let input = input_adapter.as_dataframe()?.to_input_data(df, engine)?;
    let input = downcast_output::<I>(input)?;
    trace!(
        engine = engine.name(),
        input = std::any::type_name::<I>(),
        output = std::any::type_name::<O>(),
        "calling function with native data"
    );
    let output = f(input);
    output_param.to_output_df(Box::new(output), schema, engine)
}

/// Engine-side object of type `S` (the engine, its session or context).
pub fn engine_input<S: Any + Send + Sync>(engine: &dyn ExecutionEngine) -> Result<S> {
    let adapter = param_adapter::<S>()?;
    let value = adapter.as_engine()?.to_input(engine)?;
    downcast_output::<S>(value)
}

/// Row count of a native output, when its adapter allows counting.
pub fn count_output<O: Any>(output: &O) -> Result<usize> {
    param_adapter::<O>()?.as_dataframe()?.count(output)
}
