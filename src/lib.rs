//! Polyframe - one dataframe contract over many backends
//!
//! This library exposes a single [`DataFrame`] trait implemented by adapters
//! over row arrays, row streams, Arrow record batches, Polars frames and a
//! partitioned spark-style engine. Execution engines turn raw input into
//! frames, and a global registry resolves engines, native conversions and
//! function parameter adapters by name or type.
//!
//! ```ignore
//! use polyframe::{ArrayDataFrame, DataFrame, DataInput, Value};
//!
//! let df = ArrayDataFrame::new(
//!     DataInput::Rows(vec![vec![Value::from("a"), Value::from(1)]]),
//!     Some(&"a:str,b:int".parse()?),
//! )?;
//! assert_eq!(df.count()?, 1);
//! ```

pub mod arrow_conversion;
pub mod dataframe;
pub mod dataframes;
pub mod execution;
pub mod function_wrapper;
pub mod params;
pub mod registry;
pub mod spark;
pub mod utils;

pub use dataframe::{
    AnyDataFrame, ArrayDataFrame, ArrowDataFrame, DataFrame, DataInput, FrameIterableDataFrame,
    IterableDataFrame, PolarsDataFrame, RowDict,
};
pub use dataframes::DataFrames;
pub use execution::{AnyEngine, EngineConf, ExecutionEngine, NativeExecutionEngine};
pub use function_wrapper::call_with_native;
pub use params::{DataFrameParam, EngineParam, ParamAdapter};
pub use polyframe_core::{coercion, config};
pub use polyframe_core::{DataType, Field, FrameConfig, FrameError, Result, Row, Schema, Value};
pub use registry::{as_frame, infer_engine, make_engine, EngineKey, EngineRegistry, OnDuplicate};
pub use utils::{frames_equal, EqualityOptions};

/// Build the global registry with its built-in engines, converters and
/// parameter adapters. Idempotent; lookups initialize it lazily anyway.
pub fn init() {
    EngineRegistry::global();
    tracing::debug!("polyframe registry ready");
}
