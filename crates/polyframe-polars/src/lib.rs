//! polyframe Polars: schema conversion and column codec for the Polars backend.

pub mod codec;
pub mod error;
pub mod schema_conv;

pub use codec::{column_values, frame_to_rows, read_column, rows_to_frame, values_to_column};
pub use error::polars_to_frame_error;
pub use schema_conv::{infer_schema, SchemaPolarsExt};

/// Re-export so dependents name the same Polars types.
pub use polars::prelude::{Column as PlColumn, DataFrame as PlDataFrame, DataType as PlDataType, Series};
