//! Polars schema conversion for [`Schema`].
//!
//! Nested types (lists and records) are written to Polars as encoded text
//! columns, so their Polars type is `String`. Native Polars list columns are
//! still understood when inferring a schema.

use polars::prelude::{DataFrame as PlDataFrame, DataType as PlDataType, Field as PlField, Schema as PlSchema, TimeUnit};
use polyframe_core::{DataType, Field, FrameError, Result, Schema};

/// Extension trait for Polars schema conversion. Implemented for [`Schema`] from core.
pub trait SchemaPolarsExt: Sized {
    fn from_polars_schema(schema: &PlSchema) -> Result<Self>;
    fn to_polars_schema(&self) -> PlSchema;
}

impl SchemaPolarsExt for Schema {
    fn from_polars_schema(schema: &PlSchema) -> Result<Self> {
        let fields = schema
            .iter()
            .map(|(name, dtype)| {
                polars_type_to_data_type(dtype)
                    .map(|t| Field::new(name.to_string(), t))
                    .ok_or_else(|| {
                        FrameError::UnsupportedInput(format!(
                            "column '{name}' has unsupported Polars type {dtype}"
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Schema::new(fields)
    }

    fn to_polars_schema(&self) -> PlSchema {
        let fields: Vec<PlField> = self
            .fields()
            .iter()
            .map(|f| PlField::new(f.name.as_str().into(), data_type_to_polars_type(&f.data_type)))
            .collect();
        PlSchema::from_iter(fields)
    }
}

/// Schema of a native Polars frame, using its column names and types.
pub fn infer_schema(df: &PlDataFrame) -> Result<Schema> {
    Schema::from_polars_schema(&df.schema())
}

/// Integer columns widen to 64-bit, floats to double.
pub fn polars_type_to_data_type(polars_type: &PlDataType) -> Option<DataType> {
    match polars_type {
        PlDataType::String => Some(DataType::Str),
        PlDataType::Boolean => Some(DataType::Bool),
        PlDataType::Int8
        | PlDataType::Int16
        | PlDataType::Int32
        | PlDataType::Int64
        | PlDataType::UInt8
        | PlDataType::UInt16
        | PlDataType::UInt32
        | PlDataType::UInt64 => Some(DataType::Long),
        PlDataType::Float32 | PlDataType::Float64 => Some(DataType::Double),
        PlDataType::Date => Some(DataType::Date),
        PlDataType::Datetime(_, _) => Some(DataType::Datetime),
        PlDataType::List(inner) => polars_type_to_data_type(inner).map(|t| DataType::List(Box::new(t))),
        PlDataType::Null => Some(DataType::Str),
        _ => None,
    }
}

/// Storage type for a column of `data_type`.
pub fn data_type_to_polars_type(data_type: &DataType) -> PlDataType {
    match data_type {
        DataType::Str => PlDataType::String,
        DataType::Bool => PlDataType::Boolean,
        DataType::Int => PlDataType::Int32,
        DataType::Long => PlDataType::Int64,
        DataType::Double => PlDataType::Float64,
        DataType::Date => PlDataType::Date,
        DataType::Datetime => PlDataType::Datetime(TimeUnit::Microseconds, None),
        DataType::List(_) | DataType::Struct(_) => PlDataType::String,
    }
}
