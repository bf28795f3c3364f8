//! polyframe core: schema, values, coercion, config and error (no backend dependency).

pub mod coercion;
pub mod config;
pub mod error;
pub mod schema;
pub mod value;

pub use coercion::{coerce_column, coerce_row, coerce_value, decode_encoded, encode_nested};
pub use config::FrameConfig;
pub use error::{FrameError, Result};
pub use schema::{DataType, Field, Schema};
pub use value::{Row, Value};
