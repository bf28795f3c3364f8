//! Polars error mapping.

use polars::error::PolarsError;
use polyframe_core::FrameError;

/// Map a PolarsError to [`FrameError`] at crate boundaries.
pub fn polars_to_frame_error(e: PolarsError) -> FrameError {
    let msg = e.to_string();
    match &e {
        PolarsError::ColumnNotFound(_) => FrameError::MissingColumn(msg),
        PolarsError::InvalidOperation(_) => FrameError::InvalidOperation(msg),
        PolarsError::SchemaMismatch(_) => FrameError::TypeCoercion(msg),
        _ => FrameError::Backend(msg),
    }
}
