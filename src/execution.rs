//! Execution engines: where dataframes are materialized and functions run.

use crate::dataframe::{AnyDataFrame, DataFrame, DataInput, PolarsDataFrame};
use polyframe_core::config::{CONF_PARALLELISM, CONF_TYPE_SAFE};
use polyframe_core::{Result, Schema};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Flat string configuration handed to every engine.
pub type EngineConf = HashMap<String, String>;

/// Shared handle to any engine.
pub type AnyEngine = Arc<dyn ExecutionEngine>;

pub trait ExecutionEngine: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn conf(&self) -> &EngineConf;

    fn is_distributed(&self) -> bool {
        false
    }

    /// Partitions produced when the engine splits local data.
    fn default_parallelism(&self) -> usize {
        1
    }

    /// Bring `input` into this engine's dataframe type.
    fn to_df(&self, input: DataInput, schema: Option<&Schema>) -> Result<AnyDataFrame>;

    fn as_any(&self) -> &(dyn Any + Send + Sync);

    /// Whether native rows handed to functions are read in type-safe mode.
    /// On unless the conf turns it off.
    fn type_safe_reads(&self) -> bool {
        conf_flag(self.conf(), CONF_TYPE_SAFE, true)
    }
}

/// Local engine backed by [`PolarsDataFrame`].
#[derive(Debug, Clone, Default)]
pub struct NativeExecutionEngine {
    conf: EngineConf,
}

impl NativeExecutionEngine {
    pub fn new(conf: EngineConf) -> Self {
        debug!(entries = conf.len(), "creating native execution engine");
        NativeExecutionEngine { conf }
    }
}

impl ExecutionEngine for NativeExecutionEngine {
    fn name(&self) -> &str {
        "native"
    }

    fn conf(&self) -> &EngineConf {
        &self.conf
    }

    fn to_df(&self, input: DataInput, schema: Option<&Schema>) -> Result<AnyDataFrame> {
        if let DataInput::Frame(df) = &input {
            let same_schema = schema.map_or(true, |s| s == df.schema());
            if same_schema && df.as_any().is::<PolarsDataFrame>() {
                return Ok(Arc::clone(df));
            }
        }
        Ok(Arc::new(PolarsDataFrame::new(input, schema)?))
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }
}

pub(crate) fn conf_flag(conf: &EngineConf, key: &str, default: bool) -> bool {
    conf.get(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

/// Parallelism from conf, when set to a positive number.
pub(crate) fn conf_parallelism(conf: &EngineConf) -> Option<usize> {
    conf.get(CONF_PARALLELISM)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
}
