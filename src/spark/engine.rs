use super::dataframe::{RowRdd, SparkDataFrame, SparkNativeFrame};
use super::session::SparkSession;
use crate::dataframe::{AnyDataFrame, DataFrame, DataInput, PolarsDataFrame};
use crate::execution::{conf_parallelism, EngineConf, ExecutionEngine};
use polyframe_core::{FrameError, Result, Schema};
use std::any::Any;
use std::sync::Arc;
use tracing::debug;

/// Distributed-style engine over a [`SparkSession`].
#[derive(Debug, Clone)]
pub struct SparkExecutionEngine {
    session: SparkSession,
    conf: EngineConf,
}

impl SparkExecutionEngine {
    /// Use the active session, creating one configured from `conf` if needed.
    pub fn new(conf: EngineConf) -> Self {
        let mut builder = SparkSession::builder();
        for (k, v) in &conf {
            builder = builder.config(k.clone(), v.clone());
        }
        Self::with_session(builder.get_or_create(), conf)
    }

    pub fn with_session(session: SparkSession, conf: EngineConf) -> Self {
        let mut merged = session.conf().clone();
        merged.extend(conf);
        debug!(app_name = session.app_name(), "creating spark execution engine");
        SparkExecutionEngine {
            session,
            conf: merged,
        }
    }

    pub fn spark_session(&self) -> &SparkSession {
        &self.session
    }

    /// Build a dataframe from schema-less rows; the schema is mandatory.
    pub fn rdd_to_df(&self, rdd: RowRdd, schema: Option<&Schema>) -> Result<AnyDataFrame> {
        let schema = schema.ok_or_else(|| {
            FrameError::InvalidArgument("schema is required to build a dataframe from rows".into())
        })?;
        let partitions = rdd.num_partitions();
        let native = SparkNativeFrame::from_rows(self.session.clone(), rdd.collect(), schema, partitions)?;
        Ok(Arc::new(SparkDataFrame::new(native)))
    }

    /// Repartition a spark dataframe, or distribute a local one.
    pub fn repartition(&self, df: &AnyDataFrame, num_partitions: usize) -> Result<AnyDataFrame> {
        let spark = self.to_spark(DataInput::Frame(Arc::clone(df)), None)?;
        let native = spark.native().repartition(num_partitions)?;
        Ok(Arc::new(SparkDataFrame::new(native)))
    }

    fn to_spark(&self, input: DataInput, schema: Option<&Schema>) -> Result<SparkDataFrame> {
        if let DataInput::Frame(df) = &input {
            if let Some(spark) = df.as_any().downcast_ref::<SparkDataFrame>() {
                return match schema {
                    Some(s) if s != spark.schema() => spark.conform(s),
                    _ => Ok(spark.clone()),
                };
            }
        }
        let local = PolarsDataFrame::new(input, schema)?;
        let native =
            SparkNativeFrame::from_local(self.session.clone(), &local, self.default_parallelism());
        Ok(SparkDataFrame::new(native))
    }
}

impl ExecutionEngine for SparkExecutionEngine {
    fn name(&self) -> &str {
        "spark"
    }

    fn conf(&self) -> &EngineConf {
        &self.conf
    }

    fn is_distributed(&self) -> bool {
        true
    }

    fn default_parallelism(&self) -> usize {
        conf_parallelism(&self.conf)
            .unwrap_or_else(|| self.session.spark_context().default_parallelism())
    }

    /// Spark frames pass through; local input is split evenly into
    /// [`default_parallelism`](ExecutionEngine::default_parallelism) partitions.
    fn to_df(&self, input: DataInput, schema: Option<&Schema>) -> Result<AnyDataFrame> {
        if let DataInput::Frame(df) = &input {
            let same_schema = schema.map_or(true, |s| s == df.schema());
            if same_schema && df.as_any().is::<SparkDataFrame>() {
                return Ok(Arc::clone(df));
            }
        }
        Ok(Arc::new(self.to_spark(input, schema)?))
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }
}
