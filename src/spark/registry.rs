//! Registration of the spark engine with the global registry.

use super::dataframe::{RowRdd, SparkDataFrame, SparkNativeFrame};
use super::engine::SparkExecutionEngine;
use super::session::{SparkContext, SparkSession};
use crate::dataframe::{AnyDataFrame, DataFrame, DataInput};
use crate::execution::{AnyEngine, EngineConf, ExecutionEngine};
use crate::params::{
    downcast_output, engine_as, DataFrameParam, EngineParam, NativeValue, ParamAdapter,
};
use crate::registry::{
    register_converter, register_engine, register_inference, register_param, EngineKey,
    OnDuplicate,
};
use polyframe_core::{FrameError, Result, Schema};
use polyframe_polars::PlDataFrame;
use std::any::Any;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Namespace marking `(namespace, text)` creators as spark SQL.
pub const SPARK_SQL_NAMESPACE: &str = "sparksql";

/// Register the spark engine, its parameters, converter and inference
/// candidate. Safe to call any number of times; after a failure the next
/// call tries again.
pub fn register() -> Result<()> {
    static REGISTERED: Mutex<bool> = Mutex::new(false);
    let mut registered = REGISTERED
        .lock()
        .map_err(|_| FrameError::Internal("spark registration lock poisoned".into()))?;
    if *registered {
        return Ok(());
    }
    register_all().inspect_err(|e| tracing::error!(error = %e, "failed to register spark engine"))?;
    *registered = true;
    Ok(())
}

fn register_all() -> Result<()> {
    register_engine(
        EngineKey::name("spark"),
        Arc::new(|_: Option<&dyn Any>, conf: &EngineConf| {
            Ok(Arc::new(SparkExecutionEngine::new(conf.clone())) as AnyEngine)
        }),
        OnDuplicate::Ignore,
    )?;
    register_engine(
        EngineKey::session::<SparkSession>(),
        Arc::new(|session: Option<&dyn Any>, conf: &EngineConf| {
            let session = session
                .and_then(|s| s.downcast_ref::<SparkSession>())
                .ok_or_else(|| FrameError::InvalidArgument("expected a SparkSession".into()))?;
            Ok(Arc::new(SparkExecutionEngine::with_session(session.clone(), conf.clone())) as AnyEngine)
        }),
        OnDuplicate::Ignore,
    )?;

    register_param::<SparkExecutionEngine>(ParamAdapter::Engine(Arc::new(EngineItself)))?;
    register_param::<SparkSession>(ParamAdapter::Engine(Arc::new(SessionParam)))?;
    register_param::<SparkContext>(ParamAdapter::Engine(Arc::new(ContextParam)))?;
    register_param::<SparkNativeFrame>(ParamAdapter::DataFrame(Arc::new(NativeFrameParam)))?;
    register_param::<RowRdd>(ParamAdapter::DataFrame(Arc::new(RddParam)))?;

    register_converter::<SparkNativeFrame, _>(|native, schema| {
        let df = SparkDataFrame::new(native.clone());
        match schema {
            Some(s) if s != df.schema() => Ok(Arc::new(df.conform(s)?) as AnyDataFrame),
            _ => Ok(Arc::new(df) as AnyDataFrame),
        }
    })?;

    register_inference(Arc::new(|objects: &[&dyn Any], conf: &EngineConf| {
        if !uses_spark(objects) {
            return None;
        }
        let session = SparkSession::builder().get_or_create();
        Some(Ok(
            Arc::new(SparkExecutionEngine::with_session(session, conf.clone())) as AnyEngine
        ))
    }))?;

    debug!("registered spark execution engine");
    Ok(())
}

/// True when every object is local or spark data with at least one spark
/// frame, or when any object is a spark SQL creator.
fn uses_spark(objects: &[&dyn Any]) -> bool {
    if objects.iter().any(|o| is_sparksql(*o)) {
        return true;
    }
    let mut any_spark = false;
    for obj in objects {
        if is_spark(*obj) {
            any_spark = true;
        } else if !is_local_data(*obj) {
            return false;
        }
    }
    any_spark
}

fn is_spark(obj: &dyn Any) -> bool {
    obj.is::<SparkNativeFrame>()
        || obj.is::<SparkDataFrame>()
        || obj
            .downcast_ref::<AnyDataFrame>()
            .is_some_and(|df| df.as_any().is::<SparkDataFrame>())
}

fn is_local_data(obj: &dyn Any) -> bool {
    obj.is::<PlDataFrame>()
        || obj.is::<Arc<PlDataFrame>>()
        || obj.downcast_ref::<AnyDataFrame>().is_some_and(|df| df.is_local())
}

fn is_sparksql(obj: &dyn Any) -> bool {
    if let Some((ns, _)) = obj.downcast_ref::<(String, String)>() {
        return ns == SPARK_SQL_NAMESPACE;
    }
    if let Some((ns, _)) = obj.downcast_ref::<(&'static str, &'static str)>() {
        return *ns == SPARK_SQL_NAMESPACE;
    }
    false
}

struct EngineItself;

impl EngineParam for EngineItself {
    fn to_input(&self, engine: &dyn ExecutionEngine) -> Result<NativeValue> {
        Ok(Box::new(engine_as::<SparkExecutionEngine>(engine)?.clone()))
    }
}

struct SessionParam;

impl EngineParam for SessionParam {
    fn to_input(&self, engine: &dyn ExecutionEngine) -> Result<NativeValue> {
        let engine = engine_as::<SparkExecutionEngine>(engine)?;
        Ok(Box::new(engine.spark_session().clone()))
    }
}

struct ContextParam;

impl EngineParam for ContextParam {
    fn to_input(&self, engine: &dyn ExecutionEngine) -> Result<NativeValue> {
        let engine = engine_as::<SparkExecutionEngine>(engine)?;
        Ok(Box::new(engine.spark_session().spark_context().clone()))
    }
}

fn spark_native(df: &AnyDataFrame, engine: &dyn ExecutionEngine) -> Result<SparkNativeFrame> {
    let spark = engine_as::<SparkExecutionEngine>(engine)?;
    let converted = spark.to_df(DataInput::Frame(Arc::clone(df)), None)?;
    converted
        .as_any()
        .downcast_ref::<SparkDataFrame>()
        .map(|s| s.native().clone())
        .ok_or_else(|| FrameError::Internal("spark engine produced a non-spark dataframe".into()))
}

struct NativeFrameParam;

impl DataFrameParam for NativeFrameParam {
    fn to_input_data(&self, df: &AnyDataFrame, engine: &dyn ExecutionEngine) -> Result<NativeValue> {
        Ok(Box::new(spark_native(df, engine)?))
    }

    fn to_output_df(
        &self,
        output: NativeValue,
        schema: Option<&Schema>,
        engine: &dyn ExecutionEngine,
    ) -> Result<AnyDataFrame> {
        let native = downcast_output::<SparkNativeFrame>(output)?;
        let spark = engine_as::<SparkExecutionEngine>(engine)?;
        spark.to_df(DataInput::Frame(Arc::new(SparkDataFrame::new(native))), schema)
    }
}

struct RddParam;

impl DataFrameParam for RddParam {
    fn to_input_data(&self, df: &AnyDataFrame, engine: &dyn ExecutionEngine) -> Result<NativeValue> {
        Ok(Box::new(spark_native(df, engine)?.rdd_with(engine.type_safe_reads())?))
    }

    fn to_output_df(
        &self,
        output: NativeValue,
        schema: Option<&Schema>,
        engine: &dyn ExecutionEngine,
    ) -> Result<AnyDataFrame> {
        let rdd = downcast_output::<RowRdd>(output)?;
        engine_as::<SparkExecutionEngine>(engine)?.rdd_to_df(rdd, schema)
    }

    fn need_schema(&self) -> Option<bool> {
        Some(true)
    }
}
