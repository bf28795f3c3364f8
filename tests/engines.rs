//! Engine construction, inference and registration through the registries.

mod common;

use polyframe::config::CONF_DEFAULT_ENGINE;
use polyframe::execution::EngineConf;
use polyframe::registry::{make_engine_for_session, register_engine, EngineFactory};
use polyframe::spark::{SparkExecutionEngine, SparkNativeFrame};
use polyframe::{
    infer_engine, make_engine, AnyEngine, DataFrame, DataInput, EngineKey, EngineRegistry,
    ExecutionEngine, FrameError, NativeExecutionEngine, OnDuplicate, PolarsDataFrame, Value,
};
use polars::prelude::df;
use std::any::Any;
use std::sync::Arc;

#[test]
fn native_engine_aliases() {
    polyframe::init();
    for name in ["native", "polars", "pandas"] {
        let engine = make_engine(name, &EngineConf::new()).unwrap();
        assert_eq!(engine.name(), "native");
        assert!(!engine.is_distributed());
    }
}

#[test]
fn unknown_engine_is_not_found() {
    let err = make_engine("no_such_engine", &EngineConf::new()).unwrap_err();
    match err {
        FrameError::NotFound(msg) => assert!(msg.contains("native")),
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn native_engine_to_df() {
    let engine = NativeExecutionEngine::default();
    let df = engine
        .to_df(
            common::json(serde_json::json!([["a", 1]])),
            Some(&common::schema("a:str,b:int")),
        )
        .unwrap();
    assert!(df.as_any().is::<PolarsDataFrame>());
    let again = engine.to_df(DataInput::Frame(Arc::clone(&df)), None).unwrap();
    assert!(Arc::ptr_eq(&df, &again));
    let altered = engine
        .to_df(DataInput::Frame(df), Some(&common::schema("a:str,b:double")))
        .unwrap();
    assert_eq!(altered.peek_array().unwrap(), vec![Value::from("a"), Value::Double(1.0)]);
}

#[test]
fn session_keyed_engines() {
    let base = NativeExecutionEngine::new(EngineConf::from([("x".to_string(), "1".to_string())]));
    let engine =
        make_engine_for_session(&base, &EngineConf::from([("y".to_string(), "2".to_string())]))
            .unwrap();
    assert_eq!(engine.conf().get("x").map(String::as_str), Some("1"));
    assert_eq!(engine.conf().get("y").map(String::as_str), Some("2"));

    polyframe::spark::register().unwrap();
    let session = common::spark(3);
    let engine = make_engine_for_session(&session, &EngineConf::new()).unwrap();
    assert_eq!(engine.name(), "spark");
    assert_eq!(engine.default_parallelism(), 3);
    let spark = engine.as_any().downcast_ref::<SparkExecutionEngine>().unwrap();
    assert!(spark.spark_session().same_session(&session));
}

#[test]
fn inference_prefers_spark_for_spark_frames() {
    polyframe::spark::register().unwrap();
    let local = df!["a" => &[1i64]].unwrap();
    let engine = infer_engine(&[&local as &dyn Any], &EngineConf::new()).unwrap();
    assert_eq!(engine.name(), "native");

    let native = SparkNativeFrame::from_rows(
        common::spark(2),
        vec![vec![Value::from(1)]],
        &common::schema("a:int"),
        2,
    )
    .unwrap();
    let engine = infer_engine(&[&native as &dyn Any, &local], &EngineConf::new()).unwrap();
    assert_eq!(engine.name(), "spark");
    assert!(engine.is_distributed());

    let creator = ("sparksql".to_string(), "SELECT 1".to_string());
    let engine = infer_engine(&[&creator as &dyn Any], &EngineConf::new()).unwrap();
    assert_eq!(engine.name(), "spark");
}

#[test]
fn inference_falls_back_to_configured_default() {
    let registry = EngineRegistry::with_builtins();
    let engine = registry.infer_engine(&[], &EngineConf::new()).unwrap();
    assert_eq!(engine.name(), "native");
    let conf = EngineConf::from([(CONF_DEFAULT_ENGINE.to_string(), "missing".to_string())]);
    assert!(matches!(registry.infer_engine(&[], &conf), Err(FrameError::NotFound(_))));
}

#[test]
fn registering_custom_engines() {
    let registry = EngineRegistry::with_builtins();
    let factory: EngineFactory = Arc::new(|_: Option<&dyn Any>, conf: &EngineConf| {
        let mut conf = conf.clone();
        conf.insert("custom".into(), "yes".into());
        Ok(Arc::new(NativeExecutionEngine::new(conf)) as AnyEngine)
    });
    registry
        .register_engine(EngineKey::name("custom"), Arc::clone(&factory), OnDuplicate::Throw)
        .unwrap();
    let err = registry
        .register_engine(EngineKey::name("custom"), Arc::clone(&factory), OnDuplicate::Throw)
        .unwrap_err();
    assert!(matches!(err, FrameError::Duplicate(_)));
    let engine = registry.make_engine("custom", &EngineConf::new()).unwrap();
    assert_eq!(engine.conf().get("custom").map(String::as_str), Some("yes"));

    // "native" stays untouched when a duplicate is ignored
    registry
        .register_engine(EngineKey::name("native"), factory, OnDuplicate::Ignore)
        .unwrap();
    let native = registry.make_engine("native", &EngineConf::new()).unwrap();
    assert!(native.conf().get("custom").is_none());
}

#[test]
fn global_registration_is_idempotent() {
    polyframe::spark::register().unwrap();
    polyframe::spark::register().unwrap();
    let engine = make_engine("spark", &EngineConf::new()).unwrap();
    assert_eq!(engine.name(), "spark");
    let err = register_engine(
        EngineKey::name("spark"),
        Arc::new(|_: Option<&dyn Any>, conf: &EngineConf| {
            Ok(Arc::new(NativeExecutionEngine::new(conf.clone())) as AnyEngine)
        }),
        OnDuplicate::Throw,
    )
    .unwrap_err();
    assert!(matches!(err, FrameError::Duplicate(_)));
}
