//! Capability-dispatch tables: engine factories, engine inference, dataset
//! converters and function parameter adapters.
//!
//! The global registry starts with the built-in native engine, converters and
//! parameters; plugins such as [`crate::spark::register`] add their own entries
//! through the free functions in this module.

use crate::dataframe::{AnyDataFrame, ArrayDataFrame, DataInput, PolarsDataFrame};
use crate::execution::{AnyEngine, EngineConf, ExecutionEngine, NativeExecutionEngine};
use crate::params::{builtin_params, ParamAdapter};
use arrow::record_batch::RecordBatch;
use polyframe_core::config::CONF_DEFAULT_ENGINE;
use polyframe_core::{FrameError, Result, Row, Schema};
use polyframe_polars::PlDataFrame;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// How an engine factory is looked up.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EngineKey {
    Name(String),
    /// The type of a session-like object the engine wraps.
    Session(TypeId),
}

impl EngineKey {
    pub fn name(name: impl Into<String>) -> Self {
        EngineKey::Name(name.into())
    }

    pub fn session<S: Any>() -> Self {
        EngineKey::Session(TypeId::of::<S>())
    }
}

/// What to do when a key is registered twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnDuplicate {
    #[default]
    Overwrite,
    Ignore,
    Throw,
}

/// Builds an engine; the session is `Some` for [`EngineKey::Session`] lookups.
pub type EngineFactory =
    Arc<dyn Fn(Option<&dyn Any>, &EngineConf) -> Result<AnyEngine> + Send + Sync>;

/// Inspects objects and proposes an engine, or `None` to defer to the next candidate.
pub type Inference =
    Arc<dyn Fn(&[&dyn Any], &EngineConf) -> Option<Result<AnyEngine>> + Send + Sync>;

/// Wraps a native dataset as a dataframe.
pub type Converter =
    Arc<dyn Fn(&dyn Any, Option<&Schema>) -> Result<AnyDataFrame> + Send + Sync>;

#[derive(Default)]
struct Tables {
    engines: HashMap<EngineKey, EngineFactory>,
    inferences: Vec<Inference>,
    converters: HashMap<TypeId, Converter>,
    params: HashMap<TypeId, ParamAdapter>,
}

/// Registry tables behind a lock; written during startup, read afterwards.
#[derive(Default)]
pub struct EngineRegistry {
    tables: RwLock<Tables>,
}

impl EngineRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the native engine, built-in converters and parameters.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        let native: EngineFactory =
            Arc::new(|_: Option<&dyn Any>, conf: &EngineConf| {
                Ok(Arc::new(NativeExecutionEngine::new(conf.clone())) as AnyEngine)
            });
        {
            let mut tables = registry.tables.write().unwrap_or_else(|e| e.into_inner());
            for name in ["native", "polars", "pandas"] {
                tables.engines.insert(EngineKey::name(name), Arc::clone(&native));
            }
            tables.engines.insert(
                EngineKey::session::<NativeExecutionEngine>(),
                Arc::new(|session: Option<&dyn Any>, conf: &EngineConf| {
                    let base = session
                        .and_then(|s| s.downcast_ref::<NativeExecutionEngine>())
                        .map(|e| e.conf().clone())
                        .unwrap_or_default();
                    let mut merged = base;
                    merged.extend(conf.clone());
                    Ok(Arc::new(NativeExecutionEngine::new(merged)) as AnyEngine)
                }),
            );
            for (id, converter) in builtin_converters() {
                tables.converters.insert(id, converter);
            }
            for (id, param) in builtin_params() {
                tables.params.insert(id, param);
            }
        }
        registry
    }

    /// The process-wide registry.
    pub fn global() -> &'static EngineRegistry {
        static GLOBAL: OnceLock<EngineRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            debug!("initializing global engine registry");
            EngineRegistry::with_builtins()
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| FrameError::Internal("engine registry lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| FrameError::Internal("engine registry lock poisoned".into()))
    }

    pub fn register_engine(
        &self,
        key: EngineKey,
        factory: EngineFactory,
        on_dup: OnDuplicate,
    ) -> Result<()> {
        let mut tables = self.write()?;
        if tables.engines.contains_key(&key) {
            match on_dup {
                OnDuplicate::Ignore => return Ok(()),
                OnDuplicate::Throw => {
                    return Err(FrameError::Duplicate(format!(
                        "engine {key:?} is already registered"
                    )))
                }
                OnDuplicate::Overwrite => {}
            }
        }
        debug!(key = ?key, "registered execution engine");
        tables.engines.insert(key, factory);
        Ok(())
    }

    pub fn make_engine(&self, name: &str, conf: &EngineConf) -> Result<AnyEngine> {
        let factory = self.engine_factory(&EngineKey::name(name))?;
        factory(None, conf)
    }

    pub fn make_engine_for_session<S: Any>(&self, session: &S, conf: &EngineConf) -> Result<AnyEngine> {
        let factory = self.engine_factory(&EngineKey::session::<S>())?;
        factory(Some(session as &dyn Any), conf)
    }

    fn engine_factory(&self, key: &EngineKey) -> Result<EngineFactory> {
        let tables = self.read()?;
        tables.engines.get(key).cloned().ok_or_else(|| {
            let mut names: Vec<&str> = tables
                .engines
                .keys()
                .filter_map(|k| match k {
                    EngineKey::Name(n) => Some(n.as_str()),
                    EngineKey::Session(_) => None,
                })
                .collect();
            names.sort_unstable();
            FrameError::NotFound(format!(
                "no execution engine registered for {key:?}. Registered names: [{}]",
                names.join(", ")
            ))
        })
    }

    pub fn register_inference(&self, inference: Inference) -> Result<()> {
        self.write()?.inferences.push(inference);
        Ok(())
    }

    /// Engine proposed by the first matching inference candidate, falling back
    /// to the engine named by `polyframe.default.engine` (or `native`).
    pub fn infer_engine(&self, objects: &[&dyn Any], conf: &EngineConf) -> Result<AnyEngine> {
        let candidates = self.read()?.inferences.clone();
        for candidate in candidates {
            if let Some(engine) = candidate(objects, conf) {
                let engine = engine?;
                debug!(engine = engine.name(), "inferred execution engine");
                return Ok(engine);
            }
        }
        let default = conf
            .get(CONF_DEFAULT_ENGINE)
            .map(String::as_str)
            .unwrap_or("native");
        self.make_engine(default, conf)
    }

    /// Register how a native dataset of type `T` becomes a dataframe.
    pub fn register_converter<T, F>(&self, convert: F) -> Result<()>
    where
        T: Any,
        F: Fn(&T, Option<&Schema>) -> Result<AnyDataFrame> + Send + Sync + 'static,
    {
        self.write()?
            .converters
            .insert(TypeId::of::<T>(), typed_converter(convert));
        Ok(())
    }

    pub fn as_frame(&self, obj: &dyn Any, schema: Option<&Schema>) -> Result<AnyDataFrame> {
        let converter = self
            .read()?
            .converters
            .get(&obj.type_id())
            .cloned()
            .ok_or_else(|| {
                FrameError::UnsupportedInput("no dataframe converter for this object type".into())
            })?;
        converter(obj, schema)
    }

    pub fn register_param<T: Any>(&self, adapter: ParamAdapter) -> Result<()> {
        self.write()?.params.insert(TypeId::of::<T>(), adapter);
        Ok(())
    }

    pub fn param_adapter<T: Any>(&self) -> Result<ParamAdapter> {
        self.read()?
            .params
            .get(&TypeId::of::<T>())
            .cloned()
            .ok_or_else(|| {
                FrameError::NotFound(format!(
                    "no parameter adapter for {}",
                    std::any::type_name::<T>()
                ))
            })
    }
}

fn typed_converter<T, F>(convert: F) -> Converter
where
    T: Any,
    F: Fn(&T, Option<&Schema>) -> Result<AnyDataFrame> + Send + Sync + 'static,
{
    Arc::new(move |obj: &dyn Any, schema: Option<&Schema>| match obj.downcast_ref::<T>() {
        Some(native) => convert(native, schema),
        None => Err(FrameError::Internal(format!(
            "converter for {} received another type",
            std::any::type_name::<T>()
        ))),
    })
}

fn builtin_converters() -> Vec<(TypeId, Converter)> {
    vec![
        (
            TypeId::of::<AnyDataFrame>(),
            typed_converter(|df: &AnyDataFrame, schema| match schema {
                Some(s) if s != df.schema() => {
                    Ok(Arc::new(ArrayDataFrame::new(DataInput::Frame(Arc::clone(df)), Some(s))?) as AnyDataFrame)
                }
                _ => Ok(Arc::clone(df)),
            }),
        ),
        (
            TypeId::of::<PlDataFrame>(),
            typed_converter(|df: &PlDataFrame, schema| {
                let input = DataInput::Polars(Arc::new(df.clone()));
                Ok(Arc::new(PolarsDataFrame::new(input, schema)?) as AnyDataFrame)
            }),
        ),
        (
            TypeId::of::<Arc<PlDataFrame>>(),
            typed_converter(|df: &Arc<PlDataFrame>, schema| {
                let input = DataInput::Polars(Arc::clone(df));
                Ok(Arc::new(PolarsDataFrame::new(input, schema)?) as AnyDataFrame)
            }),
        ),
        (
            TypeId::of::<RecordBatch>(),
            typed_converter(|batch: &RecordBatch, schema| {
                let input = DataInput::Arrow(Arc::new(batch.clone()));
                Ok(Arc::new(crate::ArrowDataFrame::new(input, schema)?) as AnyDataFrame)
            }),
        ),
        (
            TypeId::of::<Vec<Row>>(),
            typed_converter(|rows: &Vec<Row>, schema| {
                let input = DataInput::Rows(rows.clone());
                Ok(Arc::new(ArrayDataFrame::new(input, schema)?) as AnyDataFrame)
            }),
        ),
    ]
}

/// Register an engine factory in the global registry.
pub fn register_engine(key: EngineKey, factory: EngineFactory, on_dup: OnDuplicate) -> Result<()> {
    EngineRegistry::global().register_engine(key, factory, on_dup)
}

pub fn make_engine(name: &str, conf: &EngineConf) -> Result<AnyEngine> {
    EngineRegistry::global().make_engine(name, conf)
}

pub fn make_engine_for_session<S: Any>(session: &S, conf: &EngineConf) -> Result<AnyEngine> {
    EngineRegistry::global().make_engine_for_session(session, conf)
}

pub fn register_inference(inference: Inference) -> Result<()> {
    EngineRegistry::global().register_inference(inference)
}

pub fn infer_engine(objects: &[&dyn Any], conf: &EngineConf) -> Result<AnyEngine> {
    EngineRegistry::global().infer_engine(objects, conf)
}

pub fn register_converter<T, F>(convert: F) -> Result<()>
where
    T: Any,
    F: Fn(&T, Option<&Schema>) -> Result<AnyDataFrame> + Send + Sync + 'static,
{
    EngineRegistry::global().register_converter(convert)
}

/// Wrap a native dataset (Polars frame, record batch, rows, dataframe, or a
/// registered plugin type) as a dataframe.
pub fn as_frame(obj: &dyn Any, schema: Option<&Schema>) -> Result<AnyDataFrame> {
    EngineRegistry::global().as_frame(obj, schema)
}

pub fn register_param<T: Any>(adapter: ParamAdapter) -> Result<()> {
    EngineRegistry::global().register_param::<T>(adapter)
}

pub fn param_adapter<T: Any>() -> Result<ParamAdapter> {
    EngineRegistry::global().param_adapter::<T>()
}
