use super::dataframe::SparkNativeFrame;
use polyframe_core::config::CONF_PARALLELISM;
use polyframe_core::{FrameConfig, Result, Row, Schema};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::debug;

/// Spark's own key for the default partition count.
pub const SPARK_DEFAULT_PARALLELISM: &str = "spark.default.parallelism";

/// Builder for creating a SparkSession with configuration options
#[derive(Debug, Default)]
pub struct SparkSessionBuilder {
    app_name: Option<String>,
    master: Option<String>,
    config: HashMap<String, String>,
}

impl SparkSessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn master(mut self, master: impl Into<String>) -> Self {
        self.master = Some(master.into());
        self
    }

    pub fn config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Apply every entry of a [`FrameConfig`] (parallelism, read mode, extras).
    pub fn with_config(mut self, config: &FrameConfig) -> Self {
        for (k, v) in config.to_engine_conf() {
            self.config.insert(k, v);
        }
        self
    }

    /// Return the active session, creating (and activating) one from this builder if none exists.
    pub fn get_or_create(self) -> SparkSession {
        let mut active = active_session()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(session) = active.as_ref() {
            return session.clone();
        }
        let session = self.create();
        *active = Some(session.clone());
        session
    }

    /// Always build a new session without touching the active one.
    pub fn create(self) -> SparkSession {
        SparkSession::new(self.app_name, self.master, self.config)
    }
}

fn active_session() -> &'static Mutex<Option<SparkSession>> {
    static ACTIVE: OnceLock<Mutex<Option<SparkSession>>> = OnceLock::new();
    ACTIVE.get_or_init(|| Mutex::new(None))
}

/// Entry point of the spark engine: holds configuration and the context.
#[derive(Debug, Clone)]
pub struct SparkSession {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    conf: HashMap<String, String>,
    context: SparkContext,
}

impl SparkSession {
    pub fn new(
        app_name: Option<String>,
        master: Option<String>,
        config: HashMap<String, String>,
    ) -> Self {
        let master = master.unwrap_or_else(|| "local[*]".to_string());
        let parallelism = resolve_parallelism(&master, &config);
        let context = SparkContext {
            app_name: app_name.unwrap_or_else(|| "polyframe".to_string()),
            master,
            default_parallelism: parallelism,
        };
        debug!(
            app_name = %context.app_name,
            master = %context.master,
            parallelism,
            "created spark session"
        );
        SparkSession {
            inner: Arc::new(SessionInner {
                conf: config,
                context,
            }),
        }
    }

    pub fn builder() -> SparkSessionBuilder {
        SparkSessionBuilder::new()
    }

    pub fn conf(&self) -> &HashMap<String, String> {
        &self.inner.conf
    }

    pub fn spark_context(&self) -> &SparkContext {
        &self.inner.context
    }

    pub fn app_name(&self) -> &str {
        &self.inner.context.app_name
    }

    /// Same underlying session (clones share state).
    pub fn same_session(&self, other: &SparkSession) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Distribute `rows` over the default number of partitions.
    pub fn create_dataframe(&self, rows: Vec<Row>, schema: &Schema) -> Result<SparkNativeFrame> {
        SparkNativeFrame::from_rows(self.clone(), rows, schema, self.inner.context.default_parallelism)
    }

    /// Deactivate this session if it is the active one.
    pub fn stop(&self) {
        let mut active = active_session()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if active.as_ref().is_some_and(|s| s.same_session(self)) {
            *active = None;
        }
    }
}

impl Default for SparkSession {
    fn default() -> Self {
        Self::builder().get_or_create()
    }
}

/// Cluster-side view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparkContext {
    app_name: String,
    master: String,
    default_parallelism: usize,
}

impl SparkContext {
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn master(&self) -> &str {
        &self.master
    }

    pub fn default_parallelism(&self) -> usize {
        self.default_parallelism
    }
}

/// Explicit conf wins, then the `local[N]` master, then the machine's cores.
fn resolve_parallelism(master: &str, conf: &HashMap<String, String>) -> usize {
    let from_conf = [CONF_PARALLELISM, SPARK_DEFAULT_PARALLELISM]
        .iter()
        .filter_map(|k| conf.get(*k))
        .filter_map(|v| v.trim().parse::<usize>().ok())
        .find(|n| *n > 0);
    if let Some(n) = from_conf {
        return n;
    }
    let cores = || {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    };
    match master.trim() {
        "local" => 1,
        m => match m.strip_prefix("local[").and_then(|r| r.strip_suffix(']')) {
            Some("*") => cores(),
            Some(n) => n.parse::<usize>().ok().filter(|n| *n > 0).unwrap_or_else(cores),
            None => cores(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallelism_resolution() {
        let empty = HashMap::new();
        assert_eq!(resolve_parallelism("local", &empty), 1);
        assert_eq!(resolve_parallelism("local[3]", &empty), 3);
        assert!(resolve_parallelism("local[*]", &empty) >= 1);
        let conf = HashMap::from([(SPARK_DEFAULT_PARALLELISM.to_string(), "5".to_string())]);
        assert_eq!(resolve_parallelism("local[3]", &conf), 5);
    }

    #[test]
    fn test_builder_with_config() {
        let config = FrameConfig {
            parallelism: Some(7),
            ..FrameConfig::default()
        };
        let session = SparkSession::builder()
            .app_name("t")
            .with_config(&config)
            .create();
        assert_eq!(session.spark_context().default_parallelism(), 7);
        assert_eq!(session.app_name(), "t");
        assert_eq!(session.conf().get(CONF_PARALLELISM).map(String::as_str), Some("7"));
    }

    #[test]
    fn test_create_does_not_share() {
        let a = SparkSession::builder().master("local[2]").create();
        let b = SparkSession::builder().master("local[2]").create();
        assert!(!a.same_session(&b));
        assert!(a.same_session(&a.clone()));
    }
}
