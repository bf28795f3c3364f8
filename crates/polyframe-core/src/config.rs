//! Process-level configuration.
//!
//! [`FrameConfig`] can be built in code or read from `POLYFRAME_*` environment
//! variables, then flattened into the string map engines receive.

use std::collections::HashMap;

/// Engine conf key naming the engine used when inference finds no candidate.
pub const CONF_DEFAULT_ENGINE: &str = "polyframe.default.engine";
/// Engine conf key for the default number of partitions a distributed engine produces.
pub const CONF_PARALLELISM: &str = "polyframe.default.parallelism";
/// Engine conf key choosing whether rows handed to functions are read type-safe.
pub const CONF_TYPE_SAFE: &str = "polyframe.read.type_safe";

const ENV_DEFAULT_ENGINE: &str = "POLYFRAME_DEFAULT_ENGINE";
const ENV_PARALLELISM: &str = "POLYFRAME_SPARK_PARALLELISM";
const ENV_TYPE_SAFE: &str = "POLYFRAME_TYPE_SAFE";
const ENV_CONF_PREFIX: &str = "POLYFRAME_CONF_";

#[derive(Debug, Clone, PartialEq)]
pub struct FrameConfig {
    /// Engine name used when none is given explicitly.
    pub default_engine: String,
    /// Partitions produced by distributed engines; `None` lets the engine decide.
    pub parallelism: Option<usize>,
    /// Read native rows type-safe; off means fast storage reads.
    pub type_safe_reads: bool,
    /// Extra engine conf entries.
    pub extra: HashMap<String, String>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        FrameConfig {
            default_engine: "native".to_string(),
            parallelism: None,
            type_safe_reads: true,
            extra: HashMap::new(),
        }
    }
}

impl FrameConfig {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build from an explicit set of variables (what [`from_env`](Self::from_env) uses).
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = FrameConfig::default();
        for (k, v) in vars {
            let key = k.as_ref();
            let value: String = v.into();
            match key {
                ENV_DEFAULT_ENGINE => config.default_engine = value.trim().to_string(),
                ENV_PARALLELISM => match value.trim().parse::<usize>() {
                    Ok(n) if n > 0 => config.parallelism = Some(n),
                    _ => tracing::warn!(value = %value, "ignoring invalid {ENV_PARALLELISM}"),
                },
                ENV_TYPE_SAFE => config.type_safe_reads = parse_flag(&value),
                _ => {
                    if let Some(rest) = key.strip_prefix(ENV_CONF_PREFIX) {
                        let conf_key = rest.to_ascii_lowercase().replace("__", ".");
                        config.extra.insert(conf_key, value);
                    }
                }
            }
        }
        config
    }

    /// Flatten into engine conf entries.
    pub fn to_engine_conf(&self) -> HashMap<String, String> {
        let mut conf = self.extra.clone();
        conf.insert(CONF_DEFAULT_ENGINE.to_string(), self.default_engine.clone());
        if let Some(n) = self.parallelism {
            conf.insert(CONF_PARALLELISM.to_string(), n.to_string());
        }
        conf.insert(CONF_TYPE_SAFE.to_string(), self.type_safe_reads.to_string());
        conf
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = FrameConfig::from_vars(Vec::<(String, String)>::new());
        assert_eq!(c, FrameConfig::default());
        assert_eq!(c.default_engine, "native");
        assert!(c.type_safe_reads);
        let off = FrameConfig::from_vars([("POLYFRAME_TYPE_SAFE", "false")]);
        assert!(!off.type_safe_reads);
    }

    #[test]
    fn reads_known_and_extra_keys() {
        let c = FrameConfig::from_vars([
            ("POLYFRAME_DEFAULT_ENGINE", "spark"),
            ("POLYFRAME_SPARK_PARALLELISM", "4"),
            ("POLYFRAME_TYPE_SAFE", "yes"),
            ("POLYFRAME_CONF_SPARK__APP__NAME", "demo"),
            ("UNRELATED", "x"),
        ]);
        assert_eq!(c.default_engine, "spark");
        assert_eq!(c.parallelism, Some(4));
        assert!(c.type_safe_reads);
        let conf = c.to_engine_conf();
        assert_eq!(conf.get(CONF_PARALLELISM).map(String::as_str), Some("4"));
        assert_eq!(conf.get(CONF_TYPE_SAFE).map(String::as_str), Some("true"));
        assert_eq!(conf.get(CONF_DEFAULT_ENGINE).map(String::as_str), Some("spark"));
        assert_eq!(conf.get("spark.app.name").map(String::as_str), Some("demo"));
        assert!(!conf.contains_key("unrelated"));
    }

    #[test]
    fn invalid_parallelism_is_ignored() {
        let c = FrameConfig::from_vars([("POLYFRAME_SPARK_PARALLELISM", "zero")]);
        assert_eq!(c.parallelism, None);
    }
}
