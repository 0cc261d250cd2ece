//! Process settings and the runtime configuration tree.
//!
//! Two layers live here:
//!
//! - [`Settings`]: bootstrap values read once from environment variables
//!   (deployment profile, config directory, logging, heartbeat cadence).
//! - [`ConfigTree`]: the JSON runtime configuration, addressed by
//!   colon-separated key paths such as `app:port` or `mediator:api:urn`.
//!   It is loaded through a [`ConfigLoader`] and owned by [`ConfigStore`].

pub mod loader;
pub mod store;

pub use loader::{ConfigLoader, FileConfigLoader};
pub use store::{ConfigStore, RuntimeConfig};

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// A configuration tree: a JSON object keyed by top-level section name.
pub type ConfigTree = Map<String, Value>;

/// Key path of the listener port.
pub const PORT_KEY: &str = "app:port";
/// Key path of the hub API coordinates.
pub const HUB_API_KEY: &str = "mediator:api";
/// Key path the registered URN is stamped into after every reload.
pub const URN_KEY: &str = "mediator:api:urn";
/// Key path of the shared token-signing secret.
pub const SECRET_KEY: &str = "auth:secret";
/// Key path of the optional TLS material (`{ "cert": ..., "key": ... }`).
pub const TLS_KEY: &str = "app:tls";

/// Errors produced while loading, reading, or persisting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file could not be read or written.
    #[error("config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid JSON.
    #[error("config file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A configuration file parsed, but its root is not a JSON object.
    #[error("config file {0} must contain a JSON object")]
    NotAnObject(PathBuf),

    /// A required key path has no value.
    #[error("missing config key `{0}`")]
    Missing(&'static str),

    /// A key path holds a value of the wrong shape.
    #[error("invalid config key `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Look up a colon-separated key path in `tree`.
pub fn lookup<'a>(tree: &'a ConfigTree, path: &str) -> Option<&'a Value> {
    let mut parts = path.split(':');
    let mut current = tree.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Set a colon-separated key path in `tree`, creating (or replacing
/// non-object) intermediate sections as needed.
pub fn set_path(tree: &mut ConfigTree, path: &str, value: Value) {
    let mut parts: Vec<&str> = path.split(':').collect();
    let Some(last) = parts.pop() else {
        return;
    };
    let mut current = tree;
    for part in parts {
        let slot = current
            .entry(part.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = match slot {
            Value::Object(map) => map,
            _ => unreachable!("slot was just made an object"),
        };
    }
    current.insert(last.to_owned(), value);
}

/// Shallow merge: every top-level key of `update` replaces the same key of
/// `base` wholesale. Nested sections are not merged.
pub fn merge(base: &ConfigTree, update: &ConfigTree) -> ConfigTree {
    let mut merged = base.clone();
    for (key, value) in update {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

// ---------------------------------------------------------------------------
// Bootstrap settings
// ---------------------------------------------------------------------------

/// Validated process settings read from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Deployment profile; selects `config_<env>.json`.
    #[serde(default)]
    pub mediator_env: Option<String>,

    /// Profile variable of existing deployments; read when `MEDIATOR_ENV` is unset.
    #[serde(default)]
    pub node_env: Option<String>,

    /// Directory holding `mediator.json`, the profile files and the side cache.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Seconds between heartbeats sent to the hub.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// OTLP endpoint for span export. Unset disables export.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

const DEFAULT_PROFILE: &str = "development";

fn default_config_dir() -> PathBuf {
    PathBuf::from("config")
}
fn default_heartbeat_interval() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".into()
}

impl Settings {
    /// Load and validate settings from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build settings from environment")?;

        let s: Settings = cfg
            .try_deserialize()
            .context("failed to deserialise settings")?;

        s.validate()?;
        Ok(s)
    }

    /// The deployment profile: `MEDIATOR_ENV`, then `NODE_ENV`, then
    /// `development`.
    pub fn profile(&self) -> &str {
        self.mediator_env
            .as_deref()
            .or(self.node_env.as_deref())
            .unwrap_or(DEFAULT_PROFILE)
    }

    fn validate(&self) -> Result<()> {
        if self.profile().trim().is_empty() {
            anyhow::bail!("MEDIATOR_ENV / NODE_ENV must not be blank");
        }
        if self.heartbeat_interval_secs == 0 {
            anyhow::bail!("HEARTBEAT_INTERVAL_SECS must be > 0");
        }
        if let Some(endpoint) = &self.otel_exporter_otlp_endpoint {
            if endpoint.trim().is_empty() {
                anyhow::bail!("OTEL_EXPORTER_OTLP_ENDPOINT must not be blank when set");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: Value) -> ConfigTree {
        value.as_object().cloned().unwrap()
    }

    fn settings() -> Settings {
        Settings {
            mediator_env: None,
            node_env: None,
            config_dir: default_config_dir(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            otel_exporter_otlp_endpoint: None,
            log_level: default_log_level(),
        }
    }

    #[test]
    fn defaults_are_correct() {
        assert_eq!(settings().profile(), "development");
        assert_eq!(default_config_dir(), PathBuf::from("config"));
        assert_eq!(default_heartbeat_interval(), 10);
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn node_env_is_a_fallback_for_the_profile() {
        let s = Settings {
            node_env: Some("production".into()),
            ..settings()
        };
        assert_eq!(s.profile(), "production");

        let s = Settings {
            mediator_env: Some("staging".into()),
            node_env: Some("production".into()),
            ..settings()
        };
        assert_eq!(s.profile(), "staging");
    }

    #[test]
    fn validate_rejects_blank_profile() {
        let s = Settings {
            mediator_env: Some(" ".into()),
            ..settings()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(settings().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_heartbeat() {
        let s = Settings {
            heartbeat_interval_secs: 0,
            ..settings()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_otel_endpoint() {
        let s = Settings {
            otel_exporter_otlp_endpoint: Some(" ".into()),
            ..settings()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn lookup_walks_nested_sections() {
        let t = tree(json!({"app": {"port": 3000}, "mediator": {"api": {"urn": "u"}}}));
        assert_eq!(lookup(&t, "app:port"), Some(&json!(3000)));
        assert_eq!(lookup(&t, "mediator:api:urn"), Some(&json!("u")));
        assert_eq!(lookup(&t, "app:missing"), None);
        assert_eq!(lookup(&t, "app:port:deeper"), None);
    }

    #[test]
    fn set_path_creates_sections() {
        let mut t = tree(json!({"mediator": "not-an-object"}));
        set_path(&mut t, "mediator:api:urn", json!("urn:x"));
        assert_eq!(t, tree(json!({"mediator": {"api": {"urn": "urn:x"}}})));
    }

    #[test]
    fn merge_replaces_top_level_sections_wholesale() {
        let base = tree(json!({"app": {"port": 3000, "host": "0.0.0.0"}, "auth": {"secret": "s"}}));
        let update = tree(json!({"app": {"port": 4000}}));
        let merged = merge(&base, &update);
        assert_eq!(
            merged,
            tree(json!({"app": {"port": 4000}, "auth": {"secret": "s"}}))
        );
    }

    #[test]
    fn merge_is_idempotent() {
        let base = tree(json!({"app": {"port": 3000}, "auth": {"secret": "s"}}));
        let update = tree(json!({"app": {"port": 4000}, "extra": true}));
        let once = merge(&base, &update);
        let twice = merge(&once, &update);
        assert_eq!(once, twice);
    }
}
