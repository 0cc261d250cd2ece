//! Loading configuration trees from the config directory.
//!
//! Directory layout:
//!
//! ```text
//! <config_dir>/
//!   mediator.json            static mediator identity sent to the hub
//!   config_<env>.json        base runtime config for the deployment profile
//!   runtime-config.json      side cache, last merged runtime config
//! ```

use std::path::{Path, PathBuf};

use common::protocol::MediatorConfig;
use serde_json::Value;
use tracing::{debug, info};

use super::{ConfigError, ConfigTree};

/// File name of the persisted runtime configuration snapshot.
pub const CACHE_FILE_NAME: &str = "runtime-config.json";

/// Source of configuration trees for the lifecycle.
pub trait ConfigLoader: Send + Sync {
    /// The static base tree for the selected deployment profile.
    fn load_base(&self) -> Result<ConfigTree, ConfigError>;

    /// The tree to seed [`ConfigStore`](super::ConfigStore) with at boot.
    fn load_seed(&self) -> Result<ConfigTree, ConfigError>;

    /// The mediator identity registered with the hub.
    fn load_mediator(&self) -> Result<MediatorConfig, ConfigError>;

    /// Where merged runtime config is persisted.
    fn cache_path(&self) -> PathBuf;
}

/// [`ConfigLoader`] backed by JSON files in a directory.
#[derive(Debug, Clone)]
pub struct FileConfigLoader {
    dir: PathBuf,
    env: String,
}

impl FileConfigLoader {
    pub fn new(dir: impl Into<PathBuf>, env: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            env: env.into(),
        }
    }

    fn base_path(&self) -> PathBuf {
        self.dir.join(format!("config_{}.json", self.env))
    }
}

impl ConfigLoader for FileConfigLoader {
    fn load_base(&self) -> Result<ConfigTree, ConfigError> {
        read_tree(&self.base_path())
    }

    /// Prefers the side cache (last known good) and falls back to the base
    /// profile when no cache has been written yet.
    fn load_seed(&self) -> Result<ConfigTree, ConfigError> {
        let cache = self.cache_path();
        if cache.exists() {
            info!(path = %cache.display(), "seeding runtime config from cache");
            return read_tree(&cache);
        }
        info!(path = %self.base_path().display(), "seeding runtime config from base profile");
        self.load_base()
    }

    fn load_mediator(&self) -> Result<MediatorConfig, ConfigError> {
        let path = self.dir.join("mediator.json");
        let raw = read_file(&path)?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })
    }

    fn cache_path(&self) -> PathBuf {
        self.dir.join(CACHE_FILE_NAME)
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_owned(),
        source,
    })
}

/// Read `path` and require a JSON object at its root.
pub fn read_tree(path: &Path) -> Result<ConfigTree, ConfigError> {
    let raw = read_file(path)?;
    let value: Value = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })?;
    debug!(path = %path.display(), "loaded config tree");
    match value {
        Value::Object(tree) => Ok(tree),
        _ => Err(ConfigError::NotAnObject(path.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &Path, name: &str, value: &Value) {
        std::fs::write(dir.join(name), serde_json::to_vec(value).unwrap()).unwrap();
    }

    #[test]
    fn base_is_selected_by_profile() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "config_development.json", &json!({"app": {"port": 3000}}));
        write(tmp.path(), "config_production.json", &json!({"app": {"port": 80}}));

        let dev = FileConfigLoader::new(tmp.path(), "development");
        let prod = FileConfigLoader::new(tmp.path(), "production");
        assert_eq!(dev.load_base().unwrap()["app"]["port"], 3000);
        assert_eq!(prod.load_base().unwrap()["app"]["port"], 80);
    }

    #[test]
    fn seed_prefers_cache_over_base() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = FileConfigLoader::new(tmp.path(), "development");
        write(tmp.path(), "config_development.json", &json!({"app": {"port": 3000}}));
        assert_eq!(loader.load_seed().unwrap()["app"]["port"], 3000);

        write(tmp.path(), CACHE_FILE_NAME, &json!({"app": {"port": 4000}}));
        assert_eq!(loader.load_seed().unwrap()["app"]["port"], 4000);
    }

    #[test]
    fn missing_base_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = FileConfigLoader::new(tmp.path(), "staging");
        assert!(matches!(loader.load_base(), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn non_object_root_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "config_development.json", &json!([1, 2, 3]));
        let loader = FileConfigLoader::new(tmp.path(), "development");
        assert!(matches!(loader.load_base(), Err(ConfigError::NotAnObject(_))));
    }

    #[test]
    fn mediator_identity_is_parsed() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "mediator.json",
            &json!({"urn": "urn:mediator:cr", "name": "Client Registry"}),
        );
        let loader = FileConfigLoader::new(tmp.path(), "development");
        let mediator = loader.load_mediator().unwrap();
        assert_eq!(mediator.urn, "urn:mediator:cr");
    }
}
