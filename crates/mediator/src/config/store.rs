//! [`ConfigStore`]: process-wide runtime configuration with versioned reload.
//!
//! Backed by `arc-swap` so the request path reads a complete snapshot without
//! locking while the lifecycle swaps in a freshly merged tree.

use std::{path::Path, sync::Arc};

use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;

use super::{lookup, merge, set_path, ConfigError, ConfigTree, PORT_KEY, URN_KEY};

/// One immutable snapshot of the runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    tree: ConfigTree,
    version: u64,
}

impl RuntimeConfig {
    /// The full configuration tree.
    #[cfg(test)]
    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    /// Swap counter; starts at 0 for the boot seed.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Look up a colon-separated key path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.tree, path)
    }

    /// Look up a string value.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// The listener port at `app:port`, given as a number or a numeric string.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Missing`] or [`ConfigError::Invalid`].
    pub fn port(&self) -> Result<u16, ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            key: PORT_KEY,
            reason,
        };
        match self.get(PORT_KEY) {
            None | Some(Value::Null) => Err(ConfigError::Missing(PORT_KEY)),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| invalid(format!("{n} is not a port number"))),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| invalid(format!("{s:?} is not a port number"))),
            Some(other) => Err(invalid(format!("{other} is not a port number"))),
        }
    }

    /// Deserialize the value at `key` into `T`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Missing`] when absent, [`ConfigError::Invalid`] when the
    /// value does not have the expected shape.
    pub fn section<T: DeserializeOwned>(&self, key: &'static str) -> Result<T, ConfigError> {
        let value = self.get(key).ok_or(ConfigError::Missing(key))?;
        serde_json::from_value(value.clone()).map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
    }
}

/// Shared handle to the current [`RuntimeConfig`].
#[derive(Clone, Debug)]
pub struct ConfigStore {
    inner: Arc<ArcSwap<RuntimeConfig>>,
}

impl ConfigStore {
    /// Create a store seeded with `seed` at version 0.
    pub fn new(seed: ConfigTree) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(RuntimeConfig {
                tree: seed,
                version: 0,
            })),
        }
    }

    /// Current snapshot. Lock-free; safe on the request path.
    pub fn snapshot(&self) -> Arc<RuntimeConfig> {
        self.inner.load_full()
    }

    /// Version of the current snapshot.
    #[cfg(test)]
    pub fn version(&self) -> u64 {
        self.inner.load().version
    }

    /// Set a single key path, publishing a new snapshot.
    pub fn set(&self, path: &str, value: Value) {
        self.inner.rcu(|current| {
            let mut tree = current.tree.clone();
            set_path(&mut tree, path, value.clone());
            RuntimeConfig {
                tree,
                version: current.version + 1,
            }
        });
    }

    /// Record the registered URN at `mediator:api:urn`.
    pub fn stamp_urn(&self, urn: &str) {
        self.set(URN_KEY, Value::String(urn.to_owned()));
    }

    /// Merge `update` over `base`, stamp `urn`, persist the result to
    /// `cache_path`, and only then publish it.
    ///
    /// The merge is shallow: top-level keys of `update` replace those of
    /// `base` wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the snapshot cannot be written; the
    /// current snapshot is left in place in that case.
    pub async fn reload(
        &self,
        base: &ConfigTree,
        update: &ConfigTree,
        urn: &str,
        cache_path: &Path,
    ) -> Result<Arc<RuntimeConfig>, ConfigError> {
        let mut tree = merge(base, update);
        set_path(&mut tree, URN_KEY, Value::String(urn.to_owned()));

        persist(&tree, cache_path).await?;

        let mut published = None;
        self.inner.rcu(|current| {
            let next = Arc::new(RuntimeConfig {
                tree: tree.clone(),
                version: current.version + 1,
            });
            published = Some(Arc::clone(&next));
            next
        });
        let published = published.unwrap_or_else(|| self.snapshot());
        info!(
            version = published.version,
            path = %cache_path.display(),
            "runtime config reloaded"
        );
        Ok(published)
    }
}

/// Write `tree` to `path` wholesale via a temporary sibling and a rename.
async fn persist(tree: &ConfigTree, path: &Path) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_owned(),
        source,
    };
    let body = serde_json::to_vec_pretty(tree).map_err(|e| io_err(std::io::Error::other(e)))?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, body).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
    Ok(())
}
