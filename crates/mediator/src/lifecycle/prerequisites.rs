//! Checks run after every configuration reload, before the merged config is
//! relied on.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{RuntimeConfig, PORT_KEY, SECRET_KEY};

/// A failed prerequisite.
#[derive(Debug, Error)]
#[error("prerequisite `{name}` failed: {reason}")]
pub struct PrerequisiteError {
    pub name: String,
    pub reason: String,
}

/// Something that must hold for the mediator to run with `config`.
#[async_trait]
pub trait PrerequisiteCheck: Send + Sync {
    async fn check(&self, config: &RuntimeConfig) -> Result<(), PrerequisiteError>;
}

/// Requires a set of key paths to be present in the runtime config.
#[derive(Debug, Clone)]
pub struct RequiredKeys {
    keys: Vec<&'static str>,
}

impl RequiredKeys {
    pub fn new(keys: Vec<&'static str>) -> Self {
        Self { keys }
    }
}

impl Default for RequiredKeys {
    /// The listener port and the token secret.
    fn default() -> Self {
        Self::new(vec![PORT_KEY, SECRET_KEY])
    }
}

#[async_trait]
impl PrerequisiteCheck for RequiredKeys {
    async fn check(&self, config: &RuntimeConfig) -> Result<(), PrerequisiteError> {
        for key in &self.keys {
            if config.get(key).map_or(true, serde_json::Value::is_null) {
                return Err(PrerequisiteError {
                    name: "required-keys".into(),
                    reason: format!("`{key}` is not set"),
                });
            }
        }
        Ok(())
    }
}
