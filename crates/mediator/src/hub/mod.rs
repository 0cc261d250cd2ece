//! Registration with, and heartbeats to, the orchestration hub.
//!
//! # Responsibilities
//!
//! - Register this mediator's identity and fetch its initial configuration.
//! - Run the heartbeat for the life of the process, forwarding every config
//!   pushed by the hub to the lifecycle as an event.
//!
//! Hub coordinates (`mediator:api`) are re-read from the runtime config on
//! every call, so a pushed config can move the mediator to a new hub.

pub mod client;
pub mod heartbeat;

pub use client::OpenHimClient;
pub use heartbeat::activate_heartbeat;

use async_trait::async_trait;
use common::protocol::MediatorConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::config::{ConfigError, ConfigTree, RuntimeConfig, HUB_API_KEY};

/// Errors talking to the hub.
#[derive(Debug, Error)]
pub enum HubError {
    /// The request never produced a response.
    #[error("hub request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The hub answered with an unexpected status.
    #[error("hub returned {status} for {operation}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The hub answered with a body of the wrong shape.
    #[error("hub response for {operation} is not valid: {reason}")]
    Decode {
        operation: &'static str,
        reason: String,
    },

    /// `mediator:api` is missing or malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Hub API coordinates read from `mediator:api`.
#[derive(Clone, Deserialize)]
pub struct HubApi {
    pub username: String,
    pub password: String,
    #[serde(rename = "apiURL")]
    pub api_url: String,
    /// Skip hub certificate verification. Defaults to `true`: hubs ship with
    /// a self-signed certificate. Set `false` to verify against system roots.
    #[serde(default = "default_trust_self_signed", rename = "trustSelfSigned")]
    pub trust_self_signed: bool,
    #[serde(default)]
    pub urn: Option<String>,
}

fn default_trust_self_signed() -> bool {
    true
}

impl HubApi {
    /// Read the hub coordinates from a runtime config snapshot.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, ConfigError> {
        config.section(HUB_API_KEY)
    }

    /// The URN stamped into `mediator:api:urn`.
    pub fn require_urn(&self) -> Result<&str, ConfigError> {
        self.urn.as_deref().ok_or(ConfigError::Missing(crate::config::URN_KEY))
    }
}

impl std::fmt::Debug for HubApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubApi")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .field("trust_self_signed", &self.trust_self_signed)
            .field("urn", &self.urn)
            .finish()
    }
}

/// The hub's registration protocol.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HubClient: Send + Sync {
    /// Register `mediator`, returning the URN it is filed under.
    async fn register(&self, api: &HubApi, mediator: &MediatorConfig) -> Result<String, HubError>;

    /// Fetch the configuration the hub holds for `api.urn`.
    async fn fetch_config(&self, api: &HubApi) -> Result<ConfigTree, HubError>;

    /// Signal liveness; returns a config tree when the hub pushes one.
    async fn heartbeat(
        &self,
        api: &HubApi,
        uptime_secs: f64,
        force_config: bool,
    ) -> Result<Option<ConfigTree>, HubError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigStore;
    use serde_json::json;

    #[test]
    fn hub_api_reads_from_config() {
        let store = ConfigStore::new(
            json!({"mediator": {"api": {
                "username": "root@openhim.org",
                "password": "pw",
                "apiURL": "https://hub:8080",
                "trustSelfSigned": true
            }}})
            .as_object()
            .cloned()
            .unwrap(),
        );
        let api = HubApi::from_config(&store.snapshot()).unwrap();
        assert_eq!(api.api_url, "https://hub:8080");
        assert!(api.trust_self_signed);
        assert!(api.require_urn().is_err());

        store.stamp_urn("urn:mediator:cr");
        let api = HubApi::from_config(&store.snapshot()).unwrap();
        assert_eq!(api.require_urn().unwrap(), "urn:mediator:cr");
    }

    #[test]
    fn hub_api_trusts_self_signed_unless_disabled() {
        let api = |extra: serde_json::Value| {
            let mut section = json!({"username": "u", "password": "p", "apiURL": "https://hub"});
            section.as_object_mut().unwrap().extend(extra.as_object().cloned().unwrap());
            let store = ConfigStore::new(
                json!({"mediator": {"api": section}}).as_object().cloned().unwrap(),
            );
            HubApi::from_config(&store.snapshot()).unwrap()
        };
        assert!(api(json!({})).trust_self_signed);
        assert!(api(json!({"trustSelfSigned": true})).trust_self_signed);
        assert!(!api(json!({"trustSelfSigned": false})).trust_self_signed);
    }

    #[test]
    fn hub_api_missing_is_config_error() {
        let store = ConfigStore::new(Default::default());
        assert!(matches!(
            HubApi::from_config(&store.snapshot()),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn debug_redacts_password() {
        let api = HubApi {
            username: "u".into(),
            password: "hunter2".into(),
            api_url: "https://hub".into(),
            trust_self_signed: false,
            urn: None,
        };
        assert!(!format!("{api:?}").contains("hunter2"));
    }
}
