//! Request and response types exchanged between components.
//!
//! These types are serialised as JSON, both on the public HTTP surface of the
//! mediator and on the registration/heartbeat API of the hub.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Error body returned on any rejected or unroutable request.
///
/// The single `error` field is part of the contract with existing clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable description safe to expose to callers.
    pub error: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a message.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: String,
    /// URN the mediator registered under, if registration has happened.
    pub urn: Option<String>,
    /// Version counter of the runtime configuration snapshot being served.
    pub config_version: u64,
}

// ---------------------------------------------------------------------------
// Hub registration
// ---------------------------------------------------------------------------

/// Static identity of this mediator, sent to the hub on registration.
///
/// Only `urn` is interpreted locally; every other field is forwarded to the
/// hub exactly as it appears in `mediator.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediatorConfig {
    /// Unique resource name the hub files this mediator under.
    pub urn: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Mediator version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Endpoints the hub should route to this mediator.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<Value>,
    /// Remaining registration fields (`description`, `defaultChannelConfig`,
    /// `configDefs`, `config`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Salt challenge returned by `GET /authenticate/{username}`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSalt {
    /// Per-user salt the password hash is computed with.
    pub salt: String,
}

/// Body of `POST /mediators/{urn}/heartbeat`.
#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatRequest {
    /// Seconds since the heartbeat was activated.
    pub uptime: f64,
    /// Ask the hub to send the current config even if unchanged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<bool>,
}
