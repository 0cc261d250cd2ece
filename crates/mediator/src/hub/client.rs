//! [`OpenHimClient`]: the hub registration protocol over HTTPS.
//!
//! Every call authenticates afresh: the client fetches the user's salt from
//! `GET /authenticate/{username}` and sends
//! `sha512(sha512(salt ‖ password) ‖ salt ‖ ts)` in the `auth-token` header.

use async_trait::async_trait;
use common::protocol::{AuthSalt, HeartbeatRequest, MediatorConfig};
use reqwest::{
    header::{HeaderMap, HeaderValue},
    RequestBuilder, Response, StatusCode,
};
use serde_json::Value;
use sha2::{Digest, Sha512};
use tracing::{debug, info};

use super::{HubApi, HubClient, HubError};
use crate::config::ConfigTree;

/// HTTPS client for the hub API.
///
/// Holds two connection pools: one accepting any hub certificate (used unless
/// `trustSelfSigned` is `false`), one verifying against system roots.
#[derive(Clone)]
pub struct OpenHimClient {
    verified: reqwest::Client,
    self_signed: reqwest::Client,
}

impl OpenHimClient {
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, HubError> {
        Ok(Self {
            verified: reqwest::Client::builder().build()?,
            self_signed: reqwest::Client::builder()
                .danger_accept_invalid_certs(true)
                .build()?,
        })
    }

    fn http(&self, api: &HubApi) -> &reqwest::Client {
        if api.trust_self_signed {
            &self.self_signed
        } else {
            &self.verified
        }
    }

    fn url(api: &HubApi, path: &str) -> String {
        format!("{}{}", api.api_url.trim_end_matches('/'), path)
    }

    /// Build the `auth-*` headers for one request.
    async fn auth_headers(&self, api: &HubApi) -> Result<HeaderMap, HubError> {
        let resp = self
            .http(api)
            .get(Self::url(api, &format!("/authenticate/{}", api.username)))
            .send()
            .await?;
        let resp = expect_status(resp, StatusCode::OK, "authenticate").await?;
        let salt: AuthSalt = resp.json().await.map_err(|e| HubError::Decode {
            operation: "authenticate",
            reason: e.to_string(),
        })?;

        let ts = chrono::Utc::now().to_rfc3339();
        let token = auth_token(&salt.salt, &api.password, &ts);

        let mut headers = HeaderMap::new();
        for (name, value) in [
            ("auth-username", api.username.as_str()),
            ("auth-ts", ts.as_str()),
            ("auth-salt", salt.salt.as_str()),
            ("auth-token", token.as_str()),
        ] {
            let value: HeaderValue = value.parse().map_err(|_| HubError::Decode {
                operation: "authenticate",
                reason: format!("{name} is not a valid header value"),
            })?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    async fn send(
        &self,
        api: &HubApi,
        request: RequestBuilder,
    ) -> Result<Response, HubError> {
        let headers = self.auth_headers(api).await?;
        Ok(request.headers(headers).send().await?)
    }
}

/// `hex(sha512(hex(sha512(salt ‖ password)) ‖ salt ‖ ts))`.
fn auth_token(salt: &str, password: &str, ts: &str) -> String {
    let passhash = Sha512::new()
        .chain_update(salt)
        .chain_update(password)
        .finalize();
    let token = Sha512::new()
        .chain_update(format!("{passhash:x}"))
        .chain_update(salt)
        .chain_update(ts)
        .finalize();
    format!("{token:x}")
}

async fn expect_status(
    resp: Response,
    expected: StatusCode,
    operation: &'static str,
) -> Result<Response, HubError> {
    if resp.status() == expected {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(HubError::Status {
        operation,
        status,
        body,
    })
}

/// Interpret a heartbeat response body: empty or `OK` means no change.
fn pushed_config(body: &str) -> Result<Option<ConfigTree>, HubError> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "OK" {
        return Ok(None);
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(tree)) if tree.is_empty() => Ok(None),
        Ok(Value::Object(tree)) => Ok(Some(tree)),
        Ok(_) => Err(HubError::Decode {
            operation: "heartbeat",
            reason: "config body is not a JSON object".into(),
        }),
        Err(e) => Err(HubError::Decode {
            operation: "heartbeat",
            reason: e.to_string(),
        }),
    }
}

#[async_trait]
impl HubClient for OpenHimClient {
    async fn register(&self, api: &HubApi, mediator: &MediatorConfig) -> Result<String, HubError> {
        let request = self
            .http(api)
            .post(Self::url(api, "/mediators"))
            .json(mediator);
        let resp = self.send(api, request).await?;
        expect_status(resp, StatusCode::CREATED, "register").await?;
        info!(urn = %mediator.urn, hub = %api.api_url, "mediator registered");
        Ok(mediator.urn.clone())
    }

    async fn fetch_config(&self, api: &HubApi) -> Result<ConfigTree, HubError> {
        let urn = api.require_urn()?;
        let request = self
            .http(api)
            .get(Self::url(api, &format!("/mediators/{urn}/config")));
        let resp = self.send(api, request).await?;
        let resp = expect_status(resp, StatusCode::OK, "fetch_config").await?;
        match resp.json::<Value>().await? {
            Value::Object(tree) => Ok(tree),
            _ => Err(HubError::Decode {
                operation: "fetch_config",
                reason: "config body is not a JSON object".into(),
            }),
        }
    }

    async fn heartbeat(
        &self,
        api: &HubApi,
        uptime_secs: f64,
        force_config: bool,
    ) -> Result<Option<ConfigTree>, HubError> {
        let urn = api.require_urn()?;
        let body = HeartbeatRequest {
            uptime: uptime_secs,
            config: force_config.then_some(true),
        };
        let request = self
            .http(api)
            .post(Self::url(api, &format!("/mediators/{urn}/heartbeat")))
            .json(&body);
        let resp = self.send(api, request).await?;
        let resp = expect_status(resp, StatusCode::OK, "heartbeat").await?;
        let text = resp.text().await?;
        debug!(bytes = text.len(), "heartbeat acknowledged");
        pushed_config(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn auth_token_is_deterministic_hex() {
        let a = auth_token("salt", "password", "2026-10-16T00:00:00+00:00");
        let b = auth_token("salt", "password", "2026-10-16T00:00:00+00:00");
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, auth_token("salt", "password", "2026-10-16T00:00:01+00:00"));
        assert_ne!(a, auth_token("salt", "other", "2026-10-16T00:00:00+00:00"));
    }

    fn api_from(section: serde_json::Value) -> HubApi {
        let store = crate::config::ConfigStore::new(
            json!({"mediator": {"api": section}}).as_object().cloned().unwrap(),
        );
        HubApi::from_config(&store.snapshot()).unwrap()
    }

    #[test]
    fn hub_without_trust_setting_uses_lenient_pool() {
        let client = OpenHimClient::new().unwrap();
        let api = api_from(json!({
            "username": "root@openhim.org",
            "password": "pw",
            "apiURL": "https://openhim:8080"
        }));
        assert!(std::ptr::eq(client.http(&api), &client.self_signed));
    }

    #[test]
    fn hub_with_trust_disabled_uses_verifying_pool() {
        let client = OpenHimClient::new().unwrap();
        let api = api_from(json!({
            "username": "root@openhim.org",
            "password": "pw",
            "apiURL": "https://openhim:8080",
            "trustSelfSigned": false
        }));
        assert!(std::ptr::eq(client.http(&api), &client.verified));
    }

    #[test]
    fn url_joins_without_double_slash() {
        let api = HubApi {
            username: "u".into(),
            password: "p".into(),
            api_url: "https://hub:8080/".into(),
            trust_self_signed: false,
            urn: None,
        };
        assert_eq!(
            OpenHimClient::url(&api, "/mediators"),
            "https://hub:8080/mediators"
        );
    }

    #[test]
    fn heartbeat_body_without_change_is_none() {
        assert!(pushed_config("").unwrap().is_none());
        assert!(pushed_config("OK").unwrap().is_none());
        assert!(pushed_config("{}").unwrap().is_none());
    }

    #[test]
    fn heartbeat_body_with_config_is_pushed() {
        let tree = pushed_config(r#"{"app":{"port":4000}}"#).unwrap().unwrap();
        assert_eq!(tree["app"], json!({"port": 4000}));
    }

    #[test]
    fn heartbeat_body_of_wrong_shape_is_decode_error() {
        assert!(matches!(
            pushed_config("[1,2]"),
            Err(HubError::Decode { .. })
        ));
        assert!(matches!(
            pushed_config("{not json"),
            Err(HubError::Decode { .. })
        ));
    }
}
