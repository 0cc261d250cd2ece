//! The admission gate: an ordered, first-match-wins decision applied to every
//! inbound request before it reaches a route handler.
//!
//! 1. Non-empty peer certificate → admit.
//! 2. `OPTIONS`, or the login endpoint → admit.
//! 3. No `Authorization: <scheme> <credential>` header → 401 `MissingToken`.
//! 4. Credential fails verification → 401 `ExpiredOrInvalidToken`.
//! 5. Token-liveness endpoint → answer `200 true` here; anything else → admit.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use common::{protocol::ErrorResponse, AdmissionRejected};
use tracing::{debug, error, warn};

use super::{
    certificate::{self, PeerCertificate},
    AuthDecision, Credential, TokenCredential, TokenValidator,
};
use crate::config::{RuntimeConfig, SECRET_KEY};
use crate::server::state::AppState;

/// Login route; callers reach it before they hold a token.
pub const LOGIN_PATH: &str = "/user/authenticate";
/// Route answering whether the presented token is still valid.
pub const TOKEN_ACTIVE_PATH: &str = "/ocrux/isTokenActive/";

/// What the gate decided for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Pass the request on to the route handlers.
    Forward(Option<Credential>),
    /// Valid token on the liveness route; answered by the gate itself.
    TokenActive(TokenCredential),
    /// Refuse with a 401.
    Reject(AdmissionRejected),
}

impl Admission {
    pub fn decision(&self) -> AuthDecision {
        match self {
            Admission::Forward(_) | Admission::TokenActive(_) => AuthDecision::accepted(),
            Admission::Reject(reason) => AuthDecision::rejected(*reason),
        }
    }
}

/// Decide admission for a request.
///
/// Pure with respect to the request: header rewriting and response writing
/// happen in [`admission_gate`].
pub fn evaluate(
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    peer: Option<&PeerCertificate>,
    config: &RuntimeConfig,
) -> Admission {
    if let Some(cred) = certificate::inspect(peer) {
        return Admission::Forward(Some(Credential::Certificate(cred)));
    }

    if *method == Method::OPTIONS || path == LOGIN_PATH {
        return Admission::Forward(None);
    }

    let Some(raw) = bearer_credential(headers) else {
        return Admission::Reject(AdmissionRejected::MissingToken);
    };

    // An absent secret can verify nothing.
    let Some(secret) = config.get_str(SECRET_KEY) else {
        return Admission::Reject(AdmissionRejected::ExpiredOrInvalidToken);
    };
    if let Err(e) = TokenValidator::new(secret).verify(raw) {
        debug!(error = %e, "token verification failed");
        return Admission::Reject(AdmissionRejected::ExpiredOrInvalidToken);
    }

    let credential = TokenCredential {
        raw: raw.to_owned(),
    };
    if path == TOKEN_ACTIVE_PATH {
        Admission::TokenActive(credential)
    } else {
        Admission::Forward(Some(Credential::Token(credential)))
    }
}

/// The credential half of an `Authorization` header that splits on single
/// spaces into exactly two parts.
fn bearer_credential(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split(' ');
    let (_scheme, credential) = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    Some(credential)
}

/// Axum middleware enforcing [`evaluate`] on every route.
///
/// Admitted requests carry their [`AuthDecision`] and [`Credential`] as
/// extensions; token requests additionally have `Authorization` rewritten to
/// the bare credential.
pub async fn admission_gate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let config = state.config.snapshot();
    let admission = evaluate(
        req.method(),
        req.uri().path(),
        req.headers(),
        req.extensions().get::<PeerCertificate>(),
        &config,
    );
    let decision = admission.decision();
    debug!(
        authorized = decision.authorized,
        reason = ?decision.failure_reason,
        "admission decided"
    );

    match admission {
        Admission::Forward(credential) => {
            match &credential {
                Some(Credential::Token(token)) => match HeaderValue::from_str(&token.raw) {
                    Ok(value) => {
                        req.headers_mut().insert(header::AUTHORIZATION, value);
                    }
                    Err(_) => return rejection(AdmissionRejected::MissingToken),
                },
                Some(Credential::Certificate(cert)) => {
                    debug!(subject_cn = %cert.subject_cn, "admitted by client certificate");
                }
                None => {}
            }
            req.extensions_mut().insert(decision);
            if let Some(credential) = credential {
                req.extensions_mut().insert(credential);
            }
            next.run(req).await
        }
        Admission::TokenActive(_) => token_active(),
        Admission::Reject(reason) => {
            match reason {
                AdmissionRejected::MissingToken => error!(path = %req.uri().path(), "Token is missing"),
                AdmissionRejected::ExpiredOrInvalidToken => warn!(path = %req.uri().path(), "Token expired"),
            }
            rejection(reason)
        }
    }
}

fn token_active() -> Response {
    (
        StatusCode::OK,
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Json(true),
    )
        .into_response()
}

/// Fully-formed 401 for `reason`.
pub fn rejection(reason: AdmissionRejected) -> Response {
    let status = StatusCode::from_u16(reason.http_status()).unwrap_or(StatusCode::UNAUTHORIZED);
    (
        status,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::WWW_AUTHENTICATE, reason.challenge()),
        ],
        // kept for existing clients
        [("charset", "utf - 8")],
        Json(ErrorResponse::new(reason.to_string())),
    )
        .into_response()
}
