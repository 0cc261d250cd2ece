//! Request admission: who is calling, and are they allowed in.
//!
//! # Responsibilities
//!
//! - [`certificate`]: read the peer certificate the TLS listener attached to
//!   the request, if any.
//! - [`token`]: verify bearer tokens against the shared secret.
//! - [`gate`]: the ordered decision function and the Axum middleware that
//!   enforces it on every route.
//!
//! # Invariants
//!
//! - A request with a non-empty peer certificate is never subjected to token
//!   validation.
//! - Every request yields exactly one [`AuthDecision`]; rejections are final.

pub mod certificate;
pub mod gate;
pub mod token;

pub use certificate::{CertificateCredential, PeerCertificate};
pub use gate::admission_gate;
pub use token::{TokenCredential, TokenValidator};

use common::AdmissionRejected;

/// The credential a request was admitted with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Presented by the TLS peer.
    Certificate(CertificateCredential),
    /// Carried in the `Authorization` header.
    Token(TokenCredential),
}

/// Outcome of admission for one request.
///
/// Inserted into the request extensions of every admitted request so
/// downstream handlers can see how the caller was let in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthDecision {
    pub authorized: bool,
    pub failure_reason: Option<AdmissionRejected>,
}

impl AuthDecision {
    pub fn accepted() -> Self {
        Self {
            authorized: true,
            failure_reason: None,
        }
    }

    pub fn rejected(reason: AdmissionRejected) -> Self {
        Self {
            authorized: false,
            failure_reason: Some(reason),
        }
    }
}
