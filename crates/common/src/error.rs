//! Common error types shared across crates.

use thiserror::Error;

/// Reason an inbound request was refused by the admission gate.
///
/// Both variants map to `401 Unauthorized`; the variant selects the
/// `WWW-Authenticate` realm and the `{"error": ...}` body text that existing
/// clients match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdmissionRejected {
    /// No `Authorization` header, or one that is not `<scheme> <credential>`.
    #[error("Token is missing")]
    MissingToken,

    /// The credential failed signature or expiry verification.
    #[error("Token expired")]
    ExpiredOrInvalidToken,
}

impl AdmissionRejected {
    /// Returns the HTTP status code that should be sent for this rejection.
    pub fn http_status(&self) -> u16 {
        401
    }

    /// Value of the `WWW-Authenticate` challenge header.
    pub fn challenge(&self) -> &'static str {
        match self {
            AdmissionRejected::MissingToken => r#"Bearer realm="Token is required""#,
            AdmissionRejected::ExpiredOrInvalidToken => r#"Bearer realm="Token expired""#,
        }
    }
}
