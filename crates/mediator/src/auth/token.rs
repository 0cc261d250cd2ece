//! Bearer token verification against the shared `auth:secret`.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

/// A bearer credential exactly as the client sent it, scheme stripped.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenCredential {
    pub raw: String,
}

impl std::fmt::Debug for TokenCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Tokens are bearer secrets.
        f.write_str("TokenCredential([REDACTED])")
    }
}

/// HMAC-signed JWT verifier.
///
/// Accepts HS256/HS384/HS512, checks `exp` and `nbf` when the token carries
/// them, and allows no clock leeway. Claims other than the time-based ones are not
/// interpreted.
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify signature and expiry, returning the token's claims.
    ///
    /// # Errors
    ///
    /// Any malformed, wrongly-signed, or expired token.
    pub fn verify(&self, token: &str) -> Result<Map<String, Value>, jsonwebtoken::errors::Error> {
        decode::<Map<String, Value>>(token, &self.key, &self.validation).map(|data| data.claims)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{encode, get_current_timestamp, EncodingKey, Header};
    use serde_json::json;

    pub(crate) fn sign(secret: &str, claims: Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    pub(crate) fn valid_token(secret: &str) -> String {
        sign(secret, json!({"sub": "admin", "exp": get_current_timestamp() + 600}))
    }

    pub(crate) fn expired_token(secret: &str) -> String {
        sign(secret, json!({"sub": "admin", "exp": get_current_timestamp() - 10}))
    }

    pub(crate) fn not_yet_valid_token(secret: &str) -> String {
        let now = get_current_timestamp();
        sign(secret, json!({"sub": "admin", "nbf": now + 86_400, "exp": now + 172_800}))
    }

    #[test]
    fn accepts_valid_token() {
        let v = TokenValidator::new("s3cret");
        let claims = v.verify(&valid_token("s3cret")).unwrap();
        assert_eq!(claims["sub"], "admin");
    }

    #[test]
    fn accepts_token_without_expiry() {
        let v = TokenValidator::new("s3cret");
        assert!(v.verify(&sign("s3cret", json!({"sub": "svc"}))).is_ok());
    }

    #[test]
    fn rejects_expired_token() {
        let v = TokenValidator::new("s3cret");
        assert!(v.verify(&expired_token("s3cret")).is_err());
    }

    #[test]
    fn rejects_token_before_not_before() {
        let v = TokenValidator::new("s3cret");
        assert!(v.verify(&not_yet_valid_token("s3cret")).is_err());
    }

    #[test]
    fn rejects_wrong_secret() {
        let v = TokenValidator::new("s3cret");
        assert!(v.verify(&valid_token("other")).is_err());
    }

    #[test]
    fn accepts_hs512() {
        let v = TokenValidator::new("s3cret");
        let token = encode(
            &Header::new(Algorithm::HS512),
            &json!({"sub": "admin"}),
            &EncodingKey::from_secret(b"s3cret"),
        )
        .unwrap();
        assert!(v.verify(&token).is_ok());
    }

    #[test]
    fn rejects_garbage() {
        let v = TokenValidator::new("s3cret");
        assert!(v.verify("not-a-jwt").is_err());
        assert!(v.verify("").is_err());
    }

    #[test]
    fn credential_debug_is_redacted() {
        let cred = TokenCredential { raw: "abc.def.ghi".into() };
        assert!(!format!("{cred:?}").contains("abc"));
    }
}
