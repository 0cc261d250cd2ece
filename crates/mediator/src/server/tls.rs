//! TLS listener setup using rustls.
//!
//! Clients may present a certificate; none is required. A presented
//! certificate is accepted without chain validation: the admission gate only
//! looks at whether one is present. The handshake still checks that the peer
//! holds the certificate's private key.

use std::sync::Arc;

use anyhow::{Context, Result};
use rustls::{
    client::danger::HandshakeSignatureValid,
    crypto::{ring, verify_tls12_signature, verify_tls13_signature, WebPkiSupportedAlgorithms},
    pki_types::{CertificateDer, UnixTime},
    server::danger::{ClientCertVerified, ClientCertVerifier},
    DigitallySignedStruct, DistinguishedName, ServerConfig, SignatureScheme,
};
use serde::Deserialize;

/// Paths to the PEM server certificate chain and private key (`app:tls`).
#[derive(Debug, Clone, Deserialize)]
pub struct TlsFiles {
    pub cert: String,
    pub key: String,
}

/// Offers client authentication and accepts any presented certificate.
#[derive(Debug)]
struct PresenceOnlyClientVerifier {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ClientCertVerifier for PresenceOnlyClientVerifier {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        false
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// Build a [`rustls::ServerConfig`] from PEM-encoded certificate and private key bytes.
///
/// # Errors
///
/// Returns an error if the certificate or key cannot be parsed, or if rustls
/// rejects the configuration.
pub fn build_server_config(cert_pem: &[u8], key_pem: &[u8]) -> Result<Arc<ServerConfig>> {
    let certs = rustls_pemfile::certs(&mut std::io::BufReader::new(cert_pem))
        .collect::<Result<Vec<_>, _>>()
        .context("failed to parse TLS certificate chain")?;
    if certs.is_empty() {
        anyhow::bail!("no certificate found in PEM data");
    }

    let key = rustls_pemfile::private_key(&mut std::io::BufReader::new(key_pem))
        .context("failed to read TLS private key")?
        .context("no private key found in PEM data")?;

    let provider = Arc::new(ring::default_provider());
    let verifier = Arc::new(PresenceOnlyClientVerifier {
        algorithms: provider.signature_verification_algorithms,
    });

    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .context("failed to select TLS protocol versions")?
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)
        .context("failed to build rustls ServerConfig")?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Read the files named in `files` and build a server config from them.
///
/// # Errors
///
/// Returns an error if either file cannot be read or does not parse.
pub async fn load(files: &TlsFiles) -> Result<Arc<ServerConfig>> {
    let cert = tokio::fs::read(&files.cert)
        .await
        .with_context(|| format!("failed to read TLS certificate {}", files.cert))?;
    let key = tokio::fs::read(&files.key)
        .await
        .with_context(|| format!("failed to read TLS private key {}", files.key))?;
    build_server_config(&cert, &key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CERT: &[u8] = include_bytes!("../../testdata/client-cert.pem");
    const KEY: &[u8] = include_bytes!("../../testdata/client-key.pem");

    #[test]
    fn rejects_empty_cert_pem() {
        let result = build_server_config(b"", b"");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_garbage_pem() {
        let result = build_server_config(b"not a pem", b"also not a pem");
        assert!(result.is_err());
    }

    #[test]
    fn builds_from_valid_pair() {
        let config = build_server_config(CERT, KEY).unwrap();
        assert!(config.alpn_protocols.contains(&b"http/1.1".to_vec()));
    }

    #[test]
    fn any_client_certificate_is_accepted() {
        let verifier = PresenceOnlyClientVerifier {
            algorithms: ring::default_provider().signature_verification_algorithms,
        };
        assert!(verifier.offer_client_auth());
        assert!(!verifier.client_auth_mandatory());
        let junk = CertificateDer::from(vec![0x01, 0x02]);
        assert!(verifier.verify_client_cert(&junk, &[], UnixTime::now()).is_ok());
    }

    #[tokio::test]
    async fn load_reports_missing_files() {
        let files = TlsFiles {
            cert: "/nonexistent/cert.pem".into(),
            key: "/nonexistent/key.pem".into(),
        };
        assert!(load(&files).await.is_err());
    }
}
