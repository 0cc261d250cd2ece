//! Peer certificate inspection.
//!
//! The TLS listener attaches the client's certificate chain to each request
//! as a [`PeerCertificate`] extension. Only the *presence* of a certificate is
//! used for admission; the chain is not validated against any trust root.

use std::sync::Arc;

use rustls::pki_types::CertificateDer;
use tracing::debug;

/// Certificate chain presented by the TLS peer, end-entity first.
#[derive(Debug, Clone)]
pub struct PeerCertificate(pub Arc<Vec<CertificateDer<'static>>>);

impl PeerCertificate {
    pub fn new(chain: Vec<CertificateDer<'static>>) -> Self {
        Self(Arc::new(chain))
    }

    /// The end-entity certificate, if the chain is non-empty.
    pub fn end_entity(&self) -> Option<&CertificateDer<'static>> {
        self.0.first().filter(|der| !der.is_empty())
    }
}

/// Identity of a caller admitted by certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateCredential {
    /// Subject common name; empty when the certificate has none or cannot be
    /// parsed.
    pub subject_cn: String,
}

/// Return a credential when the connection presented a non-empty certificate.
pub fn inspect(peer: Option<&PeerCertificate>) -> Option<CertificateCredential> {
    let der = peer?.end_entity()?;
    Some(CertificateCredential {
        subject_cn: subject_cn(der.as_ref()).unwrap_or_default(),
    })
}

fn subject_cn(der: &[u8]) -> Option<String> {
    match x509_parser::parse_x509_certificate(der) {
        Ok((_, cert)) => cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_owned),
        Err(e) => {
            debug!(error = %e, "peer certificate is not parseable X.509");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT_CERT: &[u8] = include_bytes!("../../testdata/client-cert.pem");

    fn client_chain() -> Vec<CertificateDer<'static>> {
        rustls_pemfile::certs(&mut std::io::BufReader::new(CLIENT_CERT))
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn no_extension_means_no_credential() {
        assert_eq!(inspect(None), None);
    }

    #[test]
    fn empty_chain_means_no_credential() {
        let peer = PeerCertificate::new(Vec::new());
        assert_eq!(inspect(Some(&peer)), None);

        let peer = PeerCertificate::new(vec![CertificateDer::from(Vec::new())]);
        assert_eq!(inspect(Some(&peer)), None);
    }

    #[test]
    fn subject_cn_is_extracted() {
        let peer = PeerCertificate::new(client_chain());
        let cred = inspect(Some(&peer)).unwrap();
        assert_eq!(cred.subject_cn, "registry-client");
    }

    #[test]
    fn unparseable_certificate_is_still_present() {
        let peer = PeerCertificate::new(vec![CertificateDer::from(vec![0x30, 0x03, 0x01])]);
        let cred = inspect(Some(&peer)).unwrap();
        assert_eq!(cred.subject_cn, "");
    }
}
