//! Certificate generation and fingerprint utilities.
//!
//! Helpers to generate self-signed certificates for DTLS peers, and to
//! compute, format and parse the SHA-256 fingerprints used to pin a
//! peer's certificate.

use rcgen::{
    Certificate as RcgenCertificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    PKCS_ECDSA_P256_SHA256,
};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Certificate utility error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertificateError {
    /// Certificate generation failed
    #[error("Certificate generation failed")]
    GenerationFailed,
    /// A fingerprint string is not 32 colon separated hex bytes
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),
}

/// Certificate and private key pair, both DER encoded.
#[derive(Clone)]
pub struct CertifiedKey {
    /// Certificate in DER format
    pub certificate: Vec<u8>,
    /// Private key in PKCS#8 DER format
    pub private_key: Vec<u8>,
}

impl CertifiedKey {
    /// SHA-256 fingerprint of the certificate.
    pub fn fingerprint(&self) -> [u8; 32] {
        calculate_fingerprint(&self.certificate)
    }
}

impl std::fmt::Debug for CertifiedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertifiedKey")
            .field("fingerprint", &format_fingerprint(&self.fingerprint()))
            .finish()
    }
}

/// Generate a self-signed ECDSA P-256 certificate for `common_name`.
pub fn generate_self_signed_certificate(common_name: &str) -> Result<CertifiedKey, CertificateError> {
    let key_pair = KeyPair::generate(&PKCS_ECDSA_P256_SHA256)
        .map_err(|_| CertificateError::GenerationFailed)?;

    let mut params = CertificateParams::new(vec![common_name.to_string()]);

    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(DnType::CommonName, common_name.to_string());
    params.distinguished_name = distinguished_name;

    params.is_ca = IsCa::NoCa;
    params.key_pair = Some(key_pair);

    // Valid from an hour ago to tolerate clock skew between peers.
    let not_before = time::OffsetDateTime::now_utc() - time::Duration::hours(1);
    params.not_before = not_before;
    params.not_after = not_before + time::Duration::days(365);

    let cert =
        RcgenCertificate::from_params(params).map_err(|_| CertificateError::GenerationFailed)?;

    let certificate = cert
        .serialize_der()
        .map_err(|_| CertificateError::GenerationFailed)?;
    let private_key = cert.serialize_private_key_der();

    Ok(CertifiedKey {
        certificate,
        private_key,
    })
}

/// Calculate a certificate fingerprint using SHA-256
pub fn calculate_fingerprint(cert_der: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(cert_der);
    hasher.finalize().into()
}

/// Format a fingerprint as a colon-separated hex string
/// Example: "AF:12:F6:..."
pub fn format_fingerprint(fingerprint: &[u8]) -> String {
    fingerprint
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<String>>()
        .join(":")
}

/// Parse a fingerprint formatted by [`format_fingerprint`].
///
/// Case insensitive.
pub fn parse_fingerprint(s: &str) -> Result<[u8; 32], CertificateError> {
    let invalid = || CertificateError::InvalidFingerprint(s.to_string());

    let mut out = [0_u8; 32];
    let mut parts = s.trim().split(':');

    for byte in out.iter_mut() {
        let part = parts.next().ok_or_else(invalid)?;
        if part.len() != 2 {
            return Err(invalid());
        }
        *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
    }

    if parts.next().is_some() {
        return Err(invalid());
    }

    Ok(out)
}
