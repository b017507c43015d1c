use std::fmt;

use openssl::error::ErrorStack;
use openssl::pkey::PKey;
use openssl::ssl::{SslContextBuilder, SslVerifyMode};
use openssl::x509::X509;
use zeroize::Zeroizing;

use crate::certificate::{calculate_fingerprint, format_fingerprint, CertifiedKey};
use crate::Error;

// CoAP mandates TLS_PSK_WITH_AES_128_CCM_8 (RFC 7252 9.1.3.1). The CBC-SHA
// suite is the only one usable with DTLS 1.0.
const PSK_CIPHERS: &str =
    "PSK-AES128-CCM8:PSK-AES128-GCM-SHA256:PSK-AES128-CBC-SHA256:PSK-AES128-CBC-SHA";

// CoAP mandates TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8 (RFC 7252 9.1.3.3). After
// that, ephemeral Diffie-Hellman AND AES-256 or AES-GCM.
const CERTIFICATE_CIPHERS: &str =
    "ECDHE-ECDSA-AES128-CCM8:ECDHE+AESGCM:DHE+AESGCM:ECDHE+AES256:DHE+AES256";

/// Authentication material for the DTLS handshake.
///
/// The transport never looks inside the credentials; it only hands the
/// engine's context builder to [`Credentials::apply`].
pub trait Credentials: Send + Sync {
    /// OpenSSL cipher list suitable for this kind of credential.
    fn cipher_list(&self) -> &str;

    /// Reject unusable material before any engine or socket is created.
    fn check(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Install the material in the engine's context.
    fn apply(&self, ctx: &mut SslContextBuilder) -> Result<(), ErrorStack>;
}

/// Pre-shared key credentials (identity + shared secret).
#[derive(Clone)]
pub struct PreSharedKey {
    identity: Vec<u8>,
    key: Zeroizing<Vec<u8>>,
}

impl PreSharedKey {
    /// Create credentials for `identity` sharing the secret `key`.
    pub fn new(identity: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>) -> Self {
        PreSharedKey {
            identity: identity.into(),
            key: Zeroizing::new(key.into()),
        }
    }

    /// The PSK identity sent to the server.
    pub fn identity(&self) -> &[u8] {
        &self.identity
    }
}

impl fmt::Debug for PreSharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreSharedKey")
            .field("identity", &String::from_utf8_lossy(&self.identity))
            .field("key_len", &self.key.len())
            .finish()
    }
}

impl Credentials for PreSharedKey {
    fn cipher_list(&self) -> &str {
        PSK_CIPHERS
    }

    fn check(&self) -> Result<(), Error> {
        if self.identity.is_empty() {
            return Err(Error::Config("PSK identity is empty".into()));
        }
        if self.identity.contains(&0) {
            return Err(Error::Config("PSK identity contains NUL".into()));
        }
        if self.key.is_empty() {
            return Err(Error::Config("PSK key is empty".into()));
        }
        Ok(())
    }

    fn apply(&self, ctx: &mut SslContextBuilder) -> Result<(), ErrorStack> {
        let identity = self.identity.clone();
        let key = self.key.clone();

        ctx.set_psk_client_callback(move |_ssl, hint, identity_out, psk_out| {
            if let Some(hint) = hint {
                trace!("PSK identity hint: {}", String::from_utf8_lossy(hint));
            }

            // The identity is written NUL terminated.
            if identity.len() >= identity_out.len() || key.len() > psk_out.len() {
                warn!(
                    "PSK identity ({}) or key ({}) exceeds engine limits",
                    identity.len(),
                    key.len()
                );
                // A zero length key aborts the handshake.
                return Ok(0);
            }

            identity_out[..identity.len()].copy_from_slice(&identity);
            identity_out[identity.len()] = 0;
            psk_out[..key.len()].copy_from_slice(&key);

            Ok(key.len())
        });

        Ok(())
    }
}

/// How a certificate peer is authenticated.
#[derive(Clone)]
pub enum PeerVerification {
    /// Accept only a peer whose leaf certificate has this SHA-256 fingerprint.
    Fingerprint([u8; 32]),
    /// Verify the peer's chain against these DER encoded roots.
    TrustedRoots(Vec<Vec<u8>>),
    /// Accept any peer certificate.
    AcceptAny,
}

impl fmt::Debug for PeerVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerVerification::Fingerprint(fp) => f
                .debug_tuple("Fingerprint")
                .field(&format_fingerprint(fp))
                .finish(),
            PeerVerification::TrustedRoots(roots) => {
                f.debug_tuple("TrustedRoots").field(&roots.len()).finish()
            }
            PeerVerification::AcceptAny => write!(f, "AcceptAny"),
        }
    }
}

/// Certificate credentials (DER certificate and private key).
#[derive(Clone)]
pub struct CertificateCredentials {
    certificate: Vec<u8>,
    private_key: Zeroizing<Vec<u8>>,
    verification: PeerVerification,
}

impl CertificateCredentials {
    /// Create credentials from a DER certificate and DER private key.
    pub fn new(
        certificate: Vec<u8>,
        private_key: Vec<u8>,
        verification: PeerVerification,
    ) -> Self {
        CertificateCredentials {
            certificate,
            private_key: Zeroizing::new(private_key),
            verification,
        }
    }

    /// Create credentials from a generated key pair.
    pub fn from_certified_key(key: CertifiedKey, verification: PeerVerification) -> Self {
        Self::new(key.certificate, key.private_key, verification)
    }

    /// SHA-256 fingerprint of our own certificate.
    pub fn fingerprint(&self) -> [u8; 32] {
        calculate_fingerprint(&self.certificate)
    }
}

impl fmt::Debug for CertificateCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateCredentials")
            .field("fingerprint", &format_fingerprint(&self.fingerprint()))
            .field("verification", &self.verification)
            .finish()
    }
}

impl Credentials for CertificateCredentials {
    fn cipher_list(&self) -> &str {
        CERTIFICATE_CIPHERS
    }

    fn check(&self) -> Result<(), Error> {
        if self.certificate.is_empty() || self.private_key.is_empty() {
            return Err(Error::Config("certificate or private key is empty".into()));
        }
        Ok(())
    }

    fn apply(&self, ctx: &mut SslContextBuilder) -> Result<(), ErrorStack> {
        let cert = X509::from_der(&self.certificate)?;
        let pkey = PKey::private_key_from_der(&self.private_key)?;

        ctx.set_certificate(&cert)?;
        ctx.set_private_key(&pkey)?;
        ctx.check_private_key()?;

        match &self.verification {
            PeerVerification::Fingerprint(expected) => {
                let expected = *expected;
                ctx.set_verify_callback(SslVerifyMode::PEER, move |_ok, store| {
                    // Only the leaf is pinned, the rest of the chain is irrelevant.
                    if store.error_depth() != 0 {
                        return true;
                    }
                    let Some(der) = store.current_cert().and_then(|c| c.to_der().ok()) else {
                        return false;
                    };
                    let matches = calculate_fingerprint(&der) == expected;
                    if !matches {
                        debug!(
                            "Peer fingerprint mismatch: {}",
                            format_fingerprint(&calculate_fingerprint(&der))
                        );
                    }
                    matches
                });
            }
            PeerVerification::TrustedRoots(roots) => {
                for der in roots {
                    ctx.cert_store_mut().add_cert(X509::from_der(der)?)?;
                }
                ctx.set_verify(SslVerifyMode::PEER);
            }
            PeerVerification::AcceptAny => {
                ctx.set_verify(SslVerifyMode::NONE);
            }
        }

        Ok(())
    }
}
