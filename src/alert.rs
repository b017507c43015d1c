//! DTLS alert levels and descriptions.
//!
//! Alerts are two-byte messages (level, description) that a peer sends to
//! signal a warning or the reason for a fatal protocol failure. The codes
//! are shared between TLS and DTLS.

use std::fmt;

use nom::number::complete::be_u8;
use nom::IResult;

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertLevel {
    /// The connection may continue.
    Warning,
    /// The connection is terminated.
    Fatal,
    /// A level outside the registry.
    Unknown(u8),
}

impl AlertLevel {
    /// Convert a u8 value to an `AlertLevel`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => AlertLevel::Warning,
            2 => AlertLevel::Fatal,
            _ => AlertLevel::Unknown(value),
        }
    }

    /// Convert this `AlertLevel` to its u8 value.
    pub fn as_u8(&self) -> u8 {
        match self {
            AlertLevel::Warning => 1,
            AlertLevel::Fatal => 2,
            AlertLevel::Unknown(value) => *value,
        }
    }
}

macro_rules! alert_descriptions {
    ($($(#[$doc:meta])* $variant:ident = $code:literal => $name:literal,)*) => {
        /// Alert description codes (IANA TLS Alert registry).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum AlertDescription {
            $($(#[$doc])* $variant,)*
            /// A code outside the registry.
            Unknown(u8),
        }

        impl AlertDescription {
            /// Convert a u8 value to an `AlertDescription`.
            pub fn from_u8(value: u8) -> Self {
                match value {
                    $($code => AlertDescription::$variant,)*
                    _ => AlertDescription::Unknown(value),
                }
            }

            /// Convert this `AlertDescription` to its u8 value.
            pub fn as_u8(&self) -> u8 {
                match self {
                    $(AlertDescription::$variant => $code,)*
                    AlertDescription::Unknown(value) => *value,
                }
            }

            /// Registry name of the alert, e.g. `decrypt_error`.
            pub fn name(&self) -> &'static str {
                match self {
                    $(AlertDescription::$variant => $name,)*
                    AlertDescription::Unknown(_) => "unknown",
                }
            }
        }
    };
}

alert_descriptions! {
    /// Orderly shutdown of the connection.
    CloseNotify = 0 => "close_notify",
    UnexpectedMessage = 10 => "unexpected_message",
    /// A record failed authentication.
    BadRecordMac = 20 => "bad_record_mac",
    DecryptionFailed = 21 => "decryption_failed",
    RecordOverflow = 22 => "record_overflow",
    DecompressionFailure = 30 => "decompression_failure",
    HandshakeFailure = 40 => "handshake_failure",
    NoCertificate = 41 => "no_certificate",
    BadCertificate = 42 => "bad_certificate",
    UnsupportedCertificate = 43 => "unsupported_certificate",
    CertificateRevoked = 44 => "certificate_revoked",
    CertificateExpired = 45 => "certificate_expired",
    CertificateUnknown = 46 => "certificate_unknown",
    IllegalParameter = 47 => "illegal_parameter",
    UnknownCa = 48 => "unknown_ca",
    AccessDenied = 49 => "access_denied",
    DecodeError = 50 => "decode_error",
    /// A handshake cryptographic operation failed, e.g. the Finished
    /// verification with a mismatching pre-shared key.
    DecryptError = 51 => "decrypt_error",
    ExportRestriction = 60 => "export_restriction",
    ProtocolVersion = 70 => "protocol_version",
    InsufficientSecurity = 71 => "insufficient_security",
    InternalError = 80 => "internal_error",
    InappropriateFallback = 86 => "inappropriate_fallback",
    UserCanceled = 90 => "user_canceled",
    NoRenegotiation = 100 => "no_renegotiation",
    MissingExtension = 109 => "missing_extension",
    UnsupportedExtension = 110 => "unsupported_extension",
    CertificateUnobtainable = 111 => "certificate_unobtainable",
    UnrecognizedName = 112 => "unrecognized_name",
    BadCertificateStatusResponse = 113 => "bad_certificate_status_response",
    BadCertificateHashValue = 114 => "bad_certificate_hash_value",
    /// The server does not know the offered PSK identity.
    UnknownPskIdentity = 115 => "unknown_psk_identity",
    CertificateRequired = 116 => "certificate_required",
    NoApplicationProtocol = 120 => "no_application_protocol",
}

impl fmt::Display for AlertDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.as_u8())
    }
}

/// An alert message as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Alert {
    /// Severity.
    pub level: AlertLevel,
    /// Reason.
    pub description: AlertDescription,
}

impl Alert {
    /// Parse an alert from the fragment of an Alert record.
    pub fn parse(input: &[u8]) -> IResult<&[u8], Alert> {
        let (input, level) = be_u8(input)?;
        let (input, description) = be_u8(input)?;
        Ok((
            input,
            Alert {
                level: AlertLevel::from_u8(level),
                description: AlertDescription::from_u8(description),
            },
        ))
    }

    /// Whether the alert terminates the connection.
    pub fn is_fatal(&self) -> bool {
        self.level == AlertLevel::Fatal
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            AlertLevel::Warning => "warning",
            AlertLevel::Fatal => "fatal",
            AlertLevel::Unknown(_) => "unknown",
        };
        write!(f, "{} {}", level, self.description)
    }
}
