use std::fmt;
use std::str::FromStr;

use openssl::ssl::SslVersion;

use crate::Error;

/// DTLS protocol version to negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DtlsVersion {
    /// DTLS 1.0 (RFC 4347).
    V1_0,
    /// DTLS 1.2 (RFC 6347).
    #[default]
    V1_2,
}

impl DtlsVersion {
    /// The version tag as it appears in DTLS record headers.
    ///
    /// DTLS versions are the 1-complement of the TLS version they derive from.
    pub fn wire_tag(&self) -> u16 {
        match self {
            DtlsVersion::V1_0 => u16::from_be_bytes([!1, !0]),
            DtlsVersion::V1_2 => u16::from_be_bytes([!1, !2]),
        }
    }

    pub(crate) fn ssl_version(&self) -> SslVersion {
        match self {
            DtlsVersion::V1_0 => SslVersion::DTLS1,
            DtlsVersion::V1_2 => SslVersion::DTLS1_2,
        }
    }

    /// Version matching a protocol string reported by the engine.
    pub(crate) fn from_engine_name(name: &str) -> Option<Self> {
        match name {
            "DTLSv1" => Some(DtlsVersion::V1_0),
            "DTLSv1.2" => Some(DtlsVersion::V1_2),
            _ => None,
        }
    }
}

impl TryFrom<u16> for DtlsVersion {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0xfeff => Ok(DtlsVersion::V1_0),
            0xfefd => Ok(DtlsVersion::V1_2),
            _ => Err(Error::UnsupportedVersion(format!("{:#06x}", value))),
        }
    }
}

impl FromStr for DtlsVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1.0" | "DTLS 1.0" | "DTLSv1" => Ok(DtlsVersion::V1_0),
            "1.2" | "DTLS 1.2" | "DTLSv1.2" => Ok(DtlsVersion::V1_2),
            other => Err(Error::UnsupportedVersion(other.to_string())),
        }
    }
}

impl fmt::Display for DtlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                DtlsVersion::V1_0 => "DTLS 1.0",
                DtlsVersion::V1_2 => "DTLS 1.2",
            }
        )
    }
}
