use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use crate::channel::MAX_SEND;
use crate::{DtlsVersion, Error};

/// Smallest MTU we accept. DTLS handshake messages are fragmented to fit
/// the MTU, and OpenSSL refuses anything much smaller.
const MIN_MTU: usize = 256;

/// DTLS transport configuration
#[derive(Debug, Clone)]
pub struct Config {
    dtls_version: DtlsVersion,
    mtu: usize,
    handshake_timeout: Duration,
    flight_start_rto: Duration,
    cipher_list: Option<String>,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            dtls_version: DtlsVersion::V1_2,
            mtu: 1150,
            handshake_timeout: Duration::from_secs(40),
            flight_start_rto: Duration::from_secs(1),
            cipher_list: None,
        }
    }

    /// The DTLS version to negotiate.
    ///
    /// The engine is pinned to exactly this version.
    #[inline(always)]
    pub fn dtls_version(&self) -> DtlsVersion {
        self.dtls_version
    }

    /// Max transmission unit.
    ///
    /// The largest size UDP packets the engine will produce.
    #[inline(always)]
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Timeout for the entire handshake, regardless of flights.
    #[inline(always)]
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// How long to wait for a datagram during the handshake before
    /// handing control back to the engine so it can retransmit.
    #[inline(always)]
    pub fn flight_start_rto(&self) -> Duration {
        self.flight_start_rto
    }

    /// OpenSSL cipher list overriding the credentials' default.
    #[inline(always)]
    pub fn cipher_list(&self) -> Option<&str> {
        self.cipher_list.as_deref()
    }
}

/// Builder for DTLS transport configuration.
pub struct ConfigBuilder {
    dtls_version: DtlsVersion,
    mtu: usize,
    handshake_timeout: Duration,
    flight_start_rto: Duration,
    cipher_list: Option<String>,
}

impl ConfigBuilder {
    /// Set the DTLS version to negotiate.
    ///
    /// Defaults to DTLS 1.2.
    pub fn dtls_version(mut self, version: DtlsVersion) -> Self {
        self.dtls_version = version;
        self
    }

    /// Set the max transmission unit (MTU).
    ///
    /// The largest size UDP packets the engine will produce.
    /// Defaults to 1150.
    pub fn mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    /// Set the timeout for the entire handshake, regardless of flights.
    ///
    /// Defaults to 40 seconds.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the time to wait for input before re-entering the engine.
    ///
    /// Defaults to 1 second.
    pub fn flight_start_rto(mut self, rto: Duration) -> Self {
        self.flight_start_rto = rto;
        self
    }

    /// Set an OpenSSL cipher list, overriding the one chosen by the
    /// credentials.
    pub fn cipher_list(mut self, list: impl Into<String>) -> Self {
        self.cipher_list = Some(list.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns `Error::Config` if a value is out of range.
    pub fn build(self) -> Result<Config, Error> {
        if self.mtu < MIN_MTU || self.mtu > MAX_SEND {
            return Err(Error::Config(format!(
                "mtu {} outside {}..={}",
                self.mtu, MIN_MTU, MAX_SEND
            )));
        }

        if self.handshake_timeout.is_zero() {
            return Err(Error::Config("handshake_timeout is zero".into()));
        }

        if self.flight_start_rto.is_zero() {
            return Err(Error::Config("flight_start_rto is zero".into()));
        }

        if matches!(&self.cipher_list, Some(l) if l.trim().is_empty()) {
            return Err(Error::Config("cipher_list is empty".into()));
        }

        Ok(self.into_config())
    }

    fn into_config(self) -> Config {
        Config {
            dtls_version: self.dtls_version,
            mtu: self.mtu,
            handshake_timeout: self.handshake_timeout,
            flight_start_rto: self.flight_start_rto,
            cipher_list: self.cipher_list,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        // The builder defaults are within range.
        Config::builder().into_config()
    }
}

/// Where to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    endpoint: SocketAddr,
    local_addr: Option<SocketAddr>,
}

impl ConnectOptions {
    /// Connect to `endpoint` from an ephemeral local port.
    pub fn new(endpoint: SocketAddr) -> Self {
        ConnectOptions {
            endpoint,
            local_addr: None,
        }
    }

    /// Resolve `host:port` and use the first address found.
    pub fn resolve(target: &str) -> Result<Self, Error> {
        let endpoint = target
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::Config(format!("{} resolved to no address", target)))?;
        Ok(Self::new(endpoint))
    }

    /// Bind the local socket to this address instead of an ephemeral one.
    ///
    /// The address family must match the endpoint.
    pub fn with_local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = Some(addr);
        self
    }

    /// The remote peer.
    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    /// The requested local bind address, if any.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}
