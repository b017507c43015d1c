//! DTLS secured UDP transport for CoAP clients.
//!
//! A [`DtlsTransport`] owns one UDP socket fixed to a single peer and an
//! OpenSSL DTLS engine. It runs the handshake over the raw datagram
//! channel and then relays application datagrams through the secured
//! session, exposing the four operations an upper CoAP layer needs:
//! connect, send, receive and close.
//!
//! ```no_run
//! use std::sync::Arc;
//! use coap_dtls::{Config, ConnectOptions, DtlsTransport, PreSharedKey};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), coap_dtls::Error> {
//! let config = Arc::new(Config::default());
//! let psk = PreSharedKey::new("client1", "secret123");
//! let transport = DtlsTransport::new(config, Arc::new(psk));
//!
//! let cancel = CancellationToken::new();
//! let options = ConnectOptions::new("127.0.0.1:5684".parse().unwrap());
//! transport.connect(&options, &cancel).await?;
//!
//! transport.send(&[0x40, 0x01, 0x00, 0x01], &cancel).await?;
//!
//! let mut buf = vec![0; 1500];
//! let n = transport.receive(&mut buf, &cancel).await?;
//! println!("received {} bytes", n);
//!
//! transport.close();
//! # Ok(())
//! # }
//! ```
//!
//! Cancellation is not cooperative inside the DTLS engine. A cancelled
//! connect or receive force-closes the datagram channel, which makes the
//! transport unusable afterwards.
#![forbid(unsafe_code)]
#![warn(clippy::all)]
// #![deny(missing_docs)]

#[macro_use]
extern crate log;

mod error;
pub use error::Error;

mod config;
pub use config::{Config, ConfigBuilder, ConnectOptions};

mod version;
pub use version::DtlsVersion;

pub mod alert;
pub use alert::{Alert, AlertDescription, AlertLevel};

mod record;

pub mod certificate;

mod credentials;
pub use credentials::{CertificateCredentials, Credentials, PeerVerification, PreSharedKey};

mod channel;
pub use channel::{DatagramChannel, MAX_RECEIVE, MAX_SEND};

mod io_buf;
mod stream;

mod engine;
mod session;

mod transport;
pub use transport::{DtlsTransport, TransportState};

mod option;
pub use option::UintOptionValue;
