use std::io;

use openssl::error::ErrorStack;
use thiserror::Error;

use crate::alert::Alert;
use crate::TransportState;

/// Errors surfaced by the DTLS transport.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The requested DTLS protocol version is not recognized.
    #[error("Unsupported DTLS version: {0}")]
    UnsupportedVersion(String),

    /// The operation is not valid in the transport's current state.
    #[error("Operation not valid in state {0:?}")]
    InvalidState(TransportState),

    /// The DTLS engine rejected its setup (credentials, versions, ciphers).
    #[error("DTLS engine setup failed: {0}")]
    Engine(#[from] ErrorStack),

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// The DTLS handshake failed.
    ///
    /// `alert` is the alert the peer sent during the failed handshake,
    /// if any.
    #[error("{}", handshake_message(.alert, .reason))]
    Handshake {
        /// Alert received from the peer.
        alert: Option<Alert>,
        /// What made the handshake fail locally.
        reason: String,
    },

    /// The transport is not connected, or has been closed.
    #[error("The connection is closed")]
    NotConnected,

    /// No datagram arrived before the receive deadline.
    #[error("Timed out waiting for a datagram")]
    Timeout,

    /// Socket setup or network receive failure.
    #[error("{0}")]
    Io(#[from] io::Error),

    /// Sending a datagram failed.
    #[error("Failed to send datagram: {0}")]
    Send(io::Error),

    /// The DTLS engine failed on an established session.
    #[error("{0}")]
    Ssl(#[from] openssl::ssl::Error),

    /// A blocking worker panicked or was aborted.
    #[error("Blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

fn handshake_message(alert: &Option<Alert>, reason: &str) -> String {
    match alert {
        Some(alert) => format!("Received alert {} ({})", alert.description, reason),
        None => format!("DTLS handshake failed without alert ({})", reason),
    }
}

impl Error {
    pub(crate) fn handshake(alert: Option<Alert>, reason: impl Into<String>) -> Self {
        Error::Handshake {
            alert,
            reason: reason.into(),
        }
    }

    /// The alert carried by a handshake failure.
    pub fn received_alert(&self) -> Option<Alert> {
        match self {
            Error::Handshake { alert, .. } => *alert,
            _ => None,
        }
    }

    /// Whether this error is the result of a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
