use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::{self, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::engine;
use crate::session::SecureSession;
use crate::{Config, ConnectOptions, Credentials, DatagramChannel, DtlsVersion, Error};

/// Lifecycle of a [`DtlsTransport`].
///
/// ```text
/// Uninitialized -> Connecting -> Connected -> Closed
///                             \-> Failed ---/
/// ```
///
/// There is no way back to `Connecting`, a transport makes exactly one
/// connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Created, connect not yet called.
    Uninitialized,
    /// Handshake in progress.
    Connecting,
    /// Handshake completed, send and receive are available.
    Connected,
    /// Handshake failed or was cancelled.
    Failed,
    /// Closed by the caller.
    Closed,
}

/// DTLS client transport for one peer.
///
/// All operations take `&self`, so the transport can be shared between a
/// task that receives and one that sends or closes. Callers serialize
/// their own sends and their own receives.
pub struct DtlsTransport {
    config: Arc<Config>,
    credentials: Arc<dyn Credentials>,
    inner: Mutex<Inner>,
}

struct Inner {
    state: TransportState,
    channel: Option<Arc<DatagramChannel>>,
    session: Option<Arc<SecureSession>>,
}

impl DtlsTransport {
    /// Create a transport that will authenticate with `credentials`.
    pub fn new(config: Arc<Config>, credentials: Arc<dyn Credentials>) -> Self {
        DtlsTransport {
            config,
            credentials,
            inner: Mutex::new(Inner {
                state: TransportState::Uninitialized,
                channel: None,
                session: None,
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TransportState {
        self.inner.lock().state
    }

    /// Local address of the datagram channel, while one is open.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.lock().channel.as_ref().map(|c| c.local_addr())
    }

    /// The DTLS version negotiated by the handshake.
    pub fn negotiated_version(&self) -> Option<DtlsVersion> {
        self.inner.lock().session.as_ref().map(|s| s.version())
    }

    /// The cipher suite negotiated by the handshake, in OpenSSL naming.
    pub fn cipher_name(&self) -> Option<String> {
        self.inner
            .lock()
            .session
            .as_ref()
            .map(|s| s.cipher().to_string())
    }

    /// Open the datagram channel and run the DTLS handshake.
    ///
    /// Cancelling `cancel` while the handshake runs closes the channel,
    /// which aborts the handshake and returns [`Error::Cancelled`]. Any
    /// other failure returns [`Error::Handshake`] with the alert the peer
    /// sent, if any. In both cases the channel is released before
    /// returning.
    pub async fn connect(
        &self,
        options: &ConnectOptions,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        {
            let mut inner = self.inner.lock();
            if inner.state != TransportState::Uninitialized {
                return Err(Error::InvalidState(inner.state));
            }
            inner.state = TransportState::Connecting;
        }

        match self.handshake(options, cancel).await {
            Ok(session) => {
                let mut inner = self.inner.lock();
                if inner.state != TransportState::Connecting {
                    // Closed while the handshake was running.
                    session.close();
                    return Err(Error::NotConnected);
                }
                inner.session = Some(Arc::new(session));
                inner.state = TransportState::Connected;
                Ok(())
            }
            Err(e) => {
                let channel = {
                    let mut inner = self.inner.lock();
                    if inner.state == TransportState::Connecting {
                        inner.state = TransportState::Failed;
                    }
                    inner.channel.take()
                };
                if let Some(channel) = channel {
                    channel.close();
                }

                if cancel.is_cancelled() {
                    debug!("Connect cancelled ({})", e);
                    return Err(Error::Cancelled);
                }

                Err(e)
            }
        }
    }

    async fn handshake(
        &self,
        options: &ConnectOptions,
        cancel: &CancellationToken,
    ) -> Result<SecureSession, Error> {
        let tls = engine::dtls_client(&self.config, &*self.credentials)?;

        let channel = Arc::new(DatagramChannel::open(options)?);
        {
            let mut inner = self.inner.lock();
            if inner.state != TransportState::Connecting {
                channel.close();
                return Err(Error::NotConnected);
            }
            inner.channel = Some(channel.clone());
        }

        let config = self.config.clone();
        let handshake_channel = channel.clone();
        let work =
            task::spawn_blocking(move || SecureSession::handshake(tls, handshake_channel, &config));

        close_on_cancel(work, &channel, cancel).await?
    }

    /// Receive one decrypted datagram into `buf`.
    ///
    /// Returns `Ok(0)` when the session ended: the peer sent close_notify,
    /// the transport was closed during the call, or the socket failed.
    /// Cancelling `cancel` during the call returns [`Error::Cancelled`].
    /// Either way the transport is `Closed` afterwards.
    pub async fn receive(
        &self,
        buf: &mut [u8],
        cancel: &CancellationToken,
    ) -> Result<usize, Error> {
        let (session, channel) = self.connected()?;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if buf.is_empty() {
            return Ok(0);
        }

        let len = buf.len();
        let work = task::spawn_blocking(move || {
            let mut plain = vec![0; len];
            session.receive(&mut plain).map(|n| {
                plain.truncate(n);
                plain
            })
        });

        let result = close_on_cancel(work, &channel, cancel)
            .await
            .and_then(|r| r);

        match result {
            Ok(plain) if !plain.is_empty() => {
                buf[..plain.len()].copy_from_slice(&plain);
                Ok(plain.len())
            }
            _ if cancel.is_cancelled() => {
                self.close();
                Err(Error::Cancelled)
            }
            // A released channel or a failing socket ends the stream, it is
            // up to the caller whether that is fatal.
            Ok(_) | Err(Error::NotConnected) => {
                self.close();
                Ok(0)
            }
            Err(Error::Io(e)) => {
                debug!("Receive failed: {}", e);
                self.close();
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    /// Encrypt and send `data` as one datagram.
    ///
    /// Failures are returned as-is, a send is never silently dropped.
    pub async fn send(&self, data: &[u8], cancel: &CancellationToken) -> Result<(), Error> {
        let (session, _) = self.connected()?;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        session.send(data)
    }

    /// Close the session and the datagram channel.
    ///
    /// Idempotent. A receive blocked on another task returns `Ok(0)`.
    pub fn close(&self) {
        let (session, channel) = {
            let mut inner = self.inner.lock();
            if inner.state == TransportState::Closed {
                return;
            }
            inner.state = TransportState::Closed;
            (inner.session.take(), inner.channel.take())
        };

        if let Some(session) = session {
            session.close();
        }

        if let Some(channel) = channel {
            channel.close();
        }
    }

    fn connected(&self) -> Result<(Arc<SecureSession>, Arc<DatagramChannel>), Error> {
        let inner = self.inner.lock();
        if inner.state != TransportState::Connected {
            return Err(Error::NotConnected);
        }
        match (&inner.session, &inner.channel) {
            (Some(session), Some(channel)) => Ok((session.clone(), channel.clone())),
            _ => Err(Error::NotConnected),
        }
    }
}

impl Drop for DtlsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for DtlsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("DtlsTransport")
            .field("state", &inner.state)
            .field("local_addr", &inner.channel.as_ref().map(|c| c.local_addr()))
            .field("version", &self.config.dtls_version())
            .finish()
    }
}

/// Await `work`, closing `channel` if `cancel` fires first.
///
/// The engine has no cancellation point of its own. Closing the channel
/// under it is what makes a blocked handshake or receive return.
async fn close_on_cancel<T>(
    mut work: JoinHandle<T>,
    channel: &DatagramChannel,
    cancel: &CancellationToken,
) -> Result<T, Error> {
    tokio::select! {
        result = &mut work => Ok(result?),
        _ = cancel.cancelled() => {
            debug!("Cancelled, closing datagram channel to {}", channel.remote_addr());
            channel.close();
            Ok(work.await?)
        }
    }
}
