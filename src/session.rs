use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use openssl::ssl::ErrorCode;
use parking_lot::Mutex;

use crate::alert::Alert;
use crate::channel::MAX_RECEIVE;
use crate::io_buf::IoBuffer;
use crate::record;
use crate::stream::TlsStream;
use crate::{Config, DatagramChannel, DtlsVersion, Error};

/// How often a blocked receive re-checks whether the channel was closed.
///
/// Closing shuts the socket down, which wakes the receive immediately on
/// most platforms. This bounds the wait where it doesn't.
const CLOSE_POLL: Duration = Duration::from_millis(250);

/// Largest plaintext of a single DTLS record (2^14).
const MAX_PLAINTEXT: usize = 16_384;

/// A DTLS session established over a datagram channel.
///
/// The engine sits behind a mutex that is only held while processing, never
/// while waiting for a datagram, so a blocked receive doesn't block a send.
pub(crate) struct SecureSession {
    tls: Mutex<TlsStream<IoBuffer>>,
    channel: Arc<DatagramChannel>,
    version: DtlsVersion,
    cipher: String,
}

impl SecureSession {
    /// Run the handshake to completion over `channel`. Blocking.
    ///
    /// Fails with [`Error::Handshake`] carrying the last alert the peer
    /// sent in plaintext.
    pub fn handshake(
        mut tls: TlsStream<IoBuffer>,
        channel: Arc<DatagramChannel>,
        config: &Config,
    ) -> Result<SecureSession, Error> {
        let started = Instant::now();
        let mut alert: Option<Alert> = None;
        let mut datagram = vec![0; MAX_RECEIVE];

        debug!("Start {} handshake with {}", config.dtls_version(), channel.remote_addr());

        loop {
            let progress = tls.complete_handshake_until_block();

            // Also after a failure, the engine may have queued an alert.
            let flushed = flush(&mut tls, &channel);

            match progress {
                Ok(true) => {
                    flushed.map_err(|e| Error::handshake(alert, e.to_string()))?;
                    break;
                }
                Ok(false) => {
                    flushed.map_err(|e| Error::handshake(alert, e.to_string()))?;
                }
                Err(e) => {
                    debug!("Handshake failed: {}", e);
                    return Err(Error::handshake(alert, e.to_string()));
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= config.handshake_timeout() {
                return Err(Error::handshake(alert, "handshake timed out"));
            }
            let wait = config
                .flight_start_rto()
                .min(config.handshake_timeout() - elapsed);

            match channel.receive(&mut datagram, Some(wait)) {
                Ok(0) => {
                    return Err(Error::handshake(alert, "datagram channel closed"));
                }
                Ok(n) => {
                    let incoming = &datagram[..n];
                    if let Some(a) = record::find_alert(incoming) {
                        warn!("Received alert during handshake: {}", a);
                        alert = Some(a);
                    }
                    tls.inner_mut().set_incoming(incoming);
                }
                Err(Error::Timeout) => {
                    trace!("No datagram within {:?}, re-entering engine", wait);
                }
                Err(e) => {
                    return Err(Error::handshake(alert, e.to_string()));
                }
            }
        }

        debug_assert!(tls.is_connected());

        let (version, cipher) = {
            let ssl = tls.established().map(|s| s.ssl());
            let version = ssl
                .and_then(|s| DtlsVersion::from_engine_name(s.version_str()))
                .unwrap_or(config.dtls_version());
            let cipher = ssl
                .and_then(|s| s.current_cipher())
                .map(|c| c.name().to_string())
                .unwrap_or_default();
            (version, cipher)
        };

        debug!(
            "Handshake with {} complete in {:?}: {} {}",
            channel.remote_addr(),
            started.elapsed(),
            version,
            cipher
        );

        Ok(SecureSession {
            tls: Mutex::new(tls),
            channel,
            version,
            cipher,
        })
    }

    pub fn version(&self) -> DtlsVersion {
        self.version
    }

    pub fn cipher(&self) -> &str {
        &self.cipher
    }

    /// Block until application data arrives and decrypt it into `buf`.
    ///
    /// `Ok(0)` when the peer closed the session or the channel was closed.
    pub fn receive(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut datagram = vec![0; MAX_RECEIVE];

        loop {
            // A single datagram may carry several records, so the engine
            // might have data buffered from the previous one.
            if let Some(n) = self.read_buffered(buf)? {
                return Ok(n);
            }

            let n = match self.channel.receive(&mut datagram, Some(CLOSE_POLL)) {
                Ok(0) => return Ok(0),
                Ok(n) => n,
                Err(Error::Timeout) => {
                    if self.channel.is_closed() {
                        return Ok(0);
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.tls.lock().inner_mut().set_incoming(&datagram[..n]);
        }
    }

    /// Read decrypted data already available to the engine.
    ///
    /// `None` if the engine needs another datagram.
    fn read_buffered(&self, buf: &mut [u8]) -> Result<Option<usize>, Error> {
        let mut tls = self.tls.lock();
        let stream = tls.established_mut().ok_or(Error::NotConnected)?;

        let result = stream.ssl_read(buf);

        // Reading may trigger engine output, e.g. a retransmitted Finished
        // in response to a repeated flight from the peer.
        flush(&mut tls, &self.channel)?;

        match result {
            Ok(n) => Ok(Some(n)),
            Err(e) if e.code() == ErrorCode::WANT_READ => Ok(None),
            Err(e) if e.code() == ErrorCode::ZERO_RETURN => {
                debug!("Peer closed DTLS session");
                Ok(Some(0))
            }
            Err(e) if e.code() == ErrorCode::SYSCALL && e.io_error().is_none() => {
                debug!("DTLS session ended without close_notify");
                Ok(Some(0))
            }
            Err(e) => Err(Error::Ssl(e)),
        }
    }

    /// Encrypt `data` as one record and send it. Never partial.
    pub fn send(&self, data: &[u8]) -> Result<(), Error> {
        if data.len() > MAX_PLAINTEXT {
            return Err(Error::Send(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} bytes exceed one DTLS record", data.len()),
            )));
        }

        let mut tls = self.tls.lock();
        let stream = tls.established_mut().ok_or(Error::NotConnected)?;

        let n = stream.ssl_write(data)?;
        if n != data.len() {
            return Err(Error::Send(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("engine accepted {} of {} bytes", n, data.len()),
            )));
        }

        flush(&mut tls, &self.channel)
    }

    /// Send close_notify, best-effort.
    pub fn close(&self) {
        let mut tls = self.tls.lock();

        if let Some(stream) = tls.established_mut() {
            if let Err(e) = stream.shutdown() {
                trace!("DTLS shutdown: {}", e);
            }
        }

        if let Err(e) = flush(&mut tls, &self.channel) {
            trace!("Failed to send close_notify: {}", e);
        }
    }
}

/// Send every datagram the engine has queued.
fn flush(tls: &mut TlsStream<IoBuffer>, channel: &DatagramChannel) -> Result<(), Error> {
    while let Some(datagram) = tls.inner_mut().pop_outgoing() {
        channel.send(&datagram)?;
    }
    Ok(())
}
