//! Raw UDP datagram channel fixed to one remote peer.

use std::io::{self, Read};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::{ConnectOptions, Error};

/// Largest datagram we accept.
///
/// Larger than any realistic path MTU so that datagrams are never
/// truncated.
pub const MAX_RECEIVE: usize = 66_000;

/// Largest datagram we send.
pub const MAX_SEND: usize = 66_000;

/// An unauthenticated UDP channel to one peer.
///
/// Receive accepts datagrams from any sender; spoofed datagrams are
/// caught by the DTLS layer above. The channel can be closed from any
/// thread, also while another thread is blocked in [`receive`].
///
/// [`receive`]: DatagramChannel::receive
pub struct DatagramChannel {
    /// Cleared on close. A receive in flight holds its own clone, so the
    /// OS handle is released when that receive returns.
    socket: Mutex<Option<Arc<Socket>>>,
    remote: SocketAddr,
    remote_sock: SockAddr,
    local: SocketAddr,
}

impl DatagramChannel {
    /// Allocate a UDP socket matching the address family of the endpoint.
    pub fn open(options: &ConnectOptions) -> Result<Self, Error> {
        let remote = options.endpoint();
        let local = options
            .local_addr()
            .unwrap_or_else(|| unspecified_for(&remote));

        if local.is_ipv4() != remote.is_ipv4() {
            return Err(Error::Config(format!(
                "local address {} does not match family of {}",
                local, remote
            )));
        }

        let socket = Socket::new(Domain::for_address(remote), Type::DGRAM, Some(Protocol::UDP))?;
        socket.bind(&local.into())?;

        let local = socket.local_addr()?.as_socket().ok_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "socket has no inet address")
        })?;

        debug!("Datagram channel {} -> {}", local, remote);

        Ok(DatagramChannel {
            socket: Mutex::new(Some(Arc::new(socket))),
            remote,
            remote_sock: remote.into(),
            local,
        })
    }

    /// The fixed remote peer.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// The local address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Whether [`close`](DatagramChannel::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.socket.lock().is_none()
    }

    fn socket(&self) -> Result<Arc<Socket>, Error> {
        self.socket.lock().clone().ok_or(Error::NotConnected)
    }

    /// Block until a datagram arrives and copy up to `buf.len()` bytes of it.
    ///
    /// * `Err(NotConnected)` if the channel was closed before the call.
    /// * `Err(Timeout)` if `timeout` elapsed without a datagram.
    /// * `Ok(0)` on socket failure or when closed during the call.
    ///
    /// Empty datagrams are skipped, anyone can send one.
    pub fn receive(&self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize, Error> {
        let socket = self.socket()?;
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            // A zero read timeout is rejected by the OS, so clamp it.
            let wait = deadline.map(|d| {
                d.saturating_duration_since(Instant::now())
                    .max(Duration::from_millis(1))
            });

            if let Err(e) = socket.set_read_timeout(wait) {
                debug!("Failed to set read timeout: {}", e);
                return Ok(0);
            }

            match (&*socket).read(buf) {
                Ok(0) if self.is_closed() => {
                    trace!("Receive interrupted by close");
                    return Ok(0);
                }
                Ok(0) => {
                    trace!("Dropping empty datagram");
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        return Err(Error::Timeout);
                    }
                }
                Ok(n) => {
                    trace!("Received datagram of {} bytes", n);
                    return Ok(n);
                }
                Err(e) if self.is_closed() => {
                    trace!("Receive interrupted by close: {}", e);
                    return Ok(0);
                }
                Err(e) if is_timeout(&e) && deadline.is_some() => return Err(Error::Timeout),
                Err(e) => {
                    debug!("Receive failed: {}", e);
                    return Ok(0);
                }
            }
        }
    }

    /// Send `buf` as exactly one datagram to the remote peer.
    pub fn send(&self, buf: &[u8]) -> Result<(), Error> {
        let socket = self.socket()?;

        if buf.len() > MAX_SEND {
            return Err(Error::Send(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("datagram of {} bytes exceeds {}", buf.len(), MAX_SEND),
            )));
        }

        match socket.send_to(buf, &self.remote_sock) {
            Ok(n) if n == buf.len() => {
                trace!("Sent datagram of {} bytes", n);
                Ok(())
            }
            Ok(n) => Err(Error::Send(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short send {} of {} bytes", n, buf.len()),
            ))),
            Err(e) if e.kind() == io::ErrorKind::NotConnected || self.is_closed() => {
                Err(Error::NotConnected)
            }
            Err(e) => Err(Error::Send(e)),
        }
    }

    /// Shut down both directions and release the socket.
    ///
    /// Idempotent. Wakes up a receive blocked on another thread.
    pub fn close(&self) {
        let Some(socket) = self.socket.lock().take() else {
            return;
        };

        // Linux reports ENOTCONN for an unconnected UDP socket, but still
        // marks it shut down and wakes blocked readers.
        if let Err(e) = socket.shutdown(Shutdown::Both) {
            trace!("Shutdown of datagram socket: {}", e);
        }

        debug!("Datagram channel {} -> {} closed", self.local, self.remote);
    }
}

impl Drop for DatagramChannel {
    fn drop(&mut self) {
        self.close();
    }
}

fn unspecified_for(remote: &SocketAddr) -> SocketAddr {
    let ip = match remote.ip() {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    SocketAddr::new(ip, 0)
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
