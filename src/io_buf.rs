use std::collections::VecDeque;
use std::io;

/// In-memory datagram I/O for the DTLS engine.
///
/// The engine reads one incoming datagram at a time and writes whole
/// datagrams, which are queued until the session sends them on the
/// channel. Reading with nothing pending yields `WouldBlock`, which makes
/// the engine return to us instead of blocking on the socket.
#[derive(Default)]
pub(crate) struct IoBuffer {
    incoming: Vec<u8>,
    outgoing: VecDeque<Vec<u8>>,
}

impl IoBuffer {
    /// Replace the pending incoming datagram.
    pub fn set_incoming(&mut self, datagram: &[u8]) {
        if !self.incoming.is_empty() {
            trace!("Dropping {} unread bytes", self.incoming.len());
        }
        self.incoming.clear();
        self.incoming.extend_from_slice(datagram);
    }

    pub fn pop_outgoing(&mut self) -> Option<Vec<u8>> {
        self.outgoing.pop_front()
    }
}

impl io::Read for IoBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.incoming.is_empty() {
            return Err(io::Error::new(io::ErrorKind::WouldBlock, "WouldBlock"));
        }

        let n = buf.len().min(self.incoming.len());
        buf[..n].copy_from_slice(&self.incoming[..n]);

        if n == self.incoming.len() {
            self.incoming.clear();
        } else {
            self.incoming.drain(..n);
        }

        Ok(n)
    }
}

impl io::Write for IoBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outgoing.push_back(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
