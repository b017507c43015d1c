use std::io::{Read, Write};
use std::mem;

use openssl::ssl::{HandshakeError, MidHandshakeSslStream, Ssl, SslStream};

use crate::Error;

/// An OpenSSL DTLS client stream that moves from handshake to established
/// without ever blocking.
pub(crate) struct TlsStream<S> {
    state: State<S>,
}

enum State<S> {
    Init(Ssl, S),
    Handshaking(MidHandshakeSslStream<S>),
    Established(SslStream<S>),
    Failed(S),
}

impl<S: Read + Write + Default> TlsStream<S> {
    pub fn new(ssl: Ssl, stream: S) -> Self {
        TlsStream {
            state: State::Init(ssl, stream),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, State::Established(_))
    }

    /// Drive the handshake as far as the available input allows.
    ///
    /// `Ok(true)` once established, `Ok(false)` when the engine waits for
    /// another datagram. On failure the underlying stream is kept so
    /// that an alert the engine queued can still be sent.
    pub fn complete_handshake_until_block(&mut self) -> Result<bool, Error> {
        let state = mem::replace(&mut self.state, State::Failed(S::default()));

        let result = match state {
            State::Init(ssl, stream) => ssl.connect(stream),
            State::Handshaking(mid) => mid.handshake(),
            State::Established(stream) => {
                self.state = State::Established(stream);
                return Ok(true);
            }
            State::Failed(stream) => {
                self.state = State::Failed(stream);
                return Err(Error::NotConnected);
            }
        };

        match result {
            Ok(stream) => {
                self.state = State::Established(stream);
                Ok(true)
            }
            Err(HandshakeError::WouldBlock(mid)) => {
                self.state = State::Handshaking(mid);
                Ok(false)
            }
            Err(HandshakeError::SetupFailure(e)) => Err(Error::Engine(e)),
            Err(HandshakeError::Failure(mut mid)) => {
                self.state = State::Failed(mem::take(mid.get_mut()));
                Err(Error::Ssl(mid.into_error()))
            }
        }
    }

    /// The I/O object below the engine, in any state.
    pub fn inner_mut(&mut self) -> &mut S {
        match &mut self.state {
            State::Init(_, s) => s,
            State::Handshaking(mid) => mid.get_mut(),
            State::Established(stream) => stream.get_mut(),
            State::Failed(s) => s,
        }
    }

    pub fn established(&self) -> Option<&SslStream<S>> {
        match &self.state {
            State::Established(stream) => Some(stream),
            _ => None,
        }
    }

    pub fn established_mut(&mut self) -> Option<&mut SslStream<S>> {
        match &mut self.state {
            State::Established(stream) => Some(stream),
            _ => None,
        }
    }
}
