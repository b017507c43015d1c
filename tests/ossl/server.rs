use std::io::{self, Read, Write};
use std::net::{SocketAddr, UdpSocket};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use openssl::pkey::PKey;
use openssl::ssl::{Ssl, SslContext, SslContextBuilder, SslMethod, SslStream, SslVerifyMode};
use openssl::x509::X509;

use coap_dtls::certificate::CertifiedKey;

/// Test server errors, flattened to text since the handshake error type
/// isn't `Send` across the join handle.
pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

pub type ServerStream = SslStream<UdpStream>;

/// A UDP socket connected to the client, as a blocking datagram stream.
#[derive(Debug)]
pub struct UdpStream(UdpSocket);

impl Read for UdpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.recv(buf)
    }
}

impl Write for UdpStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Server {
    pub addr: SocketAddr,
    handle: JoinHandle<Result<Vec<u8>, ServerError>>,
}

impl Server {
    /// Wait for the server thread and return what its behavior returned.
    pub fn join(self) -> Result<Vec<u8>, ServerError> {
        self.handle.join().expect("server thread panicked")
    }
}

pub fn psk_server_ctx(identity: &'static str, key: &'static [u8]) -> SslContext {
    let mut ctx = SslContextBuilder::new(SslMethod::dtls()).expect("context");
    ctx.set_cipher_list(super::PSK_CIPHERS).expect("ciphers");

    ctx.set_psk_server_callback(move |_ssl, client_identity, psk_out| {
        if client_identity != Some(identity.as_bytes()) {
            // Unknown identity, the engine answers with unknown_psk_identity.
            return Ok(0);
        }
        psk_out[..key.len()].copy_from_slice(key);
        Ok(key.len())
    });

    ctx.build()
}

pub fn cert_server_ctx(cert: &CertifiedKey) -> SslContext {
    let mut ctx = SslContextBuilder::new(SslMethod::dtls()).expect("context");
    ctx.set_cipher_list("ECDHE+AESGCM:ECDHE+AES256")
        .expect("ciphers");

    let x509 = X509::from_der(&cert.certificate).expect("server cert");
    let pkey = PKey::private_key_from_der(&cert.private_key).expect("server key");
    ctx.set_certificate(&x509).expect("set cert");
    ctx.set_private_key(&pkey).expect("set key");

    // Ask for the client certificate but accept anything.
    ctx.set_verify_callback(SslVerifyMode::PEER, |_ok, _ctx| true);

    ctx.build()
}

/// Serve one client with `ctx`, then hand the established stream to
/// `behavior`.
pub fn spawn_server<F>(ctx: SslContext, behavior: F) -> Server
where
    F: FnOnce(&mut ServerStream) -> Result<Vec<u8>, ServerError> + Send + 'static,
{
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind server");
    socket
        .set_read_timeout(Some(Duration::from_secs(10)))
        .expect("read timeout");
    let addr = socket.local_addr().expect("local addr");

    let handle = thread::spawn(move || {
        // Peek so the ClientHello is still there for the engine.
        let mut peek = vec![0; 2048];
        let (_, client) = socket.peek_from(&mut peek)?;
        socket.connect(client)?;

        let mut ssl = Ssl::new(&ctx)?;
        ssl.set_mtu(1150)?;

        let mut stream = ssl
            .accept(UdpStream(socket))
            .map_err(|e| format!("server handshake: {}", e))?;

        let result = behavior(&mut stream);
        let _ = stream.shutdown();
        result
    });

    Server { addr, handle }
}
