#![allow(unused)]

//! OpenSSL DTLS peers for integration tests.
//!
//! Each peer serves exactly one client on a background thread bound to
//! 127.0.0.1 and reports what it received through its join handle.

mod server;

use std::net::{SocketAddr, UdpSocket};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub use server::{
    cert_server_ctx, psk_server_ctx, spawn_server, Server, ServerError, ServerStream,
};

/// PSK cipher suites offered by test servers. Security level 0 lets DTLS 1.0
/// clients in.
pub const PSK_CIPHERS: &str =
    "PSK-AES128-CCM8:PSK-AES128-GCM-SHA256:PSK-AES128-CBC-SHA256:PSK-AES128-CBC-SHA:@SECLEVEL=0";

/// Read one record and write it back. Returns what was read.
pub fn echo_once(stream: &mut ServerStream) -> Result<Vec<u8>, ServerError> {
    let mut buf = vec![0; 4096];
    let n = stream.ssl_read(&mut buf)?;
    buf.truncate(n);
    stream.ssl_write(&buf)?;
    Ok(buf)
}

/// Read records until the client goes away. Returns everything read.
pub fn drain(stream: &mut ServerStream) -> Result<Vec<u8>, ServerError> {
    let mut all = Vec::new();
    let mut buf = vec![0; 4096];
    loop {
        match stream.ssl_read(&mut buf) {
            Ok(0) => break,
            Ok(n) => all.extend_from_slice(&buf[..n]),
            Err(_) => break,
        }
    }
    Ok(all)
}

/// Complete the handshake and then stay silent.
pub fn idle(stream: &mut ServerStream) -> Result<Vec<u8>, ServerError> {
    thread::sleep(Duration::from_secs(3));
    Ok(Vec::new())
}

/// A raw UDP peer that answers the first datagram with a plaintext fatal
/// alert record, the way a DTLS server rejects a handshake.
pub fn alert_peer(description: u8) -> (SocketAddr, JoinHandle<Vec<u8>>) {
    scripted_peer(description, false)
}

/// Like [`alert_peer`], but an empty datagram goes out before the alert.
pub fn empty_then_alert_peer(description: u8) -> (SocketAddr, JoinHandle<Vec<u8>>) {
    scripted_peer(description, true)
}

fn scripted_peer(description: u8, empty_first: bool) -> (SocketAddr, JoinHandle<Vec<u8>>) {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind alert peer");
    socket
        .set_read_timeout(Some(Duration::from_secs(10)))
        .expect("read timeout");
    let addr = socket.local_addr().expect("local addr");

    let handle = thread::spawn(move || {
        let mut buf = vec![0; 2048];
        let (n, from) = socket.recv_from(&mut buf).expect("receive ClientHello");
        buf.truncate(n);

        if empty_first {
            socket.send_to(&[], from).expect("send empty datagram");
            thread::sleep(Duration::from_millis(50));
        }

        #[rustfmt::skip]
        let alert = [
            21,             // content type: alert
            0xfe, 0xfd,     // DTLS 1.2
            0, 0,           // epoch
            0, 0, 0, 0, 0, 0, // sequence
            0, 2,           // length
            2, description, // fatal
        ];
        socket.send_to(&alert, from).expect("send alert");

        buf
    });

    (addr, handle)
}

/// A UDP peer that never answers.
pub fn silent_peer() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").expect("bind silent peer")
}

/// A local address that is free right now.
pub fn free_local_addr() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind probe");
    socket.local_addr().expect("local addr")
}
