mod ossl;

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};

use coap_dtls::{
    AlertDescription, Config, ConnectOptions, DtlsTransport, DtlsVersion, Error, PreSharedKey,
    TransportState,
};
use ossl::{
    alert_peer, echo_once, empty_then_alert_peer, free_local_addr, psk_server_ctx, spawn_server,
};
use tokio_util::sync::CancellationToken;

const IDENTITY: &str = "client1";
const KEY: &[u8] = b"secret123";

fn psk_transport(config: Config, identity: &str, key: &[u8]) -> DtlsTransport {
    DtlsTransport::new(
        Arc::new(config),
        Arc::new(PreSharedKey::new(identity, key)),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn psk_echo_round_trip() {
    let _ = env_logger::try_init();

    let server = spawn_server(psk_server_ctx(IDENTITY, KEY), |stream| {
        let mut got = echo_once(stream)?;
        got.extend(echo_once(stream)?);
        Ok(got)
    });

    let transport = psk_transport(Config::default(), IDENTITY, KEY);
    let cancel = CancellationToken::new();

    transport
        .connect(&ConnectOptions::new(server.addr), &cancel)
        .await
        .expect("handshake");

    assert_eq!(transport.state(), TransportState::Connected);
    assert_eq!(transport.negotiated_version(), Some(DtlsVersion::V1_2));
    assert!(!transport.cipher_name().unwrap_or_default().is_empty());
    assert!(transport.local_addr().is_some());

    let mut buf = vec![0; 1500];

    transport.send(&[1, 2, 3], &cancel).await.expect("send");
    let n = transport.receive(&mut buf, &cancel).await.expect("receive");
    assert_eq!(&buf[..n], &[1, 2, 3]);

    // The smallest payload is still a datagram of its own.
    transport.send(&[9], &cancel).await.expect("send");
    let n = transport.receive(&mut buf, &cancel).await.expect("receive");
    assert_eq!(&buf[..n], &[9]);

    transport.close();
    assert_eq!(transport.state(), TransportState::Closed);

    let seen = server.join().expect("server");
    assert_eq!(seen, vec![1, 2, 3, 9]);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_identity_reports_alert() {
    let _ = env_logger::try_init();

    let server = spawn_server(psk_server_ctx(IDENTITY, KEY), echo_once);

    let transport = psk_transport(Config::default(), "stranger", KEY);
    let cancel = CancellationToken::new();

    let err = transport
        .connect(&ConnectOptions::new(server.addr), &cancel)
        .await
        .unwrap_err();

    let alert = err.received_alert().expect("alert from server");
    assert!(alert.is_fatal());
    assert_eq!(alert.description, AlertDescription::UnknownPskIdentity);
    assert!(err.to_string().contains("unknown_psk_identity"));

    assert_eq!(transport.state(), TransportState::Failed);
    assert_eq!(transport.local_addr(), None);

    assert!(server.join().is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn decrypt_error_alert_releases_local_port() {
    let _ = env_logger::try_init();

    let local = free_local_addr();

    let (peer, hello) = alert_peer(AlertDescription::DecryptError.as_u8());
    let transport = psk_transport(Config::default(), IDENTITY, b"wrong-key");
    let cancel = CancellationToken::new();

    let err = transport
        .connect(&ConnectOptions::new(peer).with_local_addr(local), &cancel)
        .await
        .unwrap_err();

    assert_eq!(
        err.received_alert().map(|a| a.description),
        Some(AlertDescription::DecryptError)
    );
    assert!(err.to_string().starts_with("Received alert decrypt_error(51)"));

    // The first datagram is a handshake record. The record layer may say
    // DTLS 1.0, the ClientHello body carries the version we pinned.
    let hello = hello.join().expect("alert peer");
    assert_eq!(hello[0], 22);
    assert_eq!(hello[13], 1);
    assert_eq!(&hello[25..27], &[0xfe, 0xfd]);

    // The failed attempt gave the port back, a new attempt can bind it.
    let (peer, _) = alert_peer(AlertDescription::HandshakeFailure.as_u8());
    let retry = psk_transport(Config::default(), IDENTITY, KEY);

    let err = retry
        .connect(&ConnectOptions::new(peer).with_local_addr(local), &cancel)
        .await
        .unwrap_err();

    assert_eq!(
        err.received_alert().map(|a| a.description),
        Some(AlertDescription::HandshakeFailure)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_key_times_out_without_alert() {
    let _ = env_logger::try_init();

    // A DTLS server drops records it can't authenticate instead of
    // answering, so the client only sees silence.
    let server = spawn_server(psk_server_ctx(IDENTITY, KEY), echo_once);

    let config = Config::builder()
        .handshake_timeout(Duration::from_secs(3))
        .flight_start_rto(Duration::from_millis(500))
        .build()
        .unwrap();
    let transport = psk_transport(config, IDENTITY, b"wrong-key");
    let cancel = CancellationToken::new();

    let started = Instant::now();
    let err = transport
        .connect(&ConnectOptions::new(server.addr), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Handshake { .. }), "{:?}", err);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(transport.state(), TransportState::Failed);
}

#[tokio::test(flavor = "multi_thread")]
async fn dtls_1_0_handshake() {
    let _ = env_logger::try_init();

    let server = spawn_server(psk_server_ctx(IDENTITY, KEY), echo_once);

    let config = Config::builder()
        .dtls_version(DtlsVersion::V1_0)
        .build()
        .unwrap();
    let transport = psk_transport(config, IDENTITY, KEY);
    let cancel = CancellationToken::new();

    transport
        .connect(&ConnectOptions::new(server.addr), &cancel)
        .await
        .expect("handshake");
    assert_eq!(transport.negotiated_version(), Some(DtlsVersion::V1_0));

    let mut buf = vec![0; 1500];
    transport.send(b"ping", &cancel).await.expect("send");
    let n = transport.receive(&mut buf, &cancel).await.expect("receive");
    assert_eq!(&buf[..n], b"ping");
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_datagram_during_handshake_is_ignored() {
    let _ = env_logger::try_init();

    let (peer, _) = empty_then_alert_peer(AlertDescription::DecryptError.as_u8());
    let transport = psk_transport(Config::default(), IDENTITY, KEY);

    let err = transport
        .connect(&ConnectOptions::new(peer), &CancellationToken::new())
        .await
        .unwrap_err();

    // The handshake kept going past the empty datagram and saw the alert.
    assert_eq!(
        err.received_alert().map(|a| a.description),
        Some(AlertDescription::DecryptError)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_datagram_during_receive_is_ignored() {
    let _ = env_logger::try_init();

    let server = spawn_server(psk_server_ctx(IDENTITY, KEY), echo_once);

    let transport = psk_transport(Config::default(), IDENTITY, KEY);
    let cancel = CancellationToken::new();

    transport
        .connect(&ConnectOptions::new(server.addr), &cancel)
        .await
        .expect("handshake");

    let port = transport.local_addr().expect("local addr").port();
    let stranger = UdpSocket::bind("127.0.0.1:0").unwrap();
    stranger
        .send_to(&[], SocketAddr::from(([127, 0, 0, 1], port)))
        .unwrap();

    transport.send(&[1, 2, 3], &cancel).await.expect("send");

    let mut buf = vec![0; 1500];
    let n = transport.receive(&mut buf, &cancel).await.expect("receive");
    assert_eq!(&buf[..n], &[1, 2, 3]);
    assert_eq!(transport.state(), TransportState::Connected);
}
