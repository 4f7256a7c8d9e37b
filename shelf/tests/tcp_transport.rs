use std::sync::Arc;
use std::time::Duration;

use shelf::connection::{
    CloseReason, ConnectionOutcome, ConnectionWaiter, TcpTransport, TransportState,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const PROTO: &str = "shelf-progress/1";

async fn read_headers(sock: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 256];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = sock.read(&mut tmp).await.unwrap();
        assert!(n > 0);
        buf.extend_from_slice(&tmp[..n]);
    }
}

#[tokio::test]
async fn opens_after_upgrade_and_closes_cleanly() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let srv = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        read_headers(&mut sock).await;
        sock.write_all(b"HTTP/1.1 101 Switching Protocols\r\nupgrade: shelf-progress/1\r\n\r\n")
            .await
            .unwrap();
        // closing the transport must reach us as EOF
        let mut tmp = [0u8; 16];
        timeout(Duration::from_secs(2), sock.read(&mut tmp)).await.unwrap().unwrap()
    });

    let transport = Arc::new(TcpTransport::open(addr.to_string(), PROTO));
    let mut waiter = ConnectionWaiter::new(transport.clone());
    let outcome = waiter.wait_for_connection(5.0, &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome, ConnectionOutcome::Ready);
    assert_eq!(transport.state(), TransportState::Open);

    waiter.close_with_reason(outcome.close_reason()).await;
    assert_eq!(transport.state(), TransportState::Closed(CloseReason::Normal));
    assert!(transport.take_connection().await.is_none());
    assert_eq!(srv.await.unwrap(), 0);
}

#[tokio::test]
async fn silent_server_times_out_and_close_releases_the_socket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let srv = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        read_headers(&mut sock).await;
        // never answer; wait for the client to go away
        let mut tmp = [0u8; 16];
        timeout(Duration::from_secs(2), sock.read(&mut tmp)).await.unwrap().unwrap()
    });

    let transport = Arc::new(TcpTransport::open(addr.to_string(), PROTO));
    let mut waiter = ConnectionWaiter::new(transport.clone());
    let outcome = waiter.wait_for_connection(0.3, &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome, ConnectionOutcome::TimedOut);

    waiter.close_with_reason(outcome.close_reason()).await;
    assert_eq!(transport.state(), TransportState::Closed(CloseReason::Timeout));
    assert_eq!(srv.await.unwrap(), 0, "pending attempt must not keep the socket open");
}

#[tokio::test]
async fn refused_connection_fails_fast() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = TcpTransport::open(addr.to_string(), PROTO);
    let mut waiter = ConnectionWaiter::new(transport);
    let start = std::time::Instant::now();
    let outcome = waiter.wait_for_connection(10.0, &CancellationToken::new()).await.unwrap();
    assert!(matches!(outcome, ConnectionOutcome::TransportError(_)), "{outcome:?}");
    assert!(start.elapsed() < Duration::from_secs(5));
    waiter.close_with_reason(outcome.close_reason()).await;
}
