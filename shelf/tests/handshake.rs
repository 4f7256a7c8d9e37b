use shelf::proto::handshake::{perform_upgrade, HandshakeError};
use shelf_api::limits::MAX_HANDSHAKE_BYTES;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

const PROTO: &str = "shelf-progress/1";

/// Read one request header block from the client side of the pipe.
async fn read_request(server: &mut DuplexStream) -> String {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 256];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = server.read(&mut tmp).await.unwrap();
        assert!(n > 0, "client closed before finishing its request");
        buf.extend_from_slice(&tmp[..n]);
    }
    String::from_utf8(buf).unwrap()
}

#[tokio::test]
async fn upgrade_ok_keeps_trailing_bytes() {
    let (mut client, mut server) = duplex(4096);

    let srv = tokio::spawn(async move {
        let req = read_request(&mut server).await;
        assert!(req.starts_with("GET / HTTP/1.1\r\n"));
        assert!(req.contains("upgrade: shelf-progress/1"));
        assert!(req.contains("host: books.local"));
        server
            .write_all(b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: shelf-progress/1\r\nConnection: Upgrade\r\n\r\nhello")
            .await
            .unwrap();
        server
    });

    let up = perform_upgrade(&mut client, "books.local", "/", PROTO).await.expect("upgraded");
    assert_eq!(up.response.status, 101);
    assert_eq!(up.response.header("connection"), Some("Upgrade"));
    assert_eq!(up.buffered, b"hello");
    let _server = srv.await.unwrap();
}

#[tokio::test]
async fn non_101_is_rejected() {
    let (mut client, mut server) = duplex(4096);
    let srv = tokio::spawn(async move {
        read_request(&mut server).await;
        server.write_all(b"HTTP/1.1 426 Upgrade Required\r\n\r\n").await.unwrap();
        server
    });
    let err = perform_upgrade(&mut client, "h", "/", PROTO).await.expect_err("rejected");
    assert!(matches!(err, HandshakeError::Rejected { status: 426, .. }), "{err:?}");
    let _server = srv.await.unwrap();
}

#[tokio::test]
async fn wrong_protocol_is_rejected() {
    let (mut client, mut server) = duplex(4096);
    let srv = tokio::spawn(async move {
        read_request(&mut server).await;
        server
            .write_all(b"HTTP/1.1 101 Switching Protocols\r\nupgrade: websocket\r\n\r\n")
            .await
            .unwrap();
        server
    });
    let err = perform_upgrade(&mut client, "h", "/", PROTO).await.expect_err("mismatch");
    match err {
        HandshakeError::ProtocolMismatch { expected, got } => {
            assert_eq!(expected, PROTO);
            assert_eq!(got.as_deref(), Some("websocket"));
        }
        other => panic!("expected ProtocolMismatch, got {other:?}"),
    }
    let _server = srv.await.unwrap();
}

#[tokio::test]
async fn oversized_headers_are_cut_off() {
    let (mut client, mut server) = duplex(64 * 1024);
    let srv = tokio::spawn(async move {
        read_request(&mut server).await;
        let mut junk = b"HTTP/1.1 101 Switching Protocols\r\n".to_vec();
        junk.extend(std::iter::repeat(b'x').take(MAX_HANDSHAKE_BYTES + 1));
        let _ = server.write_all(&junk).await;
        server
    });
    let err = perform_upgrade(&mut client, "h", "/", PROTO).await.expect_err("too large");
    assert!(matches!(err, HandshakeError::TooLarge), "{err:?}");
    let _server = srv.await.unwrap();
}

#[tokio::test]
async fn server_hangup_is_reported() {
    let (mut client, mut server) = duplex(4096);
    let srv = tokio::spawn(async move {
        read_request(&mut server).await;
        drop(server);
    });
    let err = perform_upgrade(&mut client, "h", "/", PROTO).await.expect_err("closed");
    assert!(matches!(err, HandshakeError::Closed), "{err:?}");
    srv.await.unwrap();
}
