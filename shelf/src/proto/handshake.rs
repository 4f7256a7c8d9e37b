use shelf_api::handshake::{header_end, HandshakeResponse};
use shelf_api::limits::MAX_HANDSHAKE_BYTES;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("handshake: connection closed")]
    Closed,
    #[error("handshake: response headers too large")]
    TooLarge,
    #[error("handshake: invalid response")]
    Invalid,
    #[error("handshake: server answered {status} {reason}")]
    Rejected { status: u16, reason: String },
    #[error("handshake: server upgraded to {got:?}, expected {expected}")]
    ProtocolMismatch { expected: String, got: Option<String> },
    #[error("handshake: {0}")]
    Io(#[from] std::io::Error),
}

/// A completed upgrade. `buffered` holds any bytes read past the header block.
#[derive(Debug)]
pub struct Upgraded {
    pub response: HandshakeResponse,
    pub buffered: Vec<u8>,
}

/// Send an HTTP/1.1 upgrade request for `protocol` and wait for `101`.
pub async fn perform_upgrade<S>(
    stream: &mut S,
    host: &str,
    path: &str,
    protocol: &str,
) -> Result<Upgraded, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let req = format!(
        "GET {path} HTTP/1.1\r\n\
host: {host}\r\n\
connection: Upgrade\r\n\
upgrade: {protocol}\r\n\r\n"
    );
    stream.write_all(req.as_bytes()).await?;
    stream.flush().await?;

    let mut buf = Vec::with_capacity(512);
    let mut tmp = [0u8; 512];
    let end = loop {
        let n = stream.read(&mut tmp).await?;
        if n == 0 {
            return Err(HandshakeError::Closed);
        }
        buf.extend_from_slice(&tmp[..n]);
        if let Some(end) = header_end(&buf) {
            break end;
        }
        if buf.len() > MAX_HANDSHAKE_BYTES {
            return Err(HandshakeError::TooLarge);
        }
    };

    let response = HandshakeResponse::parse(&buf).ok_or(HandshakeError::Invalid)?;
    if !response.is_switching_protocols() {
        return Err(HandshakeError::Rejected {
            status: response.status,
            reason: response.reason.clone(),
        });
    }
    match response.header("upgrade") {
        Some(p) if p.eq_ignore_ascii_case(protocol) => {}
        other => {
            return Err(HandshakeError::ProtocolMismatch {
                expected: protocol.to_string(),
                got: other.map(str::to_string),
            })
        }
    }
    let buffered = buf.split_off(end + 4);
    Ok(Upgraded { response, buffered })
}
