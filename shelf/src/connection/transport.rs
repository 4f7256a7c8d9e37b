use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::proto::handshake::perform_upgrade;

/// Why a transport was closed. Codes follow the WebSocket close-code ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Normal,
    GoingAway,
    Error,
    Timeout,
    Cancelled,
}

impl CloseReason {
    pub fn code(self) -> u16 {
        match self {
            CloseReason::Normal => 1000,
            CloseReason::GoingAway => 1001,
            CloseReason::Error => 1011,
            CloseReason::Timeout => 4008,
            CloseReason::Cancelled => 4009,
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CloseReason::Normal => "normal",
            CloseReason::GoingAway => "going away",
            CloseReason::Error => "error",
            CloseReason::Timeout => "timeout",
            CloseReason::Cancelled => "cancelled",
        };
        write!(f, "{name} ({})", self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportState {
    Connecting,
    Open,
    Failed(String),
    Closed(CloseReason),
}

/// A duplex connection as seen by the waiter: a state feed and a way to close it.
#[async_trait]
pub trait Transport: Send + Sync {
    fn subscribe(&self) -> watch::Receiver<TransportState>;

    async fn close_with_reason(&self, reason: CloseReason);
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn subscribe(&self) -> watch::Receiver<TransportState> {
        (**self).subscribe()
    }

    async fn close_with_reason(&self, reason: CloseReason) {
        (**self).close_with_reason(reason).await
    }
}

/// An upgraded TCP stream plus any bytes the handshake read past its headers.
#[derive(Debug)]
pub struct Connection {
    pub stream: TcpStream,
    pub buffered: Vec<u8>,
}

/// TCP transport that performs an HTTP/1.1 upgrade handshake in the background.
pub struct TcpTransport {
    state: Arc<watch::Sender<TransportState>>,
    conn: Arc<Mutex<Option<Connection>>>,
    attempt: StdMutex<Option<JoinHandle<()>>>,
}

impl TcpTransport {
    /// Start connecting to `addr` (`host:port`). Must be called inside a Tokio runtime.
    pub fn open(addr: impl Into<String>, protocol: impl Into<String>) -> Self {
        let (tx, _) = watch::channel(TransportState::Connecting);
        let state = Arc::new(tx);
        let conn = Arc::new(Mutex::new(None));
        let attempt = tokio::spawn(connect(addr.into(), protocol.into(), state.clone(), conn.clone()));
        Self { state, conn, attempt: StdMutex::new(Some(attempt)) }
    }

    pub fn state(&self) -> TransportState {
        self.state.borrow().clone()
    }

    /// Take the upgraded stream. `None` until the transport is open, or after close.
    pub async fn take_connection(&self) -> Option<Connection> {
        self.conn.lock().await.take()
    }
}

async fn connect(
    addr: String,
    protocol: String,
    state: Arc<watch::Sender<TransportState>>,
    conn: Arc<Mutex<Option<Connection>>>,
) {
    let host = addr.rsplit_once(':').map(|(h, _)| h).unwrap_or(&addr).to_string();
    let result = async {
        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| format!("connect {addr}: {e}"))?;
        let upgraded = perform_upgrade(&mut stream, &host, "/", &protocol)
            .await
            .map_err(|e| e.to_string())?;
        Ok::<_, String>(Connection { stream, buffered: upgraded.buffered })
    }
    .await;

    let next = match result {
        Ok(c) => {
            *conn.lock().await = Some(c);
            TransportState::Open
        }
        Err(detail) => TransportState::Failed(detail),
    };
    debug!(target: "shelf", %addr, state = ?next, "connect attempt settled");
    // close_with_reason may already have published Closed
    state.send_if_modified(|s| {
        if *s == TransportState::Connecting {
            *s = next;
            true
        } else {
            false
        }
    });
}

#[async_trait]
impl Transport for TcpTransport {
    fn subscribe(&self) -> watch::Receiver<TransportState> {
        self.state.subscribe()
    }

    async fn close_with_reason(&self, reason: CloseReason) {
        let pending = self.attempt.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = pending {
            task.abort();
        }
        self.state.send_replace(TransportState::Closed(reason));
        if let Some(mut c) = self.conn.lock().await.take() {
            let _ = c.stream.shutdown().await;
        }
        info!(target: "shelf", %reason, "transport closed");
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if let Some(task) = self.attempt.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
    }
}
