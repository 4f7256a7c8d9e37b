use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::transport::{CloseReason, Transport, TransportState};

/// Terminal result of one wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionOutcome {
    Ready,
    TimedOut,
    Cancelled,
    TransportError(String),
}

impl ConnectionOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionOutcome::Ready)
    }

    /// The reason a caller should pass to `close_with_reason` for this outcome.
    pub fn close_reason(&self) -> CloseReason {
        match self {
            ConnectionOutcome::Ready => CloseReason::Normal,
            ConnectionOutcome::TimedOut => CloseReason::Timeout,
            ConnectionOutcome::Cancelled => CloseReason::Cancelled,
            ConnectionOutcome::TransportError(_) => CloseReason::Error,
        }
    }

    pub fn into_result(self) -> Result<(), ConnectionError> {
        match self {
            ConnectionOutcome::Ready => Ok(()),
            ConnectionOutcome::TimedOut => Err(ConnectionError::Timeout),
            ConnectionOutcome::Cancelled => Err(ConnectionError::Cancelled),
            ConnectionOutcome::TransportError(d) => Err(ConnectionError::TransportFailure(d)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("timed out waiting for connection")]
    Timeout,
    #[error("wait cancelled")]
    Cancelled,
    #[error("transport failure: {0}")]
    TransportFailure(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("invalid wait configuration: {0}")]
    Configuration(String),
    #[error("connection wait already resolved as {0:?}")]
    AlreadyResolved(ConnectionOutcome),
}

/// Waits for one transport to become ready.
///
/// The first wait that runs to completion fixes the outcome; later waits fail
/// with `WaitError::AlreadyResolved`. The waiter never closes the transport:
/// callers close it on every path, using `ConnectionOutcome::close_reason`.
pub struct ConnectionWaiter<T> {
    transport: T,
    resolved: Option<ConnectionOutcome>,
}

impl<T: Transport> ConnectionWaiter<T> {
    pub fn new(transport: T) -> Self {
        Self { transport, resolved: None }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `None` while pending.
    pub fn outcome(&self) -> Option<&ConnectionOutcome> {
        self.resolved.as_ref()
    }

    pub async fn close_with_reason(&self, reason: CloseReason) {
        self.transport.close_with_reason(reason).await
    }

    /// Race readiness against `timeout_secs` and `cancel`.
    ///
    /// Priority when several triggers are ready at once: cancellation, then the
    /// transport's own state, then the timeout.
    pub async fn wait_for_connection(
        &mut self,
        timeout_secs: f64,
        cancel: &CancellationToken,
    ) -> Result<ConnectionOutcome, WaitError> {
        if let Some(prev) = &self.resolved {
            return Err(WaitError::AlreadyResolved(prev.clone()));
        }
        let timeout = validate_timeout(timeout_secs)?;

        let mut events = self.transport.subscribe();
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let outcome = loop {
            if cancel.is_cancelled() {
                break ConnectionOutcome::Cancelled;
            }
            let current = events.borrow_and_update().clone();
            match current {
                TransportState::Connecting => {}
                TransportState::Open => break ConnectionOutcome::Ready,
                TransportState::Failed(detail) => break ConnectionOutcome::TransportError(detail),
                TransportState::Closed(reason) => {
                    break ConnectionOutcome::TransportError(format!("closed before ready: {reason}"))
                }
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break ConnectionOutcome::Cancelled,
                changed = events.changed() => {
                    if changed.is_err() {
                        break ConnectionOutcome::TransportError("transport dropped".to_string());
                    }
                }
                _ = &mut deadline => break ConnectionOutcome::TimedOut,
            }
        };

        info!(target: "shelf", outcome = ?outcome, ?timeout, "connection wait settled");
        self.resolved = Some(outcome.clone());
        Ok(outcome)
    }
}

fn validate_timeout(secs: f64) -> Result<Duration, WaitError> {
    if !secs.is_finite() || secs <= 0.0 {
        debug!(target: "shelf", secs, "rejecting connection timeout");
        return Err(WaitError::Configuration(format!(
            "timeout must be a positive number of seconds, got {secs}"
        )));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| WaitError::Configuration(e.to_string()))
}
