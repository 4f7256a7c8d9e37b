pub mod transport;
pub mod waiter;

pub use transport::{CloseReason, Connection, TcpTransport, Transport, TransportState};
pub use waiter::{ConnectionError, ConnectionOutcome, ConnectionWaiter, WaitError};
