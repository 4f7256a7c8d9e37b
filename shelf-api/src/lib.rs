pub mod handshake;
pub mod limits;
pub mod mode;
pub mod request;
pub mod response;

pub use mode::SearchMode;
pub use request::SearchRequest;
pub use response::{SearchErrorEnvelope, SearchResponseEnvelope, SearchResult};

#[cfg(feature = "json")]
pub use response::{decode_envelope, DecodeError, Envelope};
