#[cfg(feature = "json")]
use serde::{Deserialize, Serialize};

use crate::mode::SearchMode;

/// One matched book. `relevance_score` is passed through exactly as the
/// backend reported it, even outside `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
pub struct SearchResult {
    pub id: String,
    #[cfg_attr(feature = "json", serde(default))]
    pub isbn: Option<String>,
    pub title: String,
    pub authors: Vec<String>,
    #[cfg_attr(feature = "json", serde(default))]
    pub cover_url: Option<String>,
    pub relevance_score: f64,
    pub match_type: String,
}

/// Success shape: `{results, total, mode, query, latency_ms}`.
/// `results.len()` may be smaller than `total` when the backend paginates.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
pub struct SearchResponseEnvelope {
    pub results: Vec<SearchResult>,
    pub total: u64,
    pub mode: SearchMode,
    pub query: String,
    pub latency_ms: u64,
}

/// Error shape, carried on the wire as `{"error": {code, message}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
pub struct SearchErrorEnvelope {
    pub code: String,
    pub message: String,
}

#[cfg(feature = "json")]
pub use self::decode::{decode_envelope, DecodeError, Envelope};

#[cfg(feature = "json")]
mod decode {
    use serde::Deserialize;
    use thiserror::Error;

    use super::{SearchErrorEnvelope, SearchResponseEnvelope};
    use crate::limits::{enforce_max_body_size, LimitError};

    /// A decoded response body: exactly one of the two shapes.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Envelope {
        Results(SearchResponseEnvelope),
        Error(SearchErrorEnvelope),
    }

    #[derive(Debug, Error, PartialEq, Eq)]
    pub enum DecodeError {
        #[error(transparent)]
        TooLarge(#[from] LimitError),
        #[error("body matches neither the result nor the error envelope: {0}")]
        Malformed(String),
    }

    #[derive(Deserialize)]
    struct ErrorWire {
        error: SearchErrorEnvelope,
    }

    /// Decode a response body, trying the result shape first and the error
    /// shape second. Unknown fields are ignored by both, so a valid result
    /// body that also carries an `error` key decodes as `Results`.
    pub fn decode_envelope(body: &[u8]) -> Result<Envelope, DecodeError> {
        enforce_max_body_size(body.len())?;
        let results_err = match serde_json::from_slice::<SearchResponseEnvelope>(body) {
            Ok(env) => return Ok(Envelope::Results(env)),
            Err(e) => e,
        };
        match serde_json::from_slice::<ErrorWire>(body) {
            Ok(wire) => Ok(Envelope::Error(wire.error)),
            Err(_) => Err(DecodeError::Malformed(results_err.to_string())),
        }
    }
}
