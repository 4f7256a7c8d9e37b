#[cfg(feature = "json")]
use serde::Serialize;

use crate::mode::SearchMode;

/// Body of `POST <backend>/search`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub struct SearchRequest {
    pub query: String,
    pub mode: SearchMode,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, mode: SearchMode) -> Self {
        Self { query: query.into(), mode }
    }
}
