use std::fmt;
use std::str::FromStr;

#[cfg(feature = "json")]
use serde::{Deserialize, Serialize};

/// Search strategy. Each mode has its own wire id and per-minute quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "lowercase"))]
pub enum SearchMode {
    Text,
    Semantic,
}

impl SearchMode {
    pub const ALL: [SearchMode; 2] = [SearchMode::Text, SearchMode::Semantic];

    pub fn wire_id(self) -> &'static str {
        match self {
            SearchMode::Text => "text",
            SearchMode::Semantic => "semantic",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SearchMode::Text => "Keyword",
            SearchMode::Semantic => "AI Semantic",
        }
    }

    /// Calls permitted per rolling one-minute window.
    pub fn per_minute_quota(self) -> u32 {
        match self {
            SearchMode::Text => 100,
            SearchMode::Semantic => 5,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            SearchMode::Text => "Search by title, author or ISBN keywords",
            SearchMode::Semantic => "Describe what you want to read in natural language",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown search mode: {0}")]
pub struct UnknownMode(pub String);

impl FromStr for SearchMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        SearchMode::ALL
            .into_iter()
            .find(|m| m.wire_id().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}
