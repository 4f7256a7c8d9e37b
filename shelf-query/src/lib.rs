use std::fmt;

/// Shortest accepted query, counted in characters after normalisation.
pub const MIN_QUERY_CHARS: usize = 2;

/// A query that passed pre-flight validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
    text: String,
}

impl NormalizedQuery {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Number of whitespace-separated terms.
    pub fn term_count(&self) -> usize {
        self.text.split(' ').count()
    }
}

impl fmt::Display for NormalizedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    Empty,
    TooShort { min: usize, actual: usize },
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Empty => write!(f, "query is empty"),
            QueryError::TooShort { min, actual } => {
                write!(f, "query must be at least {min} characters (got {actual})")
            }
        }
    }
}

impl std::error::Error for QueryError {}

/// Normalize a raw query for dispatch.
/// - Leading/trailing whitespace is dropped.
/// - Runs of inner whitespace collapse to a single space.
/// - Length is counted in chars, not bytes, so "日本" passes.
pub fn normalize_query(input: &str) -> Result<NormalizedQuery, QueryError> {
    let text = input.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return Err(QueryError::Empty);
    }
    let actual = text.chars().count();
    if actual < MIN_QUERY_CHARS {
        return Err(QueryError::TooShort { min: MIN_QUERY_CHARS, actual });
    }
    Ok(NormalizedQuery { text })
}
