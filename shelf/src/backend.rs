use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use shelf_api::limits::{enforce_max_body_size, LimitError};
use shelf_api::SearchRequest;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("invalid backend configuration: {0}")]
    Config(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("request timed out")]
    Timeout,
    #[error("i/o error: {0}")]
    Io(String),
    #[error("reply rejected: {0}")]
    TooLarge(#[from] LimitError),
}

/// Raw reply from a search backend, before envelope decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendReply {
    pub status: u16,
    pub retry_after: Option<Duration>,
    pub body: Vec<u8>,
}

impl BackendReply {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self { status: 200, retry_after: None, body: body.into() }
    }

    pub fn is_throttled(&self) -> bool {
        self.status == 429
    }
}

/// Issues one search request and returns the raw body.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn execute(&self, request: &SearchRequest) -> Result<BackendReply, BackendError>;
}

/// `POST <base>/search` over HTTP(S).
#[derive(Clone)]
pub struct HttpSearchBackend {
    client: Client,
    endpoint: Url,
}

impl HttpSearchBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let mut base = Url::parse(base_url).map_err(|e| BackendError::Config(e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(BackendError::Config(format!("unsupported scheme: {}", base.scheme())));
        }
        // join() replaces the last segment unless the base ends with '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join("search").map_err(|e| BackendError::Config(e.to_string()))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn execute(&self, request: &SearchRequest) -> Result<BackendReply, BackendError> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(classify)?;
        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_retry_after(v, SystemTime::now()));
        if let Some(len) = resp.content_length() {
            enforce_max_body_size(usize::try_from(len).unwrap_or(usize::MAX))?;
        }
        let body = resp.bytes().await.map_err(classify)?;
        enforce_max_body_size(body.len())?;
        debug!(target: "shelf", status, bytes = body.len(), "backend replied");
        Ok(BackendReply { status, retry_after, body: body.to_vec() })
    }
}

fn classify(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else if e.is_connect() {
        BackendError::Connection(e.to_string())
    } else {
        warn!(target: "shelf", "backend request failed: {e}");
        BackendError::Io(e.to_string())
    }
}

/// `Retry-After` is either delta-seconds or an HTTP-date.
pub fn parse_retry_after(value: &str, now: SystemTime) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = httpdate::parse_http_date(value).ok()?;
    Some(at.duration_since(now).unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_accepts_seconds_and_dates() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(parse_retry_after(" 30 ", now), Some(Duration::from_secs(30)));
        let later = httpdate::fmt_http_date(now + Duration::from_secs(90));
        assert_eq!(parse_retry_after(&later, now), Some(Duration::from_secs(90)));
        let past = httpdate::fmt_http_date(now - Duration::from_secs(5));
        assert_eq!(parse_retry_after(&past, now), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("soon", now), None);
    }

    #[test]
    fn endpoint_appends_search_segment() {
        let b = HttpSearchBackend::new("https://api.example.org/v1", Duration::from_secs(1)).unwrap();
        assert_eq!(b.endpoint().as_str(), "https://api.example.org/v1/search");
        let b = HttpSearchBackend::new("http://127.0.0.1:8787/", Duration::from_secs(1)).unwrap();
        assert_eq!(b.endpoint().as_str(), "http://127.0.0.1:8787/search");
        assert!(HttpSearchBackend::new("ftp://x", Duration::from_secs(1)).is_err());
    }
}
