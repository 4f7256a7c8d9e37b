use thiserror::Error;

/// Largest response body the client will attempt to decode.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024; // 2 MiB

/// Cap on the header block of an upgrade handshake response.
pub const MAX_HANDSHAKE_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LimitError {
    #[error("body too large: {actual} bytes (max {max})")]
    TooLarge { max: usize, actual: usize },
}

pub type LimitResult<T> = Result<T, LimitError>;

pub fn enforce_max_body_size(len: usize) -> LimitResult<()> {
    enforce_limit(len, MAX_BODY_BYTES)
}

pub fn enforce_limit(len: usize, max: usize) -> LimitResult<()> {
    if len > max {
        return Err(LimitError::TooLarge { max, actual: len });
    }
    Ok(())
}
