//! Per-file transfer error.

use std::fmt;

/// Error returned by a single attachment transfer. Recorded in the fetch
/// report and the archive file index; never stops the run.
#[derive(Debug)]
pub enum FetchError {
    /// Source URL did not parse.
    InvalidUrl(String),
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status.
    Http(u32),
    /// Disk write failed (temp file, rename, disk full).
    Storage(std::io::Error),
    /// The executor panicked; the file is treated as failed.
    Panicked(String),
    /// The task running the transfer ended without reporting back.
    Lost(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::InvalidUrl(reason) => write!(f, "invalid url: {}", reason),
            FetchError::Curl(e) => write!(f, "{}", e),
            FetchError::Http(code) => write!(f, "HTTP {}", code),
            FetchError::Storage(e) => write!(f, "storage: {}", e),
            FetchError::Panicked(msg) => write!(f, "executor panicked: {}", msg),
            FetchError::Lost(msg) => write!(f, "fetch task lost: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Curl(e) => Some(e),
            FetchError::Storage(e) => Some(e),
            FetchError::InvalidUrl(_)
            | FetchError::Http(_)
            | FetchError::Panicked(_)
            | FetchError::Lost(_) => None,
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        FetchError::Storage(e)
    }
}
