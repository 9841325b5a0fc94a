//! libcurl transfer backend.
//!
//! One GET per attachment with the workspace bearer token. The body is
//! streamed into `<dest>.part` and renamed onto `dest` only after a 2xx
//! response, so a failed transfer never leaves a truncated attachment behind.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{FetchError, FetchExecutor, FileRef};

/// Temporary file suffix used before the final rename.
pub const PART_SUFFIX: &str = ".part";

/// Curl timeouts for attachment transfers (`[transfer]` in config.toml).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferOptions {
    pub connect_timeout_secs: u64,
    /// Hard wall-clock limit per file.
    pub timeout_secs: u64,
    /// Abort when throughput stays below this many bytes/s ...
    pub low_speed_limit: u32,
    /// ... for this many seconds.
    pub low_speed_time_secs: u64,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            timeout_secs: 3600,
            low_speed_limit: 1024,
            low_speed_time_secs: 60,
        }
    }
}

/// Downloads attachments over HTTP(S) with libcurl.
#[derive(Debug, Clone)]
pub struct CurlFetcher {
    token: Option<String>,
    options: TransferOptions,
}

impl CurlFetcher {
    /// Sends `Authorization: Bearer <token>` with every request.
    pub fn new(token: impl Into<String>, options: TransferOptions) -> Self {
        Self {
            token: Some(token.into()),
            options,
        }
    }

    pub fn anonymous(options: TransferOptions) -> Self {
        Self {
            token: None,
            options,
        }
    }

    fn transfer(&self, url: &str, part: &Path) -> Result<u64, FetchError> {
        let mut out = File::create(part)?;
        let mut written = 0u64;
        let mut storage_error: Option<std::io::Error> = None;

        let mut easy = curl::easy::Easy::new();
        easy.url(url).map_err(FetchError::Curl)?;
        easy.follow_location(true).map_err(FetchError::Curl)?;
        easy.max_redirections(10).map_err(FetchError::Curl)?;
        easy.connect_timeout(Duration::from_secs(self.options.connect_timeout_secs))
            .map_err(FetchError::Curl)?;
        easy.low_speed_limit(self.options.low_speed_limit)
            .map_err(FetchError::Curl)?;
        easy.low_speed_time(Duration::from_secs(self.options.low_speed_time_secs))
            .map_err(FetchError::Curl)?;
        easy.timeout(Duration::from_secs(self.options.timeout_secs))
            .map_err(FetchError::Curl)?;

        if let Some(token) = &self.token {
            let mut list = curl::easy::List::new();
            list.append(&format!("Authorization: Bearer {}", token))
                .map_err(FetchError::Curl)?;
            easy.http_headers(list).map_err(FetchError::Curl)?;
        }

        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| match out.write_all(data) {
                    Ok(()) => {
                        written += data.len() as u64;
                        Ok(data.len())
                    }
                    Err(e) => {
                        storage_error = Some(e);
                        Ok(0) // abort transfer
                    }
                })
                .map_err(FetchError::Curl)?;
            transfer.perform()
        };
        if let Err(e) = performed {
            if e.is_write_error() {
                if let Some(io_err) = storage_error.take() {
                    return Err(FetchError::Storage(io_err));
                }
            }
            return Err(FetchError::Curl(e));
        }

        let code = easy.response_code().map_err(FetchError::Curl)?;
        if !(200..300).contains(&code) {
            return Err(FetchError::Http(code));
        }
        out.sync_all()?;
        Ok(written)
    }
}

impl FetchExecutor for CurlFetcher {
    fn fetch(&self, file: &FileRef) -> Result<u64, FetchError> {
        url::Url::parse(&file.source_url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        let part = part_path(&file.dest_path);
        match self.transfer(&file.source_url, &part) {
            Ok(written) => {
                fs::rename(&part, &file.dest_path)?;
                Ok(written)
            }
            Err(e) => {
                let _ = fs::remove_file(&part);
                Err(e)
            }
        }
    }
}

/// `photo.png` → `photo.png.part`.
pub fn part_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(PART_SUFFIX);
    PathBuf::from(o)
}
