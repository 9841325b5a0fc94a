//! Bounded attachment fetch.
//!
//! Downloads every attachment of a run with a fixed-size pool of concurrent
//! transfers: the first `limit` files are dispatched at once, each completion
//! refills the pool from the pending queue, and a single terminal signal is
//! raised when the queue and the in-flight set are both empty.
//!
//! `state` holds the pure bookkeeping, `run` drives it on tokio and
//! `transfer` is the libcurl backend.

mod error;
mod run;
mod state;
mod transfer;

use std::path::PathBuf;

pub use error::FetchError;
pub use run::{FetchEvent, FetchReport, FetchScheduler};
pub use state::{FetchPhase, SchedulerState, StateError, Step};
pub use transfer::{part_path, CurlFetcher, TransferOptions};

/// One attachment to download: unique id within the run, source URL and
/// the path the transfer must write to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRef {
    pub id: String,
    pub source_url: String,
    pub dest_path: PathBuf,
}

impl FileRef {
    pub fn new(
        id: impl Into<String>,
        source_url: impl Into<String>,
        dest_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            source_url: source_url.into(),
            dest_path: dest_path.into(),
        }
    }
}

/// Performs one network-to-disk transfer.
///
/// Runs in the current thread; the scheduler calls it from tokio's blocking
/// pool. Returns the number of bytes written to `file.dest_path`. An `Err`
/// still counts as a completed fetch for scheduling purposes.
pub trait FetchExecutor: Send + Sync {
    fn fetch(&self, file: &FileRef) -> Result<u64, FetchError>;
}
