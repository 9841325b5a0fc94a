pub mod config;
pub mod logging;

pub mod archive;
pub mod checksum;
pub mod error;
pub mod fetch;
pub mod history;
pub mod markup;
pub mod pipeline;
pub mod users;

pub use error::ArchiveError;
pub use pipeline::{Archiver, SavePlan, SaveRequest};
