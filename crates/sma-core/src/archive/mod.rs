//! Archive writer: folder layout, XML document, stylesheet and zip packaging.
//!
//! Runs once per save, after the fetch phase has finished. Everything here is
//! plain file I/O on the layout prepared before the fetch started.

mod document;
mod layout;
mod package;
mod stylesheet;
mod xml;

use serde::Serialize;
use std::path::PathBuf;

use crate::history::DateRange;

pub use document::{build_document, ArchiveDocument, FileEntry, FileStatus, Message, MessageFile};
pub use layout::{ArchiveLayout, SCRATCH_PREFIX};
pub use package::{zip_dir, PackageError};
pub use stylesheet::{Stylesheet, DEFAULT_XSL, DEFAULT_XSL_NAME};
pub use xml::{escape, render_document};

/// Channel name as used in file names: `#` stripped, surrounding space trimmed.
pub fn normalize_channel(channel: &str) -> String {
    channel.trim().replace('#', "")
}

/// `archive_{channel}` plus the date-range suffix.
pub fn archive_name(channel: &str, range: &DateRange) -> String {
    format!("archive_{}{}", normalize_channel(channel), range.filename_suffix())
}

/// What a successful save produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
    pub channel: String,
    pub from: String,
    pub to: String,
    /// Directory the XML (or zip) was written to.
    pub write_folder: PathBuf,
    /// `{archive_name}.xml`
    pub filename: String,
    pub messages: usize,
    /// Messages carrying a file.
    pub files: usize,
    /// Attachments whose download failed.
    pub failed_files: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_file: Option<String>,
}
