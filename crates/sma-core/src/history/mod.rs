//! Channel history: records, date filtering and attachment discovery.
//!
//! History arrives as the JSON array written by `slack-history-export`
//! (or any file in the same shape). Each record carries at most one file;
//! records whose file has a `url_private_download` yield one `FileRef`.

mod range;
mod source;

use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;
use std::path::Path;

use crate::fetch::FileRef;

pub use range::{parse_date, DateRange, DEFAULT_TO_SECS};
pub use source::{ExportCommandSource, HistorySource, JsonFileSource};

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history export command `{program}` failed: {reason}")]
    Command { program: String, reason: String },
    #[error("could not read history file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("history is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid date: {0} (expected YYYY-MM-DD or RFC 3339)")]
    InvalidDate(String),
}

/// One message as exported from the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub text: String,
    /// Seconds since epoch; Slack sends `"1473465873.000002"`.
    #[serde(deserialize_with = "de_ts")]
    pub ts: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileMeta>,
}

/// Attachment metadata carried by a file-share message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_private_download: Option<String>,
}

impl FileMeta {
    /// `{id}.{filetype}` as stored under the archive's `files/` folder.
    /// Always a single path component: separators and control characters in
    /// either part become `_`.
    pub fn archive_file_name(&self) -> String {
        let ext = self
            .filetype
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("bin");
        let name = format!("{}.{}", path_safe(&self.id), path_safe(ext));
        if name.starts_with('.') {
            format!("_{}", name)
        } else {
            name
        }
    }

    fn archive_file_name_is_verbatim(&self) -> bool {
        matches!(path_safe(&self.id), Cow::Borrowed(_)) && !self.id.starts_with('.')
    }

    /// Only files with a private download URL are fetched.
    pub fn download_url(&self) -> Option<&str> {
        self.url_private_download
            .as_deref()
            .filter(|u| !u.trim().is_empty())
    }
}

fn path_safe(part: &str) -> Cow<'_, str> {
    let unsafe_char = |c: char| c == '/' || c == '\\' || c.is_control();
    if part.contains(unsafe_char) {
        Cow::Owned(part.replace(unsafe_char, "_"))
    } else {
        Cow::Borrowed(part)
    }
}

fn de_ts<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Ts {
        Text(String),
        Number(f64),
    }
    match Ts::deserialize(deserializer)? {
        Ts::Number(n) => Ok(n),
        Ts::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid ts: {}", s))),
    }
}

pub fn parse_history(json: &str) -> Result<Vec<HistoryRecord>, HistoryError> {
    Ok(serde_json::from_str(json)?)
}

/// Keeps the records whose timestamp lies in `range`, preserving order.
pub fn filter_by_range(records: Vec<HistoryRecord>, range: &DateRange) -> Vec<HistoryRecord> {
    records
        .into_iter()
        .filter(|m| range.contains_ts(m.ts))
        .collect()
}

/// One `FileRef` per downloadable attachment, in discovery order, writing to
/// `files_dir/{id}.{filetype}`. Repeated file ids (the same file shared twice)
/// are fetched once.
pub fn collect_file_refs(records: &[HistoryRecord], files_dir: &Path) -> Vec<FileRef> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|m| m.file.as_ref())
        .filter_map(|f| f.download_url().map(|url| (f, url)))
        .filter(|(f, _)| seen.insert(f.id.clone()))
        .map(|(f, url)| {
            let name = f.archive_file_name();
            if !f.archive_file_name_is_verbatim() {
                tracing::warn!(id = %f.id, file = %name, "file id is not a plain file name; renamed");
            }
            FileRef::new(f.id.clone(), url, files_dir.join(name))
        })
        .collect()
}
