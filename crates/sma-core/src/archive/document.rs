//! In-memory archive document assembled from the filtered history.

use serde::Serialize;
use std::collections::HashSet;

use super::ArchiveLayout;
use crate::checksum::digest_path;
use crate::fetch::{FetchReport, FileRef};
use crate::history::{DateRange, HistoryRecord};
use crate::markup::{
    format_message_date, format_range_date, resolve_mentions, split_file_message, ts_to_datetime,
};
use crate::users::UserIndex;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveDocument {
    pub channel: String,
    pub from: String,
    pub to: String,
    pub messages: Vec<Message>,
    /// Messages carrying file metadata, downloaded or not.
    pub file_count: usize,
    pub files: Vec<FileEntry>,
}

impl ArchiveDocument {
    pub fn failed_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Failed { .. }))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: String,
    pub subtype: Option<String>,
    pub user: Option<String>,
    pub username: Option<String>,
    pub text: String,
    pub ts: String,
    pub formatted_date: String,
    pub profile_image: Option<String>,
    pub file: Option<MessageFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageFile {
    pub id: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub filetype: Option<String>,
    /// Relative to the XML file.
    pub path: String,
    pub label: String,
    /// False when the file had no download URL or its transfer failed.
    pub downloaded: bool,
}

/// One attachment the fetch phase attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub id: String,
    pub path: String,
    pub source_url: String,
    pub status: FileStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileStatus {
    Ok { bytes: u64, sha256: String },
    Failed { reason: String },
}

/// Builds the document from the filtered history and the finished fetch run.
/// `files` is the full list handed to the scheduler, in dispatch order.
pub fn build_document(
    channel: &str,
    range: &DateRange,
    records: &[HistoryRecord],
    users: &UserIndex,
    layout: &ArchiveLayout,
    files: &[FileRef],
    report: &FetchReport,
) -> ArchiveDocument {
    let entries: Vec<FileEntry> = files.iter().map(|f| file_entry(f, layout, report)).collect();
    let fetched: HashSet<&str> = entries
        .iter()
        .filter(|e| matches!(e.status, FileStatus::Ok { .. }))
        .map(|e| e.id.as_str())
        .collect();

    let messages: Vec<Message> = records
        .iter()
        .map(|r| message(r, users, layout, &fetched))
        .collect();
    let file_count = messages.iter().filter(|m| m.file.is_some()).count();

    ArchiveDocument {
        channel: channel.to_string(),
        from: format_range_date(&range.from),
        to: format_range_date(&range.to),
        messages,
        file_count,
        files: entries,
    }
}

fn message(
    record: &HistoryRecord,
    users: &UserIndex,
    layout: &ArchiveLayout,
    fetched: &HashSet<&str>,
) -> Message {
    let mut text = if record.kind == "message" {
        resolve_mentions(&record.text, users)
    } else {
        record.text.clone()
    };

    let file = record.file.as_ref().map(|meta| {
        let split = split_file_message(&text);
        text = split.text;
        let label = split
            .label
            .or_else(|| meta.title.clone())
            .or_else(|| meta.name.clone())
            .unwrap_or_else(|| meta.id.clone());
        MessageFile {
            id: meta.id.clone(),
            name: meta.name.clone(),
            title: meta.title.clone(),
            filetype: meta.filetype.clone(),
            path: layout.relative_file_path(&meta.archive_file_name()),
            label,
            downloaded: fetched.contains(meta.id.as_str()),
        }
    });

    let profile_image = record
        .user
        .as_deref()
        .and_then(|u| users.image_for(u))
        .map(str::to_string);

    Message {
        kind: record.kind.clone(),
        subtype: record.subtype.clone(),
        user: record.user.clone(),
        username: record.username.clone(),
        text,
        ts: format!("{:.6}", record.ts),
        formatted_date: ts_to_datetime(record.ts)
            .map(|dt| format_message_date(&dt))
            .unwrap_or_default(),
        profile_image,
        file,
    }
}

fn file_entry(file: &FileRef, layout: &ArchiveLayout, report: &FetchReport) -> FileEntry {
    let name = file
        .dest_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.id.clone());
    let status = match report.error_for(&file.id) {
        Some(err) => FileStatus::Failed {
            reason: err.to_string(),
        },
        None => match digest_path(&file.dest_path) {
            Ok(d) => FileStatus::Ok {
                bytes: d.bytes,
                sha256: d.sha256,
            },
            Err(e) => FileStatus::Failed {
                reason: format!("unreadable after download: {}", e),
            },
        },
    };
    FileEntry {
        id: file.id.clone(),
        path: layout.relative_file_path(&name),
        source_url: file.source_url.clone(),
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use crate::history::{collect_file_refs, parse_history};
    use crate::users::User;

    const HISTORY: &str = r#"[
        {"type": "message", "user": "U1", "text": "hey <@U2>", "ts": "1473447840.000200"},
        {"type": "message", "subtype": "file_share", "user": "U2",
         "text": "<@U2|bob> uploaded a file: <https://t.slack.com/files/bob/F1/cat.png|Cat pic>",
         "ts": "1473447900.000000",
         "file": {"id": "F1", "name": "cat.png", "title": "cat", "filetype": "png",
                  "url_private_download": "https://files/F1"}},
        {"type": "message", "user": "U1", "text": "shared", "ts": "1473448000.000000",
         "file": {"id": "F2", "name": "notes.txt", "filetype": "txt",
                  "url_private_download": "https://files/F2"}},
        {"type": "message", "user": "U1", "text": "link-less", "ts": "1473448100.000000",
         "file": {"id": "F3", "title": "Doc", "filetype": "pdf"}}
    ]"#;

    fn users() -> UserIndex {
        UserIndex::new(vec![
            User {
                id: "U1".into(),
                name: "alice".into(),
                real_name: None,
                image: Some("https://img/a.png".into()),
            },
            User {
                id: "U2".into(),
                name: "bob".into(),
                real_name: None,
                image: None,
            },
        ])
    }

    #[test]
    fn builds_messages_and_file_index() {
        let out = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::in_dir(out.path(), "archive_general");
        layout.create_dirs().unwrap();
        let records = parse_history(HISTORY).unwrap();
        let files = collect_file_refs(&records, &layout.files_dir());
        assert_eq!(files.len(), 2);
        std::fs::write(&files[0].dest_path, b"abc").unwrap();

        let mut report = FetchReport {
            completed: 2,
            ..FetchReport::default()
        };
        report.written.insert("F1".into(), 3);
        report.failures.insert("F2".into(), FetchError::Http(403));

        let doc = build_document(
            "general",
            &DateRange::default(),
            &records,
            &users(),
            &layout,
            &files,
            &report,
        );

        assert_eq!(doc.messages.len(), 4);
        assert_eq!(doc.file_count, 3);
        assert_eq!(doc.failed_files(), 1);
        assert_eq!(doc.from, "Thursday, January 1st 1970, 12:00 am");

        let first = &doc.messages[0];
        assert_eq!(first.text, "hey @bob");
        assert_eq!(first.profile_image.as_deref(), Some("https://img/a.png"));
        assert_eq!(first.formatted_date, "September 9th 2016, 7:04 pm");

        let share = doc.messages[1].file.as_ref().unwrap();
        assert_eq!(doc.messages[1].text, "@bob uploaded a file:  ");
        assert_eq!(share.label, "Cat pic");
        assert_eq!(share.path, "archive_general_files/files/F1.png");
        assert!(share.downloaded);

        let failed = doc.messages[2].file.as_ref().unwrap();
        assert_eq!(failed.label, "notes.txt");
        assert!(!failed.downloaded);

        let unlinked = doc.messages[3].file.as_ref().unwrap();
        assert_eq!(unlinked.label, "Doc");
        assert!(!unlinked.downloaded);

        assert_eq!(
            doc.files[0].status,
            FileStatus::Ok {
                bytes: 3,
                sha256: "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad".into()
            }
        );
        assert_eq!(
            doc.files[1].status,
            FileStatus::Failed {
                reason: "HTTP 403".into()
            }
        );
    }

    #[test]
    fn missing_file_without_error_is_reported_failed() {
        let out = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::in_dir(out.path(), "a");
        let file = FileRef::new("F9", "https://x/F9", layout.files_dir().join("F9.bin"));
        let entry = file_entry(&file, &layout, &FetchReport::default());
        assert!(matches!(entry.status, FileStatus::Failed { .. }));
        assert_eq!(entry.path, "a_files/files/F9.bin");
    }

    #[test]
    fn non_message_records_keep_raw_mentions() {
        let records =
            parse_history(r#"[{"type":"event","text":"<@U1> joined","ts":"1.0"}]"#).unwrap();
        let layout = ArchiveLayout::in_dir("/unused", "a");
        let doc = build_document(
            "c",
            &DateRange::default(),
            &records,
            &users(),
            &layout,
            &[],
            &FetchReport::default(),
        );
        assert_eq!(doc.messages[0].text, "<@U1> joined");
        assert_eq!(doc.file_count, 0);
        assert!(doc.files.is_empty());
    }
}
