//! XML rendering of the archive document.
//!
//! Element names follow the layout the bundled stylesheet matches on:
//! `history/messages/message` with `file_path` and `file_label` on file
//! messages, plus a `files` index of every attempted download.

use std::borrow::Cow;
use std::fmt::Write as _;

use super::document::{ArchiveDocument, FileEntry, FileStatus, Message};

/// Escapes the five XML special characters and drops the control
/// characters XML 1.0 does not allow (everything below U+0020 except tab,
/// LF and CR).
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(|c: char| matches!(c, '&' | '<' | '>' | '"' | '\'') || is_forbidden(c)) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if is_forbidden(c) => {}
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn is_forbidden(c: char) -> bool {
    c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r')
}

struct XmlOut {
    buf: String,
    depth: usize,
}

impl XmlOut {
    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.buf.push_str("  ");
        }
    }

    fn open(&mut self, tag: &str) {
        self.indent();
        let _ = writeln!(self.buf, "<{}>", tag);
        self.depth += 1;
    }

    fn close(&mut self, tag: &str) {
        self.depth -= 1;
        self.indent();
        let _ = writeln!(self.buf, "</{}>", tag);
    }

    fn leaf(&mut self, tag: &str, value: &str) {
        self.indent();
        let _ = writeln!(self.buf, "<{0}>{1}</{0}>", tag, escape(value));
    }

    fn opt_leaf(&mut self, tag: &str, value: Option<&str>) {
        if let Some(v) = value {
            self.leaf(tag, v);
        }
    }
}

/// Full XML text: declaration, stylesheet instruction pointing at
/// `stylesheet_href`, then the `<history>` element.
pub fn render_document(doc: &ArchiveDocument, stylesheet_href: &str) -> String {
    let mut out = XmlOut {
        buf: String::new(),
        depth: 0,
    };
    let _ = writeln!(
        out.buf,
        r#"<?xml version="1.0" encoding="UTF-8" ?><?xml-stylesheet type="text/xsl" href="{}" ?>"#,
        escape(stylesheet_href)
    );
    out.open("history");
    out.leaf("channel", &doc.channel);
    out.leaf("from", &doc.from);
    out.leaf("to", &doc.to);
    out.open("messages");
    for m in &doc.messages {
        message(&mut out, m);
    }
    out.close("messages");
    out.leaf("fileCount", &doc.file_count.to_string());
    out.open("files");
    for f in &doc.files {
        file_entry(&mut out, f);
    }
    out.close("files");
    out.close("history");
    out.buf
}

fn message(out: &mut XmlOut, m: &Message) {
    out.open("message");
    out.leaf("type", &m.kind);
    out.opt_leaf("subtype", m.subtype.as_deref());
    out.opt_leaf("user", m.user.as_deref());
    out.opt_leaf("username", m.username.as_deref());
    out.leaf("text", &m.text);
    out.leaf("ts", &m.ts);
    out.leaf("formatted_date", &m.formatted_date);
    out.opt_leaf("profile_image", m.profile_image.as_deref());
    if let Some(f) = &m.file {
        out.open("file");
        out.leaf("id", &f.id);
        out.opt_leaf("name", f.name.as_deref());
        out.opt_leaf("title", f.title.as_deref());
        out.opt_leaf("filetype", f.filetype.as_deref());
        out.leaf("downloaded", if f.downloaded { "true" } else { "false" });
        out.close("file");
        out.leaf("file_path", &f.path);
        out.leaf("file_label", &f.label);
    }
    out.close("message");
}

fn file_entry(out: &mut XmlOut, f: &FileEntry) {
    out.open("file");
    out.leaf("id", &f.id);
    out.leaf("path", &f.path);
    out.leaf("source_url", &f.source_url);
    match &f.status {
        FileStatus::Ok { bytes, sha256 } => {
            out.leaf("status", "ok");
            out.leaf("bytes", &bytes.to_string());
            out.leaf("sha256", sha256);
        }
        FileStatus::Failed { reason } => {
            out.leaf("status", "failed");
            out.leaf("reason", reason);
        }
    }
    out.close("file");
}
