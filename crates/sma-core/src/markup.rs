//! Slack markup rewrites and human-readable dates for the archive document.

use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::users::UserIndex;

fn mention_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<@([A-Z0-9]+)>").expect("valid mention regex"))
}

fn uploader_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^<@[A-Z0-9]+\|([^>]+)>").expect("valid uploader regex"))
}

fn file_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<https://[^|]+\|([^>]+)>").expect("valid link regex"))
}

/// Replaces every `<@UID>` with `@name`; unknown ids stay as they are.
pub fn resolve_mentions(text: &str, users: &UserIndex) -> String {
    mention_re()
        .replace_all(text, |caps: &regex::Captures<'_>| match users.get(&caps[1]) {
            Some(user) => format!("@{}", user.name),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Text and link label of a file-share message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMessage {
    pub text: String,
    pub label: Option<String>,
}

/// `<@U1|bob> uploaded a file: <https://...|Cat>` becomes
/// `@bob uploaded a file: ` with label `Cat`.
pub fn split_file_message(text: &str) -> FileMessage {
    let text = uploader_re().replace(text, "@$1");
    let label = file_link_re()
        .captures(&text)
        .map(|caps| caps[1].to_string());
    let mut text = file_link_re().replace(&text, "").into_owned();
    text.push(' ');
    FileMessage { text, label }
}

/// Seconds since epoch (Slack `ts`) to a UTC instant.
pub fn ts_to_datetime(ts: f64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis((ts * 1000.0).round() as i64)
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// `September 9th 2016, 7:04 pm`
pub fn format_message_date(dt: &DateTime<Utc>) -> String {
    format!(
        "{} {}{} {}",
        dt.format("%B"),
        dt.day(),
        ordinal_suffix(dt.day()),
        dt.format("%Y, %-I:%M %P")
    )
}

/// `Friday, September 9th 2016, 7:04 pm`
pub fn format_range_date(dt: &DateTime<Utc>) -> String {
    format!("{}, {}", dt.format("%A"), format_message_date(dt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::User;

    fn users() -> UserIndex {
        UserIndex::new(vec![
            User {
                id: "U07DYET08".into(),
                name: "swift2.0".into(),
                real_name: None,
                image: None,
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
    fn mentions_resolve_every_occurrence() {
        let out = resolve_mentions("<@U2> ping <@U07DYET08> and <@U2>", &users());
        assert_eq!(out, "@bob ping @swift2.0 and @bob");
    }

    #[test]
    fn unknown_mentions_are_kept() {
        assert_eq!(resolve_mentions("hi <@U999>", &users()), "hi <@U999>");
        assert_eq!(resolve_mentions("no mentions", &users()), "no mentions");
    }

    #[test]
    fn file_message_is_split_into_text_and_label() {
        let m = split_file_message(
            "<@U07DYET08|swift2.0> uploaded a file: <https://irclove.slack.com/files/swift2.0/F2A7BEMN2/pasted.png|You do know he's suspended all season right?>",
        );
        assert_eq!(m.text, "@swift2.0 uploaded a file:  ");
        assert_eq!(
            m.label.as_deref(),
            Some("You do know he's suspended all season right?")
        );
    }

    #[test]
    fn file_message_without_link_has_no_label() {
        let m = split_file_message("plain upload");
        assert_eq!(m.text, "plain upload ");
        assert!(m.label.is_none());
    }

    #[test]
    fn ordinals() {
        let cases = [(1, "st"), (2, "nd"), (3, "rd"), (4, "th"), (11, "th"), (12, "th"), (13, "th"), (21, "st"), (22, "nd"), (23, "rd"), (30, "th")];
        for (day, want) in cases {
            assert_eq!(ordinal_suffix(day), want, "day {}", day);
        }
    }

    #[test]
    fn dates_render_like_the_archive_stylesheet_expects() {
        let dt = ts_to_datetime(1_473_447_840.000_2).unwrap();
        assert_eq!(format_message_date(&dt), "September 9th 2016, 7:04 pm");
        assert_eq!(format_range_date(&dt), "Friday, September 9th 2016, 7:04 pm");
        let epoch = ts_to_datetime(0.0).unwrap();
        assert_eq!(format_range_date(&epoch), "Thursday, January 1st 1970, 12:00 am");
    }
}
