//! Workspace user directory used to resolve mentions and avatars.
//!
//! `SlackUserDirectory` pages through `users.list` with the bearer token;
//! `StaticUserDirectory` serves a fixed list (offline exports, tests).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::fetch::TransferOptions;

/// Upper bound on `users.list` pages followed in one lookup.
const MAX_PAGES: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum UsersError {
    #[error("users.list request failed: {0}")]
    Curl(#[from] curl::Error),
    #[error("users.list returned HTTP {0}")]
    Http(u32),
    #[error("users.list error: {0}")]
    Api(String),
    #[error("users.list response is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub real_name: Option<String>,
    /// 32px avatar URL.
    pub image: Option<String>,
}

pub trait UserDirectory: Send + Sync {
    fn list_users(&self) -> Result<Vec<User>, UsersError>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticUserDirectory {
    users: Vec<User>,
}

impl StaticUserDirectory {
    pub fn new(users: Vec<User>) -> Self {
        Self { users }
    }
}

impl UserDirectory for StaticUserDirectory {
    fn list_users(&self) -> Result<Vec<User>, UsersError> {
        Ok(self.users.clone())
    }
}

#[derive(Debug, Clone)]
pub struct SlackUserDirectory {
    api_base: String,
    token: String,
    options: TransferOptions,
}

impl SlackUserDirectory {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>, options: TransferOptions) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            options,
        }
    }

    fn page_url(&self, cursor: Option<&str>) -> String {
        match cursor {
            Some(c) => format!(
                "{}/users.list?limit=200&cursor={}",
                self.api_base,
                url::form_urlencoded::byte_serialize(c.as_bytes()).collect::<String>()
            ),
            None => format!("{}/users.list?limit=200", self.api_base),
        }
    }

    fn get(&self, url: &str) -> Result<Vec<u8>, UsersError> {
        let mut body = Vec::new();
        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.connect_timeout(Duration::from_secs(self.options.connect_timeout_secs))?;
        easy.timeout(Duration::from_secs(self.options.timeout_secs))?;
        let mut list = curl::easy::List::new();
        list.append(&format!("Authorization: Bearer {}", self.token))?;
        easy.http_headers(list)?;
        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }
        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            return Err(UsersError::Http(code));
        }
        Ok(body)
    }
}

impl UserDirectory for SlackUserDirectory {
    fn list_users(&self) -> Result<Vec<User>, UsersError> {
        let mut users = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let body = self.get(&self.page_url(cursor.as_deref()))?;
            let (page, next) = parse_users_page(&body)?;
            users.extend(page);
            match next {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }
        tracing::debug!(count = users.len(), "loaded workspace users");
        Ok(users)
    }
}

#[derive(Debug, Deserialize)]
struct UsersPage {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    members: Vec<Member>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct Member {
    id: String,
    name: String,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    #[serde(default)]
    image_32: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Parses one `users.list` page; returns the users and the next cursor, if any.
pub fn parse_users_page(body: &[u8]) -> Result<(Vec<User>, Option<String>), UsersError> {
    let page: UsersPage = serde_json::from_slice(body)?;
    if !page.ok {
        return Err(UsersError::Api(
            page.error.unwrap_or_else(|| "unknown error".to_string()),
        ));
    }
    let users = page
        .members
        .into_iter()
        .map(|m| User {
            id: m.id,
            name: m.name,
            real_name: m.real_name,
            image: m.profile.and_then(|p| p.image_32),
        })
        .collect();
    let next = page
        .response_metadata
        .and_then(|r| r.next_cursor)
        .filter(|c| !c.is_empty());
    Ok((users, next))
}

/// Id and name lookups over the user list.
#[derive(Debug, Clone, Default)]
pub struct UserIndex {
    by_id: HashMap<String, User>,
    id_by_name: HashMap<String, String>,
}

impl UserIndex {
    pub fn new(users: Vec<User>) -> Self {
        let mut index = Self::default();
        for user in users {
            index.id_by_name.insert(user.name.clone(), user.id.clone());
            index.by_id.insert(user.id.clone(), user);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&User> {
        self.by_id.get(id)
    }

    /// Avatar for a message author given as user id or user name.
    pub fn image_for(&self, user: &str) -> Option<&str> {
        let found = self.by_id.get(user).or_else(|| {
            self.id_by_name
                .get(user)
                .and_then(|id| self.by_id.get(id))
        });
        found.and_then(|u| u.image.as_deref())
    }
}
