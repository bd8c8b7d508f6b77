use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Feed side ---

/// One item of a syndication feed, as fetched. Never persisted directly:
/// "already published" is derived from the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    /// External URL of the item. The dedup key.
    pub link: String,
    /// Rich-text (HTML) content. May be empty.
    pub content: String,
    /// Shorter description, used when `content` is empty.
    pub summary: String,
    /// Cover image URL, if the feed advertises one.
    pub image: Option<String>,
}

impl FeedItem {
    /// The HTML body to convert: content, falling back to the summary.
    pub fn body(&self) -> &str {
        if self.content.trim().is_empty() {
            &self.summary
        } else {
            &self.content
        }
    }
}

/// A fetched feed. Items are in document order, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub title: Option<String>,
    pub items: Vec<FeedItem>,
}

// --- Log side ---

/// Identifier the log assigns to an appended entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub i64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Opaque content-derived reference to a stored blob, e.g.
/// `&<base64 sha256>.sha256`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(pub String);

impl MediaRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A post entry. `root` is set only on thread replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub link: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<EntryId>,
}

/// Profile entry naming the identity that owns the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct About {
    pub about: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<MediaRef>,
}

/// One unit appended to the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entry {
    Post(Post),
    About(About),
}

impl Entry {
    pub fn kind(&self) -> &'static str {
        match self {
            Entry::Post(_) => "post",
            Entry::About(_) => "about",
        }
    }

    /// Origin link, for posts.
    pub fn link(&self) -> Option<&str> {
        match self {
            Entry::Post(post) => Some(&post.link),
            Entry::About(_) => None,
        }
    }

    /// Thread root this entry replies to, if any.
    pub fn root(&self) -> Option<EntryId> {
        match self {
            Entry::Post(post) => post.root,
            Entry::About(_) => None,
        }
    }
}

/// An entry as read back from the log, in append order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub id: EntryId,
    pub ts: DateTime<Utc>,
    pub author: String,
    pub entry: Entry,
}

// --- Composed messages ---

/// A post composed from a feed item. `text` may exceed the ceiling; the
/// publisher threads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostMessage {
    pub link: String,
    pub text: String,
}

/// Profile message published once per identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AboutMessage {
    pub about: String,
    pub name: String,
    pub image: Option<MediaRef>,
}

/// A message ready for publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Post(PostMessage),
    About(AboutMessage),
}

impl Message {
    /// Label used in logs: the link for posts, the name for about messages.
    pub fn label(&self) -> &str {
        match self {
            Message::Post(post) => &post.link,
            Message::About(about) => &about.name,
        }
    }
}

impl From<AboutMessage> for Entry {
    fn from(msg: AboutMessage) -> Self {
        Entry::About(About {
            about: msg.about,
            name: msg.name,
            image: msg.image,
        })
    }
}
