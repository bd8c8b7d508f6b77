use std::sync::Arc;

use tracing::info;

use rssplug_common::{Entry, EntryId, LogWriteError, Message, Post};

use crate::chunker::Chunker;
use crate::traits::EntryLog;

/// Entries written for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    /// The single entry, or the thread root.
    pub root: EntryId,
    /// Thread replies in order. Empty for a single entry.
    pub replies: Vec<EntryId>,
}

impl Published {
    pub fn is_thread(&self) -> bool {
        !self.replies.is_empty()
    }

    pub fn entries(&self) -> usize {
        1 + self.replies.len()
    }
}

/// Writes messages to the log, threading posts longer than the ceiling.
///
/// Entries of one message are appended strictly in order: root first, then
/// replies in chunk order, each reply pointing at the root. A failed append
/// stops the thread; entries already written stay in the log.
#[derive(Clone)]
pub struct ThreadPublisher {
    log: Arc<dyn EntryLog>,
    chunker: Chunker,
}

impl ThreadPublisher {
    pub fn new(log: Arc<dyn EntryLog>, chunker: Chunker) -> Self {
        Self { log, chunker }
    }

    pub async fn publish(&self, message: Message) -> Result<Published, LogWriteError> {
        let post = match message {
            Message::About(about) => {
                let root = self.log.append(&Entry::from(about)).await?;
                return Ok(Published {
                    root,
                    replies: Vec::new(),
                });
            }
            Message::Post(post) => post,
        };

        if self.chunker.fits(&post.text) {
            let root = self
                .log
                .append(&Entry::Post(Post {
                    link: post.link,
                    text: post.text,
                    root: None,
                }))
                .await?;
            return Ok(Published {
                root,
                replies: Vec::new(),
            });
        }

        let chunks = self.chunker.chunk(&post.text);
        info!(
            link = post.link.as_str(),
            bytes = post.text.len(),
            chunks = chunks.len(),
            "publish: content too long, posting as thread"
        );

        let (first, rest) = chunks
            .split_first()
            .ok_or_else(|| LogWriteError("chunker returned no chunks".into()))?;

        let root = self
            .log
            .append(&Entry::Post(Post {
                link: post.link.clone(),
                text: first.to_string(),
                root: None,
            }))
            .await?;

        let mut replies = Vec::with_capacity(rest.len());
        for chunk in rest {
            let reply = self
                .log
                .append(&Entry::Post(Post {
                    link: post.link.clone(),
                    text: chunk.to_string(),
                    root: Some(root),
                }))
                .await?;
            replies.push(reply);
        }

        Ok(Published { root, replies })
    }
}
