// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Conversation storage
//!
//! Append-only message log. `FileStore` keeps one JSON document per line under the
//! data directory and mirrors it in memory; `MemoryStore` is the same without the file.

use parking_lot::{Mutex, RwLock};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use toolbot_core::{ChatMessage, Sender};
use tracing::{info, warn};

pub const CHAT_LOG_FILE: &str = "chats.jsonl";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    OldestFirst,
    NewestFirst,
}

/// Selection over the log for one identity
#[derive(Debug, Clone)]
pub struct MessageQuery {
    pub user_id: String,
    pub sender: Option<Sender>,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl MessageQuery {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            sender: None,
            order: SortOrder::OldestFirst,
            limit: None,
        }
    }

    pub fn sender(mut self, sender: Sender) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.order = SortOrder::NewestFirst;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

pub trait ConversationStore: Send + Sync {
    fn append(&self, message: &ChatMessage) -> Result<(), StoreError>;

    fn query(&self, query: &MessageQuery) -> Result<Vec<ChatMessage>, StoreError>;
}

/// Apply a query to messages held in insertion order.
///
/// Ties on timestamp keep insertion order (reversed for newest-first).
fn select(messages: &[ChatMessage], query: &MessageQuery) -> Vec<ChatMessage> {
    let mut selected: Vec<ChatMessage> = messages
        .iter()
        .filter(|m| m.user_id == query.user_id)
        .filter(|m| query.sender.map_or(true, |sender| m.sender == sender))
        .cloned()
        .collect();

    match query.order {
        SortOrder::OldestFirst => selected.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
        SortOrder::NewestFirst => {
            selected.reverse();
            selected.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        }
    }

    if let Some(limit) = query.limit {
        selected.truncate(limit);
    }
    selected
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    messages: RwLock<Vec<ChatMessage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }
}

impl ConversationStore for MemoryStore {
    fn append(&self, message: &ChatMessage) -> Result<(), StoreError> {
        self.messages.write().push(message.clone());
        Ok(())
    }

    fn query(&self, query: &MessageQuery) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(select(&self.messages.read(), query))
    }
}

/// JSON-lines store backed by `<data_dir>/chats.jsonl`
pub struct FileStore {
    path: PathBuf,
    messages: RwLock<Vec<ChatMessage>>,
    writer: Mutex<File>,
}

impl FileStore {
    /// Open (or create) the log in `data_dir` and load existing messages.
    ///
    /// Lines that fail to parse are skipped with a warning.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(CHAT_LOG_FILE);

        let mut messages = Vec::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for (number, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ChatMessage>(&line) {
                    Ok(message) => messages.push(message),
                    Err(e) => warn!("Skipping unreadable line {} in {:?}: {}", number + 1, path, e),
                }
            }
        }

        let writer = OpenOptions::new().create(true).append(true).open(&path)?;
        info!("Loaded {} messages from {:?}", messages.len(), path);

        Ok(Self {
            path,
            messages: RwLock::new(messages),
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConversationStore for FileStore {
    fn append(&self, message: &ChatMessage) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');

        // Held across the in-memory push so file order matches memory order
        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        self.messages.write().push(message.clone());
        Ok(())
    }

    fn query(&self, query: &MessageQuery) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(select(&self.messages.read(), query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn message_at(user: &str, text: &str, sender: Sender, secs: i64) -> ChatMessage {
        let mut message = ChatMessage::new(user, text, sender);
        message.timestamp = Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs);
        message
    }

    #[test]
    fn test_select_filters_and_orders() {
        let store = MemoryStore::new();
        store.append(&message_at("a", "second", Sender::User, 2)).unwrap();
        store.append(&message_at("a", "first", Sender::User, 1)).unwrap();
        store.append(&message_at("a", "reply", Sender::Bot, 3)).unwrap();
        store.append(&message_at("b", "other", Sender::User, 0)).unwrap();

        let all: Vec<String> = store
            .query(&MessageQuery::for_user("a"))
            .unwrap()
            .into_iter()
            .map(|m| m.message)
            .collect();
        assert_eq!(all, vec!["first", "second", "reply"]);

        let latest_user: Vec<String> = store
            .query(&MessageQuery::for_user("a").sender(Sender::User).newest_first().limit(1))
            .unwrap()
            .into_iter()
            .map(|m| m.message)
            .collect();
        assert_eq!(latest_user, vec!["second"]);

        assert!(store.query(&MessageQuery::for_user("nobody")).unwrap().is_empty());
    }

    #[test]
    fn test_equal_timestamps_keep_insertion_order() {
        let store = MemoryStore::new();
        for text in ["one", "two", "three"] {
            store.append(&message_at("a", text, Sender::User, 5)).unwrap();
        }

        let newest: Vec<String> = store
            .query(&MessageQuery::for_user("a").newest_first())
            .unwrap()
            .into_iter()
            .map(|m| m.message)
            .collect();
        assert_eq!(newest, vec!["three", "two", "one"]);
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let stored = {
            let store = FileStore::open(dir.path()).unwrap();
            let message = message_at("anonymous", "hello", Sender::User, 0).with_conversation("c1");
            store.append(&message).unwrap();
            store.append(&message_at("anonymous", "<div>hi</div>", Sender::Bot, 1)).unwrap();
            message
        };

        let reopened = FileStore::open(dir.path()).unwrap();
        let messages = reopened.query(&MessageQuery::for_user("anonymous")).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], stored);
        assert_eq!(messages[1].sender, Sender::Bot);
    }

    #[test]
    fn test_file_store_skips_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.append(&message_at("a", "kept", Sender::User, 0)).unwrap();
        }

        let path = dir.path().join(CHAT_LOG_FILE);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.query(&MessageQuery::for_user("a")).unwrap().len(), 1);
        assert_eq!(store.path(), path.as_path());
    }
}
