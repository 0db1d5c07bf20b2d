//! Per-chat message lists.
//!
//! A chat with no key has not been fetched yet; an empty list means it was
//! fetched and holds nothing. Keys are never removed once created.
//!
//! Messages that arrive for a chat before its history does are held in a
//! pending buffer and folded in when the history is stored.

use std::collections::HashMap;

use huddle_shared::models::ChatMessage;
use huddle_shared::{ChatId, MessageId};

#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    by_chat: HashMap<ChatId, Vec<ChatMessage>>,
    pending: HashMap<ChatId, Vec<ChatMessage>>,
}

impl MessageStore {
    /// Populate a chat's history on first open. Buffered messages the
    /// fetched list does not already contain are appended after it. An
    /// already loaded chat is left alone; returns `true` if the list was
    /// stored.
    pub fn set_for_chat(&mut self, chat_id: ChatId, mut messages: Vec<ChatMessage>) -> bool {
        if self.by_chat.contains_key(&chat_id) {
            return false;
        }
        if let Some(buffered) = self.pending.remove(&chat_id) {
            for message in buffered {
                if !messages.iter().any(|m| m.id == message.id) {
                    messages.push(message);
                }
            }
        }
        self.by_chat.insert(chat_id, messages);
        true
    }

    /// Hold a message for a chat whose history has not been stored yet.
    /// Returns `true` if it was new to the buffer.
    pub fn buffer(&mut self, chat_id: &ChatId, message: ChatMessage) -> bool {
        let list = self.pending.entry(chat_id.clone()).or_default();
        match list.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => {
                *existing = message;
                false
            }
            None => {
                list.push(message);
                true
            }
        }
    }

    pub fn pending(&self, chat_id: &ChatId) -> &[ChatMessage] {
        self.pending.get(chat_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Push a message in receipt order. A message whose id is already in the
    /// list is replaced where it stands. Returns `true` if it was new.
    pub fn append(&mut self, chat_id: &ChatId, message: ChatMessage) -> bool {
        let list = self.by_chat.entry(chat_id.clone()).or_default();
        match list.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => {
                *existing = message;
                false
            }
            None => {
                list.push(message);
                true
            }
        }
    }

    /// Remove from the loaded history, or from the pending buffer while
    /// the history is not loaded.
    pub fn remove(&mut self, chat_id: &ChatId, message_id: &MessageId) -> Option<ChatMessage> {
        let list = match self.by_chat.get_mut(chat_id) {
            Some(list) => list,
            None => self.pending.get_mut(chat_id)?,
        };
        let idx = list.iter().position(|m| &m.id == message_id)?;
        Some(list.remove(idx))
    }

    pub fn is_loaded(&self, chat_id: &ChatId) -> bool {
        self.by_chat.contains_key(chat_id)
    }

    pub fn get(&self, chat_id: &ChatId) -> Option<&[ChatMessage]> {
        self.by_chat.get(chat_id).map(Vec::as_slice)
    }

    pub fn find(&self, chat_id: &ChatId, message_id: &MessageId) -> Option<&ChatMessage> {
        self.by_chat
            .get(chat_id)?
            .iter()
            .find(|m| &m.id == message_id)
    }

    pub fn last(&self, chat_id: &ChatId) -> Option<&ChatMessage> {
        self.by_chat.get(chat_id)?.last()
    }

    /// Conversation search over sender name and content, case-insensitive.
    pub fn search(&self, chat_id: &ChatId, query: &str) -> Vec<&ChatMessage> {
        let needle = query.to_lowercase();
        self.by_chat
            .get(chat_id)
            .map(|list| {
                list.iter()
                    .filter(|m| {
                        m.sender_name.to_lowercase().contains(&needle)
                            || m.content.to_lowercase().contains(&needle)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.by_chat.clear();
        self.pending.clear();
    }
}
