//! Task and event messages, kept apart from ordinary chat messages.

use huddle_shared::models::{ActionableKind, ActionableMessage};
use huddle_shared::MessageId;

#[derive(Debug, Clone, Default)]
pub struct ActionableStore {
    messages: Vec<ActionableMessage>,
}

impl ActionableStore {
    pub fn replace_all(&mut self, messages: Vec<ActionableMessage>) {
        self.messages = messages;
    }

    /// Add one message; an existing entry with the same id is replaced.
    pub fn append_one(&mut self, message: ActionableMessage) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => {
                *existing = message;
                false
            }
            None => {
                self.messages.push(message);
                true
            }
        }
    }

    pub fn remove_one(&mut self, id: &MessageId) -> Option<ActionableMessage> {
        let idx = self.messages.iter().position(|m| &m.id == id)?;
        Some(self.messages.remove(idx))
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|m| &m.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionableMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn by_kind(&self, kind: ActionableKind) -> Vec<&ActionableMessage> {
        self.messages.iter().filter(|m| m.kind == kind).collect()
    }

    /// Free-text search over title, description and targeted users' names,
    /// optionally restricted to one kind.
    pub fn search(&self, kind: Option<ActionableKind>, query: &str) -> Vec<&ActionableMessage> {
        let needle = query.trim().to_lowercase();
        self.messages
            .iter()
            .filter(|m| kind.map_or(true, |k| m.kind == k))
            .filter(|m| {
                let payload = &m.payload;
                payload.title.to_lowercase().contains(&needle)
                    || payload
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
                    || payload
                        .targeted_users
                        .iter()
                        .any(|u| u.name.to_lowercase().contains(&needle))
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
