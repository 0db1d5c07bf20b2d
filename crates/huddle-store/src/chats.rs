//! The chat directory: every conversation the signed-in user takes part in.

use tracing::debug;

use huddle_shared::models::{Chat, LastMessage, User};
use huddle_shared::{ChatId, UserId};

use crate::error::{Result, StoreError};

/// Ordered collection of chats, in the order the server listed them
/// followed by chats appended since.
#[derive(Debug, Clone, Default)]
pub struct ChatDirectory {
    chats: Vec<Chat>,
}

impl ChatDirectory {
    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Overwrite the directory with the authoritative list from the server.
    pub fn replace_all(&mut self, chats: Vec<Chat>) {
        self.chats = chats;
    }

    /// Add a newly created chat. An entry with the same id is replaced in
    /// place, so a creation event arriving after the local append does not
    /// produce a second entry. Returns `true` if the chat was new.
    pub fn append(&mut self, chat: Chat) -> bool {
        match self.position(&chat.id) {
            Some(idx) => {
                debug!(chat = %chat.id, "Chat already present, replacing");
                self.chats[idx] = chat;
                false
            }
            None => {
                self.chats.push(chat);
                true
            }
        }
    }

    /// Append `new_users` to the chat's member list, skipping anyone who is
    /// already a member. Returns how many were added.
    pub fn add_members(&mut self, chat_id: &ChatId, new_users: Vec<User>) -> Result<usize> {
        let chat = self.get_mut(chat_id)?;
        let before = chat.users.len();
        for user in new_users {
            if !chat.has_member(&user.id) {
                chat.users.push(user);
            }
        }
        Ok(chat.users.len() - before)
    }

    /// Drop one member. Returns `true` if the user was a member.
    pub fn remove_member(&mut self, chat_id: &ChatId, user_id: &UserId) -> Result<bool> {
        let chat = self.get_mut(chat_id)?;
        let before = chat.users.len();
        chat.users.retain(|u| &u.id != user_id);
        Ok(chat.users.len() != before)
    }

    /// Remove a chat entirely.
    pub fn remove(&mut self, chat_id: &ChatId) -> Option<Chat> {
        self.position(chat_id).map(|idx| self.chats.remove(idx))
    }

    /// Record who blocked the chat. Overwrites any earlier blocker.
    pub fn set_blocked(&mut self, chat_id: &ChatId, blocked_by: UserId) -> Result<()> {
        self.get_mut(chat_id)?.blocked_by = Some(blocked_by);
        Ok(())
    }

    pub fn clear_blocked(&mut self, chat_id: &ChatId) -> Result<()> {
        self.get_mut(chat_id)?.blocked_by = None;
        Ok(())
    }

    /// Replace the member entry for `user.id` in every chat. Returns the
    /// number of chats touched.
    pub fn patch_member_profile(&mut self, user: &User) -> usize {
        let mut touched = 0;
        for chat in &mut self.chats {
            for member in chat.users.iter_mut().filter(|m| m.id == user.id) {
                *member = user.clone();
                touched += 1;
            }
        }
        touched
    }

    pub fn patch_group_image(&mut self, chat_id: &ChatId, url: String) -> Result<()> {
        self.get_mut(chat_id)?.group_image = url;
        Ok(())
    }

    pub fn set_last_message(
        &mut self,
        chat_id: &ChatId,
        summary: Option<LastMessage>,
    ) -> Result<()> {
        self.get_mut(chat_id)?.last_message = summary;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get(&self, chat_id: &ChatId) -> Option<&Chat> {
        self.chats.iter().find(|c| &c.id == chat_id)
    }

    pub fn contains(&self, chat_id: &ChatId) -> bool {
        self.position(chat_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chat> {
        self.chats.iter()
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    /// Chat-list search: groups whose name matches, then direct chats with a
    /// member whose name matches. Case-insensitive; an empty query returns
    /// every chat in that order.
    pub fn search(&self, query: &str) -> Vec<&Chat> {
        let needle = query.trim().to_lowercase();
        let groups = self
            .chats
            .iter()
            .filter(|c| c.is_group && c.group_name.to_lowercase().contains(&needle));
        let direct = self.chats.iter().filter(|c| {
            !c.is_group
                && c
                    .users
                    .iter()
                    .any(|u| u.name.to_lowercase().contains(&needle))
        });
        groups.chain(direct).collect()
    }

    /// Everyone we already share a direct chat with, excluding `me`.
    pub fn direct_contacts(&self, me: &UserId) -> Vec<&User> {
        self.chats
            .iter()
            .filter(|c| !c.is_group)
            .filter_map(|c| c.other_party(me))
            .collect()
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn position(&self, chat_id: &ChatId) -> Option<usize> {
        self.chats.iter().position(|c| &c.id == chat_id)
    }

    fn get_mut(&mut self, chat_id: &ChatId) -> Result<&mut Chat> {
        self.chats
            .iter_mut()
            .find(|c| &c.id == chat_id)
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.clone()))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use huddle_shared::models::{Chat, User};
    use huddle_shared::{ChatId, UserId};

    pub fn user(id: &str, name: &str) -> User {
        User {
            id: UserId::new(id),
            name: name.to_string(),
            email: format!("{id}@example.com"),
            photo_url: String::new(),
        }
    }

    pub fn group(id: &str, name: &str, members: &[User]) -> Chat {
        Chat {
            id: ChatId::new(id),
            admin: members[0].id.clone(),
            is_group: true,
            is_bot: false,
            group_name: name.to_string(),
            group_image: String::new(),
            users: members.to_vec(),
            blocked_by: None,
            last_message: None,
        }
    }

    pub fn direct(id: &str, a: &User, b: &User) -> Chat {
        Chat {
            id: ChatId::new(id),
            admin: a.id.clone(),
            is_group: false,
            is_bot: false,
            group_name: String::new(),
            group_image: String::new(),
            users: vec![a.clone(), b.clone()],
            blocked_by: None,
            last_message: None,
        }
    }
}
