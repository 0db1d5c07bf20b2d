//! Root store and the single reducer entry point.
//!
//! Local HTTP successes and remote real-time events are both turned into a
//! [`StoreAction`] and applied here, so the two paths can never disagree.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use huddle_shared::models::{ActionableMessage, Chat, ChatMessage, LastMessage, User};
use huddle_shared::{ChatId, MessageId, UserId};

use crate::actionable::ActionableStore;
use crate::chats::ChatDirectory;
use crate::error::{Result, StoreError};
use crate::messages::MessageStore;
use crate::reply::{ReplyDraft, ReplyDraftStore};
use crate::session::SessionStore;
use crate::ui::UiFlags;

/// How a chat's last-message summary reacts to a new message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryPolicy {
    /// Every new message becomes the summary, in receipt order.
    #[default]
    Receipt,
    /// A message older (by `createdAt`) than the current summary does not
    /// replace it. Messages without a timestamp fall back to receipt order.
    Causal,
}

/// Every mutation the store knows about.
#[derive(Debug, Clone)]
pub enum StoreAction {
    SignedIn(User),
    /// Logout: every sub-store goes back to its initial state.
    SignedOut,
    /// A user's profile changed. Patches them in every chat, and the session
    /// profile too when it is us.
    ProfileUpdated(User),

    ChatsReplaced(Vec<Chat>),
    ChatAdded(Chat),
    MembersAdded { chat_id: ChatId, users: Vec<User> },
    MemberRemoved { chat_id: ChatId, user_id: UserId },
    /// Group deleted, or we left it.
    ChatRemoved(ChatId),
    ChatBlocked { chat_id: ChatId, blocked_by: UserId },
    ChatUnblocked(ChatId),
    GroupImageChanged { chat_id: ChatId, url: String },

    MessagesLoaded { chat_id: ChatId, messages: Vec<ChatMessage> },
    MessageReceived(ChatMessage),
    MessageDeleted { chat_id: ChatId, message_id: MessageId },

    ActionablesReplaced(Vec<ActionableMessage>),
    ActionableReceived(ActionableMessage),
    ActionableRemoved(MessageId),

    ReplyDrafted(ReplyDraft),
    ReplyCleared,

    ChatSelected(Option<ChatId>),
    CreateChatModalToggled(bool),
    ImageUploadToggled(bool),
    ChatRefetchRequested,
}

/// What applying an action did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Changed,
    /// The action was valid but the store already reflected it.
    Unchanged,
    /// The store cannot apply the action locally and has flagged the chat
    /// directory for a full refetch instead.
    RefetchRequested,
}

impl Applied {
    fn changed_if(changed: bool) -> Self {
        if changed {
            Self::Changed
        } else {
            Self::Unchanged
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppStore {
    pub session: SessionStore,
    pub chats: ChatDirectory,
    pub messages: MessageStore,
    pub actionables: ActionableStore,
    pub reply: ReplyDraftStore,
    pub ui: UiFlags,
    summary_policy: SummaryPolicy,
}

impl AppStore {
    pub fn new(summary_policy: SummaryPolicy) -> Self {
        Self {
            summary_policy,
            ..Self::default()
        }
    }

    pub fn summary_policy(&self) -> SummaryPolicy {
        self.summary_policy
    }

    pub fn me(&self) -> Option<&UserId> {
        self.session.user_id()
    }

    /// Apply one action. Errors leave the store untouched.
    pub fn apply(&mut self, action: StoreAction) -> Result<Applied> {
        match action {
            StoreAction::SignedIn(user) => {
                debug!(user = %user.id, "Signed in");
                self.session.set_user(user);
                Ok(Applied::Changed)
            }
            StoreAction::SignedOut => {
                let policy = self.summary_policy;
                *self = Self::new(policy);
                Ok(Applied::Changed)
            }
            StoreAction::ProfileUpdated(user) => {
                let touched = self.chats.patch_member_profile(&user);
                let is_me = self.session.is_me(&user.id);
                if is_me {
                    self.session.set_user(user);
                }
                Ok(Applied::changed_if(touched > 0 || is_me))
            }

            StoreAction::ChatsReplaced(chats) => {
                debug!(count = chats.len(), "Chat directory replaced");
                self.chats.replace_all(chats);
                Ok(Applied::Changed)
            }
            StoreAction::ChatAdded(chat) => Ok(Applied::changed_if(self.chats.append(chat))),
            StoreAction::MembersAdded { chat_id, users } => self.add_members(chat_id, users),
            StoreAction::MemberRemoved { chat_id, user_id } => {
                self.remove_member(&chat_id, &user_id)
            }
            StoreAction::ChatRemoved(chat_id) => Ok(Applied::changed_if(self.remove_chat(&chat_id))),
            StoreAction::ChatBlocked {
                chat_id,
                blocked_by,
            } => {
                self.chats.set_blocked(&chat_id, blocked_by)?;
                Ok(Applied::Changed)
            }
            StoreAction::ChatUnblocked(chat_id) => {
                self.chats.clear_blocked(&chat_id)?;
                Ok(Applied::Changed)
            }
            StoreAction::GroupImageChanged { chat_id, url } => {
                self.chats.patch_group_image(&chat_id, url)?;
                Ok(Applied::Changed)
            }

            StoreAction::MessagesLoaded { chat_id, messages } => {
                Ok(Applied::changed_if(self.messages.set_for_chat(chat_id, messages)))
            }
            StoreAction::MessageReceived(message) => self.record_new_message(message),
            StoreAction::MessageDeleted {
                chat_id,
                message_id,
            } => self.record_message_deletion(&chat_id, &message_id),

            StoreAction::ActionablesReplaced(messages) => {
                self.actionables.replace_all(messages);
                Ok(Applied::Changed)
            }
            StoreAction::ActionableReceived(message) => {
                Ok(Applied::changed_if(self.actionables.append_one(message)))
            }
            StoreAction::ActionableRemoved(id) => {
                Ok(Applied::changed_if(self.actionables.remove_one(&id).is_some()))
            }

            StoreAction::ReplyDrafted(draft) => {
                self.reply.set(draft);
                Ok(Applied::Changed)
            }
            StoreAction::ReplyCleared => {
                self.reply.clear();
                Ok(Applied::Changed)
            }

            StoreAction::ChatSelected(chat_id) => {
                if self.ui.active_chat != chat_id {
                    self.reply.clear();
                }
                self.ui.set_active_chat(chat_id);
                Ok(Applied::Changed)
            }
            StoreAction::CreateChatModalToggled(open) => {
                self.ui.set_show_create_chat_modal(open);
                Ok(Applied::Changed)
            }
            StoreAction::ImageUploadToggled(open) => {
                self.ui.set_image_upload_open(open);
                Ok(Applied::Changed)
            }
            StoreAction::ChatRefetchRequested => {
                self.ui.request_chat_refetch();
                Ok(Applied::RefetchRequested)
            }
        }
    }

    // ------------------------------------------------------------------
    // Composite reducers
    // ------------------------------------------------------------------

    /// If we are among the new members the chat may not be in our directory
    /// yet, so the whole directory is refetched instead.
    fn add_members(&mut self, chat_id: ChatId, users: Vec<User>) -> Result<Applied> {
        if let Some(me) = self.session.user_id() {
            if users.iter().any(|u| &u.id == me) {
                debug!(chat = %chat_id, "Added to a chat, requesting refetch");
                self.ui.request_chat_refetch();
                return Ok(Applied::RefetchRequested);
            }
        }
        let added = self.chats.add_members(&chat_id, users)?;
        Ok(Applied::changed_if(added > 0))
    }

    fn remove_member(&mut self, chat_id: &ChatId, user_id: &UserId) -> Result<Applied> {
        if self.session.is_me(user_id) {
            return Ok(Applied::changed_if(self.remove_chat(chat_id)));
        }
        let removed = self.chats.remove_member(chat_id, user_id)?;
        Ok(Applied::changed_if(removed))
    }

    fn remove_chat(&mut self, chat_id: &ChatId) -> bool {
        let removed = self.chats.remove(chat_id).is_some();
        if self.ui.clear_active_chat_if(chat_id) {
            self.reply.clear();
        }
        removed
    }

    /// Append to the owning chat and refresh the chat's summary. A chat whose
    /// history is not loaded yet buffers the message until it is.
    fn record_new_message(&mut self, message: ChatMessage) -> Result<Applied> {
        if !message.is_displayable() {
            warn!(message = %message.id, "Dropping message without content or attachment");
            return Err(StoreError::InvalidMessage(message.id));
        }

        let chat_id = message.chat_id.clone();
        let summary = LastMessage::of(&message);

        // An unloaded chat stays unloaded until its history request lands.
        let appended = if self.messages.is_loaded(&chat_id) {
            self.messages.append(&chat_id, message)
        } else {
            self.messages.buffer(&chat_id, message)
        };

        let Some(chat) = self.chats.get(&chat_id) else {
            debug!(chat = %chat_id, "Message for a chat not in the directory");
            return Ok(Applied::changed_if(appended));
        };

        if self.summary_policy == SummaryPolicy::Causal {
            if let (Some(current), Some(incoming)) = (
                chat.last_message.as_ref().and_then(|m| m.created_at),
                summary.created_at,
            ) {
                if incoming < current {
                    debug!(chat = %chat_id, message = %summary.id, "Older message, keeping summary");
                    return Ok(Applied::changed_if(appended));
                }
            }
        }

        self.chats.set_last_message(&chat_id, Some(summary))?;
        Ok(Applied::Changed)
    }

    /// Remove a message. Only when it was the summarized one does the summary
    /// move to the new tail, or clear if the loaded history is now empty.
    ///
    /// Without a loaded history the newest buffered message takes over. With
    /// nothing buffered either, the server holds the only record of the
    /// previous message, so the directory is refetched and the summary is
    /// left as it is until then.
    fn record_message_deletion(
        &mut self,
        chat_id: &ChatId,
        message_id: &MessageId,
    ) -> Result<Applied> {
        let removed = self.messages.remove(chat_id, message_id).is_some();

        let summarized = self
            .chats
            .get(chat_id)
            .and_then(|c| c.last_message.as_ref())
            .is_some_and(|m| &m.id == message_id);
        if !summarized {
            return Ok(Applied::changed_if(removed));
        }

        let promoted = if self.messages.is_loaded(chat_id) {
            self.messages.last(chat_id).map(LastMessage::of)
        } else if let Some(newest) = self.messages.pending(chat_id).last() {
            Some(LastMessage::of(newest))
        } else {
            debug!(chat = %chat_id, "Summarized message deleted before history load, requesting refetch");
            self.ui.request_chat_refetch();
            return Ok(Applied::RefetchRequested);
        };

        self.chats.set_last_message(chat_id, promoted)?;
        Ok(Applied::Changed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::chats::fixtures::{direct, group, user};
    use crate::messages::fixtures::message;

    fn signed_in_store() -> AppStore {
        let (me, bo, cy) = (user("me", "Me"), user("u2", "Bo"), user("u3", "Cy"));
        let mut store = AppStore::default();
        store.apply(StoreAction::SignedIn(me.clone())).unwrap();
        store
            .apply(StoreAction::ChatsReplaced(vec![
                group("c1", "Climbing", &[me.clone(), bo.clone(), cy]),
                direct("c2", &me, &bo),
            ]))
            .unwrap();
        store
    }

    fn summary_id(store: &AppStore, chat: &str) -> Option<String> {
        store
            .chats
            .get(&ChatId::new(chat))
            .and_then(|c| c.last_message.as_ref())
            .map(|m| m.id.to_string())
    }

    #[test]
    fn test_new_message_becomes_summary() {
        let mut store = signed_in_store();
        let c1 = ChatId::new("c1");
        store
            .chats
            .set_last_message(
                &c1,
                Some(LastMessage::of(&message("c1", "m0", "u2", "earlier"))),
            )
            .unwrap();

        let msg = message("c1", "m1", "u2", "hello");
        store.apply(StoreAction::MessageReceived(msg)).unwrap();

        let summary = store.chats.get(&c1).unwrap().last_message.clone().unwrap();
        assert_eq!(summary.id, MessageId::new("m1"));
        assert_eq!(summary.sender_name, "u2");
        assert_eq!(summary.content, "hello");
    }

    #[test]
    fn test_new_message_for_unloaded_chat_does_not_create_history() {
        let mut store = signed_in_store();
        let c1 = ChatId::new("c1");

        store
            .apply(StoreAction::MessageReceived(message("c1", "m1", "u2", "hi")))
            .unwrap();

        assert!(!store.messages.is_loaded(&c1));
        assert_eq!(summary_id(&store, "c1").as_deref(), Some("m1"));
    }

    #[test]
    fn test_message_received_during_history_load_is_kept() {
        let mut store = signed_in_store();
        let c1 = ChatId::new("c1");

        store
            .apply(StoreAction::MessageReceived(message("c1", "m2", "u2", "new")))
            .unwrap();
        store
            .apply(StoreAction::MessagesLoaded {
                chat_id: c1.clone(),
                messages: vec![message("c1", "m1", "u2", "old")],
            })
            .unwrap();

        let history: Vec<_> = store
            .messages
            .get(&c1)
            .unwrap()
            .iter()
            .map(|m| m.id.to_string())
            .collect();
        assert_eq!(history, vec!["m1", "m2"]);
        assert_eq!(summary_id(&store, "c1").as_deref(), Some("m2"));
    }

    #[test]
    fn test_deleting_summary_of_unloaded_chat_requests_refetch() {
        let mut store = signed_in_store();
        store.ui.take_chat_refetch();
        let c1 = ChatId::new("c1");
        store
            .chats
            .set_last_message(&c1, Some(LastMessage::of(&message("c1", "m1", "u2", "server"))))
            .unwrap();
        store
            .apply(StoreAction::MessageReceived(message("c1", "m2", "u2", "oops")))
            .unwrap();

        let applied = store
            .apply(StoreAction::MessageDeleted {
                chat_id: c1.clone(),
                message_id: MessageId::new("m2"),
            })
            .unwrap();

        assert_eq!(applied, Applied::RefetchRequested);
        assert!(!store.messages.is_loaded(&c1));
        assert_eq!(summary_id(&store, "c1").as_deref(), Some("m2"));
        assert!(store.ui.needs_chat_refetch());
    }

    #[test]
    fn test_deleting_summary_of_unloaded_chat_promotes_buffered() {
        let mut store = signed_in_store();
        store.ui.take_chat_refetch();
        let c1 = ChatId::new("c1");
        for id in ["m1", "m2"] {
            store
                .apply(StoreAction::MessageReceived(message("c1", id, "u2", id)))
                .unwrap();
        }

        let applied = store
            .apply(StoreAction::MessageDeleted {
                chat_id: c1,
                message_id: MessageId::new("m2"),
            })
            .unwrap();

        assert_eq!(applied, Applied::Changed);
        assert_eq!(summary_id(&store, "c1").as_deref(), Some("m1"));
        assert!(!store.ui.needs_chat_refetch());
    }

    #[test]
    fn test_blank_message_is_rejected() {
        let mut store = signed_in_store();
        let err = store
            .apply(StoreAction::MessageReceived(message("c1", "m1", "u2", "  ")))
            .unwrap_err();
        assert_eq!(err, StoreError::InvalidMessage(MessageId::new("m1")));
        assert_eq!(summary_id(&store, "c1"), None);
    }

    #[test]
    fn test_deleting_other_message_keeps_summary() {
        let mut store = signed_in_store();
        let c1 = ChatId::new("c1");
        store
            .apply(StoreAction::MessagesLoaded {
                chat_id: c1.clone(),
                messages: vec![message("c1", "m2", "u2", "older")],
            })
            .unwrap();
        store
            .apply(StoreAction::MessageReceived(message("c1", "m1", "u2", "newest")))
            .unwrap();

        store
            .apply(StoreAction::MessageDeleted {
                chat_id: c1.clone(),
                message_id: MessageId::new("m2"),
            })
            .unwrap();
        assert_eq!(summary_id(&store, "c1").as_deref(), Some("m1"));

        store
            .apply(StoreAction::MessageDeleted {
                chat_id: c1.clone(),
                message_id: MessageId::new("m1"),
            })
            .unwrap();
        assert_eq!(summary_id(&store, "c1"), None);
    }

    #[test]
    fn test_deleting_summarized_message_promotes_tail() {
        let mut store = signed_in_store();
        let c1 = ChatId::new("c1");
        store
            .apply(StoreAction::MessagesLoaded {
                chat_id: c1.clone(),
                messages: Vec::new(),
            })
            .unwrap();
        for (id, text) in [("m1", "one"), ("m2", "two"), ("m3", "three")] {
            store
                .apply(StoreAction::MessageReceived(message("c1", id, "u2", text)))
                .unwrap();
        }

        store
            .apply(StoreAction::MessageDeleted {
                chat_id: c1.clone(),
                message_id: MessageId::new("m3"),
            })
            .unwrap();

        let summary = store.chats.get(&c1).unwrap().last_message.clone().unwrap();
        assert_eq!(summary.id, MessageId::new("m2"));
        assert_eq!(summary.content, "two");
    }

    #[test]
    fn test_self_removal_drops_chat_and_selection() {
        for selected in [None, Some("c1"), Some("c2")] {
            let mut store = signed_in_store();
            store
                .apply(StoreAction::ChatSelected(selected.map(ChatId::new)))
                .unwrap();

            let applied = store
                .apply(StoreAction::MemberRemoved {
                    chat_id: ChatId::new("c1"),
                    user_id: UserId::new("me"),
                })
                .unwrap();

            assert_eq!(applied, Applied::Changed);
            assert!(!store.chats.contains(&ChatId::new("c1")));
            match selected {
                Some("c2") => assert_eq!(store.ui.active_chat, Some(ChatId::new("c2"))),
                _ => assert_eq!(store.ui.active_chat, None),
            }
        }
    }

    #[test]
    fn test_other_member_removal_keeps_chat() {
        let mut store = signed_in_store();
        store
            .apply(StoreAction::MemberRemoved {
                chat_id: ChatId::new("c1"),
                user_id: UserId::new("u3"),
            })
            .unwrap();
        assert_eq!(store.chats.get(&ChatId::new("c1")).unwrap().users.len(), 2);
    }

    #[test]
    fn test_being_added_requests_refetch() {
        let mut store = signed_in_store();
        store.ui.take_chat_refetch();

        let applied = store
            .apply(StoreAction::MembersAdded {
                chat_id: ChatId::new("c9"),
                users: vec![user("me", "Me"), user("u4", "Di")],
            })
            .unwrap();

        assert_eq!(applied, Applied::RefetchRequested);
        assert!(store.ui.needs_chat_refetch());
    }

    #[test]
    fn test_members_added_to_unknown_chat_is_an_error() {
        let mut store = signed_in_store();
        let err = store
            .apply(StoreAction::MembersAdded {
                chat_id: ChatId::new("c9"),
                users: vec![user("u4", "Di")],
            })
            .unwrap_err();
        assert_eq!(err, StoreError::ChatNotFound(ChatId::new("c9")));
    }

    #[test]
    fn test_group_removed_clears_reply_draft_of_active_chat() {
        let mut store = signed_in_store();
        store
            .apply(StoreAction::ChatSelected(Some(ChatId::new("c1"))))
            .unwrap();
        store
            .apply(StoreAction::ReplyDrafted(ReplyDraft::quoting(&message(
                "c1", "m1", "u2", "hi",
            ))))
            .unwrap();

        store
            .apply(StoreAction::ChatRemoved(ChatId::new("c1")))
            .unwrap();

        assert!(store.reply.current().is_none());
        assert_eq!(store.ui.active_chat, None);
    }

    #[test]
    fn test_switching_chat_drops_reply_draft() {
        let mut store = signed_in_store();
        store
            .apply(StoreAction::ChatSelected(Some(ChatId::new("c1"))))
            .unwrap();
        store
            .apply(StoreAction::ReplyDrafted(ReplyDraft::quoting(&message(
                "c1", "m1", "u2", "hi",
            ))))
            .unwrap();

        store
            .apply(StoreAction::ChatSelected(Some(ChatId::new("c1"))))
            .unwrap();
        assert!(store.reply.current().is_some());

        store
            .apply(StoreAction::ChatSelected(Some(ChatId::new("c2"))))
            .unwrap();
        assert!(store.reply.current().is_none());
    }

    #[test]
    fn test_profile_update_patches_session_and_members() {
        let mut store = signed_in_store();
        let mut me = user("me", "Me");
        me.photo_url = "https://img/me".into();

        store.apply(StoreAction::ProfileUpdated(me)).unwrap();

        assert_eq!(store.session.current().unwrap().photo_url, "https://img/me");
        for chat in store.chats.iter() {
            let member = chat.users.iter().find(|u| u.id.as_str() == "me").unwrap();
            assert_eq!(member.photo_url, "https://img/me");
        }
    }

    #[test]
    fn test_causal_policy_keeps_newer_summary() {
        let mut store = AppStore::new(SummaryPolicy::Causal);
        let (me, bo) = (user("me", "Me"), user("u2", "Bo"));
        store.apply(StoreAction::SignedIn(me.clone())).unwrap();
        store
            .apply(StoreAction::ChatAdded(direct("c2", &me, &bo)))
            .unwrap();

        let mut newer = message("c2", "m2", "u2", "later");
        newer.created_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 5, 0).unwrap());
        let mut older = message("c2", "m1", "u2", "earlier");
        older.created_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());

        store.apply(StoreAction::MessageReceived(newer)).unwrap();
        store.apply(StoreAction::MessageReceived(older)).unwrap();
        assert_eq!(summary_id(&store, "c2").as_deref(), Some("m2"));

        // Receipt order would have taken the late arrival.
        let mut receipt = AppStore::default();
        receipt.apply(StoreAction::SignedIn(me.clone())).unwrap();
        receipt
            .apply(StoreAction::ChatAdded(direct("c2", &me, &bo)))
            .unwrap();
        let mut newer = message("c2", "m2", "u2", "later");
        newer.created_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 5, 0).unwrap());
        let mut older = message("c2", "m1", "u2", "earlier");
        older.created_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
        receipt.apply(StoreAction::MessageReceived(newer)).unwrap();
        receipt.apply(StoreAction::MessageReceived(older)).unwrap();
        assert_eq!(summary_id(&receipt, "c2").as_deref(), Some("m1"));
    }

    #[test]
    fn test_sign_out_resets_everything() {
        let mut store = AppStore::new(SummaryPolicy::Causal);
        store.apply(StoreAction::SignedIn(user("me", "Me"))).unwrap();
        store
            .apply(StoreAction::ChatSelected(Some(ChatId::new("c1"))))
            .unwrap();

        store.apply(StoreAction::SignedOut).unwrap();

        assert!(store.session.current().is_none());
        assert!(store.chats.is_empty());
        assert_eq!(store.ui.active_chat, None);
        assert_eq!(store.summary_policy(), SummaryPolicy::Causal);
    }
}
