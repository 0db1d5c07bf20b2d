//! User actions: validate, call the API, apply the response to the store,
//! then emit the matching event so other clients converge.
//!
//! Nothing touches the store before the HTTP call succeeds. An emit failure
//! after that point is logged and does not fail the action.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use huddle_shared::models::{
    ActionableKind, ActionableMessage, AnyMessage, Chat, ChatMessage, User,
};
use huddle_shared::protocol::OutboundEvent;
use huddle_shared::validation::{validate_actionable_files, validate_attachment_size};
use huddle_shared::{ChatId, MessageId, UserId, ValidationError};
use huddle_store::{AppStore, Applied, ReplyDraft, StoreAction};

use crate::api::{ActionableDraft, ApiClient, FileUpload, GroupSpec, TextMessage};
use crate::bridge::{Emitter, SharedStore};
use crate::error::{ClientError, Result};

/// What the user typed into the composer.
#[derive(Debug, Clone, Default)]
pub struct Compose {
    pub content: String,
    pub file: Option<FileUpload>,
}

/// A task or event as filled in by the user.
#[derive(Debug, Clone)]
pub struct NewActionable {
    pub kind: ActionableKind,
    pub title: String,
    pub description: Option<String>,
    pub targeted_users: Vec<UserId>,
    pub files: Vec<FileUpload>,
}

pub struct ChatClient {
    api: ApiClient,
    store: SharedStore,
    emitter: Arc<dyn Emitter>,
}

impl ChatClient {
    pub fn new(api: ApiClient, store: SharedStore, emitter: Arc<dyn Emitter>) -> Self {
        Self {
            api,
            store,
            emitter,
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    pub async fn load_profile(&self) -> Result<User> {
        let user = self.api.get_profile().await?;
        info!(user = %user.id, name = %user.name, "Profile loaded");
        self.apply(StoreAction::SignedIn(user.clone()))?;
        Ok(user)
    }

    pub async fn update_profile_image(&self, image: FileUpload) -> Result<User> {
        ensure_image(&image)?;
        self.me()?;
        let user = self.api.update_profile_image(image).await?;
        self.apply(StoreAction::ProfileUpdated(user.clone()))?;
        self.apply(StoreAction::ImageUploadToggled(false))?;
        self.fan_out(OutboundEvent::ProfileUpdate(user.clone()));
        Ok(user)
    }

    /// End the session server-side and reset every store. The caller tears
    /// down the event bridge.
    pub async fn logout(&self) -> Result<()> {
        self.api.logout().await?;
        self.apply(StoreAction::SignedOut)?;
        info!("Signed out");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Chat directory
    // ------------------------------------------------------------------

    pub async fn refresh_chats(&self) -> Result<usize> {
        let chats = self.api.list_chats().await?;
        let count = chats.len();
        self.with_store(|store| {
            store.ui.take_chat_refetch();
            store.apply(StoreAction::ChatsReplaced(chats))
        })??;
        debug!(count, "Chat directory refreshed");
        Ok(count)
    }

    /// Refetch the directory if anything flagged it stale. Returns whether a
    /// fetch happened.
    pub async fn sync_chats_if_needed(&self) -> Result<bool> {
        if !self.with_store(|store| store.ui.needs_chat_refetch())? {
            return Ok(false);
        }
        self.refresh_chats().await?;
        Ok(true)
    }

    /// Make `chat_id` the active chat, fetching its history on first open.
    pub async fn open_chat(&self, chat_id: &ChatId) -> Result<()> {
        let loaded = self.with_store(|store| store.messages.is_loaded(chat_id))?;
        if !loaded {
            let history = self.api.get_messages(chat_id).await?;
            let mut messages = Vec::with_capacity(history.len());
            let mut actionables = Vec::new();
            for message in history {
                match message {
                    AnyMessage::Chat(m) => messages.push(m),
                    AnyMessage::Actionable(m) => actionables.push(m),
                }
            }
            debug!(chat = %chat_id, messages = messages.len(), actionables = actionables.len(), "History loaded");
            self.with_store(|store| -> huddle_store::Result<()> {
                store.apply(StoreAction::MessagesLoaded {
                    chat_id: chat_id.clone(),
                    messages,
                })?;
                let merged = merge_chat_actionables(store, chat_id, actionables);
                store.apply(StoreAction::ActionablesReplaced(merged))?;
                Ok(())
            })??;
        }
        self.apply(StoreAction::ChatSelected(Some(chat_id.clone())))?;
        Ok(())
    }

    /// Users we have no direct chat with yet, for the new-chat picker.
    pub async fn connection_candidates(&self) -> Result<Vec<User>> {
        let users = self.api.list_users().await?;
        self.with_store(|store| connection_candidates(store, users))?
    }

    pub async fn create_direct_chat(&self, user: User) -> Result<Chat> {
        self.me()?;
        let users = vec![user];
        let chat = self.api.create_chat(&users, None).await?;
        self.with_store(|store| {
            store.apply(StoreAction::CreateChatModalToggled(false))?;
            store.apply(StoreAction::ChatAdded(chat.clone()))
        })??;
        info!(chat = %chat.id, "Direct chat created");
        self.fan_out(OutboundEvent::CreateChat {
            chat: chat.clone(),
            users,
        });
        Ok(chat)
    }

    pub async fn create_group(
        &self,
        name: &str,
        users: Vec<User>,
        image: Option<FileUpload>,
    ) -> Result<Chat> {
        if users.is_empty() {
            return Err(ValidationError::NoMembersSelected.into());
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingGroupName.into());
        }
        if let Some(image) = &image {
            ensure_image(image)?;
        }
        self.me()?;

        let group = GroupSpec {
            name: name.to_string(),
            image,
        };
        let chat = self.api.create_chat(&users, Some(group)).await?;
        self.with_store(|store| {
            store.apply(StoreAction::CreateChatModalToggled(false))?;
            store.apply(StoreAction::ChatAdded(chat.clone()))
        })??;
        info!(chat = %chat.id, members = users.len(), "Group created");
        self.fan_out(OutboundEvent::CreateChat {
            chat: chat.clone(),
            users,
        });
        Ok(chat)
    }

    pub async fn add_members(&self, chat_id: &ChatId, users: Vec<User>) -> Result<()> {
        if users.is_empty() {
            return Err(ValidationError::NoMembersSelected.into());
        }
        self.api.add_members(chat_id, &users).await?;
        self.apply(StoreAction::MembersAdded {
            chat_id: chat_id.clone(),
            users: users.clone(),
        })?;
        self.apply(StoreAction::CreateChatModalToggled(false))?;
        self.fan_out(OutboundEvent::AddUsersToGroup {
            chat_id: chat_id.clone(),
            users,
        });
        Ok(())
    }

    pub async fn remove_member(&self, chat_id: &ChatId, user_id: &UserId) -> Result<()> {
        self.api.remove_member(chat_id, user_id).await?;
        self.apply(StoreAction::MemberRemoved {
            chat_id: chat_id.clone(),
            user_id: user_id.clone(),
        })?;
        self.fan_out(OutboundEvent::RemoveUser {
            chat_id: chat_id.clone(),
            user_id: user_id.clone(),
        });
        Ok(())
    }

    pub async fn exit_group(&self, chat_id: &ChatId) -> Result<()> {
        let me = self.me()?;
        self.api.exit_chat(chat_id).await?;
        self.apply(StoreAction::MemberRemoved {
            chat_id: chat_id.clone(),
            user_id: me.clone(),
        })?;
        info!(chat = %chat_id, "Left group");
        self.fan_out(OutboundEvent::ExitGroup {
            chat_id: chat_id.clone(),
            user_id: me,
        });
        Ok(())
    }

    pub async fn delete_group(&self, chat_id: &ChatId) -> Result<()> {
        self.api.delete_chat(chat_id).await?;
        self.apply(StoreAction::ChatRemoved(chat_id.clone()))?;
        info!(chat = %chat_id, "Group deleted");
        self.fan_out(OutboundEvent::DeleteGroup {
            chat_id: chat_id.clone(),
        });
        Ok(())
    }

    pub async fn block(&self, chat_id: &ChatId) -> Result<()> {
        let me = self.me()?;
        self.api.toggle_block(chat_id).await?;
        self.apply(StoreAction::ChatBlocked {
            chat_id: chat_id.clone(),
            blocked_by: me.clone(),
        })?;
        self.fan_out(OutboundEvent::BlockUser {
            blocked_by: me,
            chat_id: chat_id.clone(),
        });
        Ok(())
    }

    pub async fn unblock(&self, chat_id: &ChatId) -> Result<()> {
        self.api.toggle_block(chat_id).await?;
        self.apply(StoreAction::ChatUnblocked(chat_id.clone()))?;
        self.fan_out(OutboundEvent::UnblockUser {
            chat_id: chat_id.clone(),
        });
        Ok(())
    }

    pub async fn update_group_image(&self, chat_id: &ChatId, image: FileUpload) -> Result<Chat> {
        ensure_image(&image)?;
        let chat = self.api.update_chat_image(chat_id, image).await?;
        self.apply(StoreAction::GroupImageChanged {
            chat_id: chat.id.clone(),
            url: chat.group_image.clone(),
        })?;
        self.apply(StoreAction::ImageUploadToggled(false))?;
        self.fan_out(OutboundEvent::UpdateChat(chat.clone()));
        Ok(chat)
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Send a message, quoting the pending reply draft if there is one. In a
    /// bot chat the assistant's answer is requested and recorded as well.
    pub async fn send_message(&self, chat_id: &ChatId, compose: Compose) -> Result<ChatMessage> {
        if compose.content.trim().is_empty() && compose.file.is_none() {
            return Err(ValidationError::EmptyMessage.into());
        }
        if let Some(file) = &compose.file {
            validate_attachment_size(file.len())?;
        }

        let (draft, is_bot) = self.with_store(|store| {
            (
                store.reply.current().cloned(),
                store.chats.get(chat_id).is_some_and(|c| c.is_bot),
            )
        })?;

        let sent = self
            .api
            .create_message(
                chat_id,
                TextMessage {
                    content: compose.content,
                    file: compose.file,
                    reply_to: draft.map(ReplyDraft::into_reply_to),
                },
            )
            .await?;
        let AnyMessage::Chat(message) = sent else {
            return Err(ClientError::UnexpectedResponse(
                "text message came back as actionable".into(),
            ));
        };

        self.with_store(|store| {
            store.apply(StoreAction::ReplyCleared)?;
            store.apply(StoreAction::MessageReceived(message.clone()))
        })??;
        debug!(chat = %chat_id, message = %message.id, "Message sent");
        self.fan_out(OutboundEvent::NewMessage(message.clone()));

        if is_bot {
            match self.api.bot_reply(chat_id, &message.content).await {
                Ok(answer) => {
                    self.apply(StoreAction::MessageReceived(answer))?;
                }
                Err(e) => warn!(chat = %chat_id, error = %e, "Bot reply failed"),
            }
        }

        Ok(message)
    }

    pub async fn send_actionable(
        &self,
        chat_id: &ChatId,
        actionable: NewActionable,
    ) -> Result<ActionableMessage> {
        if actionable.title.trim().is_empty() || actionable.targeted_users.is_empty() {
            return Err(ValidationError::IncompleteActionable.into());
        }
        validate_actionable_files(actionable.files.len())?;
        for file in &actionable.files {
            validate_attachment_size(file.len())?;
        }

        let draft = ActionableDraft {
            kind: actionable.kind,
            title: actionable.title,
            description: actionable.description.filter(|d| !d.trim().is_empty()),
            targeted_users: actionable.targeted_users,
            files: actionable.files,
        };
        let AnyMessage::Actionable(message) = self.api.create_actionable(chat_id, draft).await?
        else {
            return Err(ClientError::UnexpectedResponse(
                "actionable message came back as plain".into(),
            ));
        };

        self.apply(StoreAction::ActionableReceived(message.clone()))?;
        info!(chat = %chat_id, kind = message.kind.as_str(), "Actionable message sent");
        self.fan_out(OutboundEvent::NewActionableMessage(message.clone()));
        Ok(message)
    }

    pub async fn delete_message(&self, chat_id: &ChatId, message_id: &MessageId) -> Result<()> {
        self.api.delete_message(message_id).await?;
        let applied = self.with_store(|store| {
            let action = deletion_action(store, chat_id, message_id);
            store.apply(action)
        })??;
        if applied == Applied::RefetchRequested {
            if let Err(e) = self.refresh_chats().await {
                warn!(chat = %chat_id, error = %e, "Chat refresh after delete failed");
            }
        }
        self.fan_out(OutboundEvent::DeleteMessage {
            message_id: message_id.clone(),
            chat_id: chat_id.clone(),
        });
        Ok(())
    }

    /// Quote a loaded message in the next reply.
    pub fn set_reply(&self, chat_id: &ChatId, message_id: &MessageId) -> Result<()> {
        self.with_store(|store| {
            let message = store
                .messages
                .find(chat_id, message_id)
                .ok_or_else(|| huddle_store::StoreError::InvalidMessage(message_id.clone()))?;
            store.apply(StoreAction::ReplyDrafted(ReplyDraft::quoting(message)))
        })??;
        Ok(())
    }

    pub fn clear_reply(&self) -> Result<()> {
        self.apply(StoreAction::ReplyCleared)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn with_store<R>(&self, f: impl FnOnce(&mut AppStore) -> R) -> Result<R> {
        let mut guard = self.store.lock().map_err(|_| ClientError::LockPoisoned)?;
        Ok(f(&mut guard))
    }

    fn apply(&self, action: StoreAction) -> Result<Applied> {
        Ok(self.with_store(|store| store.apply(action))??)
    }

    fn me(&self) -> Result<UserId> {
        self.with_store(|store| store.me().cloned())?
            .ok_or(ClientError::NotSignedIn)
    }

    fn fan_out(&self, event: OutboundEvent) {
        let name = event.name();
        if let Err(e) = self.emitter.emit(event) {
            warn!(event = name, error = %e, "Emit failed, other clients will catch up on refetch");
        }
    }
}

fn ensure_image(file: &FileUpload) -> Result<()> {
    if !file.is_image() {
        return Err(ValidationError::NotAnImage.into());
    }
    validate_attachment_size(file.len())?;
    Ok(())
}

/// The fetched history is authoritative for its own chat; actionables of
/// other chats are kept as they are.
fn merge_chat_actionables(
    store: &AppStore,
    chat_id: &ChatId,
    fetched: Vec<ActionableMessage>,
) -> Vec<ActionableMessage> {
    store
        .actionables
        .iter()
        .filter(|m| &m.chat_id != chat_id)
        .cloned()
        .chain(fetched)
        .collect()
}

/// Message ids are shared by both kinds, so the store decides which list
/// the deleted id belongs to.
fn deletion_action(store: &AppStore, chat_id: &ChatId, message_id: &MessageId) -> StoreAction {
    if store.actionables.contains(message_id) {
        StoreAction::ActionableRemoved(message_id.clone())
    } else {
        StoreAction::MessageDeleted {
            chat_id: chat_id.clone(),
            message_id: message_id.clone(),
        }
    }
}

/// Everyone except us and the people we already have a direct chat with.
fn connection_candidates(store: &AppStore, users: Vec<User>) -> Result<Vec<User>> {
    let me = store.me().ok_or(ClientError::NotSignedIn)?;
    let existing: HashSet<&UserId> = store
        .chats
        .direct_contacts(me)
        .into_iter()
        .map(|u| &u.id)
        .collect();
    Ok(users
        .into_iter()
        .filter(|u| &u.id != me && !existing.contains(&u.id))
        .collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::config::ClientConfig;

    #[derive(Default)]
    struct RecordingEmitter {
        events: Mutex<Vec<OutboundEvent>>,
    }

    impl Emitter for RecordingEmitter {
        fn emit(&self, event: OutboundEvent) -> Result<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    fn user(id: &str, name: &str) -> User {
        serde_json::from_value(json!({ "_id": id, "name": name })).unwrap()
    }

    fn direct(id: &str, a: &str, b: &str) -> Chat {
        serde_json::from_value(json!({
            "_id": id,
            "admin": a,
            "isGroup": false,
            "users": [{ "_id": a, "name": a }, { "_id": b, "name": b }]
        }))
        .unwrap()
    }

    fn actionable(id: &str, chat: &str) -> ActionableMessage {
        serde_json::from_value(json!({
            "_id": id,
            "senderId": { "_id": "u2", "name": "Bo" },
            "chatId": chat,
            "type": "task",
            "payload": { "title": id, "targetedUsers": [{ "_id": "me", "name": "Me" }] },
            "createdAt": "2024-05-01T10:00:00Z",
            "updatedAt": "2024-05-01T10:00:00Z"
        }))
        .unwrap()
    }

    /// A client whose API points at a closed local port.
    fn offline_client(signed_in: bool) -> (ChatClient, Arc<RecordingEmitter>) {
        let config = ClientConfig {
            base_url: "http://127.0.0.1:9/api/".into(),
            ..ClientConfig::default()
        };
        let api = ApiClient::new(&config).unwrap();
        let mut store = AppStore::default();
        if signed_in {
            store.apply(StoreAction::SignedIn(user("me", "Me"))).unwrap();
            store
                .apply(StoreAction::ChatsReplaced(vec![direct("c1", "me", "u2")]))
                .unwrap();
        }
        let emitter = Arc::new(RecordingEmitter::default());
        let client = ChatClient::new(api, Arc::new(Mutex::new(store)), emitter.clone());
        (client, emitter)
    }

    fn validation(err: ClientError) -> ValidationError {
        match err {
            ClientError::Validation(e) => e,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_message_is_refused() {
        let (client, emitter) = offline_client(true);
        let err = client
            .send_message(&ChatId::new("c1"), Compose { content: "   ".into(), file: None })
            .await
            .unwrap_err();
        assert_eq!(validation(err), ValidationError::EmptyMessage);
        assert!(emitter.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_group_needs_members_then_name() {
        let (client, _) = offline_client(true);

        let err = client.create_group("Climbing", Vec::new(), None).await.unwrap_err();
        assert_eq!(validation(err), ValidationError::NoMembersSelected);

        let err = client
            .create_group("  ", vec![user("u2", "Bo")], None)
            .await
            .unwrap_err();
        assert_eq!(validation(err), ValidationError::MissingGroupName);

        let pdf = FileUpload::new("plan.pdf", "application/pdf", vec![0; 4]);
        let err = client
            .create_group("Climbing", vec![user("u2", "Bo")], Some(pdf))
            .await
            .unwrap_err();
        assert_eq!(validation(err), ValidationError::NotAnImage);
    }

    #[tokio::test]
    async fn test_actionable_validation() {
        let (client, _) = offline_client(true);
        let base = NewActionable {
            kind: ActionableKind::Task,
            title: "Ship it".into(),
            description: None,
            targeted_users: vec![UserId::new("u2")],
            files: Vec::new(),
        };

        let err = client
            .send_actionable(
                &ChatId::new("c1"),
                NewActionable {
                    targeted_users: Vec::new(),
                    ..base.clone()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(validation(err), ValidationError::IncompleteActionable);

        let files = (0..6)
            .map(|i| FileUpload::new(format!("f{i}.txt"), "text/plain", vec![1]))
            .collect();
        let err = client
            .send_actionable(&ChatId::new("c1"), NewActionable { files, ..base })
            .await
            .unwrap_err();
        assert_eq!(validation(err), ValidationError::TooManyFiles { max: 5 });
    }

    #[tokio::test]
    async fn test_actions_needing_identity_fail_when_signed_out() {
        let (client, _) = offline_client(false);
        let err = client.exit_group(&ChatId::new("c1")).await.unwrap_err();
        assert!(matches!(err, ClientError::NotSignedIn));
        let err = client.block(&ChatId::new("c1")).await.unwrap_err();
        assert!(matches!(err, ClientError::NotSignedIn));
    }

    #[tokio::test]
    async fn test_failed_request_leaves_store_untouched() {
        let (client, emitter) = offline_client(true);
        let err = client.delete_group(&ChatId::new("c1")).await.unwrap_err();
        assert!(matches!(err, ClientError::Http(_)));
        assert_eq!(err.notice(), "Something went wrong");

        assert!(client.store().lock().unwrap().chats.contains(&ChatId::new("c1")));
        assert!(emitter.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_reply_draft_from_loaded_message() {
        let (client, _) = offline_client(true);
        let c1 = ChatId::new("c1");
        let message: ChatMessage = serde_json::from_value(json!({
            "_id": "m1",
            "senderId": { "_id": "u2", "name": "Bo" },
            "chatId": "c1",
            "name": "Bo",
            "content": "see you at 6"
        }))
        .unwrap();
        client
            .store()
            .lock()
            .unwrap()
            .apply(StoreAction::MessagesLoaded {
                chat_id: c1.clone(),
                messages: vec![message],
            })
            .unwrap();

        client.set_reply(&c1, &MessageId::new("m1")).unwrap();
        let draft = client.store().lock().unwrap().reply.current().cloned().unwrap();
        assert_eq!(draft.sender_name, "Bo");
        assert_eq!(draft.content, "see you at 6");

        assert!(client.set_reply(&c1, &MessageId::new("nope")).is_err());
        client.clear_reply().unwrap();
        assert!(client.store().lock().unwrap().reply.current().is_none());
    }

    #[test]
    fn test_history_replaces_only_that_chats_actionables() {
        let mut store = AppStore::default();
        for a in [actionable("a1", "c1"), actionable("a2", "c2"), actionable("a3", "c1")] {
            store.apply(StoreAction::ActionableReceived(a)).unwrap();
        }

        let merged =
            merge_chat_actionables(&store, &ChatId::new("c1"), vec![actionable("a3", "c1")]);
        store.apply(StoreAction::ActionablesReplaced(merged)).unwrap();

        let ids: Vec<_> = store.actionables.iter().map(|m| m.id.to_string()).collect();
        assert_eq!(ids, vec!["a2", "a3"]);
    }

    #[test]
    fn test_deleting_an_actionable_removes_it_from_its_list() {
        let mut store = AppStore::default();
        store
            .apply(StoreAction::ActionableReceived(actionable("a1", "c1")))
            .unwrap();
        let c1 = ChatId::new("c1");

        let action = deletion_action(&store, &c1, &MessageId::new("a1"));
        assert!(matches!(action, StoreAction::ActionableRemoved(ref id) if id.as_str() == "a1"));
        store.apply(action).unwrap();
        assert!(store.actionables.is_empty());

        let action = deletion_action(&store, &c1, &MessageId::new("m1"));
        assert!(matches!(action, StoreAction::MessageDeleted { .. }));
    }

    #[test]
    fn test_connection_candidates_skip_me_and_contacts() {
        let mut store = AppStore::default();
        store.apply(StoreAction::SignedIn(user("me", "Me"))).unwrap();
        store
            .apply(StoreAction::ChatsReplaced(vec![direct("c1", "me", "u2")]))
            .unwrap();

        let all = vec![user("me", "Me"), user("u2", "Bo"), user("u3", "Cy")];
        let names: Vec<_> = connection_candidates(&store, all)
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["Cy"]);
    }
}
