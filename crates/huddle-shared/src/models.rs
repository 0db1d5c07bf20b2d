//! Domain models as the backend serialises them.
//!
//! Field names follow the server's JSON (`_id`, `photoURL`, camelCase
//! elsewhere).  Every struct round-trips through serde so the same value can
//! arrive from an HTTP response or from a real-time event payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{ChatId, MessageId, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A user profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "photoURL", default)]
    pub photo_url: String,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Summary of the most recent message, cached on a [`Chat`] for list display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    #[serde(rename = "_id")]
    pub id: MessageId,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl LastMessage {
    pub fn of(message: &ChatMessage) -> Self {
        Self {
            id: message.id.clone(),
            sender_name: message.sender_name.clone(),
            content: message.content.clone(),
            created_at: message.created_at,
        }
    }
}

/// A conversation: either direct (two members) or a group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    #[serde(rename = "_id")]
    pub id: ChatId,
    pub admin: UserId,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub group_image: String,
    #[serde(default)]
    pub users: Vec<User>,
    /// Whoever last blocked this chat. A single scalar: if both parties of a
    /// direct chat block each other only the latest blocker is kept.
    #[serde(default)]
    pub blocked_by: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<LastMessage>,
}

impl Chat {
    pub fn has_member(&self, user_id: &UserId) -> bool {
        self.users.iter().any(|u| &u.id == user_id)
    }

    /// The other participant of a direct chat, found by excluding `me` from
    /// the member list.
    pub fn other_party(&self, me: &UserId) -> Option<&User> {
        if self.is_group {
            return None;
        }
        self.users.iter().find(|u| &u.id != me)
    }

    /// Name shown in the chat list: the group name, or the other party's name.
    pub fn display_name(&self, me: &UserId) -> &str {
        if self.is_group {
            return &self.group_name;
        }
        self.other_party(me).map(|u| u.name.as_str()).unwrap_or("")
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked_by.is_some()
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub url: String,
}

/// Quoted copy of the message being replied to. It is a snapshot taken when
/// the reply is sent and is never refreshed from the original.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReplyTo {
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub sender_name: String,
    #[serde(default)]
    pub message_content: String,
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

/// An ordinary text/attachment message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(rename = "_id")]
    pub id: MessageId,
    #[serde(rename = "senderId")]
    pub sender: User,
    #[serde(deserialize_with = "chat_ref")]
    pub chat_id: ChatId,
    #[serde(rename = "name", default)]
    pub sender_name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachment: Option<Attachment>,
    #[serde(default)]
    pub reply_to: Option<ReplyTo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    /// A message with blank content and no attachment has nothing to show
    /// and is rejected by the store.
    pub fn is_displayable(&self) -> bool {
        !self.content.trim().is_empty() || self.attachment.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActionableKind {
    Task,
    Event,
}

impl ActionableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Event => "event",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionablePayload {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub targeted_users: Vec<User>,
}

/// A task or event posted into a chat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionableMessage {
    #[serde(rename = "_id")]
    pub id: MessageId,
    #[serde(rename = "senderId")]
    pub sender: User,
    #[serde(deserialize_with = "chat_ref")]
    pub chat_id: ChatId,
    #[serde(rename = "type")]
    pub kind: ActionableKind,
    pub payload: ActionablePayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Whatever the create-message endpoint (or a message event) returned.
///
/// Both kinds come out of the same endpoint; an actionable message is told
/// apart by its `payload` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyMessage {
    Chat(ChatMessage),
    Actionable(ActionableMessage),
}

impl AnyMessage {
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        if value.get("payload").map_or(false, |p| p.is_object()) {
            serde_json::from_value(value).map(Self::Actionable)
        } else {
            serde_json::from_value(value).map(Self::Chat)
        }
    }

    pub fn chat_id(&self) -> &ChatId {
        match self {
            Self::Chat(m) => &m.chat_id,
            Self::Actionable(m) => &m.chat_id,
        }
    }
}

/// `chatId` is either a bare id or, when the server populates it, the whole
/// chat document. Only the id is kept.
fn chat_ref<'de, D>(deserializer: D) -> Result<ChatId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Ref {
        Id(ChatId),
        Doc {
            #[serde(rename = "_id")]
            id: ChatId,
        },
    }

    Ok(match Ref::deserialize(deserializer)? {
        Ref::Id(id) | Ref::Doc { id } => id,
    })
}
