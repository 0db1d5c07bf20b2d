use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::constants::{inbound, outbound};
use crate::error::ProtocolError;
use crate::models::{ActionableMessage, Chat, ChatMessage, User};
use crate::types::{ChatId, MessageId, UserId};

/// Events pushed to this client over the real-time channel.
///
/// Payloads have the same shape as the matching HTTP response `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Someone created a chat that includes us
    ChatCreated(Chat),
    /// Members were added to a group
    UsersAdded { chat_id: ChatId, users: Vec<User> },
    /// A member was removed from (or left) a group
    UserRemoved { chat_id: ChatId, user_id: UserId },
    UserBlocked { blocked_by: UserId, chat_id: ChatId },
    UserUnblocked { chat_id: ChatId },
    GroupDeleted { chat_id: ChatId },
    ProfileUpdated(User),
    /// Group metadata changed; only the image is applied
    ChatUpdated(Chat),
    NewMessage(ChatMessage),
    NewActionableMessage(ActionableMessage),
    MessageDeleted { message_id: MessageId, chat_id: ChatId },
}

impl InboundEvent {
    /// Decode a named event and its positional arguments.
    pub fn from_parts(name: &str, args: Vec<Value>) -> Result<Self, ProtocolError> {
        let mut args = Args::new(args);
        let event = match name {
            inbound::CHAT_CREATED => Self::ChatCreated(args.take(inbound::CHAT_CREATED, 1)?),
            inbound::NEW_USER_ADDED => Self::UsersAdded {
                chat_id: args.take(inbound::NEW_USER_ADDED, 2)?,
                users: args.take(inbound::NEW_USER_ADDED, 2)?,
            },
            inbound::USER_REMOVED => Self::UserRemoved {
                chat_id: args.take(inbound::USER_REMOVED, 2)?,
                user_id: args.take(inbound::USER_REMOVED, 2)?,
            },
            inbound::USER_BLOCKED => Self::UserBlocked {
                blocked_by: args.take(inbound::USER_BLOCKED, 2)?,
                chat_id: args.take(inbound::USER_BLOCKED, 2)?,
            },
            inbound::USER_UNBLOCKED => Self::UserUnblocked {
                chat_id: args.take(inbound::USER_UNBLOCKED, 1)?,
            },
            inbound::GROUP_DELETED => Self::GroupDeleted {
                chat_id: args.take(inbound::GROUP_DELETED, 1)?,
            },
            inbound::PROFILE_UPDATED => {
                Self::ProfileUpdated(args.take(inbound::PROFILE_UPDATED, 1)?)
            }
            inbound::CHAT_UPDATED => Self::ChatUpdated(args.take(inbound::CHAT_UPDATED, 1)?),
            inbound::NEW_MESSAGE => Self::NewMessage(args.take(inbound::NEW_MESSAGE, 1)?),
            inbound::NEW_ACTIONABLE_MESSAGE => {
                Self::NewActionableMessage(args.take(inbound::NEW_ACTIONABLE_MESSAGE, 1)?)
            }
            inbound::MESSAGE_DELETED => Self::MessageDeleted {
                message_id: args.take(inbound::MESSAGE_DELETED, 2)?,
                chat_id: args.take(inbound::MESSAGE_DELETED, 2)?,
            },
            other => return Err(ProtocolError::UnknownEvent(other.to_string())),
        };
        Ok(event)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ChatCreated(_) => inbound::CHAT_CREATED,
            Self::UsersAdded { .. } => inbound::NEW_USER_ADDED,
            Self::UserRemoved { .. } => inbound::USER_REMOVED,
            Self::UserBlocked { .. } => inbound::USER_BLOCKED,
            Self::UserUnblocked { .. } => inbound::USER_UNBLOCKED,
            Self::GroupDeleted { .. } => inbound::GROUP_DELETED,
            Self::ProfileUpdated(_) => inbound::PROFILE_UPDATED,
            Self::ChatUpdated(_) => inbound::CHAT_UPDATED,
            Self::NewMessage(_) => inbound::NEW_MESSAGE,
            Self::NewActionableMessage(_) => inbound::NEW_ACTIONABLE_MESSAGE,
            Self::MessageDeleted { .. } => inbound::MESSAGE_DELETED,
        }
    }
}

/// Fan-out notifications emitted after a local action's HTTP call succeeded.
/// They carry the server's response payload, never a separate command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    NewMessage(ChatMessage),
    NewActionableMessage(ActionableMessage),
    CreateChat { chat: Chat, users: Vec<User> },
    AddUsersToGroup { chat_id: ChatId, users: Vec<User> },
    RemoveUser { chat_id: ChatId, user_id: UserId },
    ExitGroup { chat_id: ChatId, user_id: UserId },
    DeleteGroup { chat_id: ChatId },
    BlockUser { blocked_by: UserId, chat_id: ChatId },
    UnblockUser { chat_id: ChatId },
    ProfileUpdate(User),
    UpdateChat(Chat),
    DeleteMessage { message_id: MessageId, chat_id: ChatId },
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => outbound::NEW_MESSAGE,
            Self::NewActionableMessage(_) => outbound::NEW_ACTIONABLE_MESSAGE,
            Self::CreateChat { .. } => outbound::CREATE_CHAT,
            Self::AddUsersToGroup { .. } => outbound::ADD_USER_TO_GROUP,
            Self::RemoveUser { .. } => outbound::REMOVE_USER,
            Self::ExitGroup { .. } => outbound::EXIT_GROUP,
            Self::DeleteGroup { .. } => outbound::DELETE_GROUP,
            Self::BlockUser { .. } => outbound::BLOCK_USER,
            Self::UnblockUser { .. } => outbound::UNBLOCK_USER,
            Self::ProfileUpdate(_) => outbound::PROFILE_UPDATE,
            Self::UpdateChat(_) => outbound::UPDATE_CHAT,
            Self::DeleteMessage { .. } => outbound::DELETE_MESSAGE,
        }
    }

    /// Positional arguments, in the order the server's handler expects them.
    pub fn to_args(&self) -> Result<Vec<Value>, ProtocolError> {
        let args = match self {
            Self::NewMessage(m) => vec![to_value(m)?],
            Self::NewActionableMessage(m) => vec![to_value(m)?],
            Self::CreateChat { chat, users } => vec![to_value(chat)?, to_value(users)?],
            Self::AddUsersToGroup { chat_id, users } => {
                vec![to_value(chat_id)?, to_value(users)?]
            }
            Self::RemoveUser { chat_id, user_id } | Self::ExitGroup { chat_id, user_id } => {
                vec![to_value(chat_id)?, to_value(user_id)?]
            }
            Self::DeleteGroup { chat_id } | Self::UnblockUser { chat_id } => {
                vec![to_value(chat_id)?]
            }
            Self::BlockUser {
                blocked_by,
                chat_id,
            } => vec![to_value(blocked_by)?, to_value(chat_id)?],
            Self::ProfileUpdate(user) => vec![to_value(user)?],
            Self::UpdateChat(chat) => vec![to_value(chat)?],
            Self::DeleteMessage {
                message_id,
                chat_id,
            } => vec![to_value(message_id)?, to_value(chat_id)?],
        };
        Ok(args)
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, ProtocolError> {
    Ok(serde_json::to_value(value)?)
}

/// Positional argument cursor for event decoding.
struct Args {
    values: std::vec::IntoIter<Value>,
    total: usize,
}

impl Args {
    fn new(values: Vec<Value>) -> Self {
        let total = values.len();
        Self {
            values: values.into_iter(),
            total,
        }
    }

    fn take<T: DeserializeOwned>(
        &mut self,
        event: &'static str,
        expected: usize,
    ) -> Result<T, ProtocolError> {
        let value = self.values.next().ok_or(ProtocolError::Arity {
            event,
            expected,
            got: self.total,
        })?;
        serde_json::from_value(value).map_err(|source| ProtocolError::Payload { event, source })
    }
}
