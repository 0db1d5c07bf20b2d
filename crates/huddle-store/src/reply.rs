use serde::{Deserialize, Serialize};

use huddle_shared::models::{Attachment, ChatMessage, ReplyTo};
use huddle_shared::{MessageId, UserId};

/// The message the user is currently replying to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReplyDraft {
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub content: String,
    pub attachment: Option<Attachment>,
}

impl ReplyDraft {
    pub fn quoting(message: &ChatMessage) -> Self {
        Self {
            message_id: message.id.clone(),
            sender_id: message.sender.id.clone(),
            sender_name: message.sender_name.clone(),
            content: message.content.clone(),
            attachment: message.attachment.clone(),
        }
    }

    /// Freeze the draft into the snapshot sent with the reply.
    pub fn into_reply_to(self) -> ReplyTo {
        ReplyTo {
            message_id: self.message_id,
            sender_id: self.sender_id,
            sender_name: self.sender_name,
            message_content: self.content,
            attachment: self.attachment,
        }
    }
}

/// At most one pending reply, scoped to the open chat. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct ReplyDraftStore {
    draft: Option<ReplyDraft>,
}

impl ReplyDraftStore {
    pub fn set(&mut self, draft: ReplyDraft) {
        self.draft = Some(draft);
    }

    pub fn clear(&mut self) {
        self.draft = None;
    }

    pub fn current(&self) -> Option<&ReplyDraft> {
        self.draft.as_ref()
    }

    /// Remove and return the draft, as done when the reply is sent.
    pub fn take(&mut self) -> Option<ReplyDraft> {
        self.draft.take()
    }
}
