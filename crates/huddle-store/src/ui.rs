use huddle_shared::ChatId;

/// Process-lifetime view flags. Not part of the domain model.
#[derive(Debug, Clone)]
pub struct UiFlags {
    pub active_chat: Option<ChatId>,
    pub show_create_chat_modal: bool,
    pub image_upload_open: bool,
    /// Set when the chat directory must be fetched again from the server,
    /// e.g. after we were added to a chat we have never seen.
    needs_chat_refetch: bool,
}

impl Default for UiFlags {
    fn default() -> Self {
        Self {
            active_chat: None,
            show_create_chat_modal: false,
            image_upload_open: false,
            needs_chat_refetch: true,
        }
    }
}

impl UiFlags {
    pub fn set_active_chat(&mut self, chat_id: Option<ChatId>) {
        self.active_chat = chat_id;
    }

    /// Clear the selection only if it points at `chat_id`.
    pub fn clear_active_chat_if(&mut self, chat_id: &ChatId) -> bool {
        if self.active_chat.as_ref() == Some(chat_id) {
            self.active_chat = None;
            true
        } else {
            false
        }
    }

    pub fn set_show_create_chat_modal(&mut self, open: bool) {
        self.show_create_chat_modal = open;
    }

    pub fn set_image_upload_open(&mut self, open: bool) {
        self.image_upload_open = open;
    }

    pub fn request_chat_refetch(&mut self) {
        self.needs_chat_refetch = true;
    }

    pub fn needs_chat_refetch(&self) -> bool {
        self.needs_chat_refetch
    }

    /// Read and reset the refetch flag.
    pub fn take_chat_refetch(&mut self) -> bool {
        std::mem::replace(&mut self.needs_chat_refetch, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refetch_flag_starts_set_and_is_taken_once() {
        let mut flags = UiFlags::default();
        assert!(flags.take_chat_refetch());
        assert!(!flags.take_chat_refetch());
        flags.request_chat_refetch();
        assert!(flags.needs_chat_refetch());
    }

    #[test]
    fn test_clear_active_chat_if_only_matches_same_chat() {
        let mut flags = UiFlags::default();
        flags.set_active_chat(Some(ChatId::new("c1")));
        assert!(!flags.clear_active_chat_if(&ChatId::new("c2")));
        assert_eq!(flags.active_chat, Some(ChatId::new("c1")));
        assert!(flags.clear_active_chat_if(&ChatId::new("c1")));
        assert_eq!(flags.active_chat, None);
    }
}
