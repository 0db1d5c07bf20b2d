/// Application name
pub const APP_NAME: &str = "Huddle";

/// Maximum attachment size in bytes (40 MiB)
pub const MAX_ATTACHMENT_SIZE: usize = 40 * 1024 * 1024;

/// Maximum number of files on one actionable message
pub const MAX_ACTIONABLE_FILES: usize = 5;

/// Bounded channel capacity between the bridge and the transport task
pub const CHANNEL_BUFFER: usize = 256;

/// Socket.IO handshake path and Engine.IO protocol revision
pub const SOCKET_IO_PATH: &str = "/socket.io/";
pub const ENGINE_IO_VERSION: &str = "4";

/// REST endpoints, relative to the API base URL
pub mod endpoints {
    pub const LOGOUT: &str = "auth/logout";

    pub const GET_PROFILE: &str = "user/profile";
    pub const UPDATE_PROFILE: &str = "user/profile";
    pub const GET_ALL_USERS: &str = "user/profile/all";
    pub const GET_USER_CHATS: &str = "user/chats";

    pub const CREATE_CHAT: &str = "chat/create";
    pub const GET_MESSAGES: &str = "chat/messages";
    pub const DELETE_CHAT: &str = "chat/delete";
    pub const EXIT_CHAT: &str = "chat/exit";
    pub const TOGGLE_BLOCK: &str = "chat/toggleBlock";
    pub const ADD_USER: &str = "chat/add";
    pub const REMOVE_USER: &str = "chat/remove";
    pub const UPDATE_CHAT_IMAGE: &str = "chat/update";

    pub const CREATE_MESSAGE: &str = "message/create";
    pub const DELETE_MESSAGE: &str = "message/delete";
    pub const BOT_REPLY: &str = "message/ai";
}

/// Event names received from the real-time channel
pub mod inbound {
    pub const CHAT_CREATED: &str = "chat_created";
    pub const NEW_USER_ADDED: &str = "new_user_added";
    pub const USER_REMOVED: &str = "user_removed";
    pub const USER_BLOCKED: &str = "user_blocked";
    pub const USER_UNBLOCKED: &str = "user_unblocked";
    pub const GROUP_DELETED: &str = "group_deleted";
    pub const PROFILE_UPDATED: &str = "profile_updated";
    pub const CHAT_UPDATED: &str = "chat_updated";
    pub const NEW_MESSAGE: &str = "new-message";
    pub const NEW_ACTIONABLE_MESSAGE: &str = "new-actionable-message";
    pub const MESSAGE_DELETED: &str = "message_deleted";
}

/// Event names emitted to the real-time channel
pub mod outbound {
    pub const NEW_MESSAGE: &str = "new_message";
    pub const NEW_ACTIONABLE_MESSAGE: &str = "new_actionable_message";
    pub const CREATE_CHAT: &str = "create_chat";
    pub const ADD_USER_TO_GROUP: &str = "add_user_to_group";
    pub const REMOVE_USER: &str = "remove_user";
    pub const EXIT_GROUP: &str = "exit_group";
    pub const DELETE_GROUP: &str = "delete_group";
    pub const BLOCK_USER: &str = "block_user";
    pub const UNBLOCK_USER: &str = "unblock_user";
    pub const PROFILE_UPDATE: &str = "profile_update";
    pub const UPDATE_CHAT: &str = "update_chat";
    pub const DELETE_MESSAGE: &str = "delete_message";
}
