//! # huddle-store
//!
//! In-memory normalized client state for Huddle: the signed-in user, the
//! chat directory, per-chat message lists, actionable messages, the reply
//! draft and a handful of UI flags.
//!
//! Every mutation goes through [`AppStore::apply`] so that a local HTTP
//! success and the matching remote event run the exact same reducer.

pub mod actionable;
pub mod chats;
pub mod messages;
pub mod reply;
pub mod session;
pub mod state;
pub mod ui;

mod error;

pub use actionable::ActionableStore;
pub use chats::ChatDirectory;
pub use error::{Result, StoreError};
pub use messages::MessageStore;
pub use reply::{ReplyDraft, ReplyDraftStore};
pub use session::SessionStore;
pub use state::{AppStore, Applied, StoreAction, SummaryPolicy};
pub use ui::UiFlags;
