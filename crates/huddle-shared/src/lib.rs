//! Types shared by every Huddle crate: domain models, the real-time event
//! contract, error enums and form validation.

pub mod constants;
pub mod error;
pub mod models;
pub mod protocol;
pub mod types;
pub mod validation;

pub use error::{ProtocolError, ValidationError};
pub use types::{ChatId, MessageId, UserId};
