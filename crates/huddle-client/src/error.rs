use thiserror::Error;

use huddle_net::NetError;
use huddle_shared::{ProtocolError, ValidationError};
use huddle_store::StoreError;

/// Text shown when a failure carries no message of its own.
pub const GENERIC_NOTICE: &str = "Something went wrong";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Server responded {status}: {}", .msg.as_deref().unwrap_or("no message"))]
    Server { status: u16, msg: Option<String> },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Real-time channel error: {0}")]
    Net(#[from] NetError),

    #[error("Event bridge unavailable: {0}")]
    Bridge(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Store rejected update: {0}")]
    Store(#[from] StoreError),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Lock poisoned")]
    LockPoisoned,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// One-shot, user-facing text for this failure: validation text or the
    /// server's `msg` when there is one.
    pub fn notice(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::Server { msg: Some(msg), .. } if !msg.trim().is_empty() => msg.clone(),
            _ => GENERIC_NOTICE.to_string(),
        }
    }

    /// The session is gone and the user must sign in again.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Server { status, .. } => *status == 401,
            Self::Http(e) => e.status() == Some(reqwest::StatusCode::UNAUTHORIZED),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
