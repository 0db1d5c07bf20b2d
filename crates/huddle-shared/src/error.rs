use thiserror::Error;

/// Failures decoding or encoding a real-time event.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Event {event} expects {expected} argument(s), got {got}")]
    Arity {
        event: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Invalid payload for {event}: {source}")]
    Payload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Input rejected before any network call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid name! Include only letters and spaces.")]
    InvalidName,

    #[error("Invalid email format!")]
    InvalidEmail,

    #[error("Invalid password! At least 6 characters with a letter and number.")]
    InvalidPassword,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("File size must be less than {max_mib}mb")]
    FileTooLarge { max_mib: usize },

    #[error("You can only upload {max} files")]
    TooManyFiles { max: usize },

    #[error("Please fill all the fields")]
    IncompleteActionable,

    #[error("Please enter group name")]
    MissingGroupName,

    #[error("At least add one user")]
    NoMembersSelected,

    #[error("Please upload an image")]
    NotAnImage,
}
