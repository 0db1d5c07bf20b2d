use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetError {
    #[error("Invalid socket URL: {0}")]
    InvalidUrl(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The server answered the namespace connect with an error packet.
    #[error("Connection rejected: {0}")]
    Rejected(String),

    #[error("Malformed packet: {0}")]
    Codec(String),

    #[error("Timed out waiting for the server")]
    Timeout,

    #[error("Connection closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, NetError>;
