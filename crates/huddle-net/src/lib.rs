//! Real-time transport: a Socket.IO v4 client over a single websocket.

pub mod backoff;
pub mod codec;
pub mod connection;
pub mod error;

pub use backoff::BackoffPolicy;
pub use codec::{EnginePacket, Handshake, SocketFrame, SocketPacket};
pub use connection::{
    build_socket_url, spawn_channel, ChannelCommand, ChannelConfig, ChannelNotification,
};
pub use error::NetError;
