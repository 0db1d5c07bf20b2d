//! Real-time channel task with the tokio mpsc command/notification pattern.
//!
//! One websocket carries one Engine.IO session with the default Socket.IO
//! namespace joined. The task owns the socket; the application talks to it
//! only through typed command and notification channels. A lost connection
//! is re-established on the configured backoff schedule.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use huddle_shared::constants::{CHANNEL_BUFFER, ENGINE_IO_VERSION, SOCKET_IO_PATH};

use crate::backoff::BackoffPolicy;
use crate::codec::{EnginePacket, Handshake, SocketPacket, DEFAULT_NAMESPACE};
use crate::error::{NetError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// Command / notification types
// ---------------------------------------------------------------------------

/// Commands sent *into* the channel task.
#[derive(Debug)]
pub enum ChannelCommand {
    /// Emit a named event with positional arguments.
    Emit { event: String, args: Vec<Value> },
    /// Leave the namespace and close the socket.
    Shutdown,
}

/// Notifications sent *from* the channel task to the application.
#[derive(Debug, Clone)]
pub enum ChannelNotification {
    /// The namespace was joined (initially or after a reconnect).
    Connected { sid: String },
    /// A named server event.
    Event { name: String, args: Vec<Value> },
    /// The connection is gone. `will_retry` tells whether a reconnect
    /// schedule follows.
    Disconnected { reason: String, will_retry: bool },
    /// A reconnect attempt will be made after `delay`.
    Reconnecting { attempt: u32, delay: Duration },
    /// The server refused the namespace connect.
    ConnectError { message: String },
}

/// Configuration for spawning the channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Server origin, `http(s)://` or `ws(s)://`.
    pub server_url: String,
    /// Identifies this client to the server's socket registry.
    pub user_id: String,
    pub reconnect: BackoffPolicy,
    /// Bound on the websocket upgrade plus both handshakes.
    pub connect_timeout: Duration,
}

impl ChannelConfig {
    pub fn new(server_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            user_id: user_id.into(),
            reconnect: BackoffPolicy::default(),
            connect_timeout: Duration::from_secs(20),
        }
    }
}

/// Build the websocket URL for the Socket.IO endpoint of `server_url`.
pub fn build_socket_url(server_url: &str, user_id: &str) -> Result<Url> {
    let mut url =
        Url::parse(server_url).map_err(|e| NetError::InvalidUrl(format!("{server_url}: {e}")))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(NetError::InvalidUrl(format!("unsupported scheme {other}"))),
    };
    url.set_scheme(scheme)
        .map_err(|()| NetError::InvalidUrl(format!("cannot use scheme {scheme}")))?;

    url.set_path(SOCKET_IO_PATH);
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", ENGINE_IO_VERSION)
        .append_pair("transport", "websocket")
        .append_pair("userId", user_id);
    Ok(url)
}

/// Connect and spawn the channel in a background tokio task.
///
/// The first connection is made before returning, so an unreachable server
/// or a refused handshake surfaces here as an error rather than as a
/// notification.
///
/// # Returns
///
/// `(command_tx, notification_rx)`
pub async fn spawn_channel(
    config: ChannelConfig,
) -> Result<(mpsc::Sender<ChannelCommand>, mpsc::Receiver<ChannelNotification>)> {
    let url = build_socket_url(&config.server_url, &config.user_id)?;
    let session = open_session(&url, config.connect_timeout).await?;
    info!(
        url = %url,
        sid = %session.sid,
        ping_interval = session.handshake.ping_interval,
        "Real-time channel connected"
    );

    let (cmd_tx, cmd_rx) = mpsc::channel::<ChannelCommand>(CHANNEL_BUFFER);
    let (notif_tx, notif_rx) = mpsc::channel::<ChannelNotification>(CHANNEL_BUFFER);

    tokio::spawn(async move {
        run_channel(url, config, session, cmd_rx, notif_tx).await;
        info!("Channel task terminated");
    });

    Ok((cmd_tx, notif_rx))
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

struct Session {
    ws: WsStream,
    handshake: Handshake,
    sid: String,
}

/// Why a session loop returned.
enum SessionEnd {
    /// Shutdown requested, or every command sender dropped.
    Shutdown,
    /// The server disconnected us from the namespace on purpose.
    Kicked,
    /// Transport failure; eligible for reconnecting.
    Lost(String),
}

async fn open_session(url: &Url, timeout: Duration) -> Result<Session> {
    tokio::time::timeout(timeout, handshake(url))
        .await
        .map_err(|_| NetError::Timeout)?
}

async fn handshake(url: &Url) -> Result<Session> {
    let (mut ws, _response) = connect_async(url.as_str()).await?;

    let handshake = match EnginePacket::decode(&next_text(&mut ws).await?)? {
        EnginePacket::Open(handshake) => handshake,
        other => {
            return Err(NetError::Handshake(format!(
                "expected open packet, got {other:?}"
            )))
        }
    };
    debug!(sid = %handshake.sid, "Engine.IO session opened");

    let join = EnginePacket::Message(SocketPacket::Connect { sid: None }.encode());
    ws.send(Message::Text(join.encode())).await?;

    loop {
        match EnginePacket::decode(&next_text(&mut ws).await?)? {
            EnginePacket::Ping(data) => {
                ws.send(Message::Text(EnginePacket::Pong(data).encode()))
                    .await?;
            }
            EnginePacket::Message(payload) => match SocketPacket::decode(&payload)?.packet {
                SocketPacket::Connect { sid } => {
                    return Ok(Session {
                        ws,
                        sid: sid.unwrap_or_else(|| handshake.sid.clone()),
                        handshake,
                    });
                }
                SocketPacket::ConnectError { message } => {
                    return Err(NetError::Rejected(message));
                }
                other => debug!(packet = ?other, "Ignoring packet before namespace connect"),
            },
            EnginePacket::Close => return Err(NetError::Closed),
            _ => {}
        }
    }
}

/// Next text frame, skipping control frames.
async fn next_text(ws: &mut WsStream) -> Result<String> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return Ok(text),
            Some(Ok(Message::Close(_))) | None => return Err(NetError::Closed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

/// Drive one connected session until it ends.
async fn drive_session(
    session: &mut Session,
    cmd_rx: &mut mpsc::Receiver<ChannelCommand>,
    notif_tx: &mpsc::Sender<ChannelNotification>,
) -> SessionEnd {
    let window = session.handshake.liveness_window();
    let heartbeat = tokio::time::sleep(window);
    tokio::pin!(heartbeat);

    loop {
        tokio::select! {
            // --- Incoming commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ChannelCommand::Emit { event, args }) => {
                        debug!(event = %event, args = args.len(), "Emitting event");
                        let frame = EnginePacket::Message(SocketPacket::event(event, args).encode());
                        if let Err(e) = session.ws.send(Message::Text(frame.encode())).await {
                            return SessionEnd::Lost(format!("send failed: {e}"));
                        }
                    }
                    Some(ChannelCommand::Shutdown) | None => {
                        info!("Channel shutdown requested");
                        let leave = EnginePacket::Message(SocketPacket::Disconnect.encode());
                        let _ = session.ws.send(Message::Text(leave.encode())).await;
                        let _ = session.ws.close(None).await;
                        return SessionEnd::Shutdown;
                    }
                }
            }

            // --- Socket frames ---
            frame = session.ws.next() => {
                heartbeat.as_mut().reset(Instant::now() + window);
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        return SessionEnd::Lost("transport close".into());
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return SessionEnd::Lost(format!("transport error: {e}")),
                };
                if let Some(end) = handle_frame(session, &text, notif_tx).await {
                    return end;
                }
            }

            // --- Server went silent ---
            _ = &mut heartbeat => {
                warn!(window_ms = window.as_millis() as u64, "No ping from server");
                return SessionEnd::Lost("ping timeout".into());
            }
        }
    }
}

async fn handle_frame(
    session: &mut Session,
    text: &str,
    notif_tx: &mpsc::Sender<ChannelNotification>,
) -> Option<SessionEnd> {
    let packet = match EnginePacket::decode(text) {
        Ok(packet) => packet,
        Err(e) => {
            warn!(error = %e, "Dropping malformed engine packet");
            return None;
        }
    };

    match packet {
        EnginePacket::Ping(data) => {
            let pong = EnginePacket::Pong(data).encode();
            if let Err(e) = session.ws.send(Message::Text(pong)).await {
                return Some(SessionEnd::Lost(format!("send failed: {e}")));
            }
        }
        EnginePacket::Close => return Some(SessionEnd::Lost("server closed session".into())),
        EnginePacket::Message(payload) => {
            let frame = match SocketPacket::decode(&payload) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "Dropping malformed socket packet");
                    return None;
                }
            };
            if frame.namespace != DEFAULT_NAMESPACE {
                debug!(namespace = %frame.namespace, "Ignoring packet for other namespace");
                return None;
            }
            match frame.packet {
                SocketPacket::Event { name, args, .. } => {
                    debug!(event = %name, args = args.len(), "Event received");
                    let _ = notif_tx
                        .send(ChannelNotification::Event { name, args })
                        .await;
                }
                SocketPacket::Disconnect => return Some(SessionEnd::Kicked),
                SocketPacket::ConnectError { message } => {
                    let _ = notif_tx
                        .send(ChannelNotification::ConnectError { message })
                        .await;
                }
                SocketPacket::Connect { .. } | SocketPacket::Ack { .. } => {}
            }
        }
        EnginePacket::Open(_) | EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {}
    }
    None
}

// ---------------------------------------------------------------------------
// Reconnect loop
// ---------------------------------------------------------------------------

async fn run_channel(
    url: Url,
    config: ChannelConfig,
    mut session: Session,
    mut cmd_rx: mpsc::Receiver<ChannelCommand>,
    notif_tx: mpsc::Sender<ChannelNotification>,
) {
    loop {
        let _ = notif_tx
            .send(ChannelNotification::Connected {
                sid: session.sid.clone(),
            })
            .await;

        let reason = match drive_session(&mut session, &mut cmd_rx, &notif_tx).await {
            SessionEnd::Shutdown => return,
            SessionEnd::Kicked => {
                info!("Disconnected by server");
                let _ = notif_tx
                    .send(ChannelNotification::Disconnected {
                        reason: "server disconnect".into(),
                        will_retry: false,
                    })
                    .await;
                return;
            }
            SessionEnd::Lost(reason) => reason,
        };

        warn!(reason = %reason, "Real-time connection lost");
        let _ = notif_tx
            .send(ChannelNotification::Disconnected {
                reason,
                will_retry: config.reconnect.is_enabled(),
            })
            .await;

        match reconnect(&url, &config, &mut cmd_rx, &notif_tx).await {
            Some(next) => {
                info!(sid = %next.sid, "Real-time channel reconnected");
                session = next;
            }
            None => return,
        }
    }
}

/// Retry on the backoff schedule. Emits issued while disconnected are
/// dropped; the store is resynchronised by a refetch once connected again.
async fn reconnect(
    url: &Url,
    config: &ChannelConfig,
    cmd_rx: &mut mpsc::Receiver<ChannelCommand>,
    notif_tx: &mpsc::Sender<ChannelNotification>,
) -> Option<Session> {
    let policy = config.reconnect;
    let mut rng = StdRng::from_entropy();

    for attempt in 1..=policy.max_attempts {
        let delay = policy.delay_for(attempt, &mut rng);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");
        let _ = notif_tx
            .send(ChannelNotification::Reconnecting { attempt, delay })
            .await;

        let wait = tokio::time::sleep(delay);
        tokio::pin!(wait);
        loop {
            tokio::select! {
                _ = &mut wait => break,
                cmd = cmd_rx.recv() => match cmd {
                    Some(ChannelCommand::Emit { event, .. }) => {
                        warn!(event = %event, "Not connected, dropping emit");
                    }
                    Some(ChannelCommand::Shutdown) | None => {
                        info!("Shutdown requested while reconnecting");
                        return None;
                    }
                },
            }
        }

        match open_session(url, config.connect_timeout).await {
            Ok(session) => return Some(session),
            Err(NetError::Rejected(message)) => {
                warn!(attempt, message = %message, "Reconnect rejected");
                let _ = notif_tx
                    .send(ChannelNotification::ConnectError { message })
                    .await;
            }
            Err(e) => warn!(attempt, error = %e, "Reconnect attempt failed"),
        }
    }

    if policy.is_enabled() {
        error!(attempts = policy.max_attempts, "Giving up on reconnecting");
        let _ = notif_tx
            .send(ChannelNotification::Disconnected {
                reason: "reconnect attempts exhausted".into(),
                will_retry: false,
            })
            .await;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_url_from_http_origin() {
        let url = build_socket_url("http://localhost:3000", "u1").unwrap();
        assert_eq!(
            url.as_str(),
            "ws://localhost:3000/socket.io/?EIO=4&transport=websocket&userId=u1"
        );
    }

    #[test]
    fn test_socket_url_replaces_path_and_query() {
        let url = build_socket_url("https://chat.example.com/api/?x=1", "a b").unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), "/socket.io/");
        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("EIO".to_string(), "4".to_string()),
                ("transport".to_string(), "websocket".to_string()),
                ("userId".to_string(), "a b".to_string()),
            ]
        );
    }

    #[test]
    fn test_socket_url_rejects_other_schemes() {
        assert!(matches!(
            build_socket_url("ftp://example.com", "u1"),
            Err(NetError::InvalidUrl(_))
        ));
        assert!(matches!(
            build_socket_url("not a url", "u1"),
            Err(NetError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_to_spawn() {
        let mut config = ChannelConfig::new("http://127.0.0.1:9", "u1");
        config.connect_timeout = Duration::from_secs(2);
        assert!(spawn_channel(config).await.is_err());
    }
}
