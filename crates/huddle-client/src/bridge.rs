//! Real-time event bridge.
//!
//! Owns the connection to the real-time channel for the signed-in user,
//! turns inbound named events into store actions, and hands out an explicit
//! [`BridgeHandle`] through which the actions layer emits outbound events.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, error, info, warn};

use huddle_net::{spawn_channel, BackoffPolicy, ChannelCommand, ChannelConfig, ChannelNotification};
use huddle_shared::protocol::{InboundEvent, OutboundEvent};
use huddle_shared::types::ConnectionMode;
use huddle_store::{AppStore, Applied, StoreAction};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// The store as shared between the bridge task and the actions layer.
pub type SharedStore = Arc<Mutex<AppStore>>;

/// Sends fan-out notifications to other clients.
///
/// Emitting never blocks: a full or closed channel is an error the caller
/// may log and move past, since the HTTP call already succeeded.
pub trait Emitter: Send + Sync {
    fn emit(&self, event: OutboundEvent) -> Result<()>;
}

/// Cloneable emit handle. Attached to the channel task while connected,
/// detached otherwise.
#[derive(Clone, Default)]
pub struct BridgeHandle {
    cmd_tx: Arc<Mutex<Option<mpsc::Sender<ChannelCommand>>>>,
}

impl BridgeHandle {
    pub fn is_attached(&self) -> bool {
        self.cmd_tx.lock().map(|tx| tx.is_some()).unwrap_or(false)
    }

    fn attach(&self, tx: mpsc::Sender<ChannelCommand>) {
        if let Ok(mut guard) = self.cmd_tx.lock() {
            *guard = Some(tx);
        }
    }

    fn detach(&self) -> Option<mpsc::Sender<ChannelCommand>> {
        self.cmd_tx.lock().ok().and_then(|mut guard| guard.take())
    }

    /// Detach only if still attached to `tx`, so a finished task cannot
    /// detach a newer connection. Returns `false` while a newer connection
    /// holds the handle.
    fn release(&self, tx: &mpsc::Sender<ChannelCommand>) -> bool {
        let Ok(mut guard) = self.cmd_tx.lock() else {
            return false;
        };
        match guard.as_ref() {
            Some(current) if current.same_channel(tx) => {
                *guard = None;
                true
            }
            Some(_) => false,
            None => true,
        }
    }
}

impl Emitter for BridgeHandle {
    fn emit(&self, event: OutboundEvent) -> Result<()> {
        let tx = self
            .cmd_tx
            .lock()
            .map_err(|_| ClientError::LockPoisoned)?
            .clone()
            .ok_or_else(|| ClientError::Bridge("not connected".into()))?;

        let name = event.name();
        let args = event.to_args()?;
        tx.try_send(ChannelCommand::Emit {
            event: name.to_string(),
            args,
        })
        .map_err(|e| ClientError::Bridge(format!("{name}: {e}")))?;
        debug!(event = name, "Event queued");
        Ok(())
    }
}

pub struct EventBridge {
    store: SharedStore,
    handle: BridgeHandle,
    mode: Arc<watch::Sender<ConnectionMode>>,
    refetch: Arc<Notify>,
    server_url: String,
    reconnect: BackoffPolicy,
}

impl EventBridge {
    pub fn new(store: SharedStore, config: &ClientConfig) -> Self {
        let (mode, _) = watch::channel(ConnectionMode::Disconnected);
        Self {
            store,
            handle: BridgeHandle::default(),
            mode: Arc::new(mode),
            refetch: Arc::new(Notify::new()),
            server_url: config.socket_url.clone(),
            reconnect: config.reconnect,
        }
    }

    pub fn handle(&self) -> BridgeHandle {
        self.handle.clone()
    }

    pub fn mode(&self) -> ConnectionMode {
        *self.mode.borrow()
    }

    pub fn subscribe_mode(&self) -> watch::Receiver<ConnectionMode> {
        self.mode.subscribe()
    }

    /// Notified whenever the chat directory should be fetched again.
    pub fn refetch_signal(&self) -> Arc<Notify> {
        self.refetch.clone()
    }

    /// Open the channel for the signed-in user and start dispatching
    /// inbound events. A no-op while already connected.
    pub async fn connect(&self) -> Result<()> {
        let user_id = {
            let guard = self.store.lock().map_err(|_| ClientError::LockPoisoned)?;
            guard.me().cloned().ok_or(ClientError::NotSignedIn)?
        };

        if self.handle.is_attached() {
            debug!(user = %user_id, "Bridge already connected");
            return Ok(());
        }

        self.mode.send_replace(ConnectionMode::Connecting);

        let mut config = ChannelConfig::new(self.server_url.clone(), user_id.as_str());
        config.reconnect = self.reconnect;

        let (cmd_tx, notif_rx) = match spawn_channel(config).await {
            Ok(channels) => channels,
            Err(e) => {
                self.mode.send_replace(ConnectionMode::Disconnected);
                return Err(e.into());
            }
        };

        info!(user = %user_id.short(), "Event bridge connected");
        self.handle.attach(cmd_tx.clone());

        let store = self.store.clone();
        let handle = self.handle.clone();
        let mode = self.mode.clone();
        let refetch = self.refetch.clone();
        tokio::spawn(async move {
            notification_loop(store, notif_rx, &mode, &refetch).await;
            if handle.release(&cmd_tx) {
                mode.send_replace(ConnectionMode::Disconnected);
            } else {
                debug!("Superseded channel task finished");
            }
        });

        Ok(())
    }

    /// Leave the channel. Called on logout and shutdown.
    pub async fn disconnect(&self) {
        if let Some(tx) = self.handle.detach() {
            let _ = tx.send(ChannelCommand::Shutdown).await;
            info!("Event bridge disconnected");
        }
        self.mode.send_replace(ConnectionMode::Disconnected);
    }
}

/// Receives channel notifications until the channel task ends.
async fn notification_loop(
    store: SharedStore,
    mut notif_rx: mpsc::Receiver<ChannelNotification>,
    mode: &watch::Sender<ConnectionMode>,
    refetch: &Notify,
) {
    info!("Bridge notification loop started");

    while let Some(notification) = notif_rx.recv().await {
        match notification {
            ChannelNotification::Connected { sid } => {
                let previous = mode.send_replace(ConnectionMode::Connected);
                info!(sid = %sid, "Channel connected (bridge)");
                // Events were missed while the connection was down.
                if matches!(previous, ConnectionMode::Reconnecting { .. }) {
                    apply_and_signal(&store, refetch, StoreAction::ChatRefetchRequested);
                }
            }

            ChannelNotification::Event { name, args } => {
                handle_inbound(&store, refetch, &name, args);
            }

            ChannelNotification::Disconnected { reason, will_retry } => {
                warn!(reason = %reason, will_retry, "Channel disconnected (bridge)");
                if !will_retry {
                    mode.send_replace(ConnectionMode::Disconnected);
                }
            }

            ChannelNotification::Reconnecting { attempt, delay } => {
                info!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Reconnecting (bridge)"
                );
                mode.send_replace(ConnectionMode::Reconnecting { attempt });
            }

            ChannelNotification::ConnectError { message } => {
                warn!(message = %message, "Channel connect error");
            }
        }
    }

    warn!("Bridge notification loop ended");
}

fn handle_inbound(store: &SharedStore, refetch: &Notify, name: &str, args: Vec<Value>) {
    let event = match InboundEvent::from_parts(name, args) {
        Ok(event) => event,
        Err(e) => {
            warn!(event = %name, error = %e, "Dropping inbound event");
            return;
        }
    };
    debug!(event = event.name(), "Inbound event");
    apply_and_signal(store, refetch, into_action(event));
}

fn apply_and_signal(store: &SharedStore, refetch: &Notify, action: StoreAction) {
    let outcome = match store.lock() {
        Ok(mut guard) => guard.apply(action),
        Err(_) => {
            error!("Store lock poisoned, dropping update");
            return;
        }
    };
    match outcome {
        Ok(Applied::RefetchRequested) => refetch.notify_one(),
        Ok(applied) => debug!(outcome = ?applied, "Inbound update applied"),
        Err(e) => warn!(error = %e, "Inbound update rejected"),
    }
}

/// The reducer each inbound event runs. Remote events and local action
/// successes meet in the same [`StoreAction`]s.
pub fn into_action(event: InboundEvent) -> StoreAction {
    match event {
        InboundEvent::ChatCreated(chat) => StoreAction::ChatAdded(chat),
        InboundEvent::UsersAdded { chat_id, users } => StoreAction::MembersAdded { chat_id, users },
        InboundEvent::UserRemoved { chat_id, user_id } => {
            StoreAction::MemberRemoved { chat_id, user_id }
        }
        InboundEvent::UserBlocked {
            blocked_by,
            chat_id,
        } => StoreAction::ChatBlocked {
            chat_id,
            blocked_by,
        },
        InboundEvent::UserUnblocked { chat_id } => StoreAction::ChatUnblocked(chat_id),
        InboundEvent::GroupDeleted { chat_id } => StoreAction::ChatRemoved(chat_id),
        InboundEvent::ProfileUpdated(user) => StoreAction::ProfileUpdated(user),
        InboundEvent::ChatUpdated(chat) => StoreAction::GroupImageChanged {
            chat_id: chat.id,
            url: chat.group_image,
        },
        InboundEvent::NewMessage(message) => StoreAction::MessageReceived(message),
        InboundEvent::NewActionableMessage(message) => StoreAction::ActionableReceived(message),
        InboundEvent::MessageDeleted {
            message_id,
            chat_id,
        } => StoreAction::MessageDeleted {
            chat_id,
            message_id,
        },
    }
}
