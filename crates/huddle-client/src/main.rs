//! Headless Huddle client: signs in with the configured session, keeps the
//! store in sync with the real-time channel and logs what happens until
//! interrupted.

use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing::{info, warn};

use huddle_client::{ApiClient, ChatClient, ClientConfig, EventBridge};
use huddle_shared::constants::APP_NAME;
use huddle_store::AppStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    huddle_client::init_tracing();

    let config = ClientConfig::from_env();
    info!(
        base_url = %config.base_url,
        socket_url = %config.socket_url,
        policy = ?config.summary_policy,
        "Starting {APP_NAME} headless client"
    );

    let store = Arc::new(Mutex::new(AppStore::new(config.summary_policy)));
    let api = ApiClient::new(&config).context("Failed to build API client")?;
    let bridge = EventBridge::new(store.clone(), &config);
    let client = ChatClient::new(api, store.clone(), Arc::new(bridge.handle()));

    let me = client
        .load_profile()
        .await
        .context("Failed to load profile; is the session cookie or token valid?")?;
    let chats = client.refresh_chats().await.context("Failed to list chats")?;
    info!(user = %me.id, chats, "Session ready");

    bridge
        .connect()
        .await
        .context("Failed to connect to the real-time channel")?;

    let refetch = bridge.refetch_signal();
    let mut mode = bridge.subscribe_mode();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupted, shutting down");
                break;
            }

            _ = refetch.notified() => {
                match client.sync_chats_if_needed().await {
                    Ok(true) => info!("Chat directory resynchronised"),
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, notice = %e.notice(), "Chat refetch failed"),
                }
            }

            changed = mode.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *mode.borrow_and_update();
                info!(mode = ?current, "Connection mode changed");
            }
        }
    }

    bridge.disconnect().await;
    Ok(())
}
