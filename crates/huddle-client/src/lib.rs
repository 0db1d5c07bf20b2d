//! Huddle client: REST calls, the real-time event bridge and the user
//! actions that tie them to the store.

pub mod actions;
pub mod api;
pub mod bridge;
pub mod config;
pub mod error;

pub use actions::{ChatClient, Compose, NewActionable};
pub use api::{ApiClient, FileUpload};
pub use bridge::{BridgeHandle, Emitter, EventBridge, SharedStore};
pub use config::ClientConfig;
pub use error::{ClientError, Result};

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Calling it again is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("huddle_client=debug,huddle_net=debug,huddle_store=info,warn")
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
