//! ferricd - an IRC server with DCC file transfer mediation.
//!
//! The crate is a thin library around the daemon so integration tests can
//! run the server in-process; the `ferricd` binary is `main.rs`.

pub mod bot;
pub mod config;
pub mod dcc;
pub mod error;
pub mod handlers;
pub mod network;
pub mod state;

use std::sync::Arc;

pub use config::Config;
pub use network::Gateway;
pub use state::Hub;

/// Bind the gateway for a configuration. The caller decides whether to
/// `run()` it on the current task or spawn it.
pub async fn bind(config: Config) -> anyhow::Result<Gateway> {
    let hub = Arc::new(Hub::new(&config));
    Gateway::bind(hub, config.port).await
}
