//! The accept loop and periodic maintenance.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::handlers::Dispatcher;
use crate::network::connection;
use crate::state::Hub;

/// Maintenance cadence: empty-channel sweep and DCC timeout scan. Bounded
/// at one second so maintenance latency stays within a cycle.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(1);

/// Owns the listening socket; accepts connections and spawns their tasks.
pub struct Gateway {
    listener: TcpListener,
    hub: Arc<Hub>,
    dispatcher: Arc<Dispatcher>,
}

impl Gateway {
    /// Bind the listening socket. Failure here is fatal to the process.
    pub async fn bind(hub: Arc<Hub>, port: u16) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        info!(port, server = %hub.info.name, "listening");
        Ok(Self {
            listener,
            hub,
            dispatcher: Arc::new(Dispatcher::new()),
        })
    }

    /// The bound address (useful when port 0 was requested).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the accept loop forever.
    pub async fn run(self) -> anyhow::Result<()> {
        tokio::spawn(maintenance(self.hub.clone()));

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let _ = stream.set_nodelay(true);
                    let hub = self.hub.clone();
                    let dispatcher = self.dispatcher.clone();
                    tokio::spawn(async move {
                        connection::handle(hub, dispatcher, stream, addr).await;
                    });
                }
                Err(e) => {
                    // Transient accept errors (EMFILE and friends); keep
                    // serving existing connections.
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
    }
}

/// Periodic upkeep that must not depend on socket readiness.
async fn maintenance(hub: Arc<Hub>) {
    let mut tick = tokio::time::interval(MAINTENANCE_INTERVAL);
    tick.tick().await; // immediate first tick
    loop {
        tick.tick().await;
        hub.sweep_empty_channels().await;
        hub.dcc.check_timeouts(&hub).await;
    }
}
