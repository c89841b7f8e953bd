//! ferricd - IRC server with DCC file transfer mediation.

use tracing::error;
use tracing_subscriber::EnvFilter;

use ferricd::Config;

fn usage() {
    eprintln!("Usage: ferricd <port> <password>");
    eprintln!("  port      listening port, 1-65535");
    eprintln!("  password  connection password, non-empty");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config = match Config::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ferricd: {e}");
            usage();
            std::process::exit(1);
        }
    };

    let gateway = ferricd::bind(config).await.map_err(|e| {
        error!(error = %e, "failed to bind listening socket");
        e
    })?;
    gateway.run().await
}
