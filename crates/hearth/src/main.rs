//! Hearth client entry point
//!
//! Run with:
//! ```bash
//! HEARTH_TOKEN=... cargo run -p hearth
//! ```
//!
//! Connects every shard, logs readiness and runs until Ctrl-C.

use hearth::{Client, DomainEvent, EventKind};
use hearth_common::{try_init_tracing, ClientConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = try_init_tracing() {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "Client failed");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;
    info!(app = %config.app.name, env = ?config.app.env, "Configuration loaded");

    let client = Client::new(config)?;
    client.on(EventKind::ShardReady, |event| {
        if let DomainEvent::ShardReady { shard_id, unavailable_guilds } = event {
            info!(shard = shard_id, unavailable = unavailable_guilds.len(), "Shard ready");
        }
        Ok(())
    });

    client.login().await?;
    client.connect().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    client.shutdown().await;
    Ok(())
}
