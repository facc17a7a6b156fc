use std::env;
use std::sync::Arc;

use anyhow::Context;
use log::{error, info};
use simplelog::{ColorChoice, TermLogger, TerminalMode};

use rendezvous_signaling_server::config::Config;
use rendezvous_signaling_server::relay::Relay;
use rendezvous_signaling_server::router::{self, ServerState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(address) = env::args().nth(1) {
        config.address = address.parse().context("invalid ip address provided")?;
    }

    TermLogger::init(
        config.level_filter()?,
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let app = router::create(ServerState::new(Arc::new(Relay::new())));

    let listener = tokio::net::TcpListener::bind(config.address)
        .await
        .with_context(|| format!("failed to bind {}", config.address))?;
    info!("signaling server listening on {}", config.address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", err);
    }
    info!("shutting down");
}
