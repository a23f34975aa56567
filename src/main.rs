use anyhow::{Context, Result};
use clap::Parser;
use ssc_signal::{
    commands,
    config::{Cli, ServerConfig},
    logger, ChannelService, RtcTransportFactory,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ServerConfig::try_from(cli)?;
    logger::init_tracing(&config.log_filter)?;

    info!(
        listen_addr = %config.listen_addr,
        ice_servers = ?config.ice_servers.iter().map(|s| s.url.as_str()).collect::<Vec<_>>(),
        negotiation_timeout = ?config.negotiation_timeout,
        "starting ssc-signal"
    );

    run(config).await
}

async fn run(config: ServerConfig) -> Result<()> {
    let factory = Arc::new(RtcTransportFactory::new(
        config.ice_servers.clone(),
        config.data_channel_label.clone(),
    ));
    let service = ChannelService::new(factory, config.negotiation_timeout);
    let app = commands::router(service.clone());

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(listen_addr = %config.listen_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    service.shutdown().await;
    info!("ssc-signal stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
