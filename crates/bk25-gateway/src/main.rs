use std::net::SocketAddr;

use clap::Parser;
use tracing::info;

mod app;
mod http;

/// BK25 conversational automation server.
#[derive(Parser, Debug)]
#[command(name = "bk25-gateway", version, about)]
struct Args {
    /// Path to the TOML config file (BK25_* env vars override).
    #[arg(long)]
    config: Option<String>,
    /// Override the listen port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bk25=info,bk25_gateway=info,tower_http=warn".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = bk25_core::config::Bk25Config::load(args.config.as_deref())
        .unwrap_or_else(|e| {
            tracing::warn!("Config load failed ({}), using defaults", e);
            bk25_core::config::Bk25Config::default()
        });
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let bind = config.server.host.clone();
    let port = config.server.port;

    let core = bk25_runtime::Bk25Core::new(config);
    core.start().await;

    let router = app::build_router(core.clone());
    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("BK25 gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    core.shutdown();
    Ok(())
}
