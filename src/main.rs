use anyhow::{anyhow, Context, Result};
use knot_gateway::alias::{AliasResolver, HttpAliasDirectory};
use knot_gateway::api::{create_ws_router, WsAppState};
use knot_gateway::bus::NatsTransport;
use knot_gateway::config::{self, env::apply_env_overrides, GatewayConfig};
use knot_gateway::session::SessionStore;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

fn load(path: &str) -> Result<GatewayConfig> {
    let mut config = if Path::new(path).exists() {
        config::load_config(path).map_err(|e| anyhow!("Failed to load {}: {}", path, e))?
    } else {
        GatewayConfig::default()
    };
    apply_env_overrides(&mut config);
    config
        .validate()
        .map_err(|reasons| anyhow!("Invalid configuration: {}", reasons))?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var("KNOT_GATEWAY_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = load(&config_path)?;

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.directive().into()),
        )
        .init();

    info!("KNOT gateway starting...");
    info!(
        config_path = %config_path,
        bus_url = %config.bus.url,
        alias_server = %config.alias.server_uri,
        "Configuration loaded"
    );

    let transport = Arc::new(
        NatsTransport::connect(&config.bus)
            .await
            .context("Failed to initialize bus transport")?,
    );

    let directory = HttpAliasDirectory::new(&config.alias)
        .map_err(|e| anyhow!("Failed to initialize alias directory: {}", e))?;

    let state = Arc::new(WsAppState {
        sessions: Arc::new(SessionStore::new()),
        jobs: transport.clone(),
        messages: transport,
        aliases: AliasResolver::new(Arc::new(directory)),
        bus_config: config.bus.clone(),
    });

    let router = create_ws_router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "WebSocket server listening on /ws");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "WebSocket server error");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    info!("KNOT gateway stopped");

    Ok(())
}
