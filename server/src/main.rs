//! PocketCanvas backend binary: configuration, wiring, and the HTTP
//! listener.

mod routes;

use anyhow::Context;
use bridge_server::{ReqwestHttpClient, SqliteStores};
use core_runtime::{init_logging, AppConfig, LoggingConfig};
use core_service::{AppService, ServiceDependencies, ServiceOptions};
use provider_figma::{FigmaClient, FigmaConfig, AUTHORIZE_URL, DEFAULT_SCOPES};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Configuration is incomplete")?;
    init_logging(LoggingConfig::default()).context("Logging setup failed")?;

    if config.allowed_redirect_origins.is_empty() {
        warn!("No redirect-origin allow-list configured; accepting any absolute redirect URI");
    }

    let stores = Arc::new(
        SqliteStores::connect(&config.database_url)
            .await
            .context("Store bootstrap failed")?,
    );

    let http_client = Arc::new(ReqwestHttpClient::new());
    let provider = Arc::new(FigmaClient::new(
        FigmaConfig::new(config.client_id.clone(), config.client_secret.clone()),
        http_client,
    ));

    let service = Arc::new(AppService::new(
        ServiceDependencies {
            provider,
            identities: stores.clone(),
            tokens: stores.clone(),
            sessions: stores.clone(),
            file_cache: stores,
        },
        ServiceOptions {
            client_id: config.client_id.clone(),
            auth_url: AUTHORIZE_URL.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            allowed_redirect_origins: config.allowed_redirect_origins.clone(),
            session_ttl_hours: config.session_ttl_hours,
        },
    ));

    let app = routes::router(service);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Could not bind {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "PocketCanvas backend listening");
    axum::serve(listener, app).await.context("Server exited")?;

    Ok(())
}
