use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkout_core::cache::CatalogCaches;
use checkout_core::config::Config;
use checkout_core::gateway::{GatewayClient, GatewaySettings};
use checkout_core::services::order_sink::HttpOrderSink;
use checkout_core::{create_app, startup, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let report = startup::validate_environment(&config).await?;
    report.print();
    if !report.is_valid() {
        anyhow::bail!("startup validation failed");
    }

    let gateway = GatewayClient::new(GatewaySettings {
        base_url: config.gateway_base_url.clone(),
        store_id: config.store_id.clone(),
        store_passwd: config.store_passwd.clone(),
        callback_base_url: config.app_base_url.clone(),
        currency: config.currency.clone(),
    });
    tracing::info!("gateway client initialized for {}", config.gateway_base_url);

    let order_sink = Arc::new(HttpOrderSink::new(config.order_api_url.clone()));
    let catalogs = Arc::new(CatalogCaches::from_config(&config));

    let cors = cors_layer(&config)?;
    let state = AppState {
        config: config.clone(),
        gateway,
        order_sink,
        catalogs,
    };
    let app = create_app(state).layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

fn cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    match &config.cors_allowed_origins {
        Some(origins) => {
            let origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(|o| o.parse::<HeaderValue>())
                .collect::<Result<Vec<_>, _>>()?;
            Ok(CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any))
        }
        None => Ok(CorsLayer::permissive()),
    }
}
