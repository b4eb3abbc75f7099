pub mod cache;
pub mod channel;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod services;
pub mod startup;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::cache::CatalogCaches;
use crate::config::Config;
use crate::gateway::GatewayClient;
use crate::services::order_sink::OrderStatusSink;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub gateway: GatewayClient,
    pub order_sink: Arc<dyn OrderStatusSink>,
    pub catalogs: Arc<CatalogCaches>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/payment/initiate", post(handlers::payment::initiate))
        .route("/payment/success", post(handlers::payment::on_success))
        .route("/payment/fail", post(handlers::payment::on_fail))
        .route("/payment/cancel", post(handlers::payment::on_cancel))
        .route(
            "/payment/notification",
            post(handlers::payment::on_notification),
        )
        .route("/payment/verify", post(handlers::payment::verify))
        .route("/catalog/products", get(handlers::catalog::products))
        .route("/catalog/collections", get(handlers::catalog::collections))
        .with_state(state)
}
