use anyhow::Context;
use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    /// Base URL of the hosted payment gateway (sandbox by default).
    pub gateway_base_url: String,
    pub store_id: String,
    pub store_passwd: String,
    /// Public base URL of this service; the gateway posts callbacks here.
    pub app_base_url: String,
    /// Base URL of the order-management API (the order status sink).
    pub order_api_url: String,
    pub currency: String,
    pub products_path: String,
    pub collections_path: String,
    pub cors_allowed_origins: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            gateway_base_url: env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://sandbox.sslcommerz.com".to_string()),
            store_id: env::var("STORE_ID").context("STORE_ID must be set")?,
            store_passwd: env::var("STORE_PASSWD").context("STORE_PASSWD must be set")?,
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            order_api_url: env::var("ORDER_API_URL")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
            currency: env::var("CURRENCY").unwrap_or_else(|_| "BDT".to_string()),
            products_path: env::var("CATALOG_PRODUCTS_PATH")
                .unwrap_or_else(|_| "data/products.json".to_string()),
            collections_path: env::var("CATALOG_COLLECTIONS_PATH")
                .unwrap_or_else(|_| "data/collections.json".to_string()),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
        })
    }
}
