use crate::config::Config;
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

pub struct ValidationReport {
    pub environment: bool,
    pub gateway: bool,
    pub catalog: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.gateway && self.catalog
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Gateway Connectivity:  {}", status(self.gateway));
        println!("Catalog Data Files:    {}", status(self.catalog));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!(
            "\nOverall Status: {}",
            if self.is_valid() {
                "✅ PASS"
            } else {
                "❌ FAIL"
            }
        );
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok {
        "✅ OK"
    } else {
        "❌ FAIL"
    }
}

pub async fn validate_environment(config: &Config) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        environment: true,
        gateway: true,
        catalog: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if let Err(e) = validate_gateway(&config.gateway_base_url).await {
        report.gateway = false;
        report.errors.push(format!("Gateway: {}", e));
    }

    if let Err(e) = validate_catalog(config) {
        report.catalog = false;
        report.errors.push(format!("Catalog: {}", e));
    }

    Ok(report)
}

pub fn validate_env_vars(config: &Config) -> Result<()> {
    if config.store_id.is_empty() {
        anyhow::bail!("STORE_ID is empty");
    }
    if config.store_passwd.is_empty() {
        anyhow::bail!("STORE_PASSWD is empty");
    }
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.currency.is_empty() {
        anyhow::bail!("CURRENCY is empty");
    }

    // Validate URL formats
    url::Url::parse(&config.gateway_base_url).context("GATEWAY_BASE_URL is not a valid URL")?;
    url::Url::parse(&config.app_base_url).context("APP_BASE_URL is not a valid URL")?;
    url::Url::parse(&config.order_api_url).context("ORDER_API_URL is not a valid URL")?;

    Ok(())
}

async fn validate_gateway(gateway_url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    client
        .get(gateway_url)
        .send()
        .await
        .context("Failed to connect to payment gateway")?;

    Ok(())
}

fn validate_catalog(config: &Config) -> Result<()> {
    if !Path::new(&config.products_path).exists() {
        anyhow::bail!("products file {} does not exist", config.products_path);
    }
    if !Path::new(&config.collections_path).exists() {
        anyhow::bail!("collections file {} does not exist", config.collections_path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            server_port: 3000,
            gateway_base_url: "https://sandbox.sslcommerz.com".to_string(),
            store_id: "teststore".to_string(),
            store_passwd: "testpass".to_string(),
            app_base_url: "http://localhost:3000".to_string(),
            order_api_url: "http://localhost:3001".to_string(),
            currency: "BDT".to_string(),
            products_path: "data/products.json".to_string(),
            collections_path: "data/collections.json".to_string(),
            cors_allowed_origins: None,
        }
    }

    #[test]
    fn test_validate_env_vars_empty_store_id() {
        let config = Config {
            store_id: String::new(),
            ..base_config()
        };

        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_invalid_gateway_url() {
        let config = Config {
            gateway_base_url: "not-a-url".to_string(),
            ..base_config()
        };

        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_accepts_valid_config() {
        assert!(validate_env_vars(&base_config()).is_ok());
    }
}
