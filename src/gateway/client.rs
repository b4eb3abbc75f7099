use bigdecimal::BigDecimal;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::domain::transaction::Transaction;

// Placeholder values for optional customer fields. The gateway rejects
// requests with missing customer data, so initiation must never fail
// purely because the storefront did not collect a field.
const DEFAULT_CUSTOMER_NAME: &str = "Guest Customer";
const DEFAULT_CUSTOMER_EMAIL: &str = "guest@example.com";
const DEFAULT_CUSTOMER_PHONE: &str = "01700000000";
const DEFAULT_CUSTOMER_ADDRESS: &str = "N/A";
const DEFAULT_CUSTOMER_CITY: &str = "Dhaka";
const DEFAULT_CUSTOMER_POSTCODE: &str = "1000";
const DEFAULT_CUSTOMER_COUNTRY: &str = "Bangladesh";

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("gateway rejected the request: {0}")]
    Rejected(String),
    #[error("invalid response from gateway: {0}")]
    InvalidResponse(String),
    #[error("gateway circuit breaker is open")]
    CircuitOpen,
}

/// One checkout attempt as sent to the gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub order_id: String,
    pub amount: BigDecimal,
    #[serde(default)]
    pub customer: Customer,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InitiatedPayment {
    pub transaction: Transaction,
    /// Hosted payment page the payer is redirected to.
    pub redirect_url: String,
}

#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub valid: bool,
    /// Status token as reported by the validator.
    pub status: String,
    pub raw: Value,
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub base_url: String,
    pub store_id: String,
    pub store_passwd: String,
    /// Public base URL of this service, used to build the callback URLs.
    pub callback_base_url: String,
    pub currency: String,
}

/// Synchronous response of the gateway's transaction-initiation endpoint.
#[derive(Debug, Deserialize)]
struct InitApiResponse {
    #[serde(default)]
    status: String,
    #[serde(rename = "GatewayPageURL")]
    gateway_page_url: Option<String>,
    #[serde(rename = "failedreason")]
    failed_reason: Option<String>,
}

/// HTTP client for the hosted payment gateway.
#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    settings: GatewaySettings,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl GatewayClient {
    pub fn new(settings: GatewaySettings) -> Self {
        Self::with_circuit_breaker(settings, 3, 60)
    }

    /// Creates a client with custom circuit breaker configuration.
    pub fn with_circuit_breaker(
        settings: GatewaySettings,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            // Explicit timeout so a stalled gateway never hangs a callback
            // handler past the payer's patience.
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        GatewayClient {
            client,
            settings,
            circuit_breaker,
        }
    }

    /// Returns the current state of the circuit breaker.
    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    /// Submits the initiation request and returns the hosted payment page
    /// URL plus the freshly created transaction record.
    pub async fn init(&self, request: &InitiateRequest) -> Result<InitiatedPayment, GatewayError> {
        let transaction = Transaction::initiated(&request.order_id, request.amount.clone());
        let params = self.init_params(request, &transaction.transaction_id);
        let url = format!(
            "{}/gwprocess/v4/api.php",
            self.settings.base_url.trim_end_matches('/')
        );
        let client = self.client.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.post(&url).form(&params).send().await?;
                let parsed = response.json::<InitApiResponse>().await?;

                if parsed.status == "SUCCESS" {
                    match parsed.gateway_page_url {
                        Some(page_url) if !page_url.is_empty() => Ok(page_url),
                        _ => Err(GatewayError::InvalidResponse(
                            "gateway reported SUCCESS without a payment page URL".to_string(),
                        )),
                    }
                } else {
                    Err(GatewayError::Rejected(parsed.failed_reason.unwrap_or_else(
                        || format!("gateway returned status {}", parsed.status),
                    )))
                }
            })
            .await;

        match result {
            Ok(redirect_url) => Ok(InitiatedPayment {
                transaction,
                redirect_url,
            }),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    /// Validates a `val_id` obtained from a success callback. The primary
    /// GET path is unreliable against the sandbox, so a failure there is
    /// retried once via a direct JSON POST before giving up.
    pub async fn validate(&self, val_id: &str) -> Result<ValidationOutcome, GatewayError> {
        let url = format!(
            "{}/validator/api/validationserverAPI.php",
            self.settings.base_url.trim_end_matches('/')
        );
        let query = [
            ("val_id", val_id.to_string()),
            ("store_id", self.settings.store_id.clone()),
            ("store_passwd", self.settings.store_passwd.clone()),
            ("format", "json".to_string()),
            ("v", "1".to_string()),
        ];
        let body = serde_json::json!({
            "val_id": val_id,
            "store_id": self.settings.store_id,
            "store_passwd": self.settings.store_passwd,
        });
        let client = self.client.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let raw = match validate_get(&client, &url, &query).await {
                    Ok(raw) => raw,
                    Err(e) => {
                        tracing::warn!(
                            "primary validation call failed, falling back to direct POST: {}",
                            e
                        );
                        validate_post(&client, &url, &body).await?
                    }
                };

                let status = raw
                    .get("status")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let valid = matches!(status.as_str(), "VALID" | "VALIDATED");
                Ok(ValidationOutcome { valid, status, raw })
            })
            .await;

        match result {
            Ok(outcome) => Ok(outcome),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    fn init_params(
        &self,
        request: &InitiateRequest,
        transaction_id: &str,
    ) -> Vec<(&'static str, String)> {
        let callback_base = self.settings.callback_base_url.trim_end_matches('/');
        let customer = &request.customer;
        let field = |value: &Option<String>, fallback: &str| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };

        vec![
            ("store_id", self.settings.store_id.clone()),
            ("store_passwd", self.settings.store_passwd.clone()),
            ("total_amount", request.amount.to_string()),
            ("currency", self.settings.currency.clone()),
            ("tran_id", transaction_id.to_string()),
            ("success_url", format!("{}/payment/success", callback_base)),
            ("fail_url", format!("{}/payment/fail", callback_base)),
            ("cancel_url", format!("{}/payment/cancel", callback_base)),
            ("ipn_url", format!("{}/payment/notification", callback_base)),
            ("shipping_method", "NO".to_string()),
            (
                "product_name",
                field(&request.product_name, "storefront order"),
            ),
            (
                "product_category",
                field(&request.product_category, "general"),
            ),
            ("product_profile", "general".to_string()),
            ("cus_name", field(&customer.name, DEFAULT_CUSTOMER_NAME)),
            ("cus_email", field(&customer.email, DEFAULT_CUSTOMER_EMAIL)),
            (
                "cus_add1",
                field(&customer.address, DEFAULT_CUSTOMER_ADDRESS),
            ),
            ("cus_city", field(&customer.city, DEFAULT_CUSTOMER_CITY)),
            (
                "cus_postcode",
                field(&customer.postcode, DEFAULT_CUSTOMER_POSTCODE),
            ),
            (
                "cus_country",
                field(&customer.country, DEFAULT_CUSTOMER_COUNTRY),
            ),
            ("cus_phone", field(&customer.phone, DEFAULT_CUSTOMER_PHONE)),
            // Passthrough fields round-trip order identity through the
            // gateway so callbacks can resolve the order without local state.
            ("value_a", request.order_id.clone()),
            ("value_b", request.amount.to_string()),
        ]
    }
}

async fn validate_get(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<Value, GatewayError> {
    let response = client.get(url).query(query).send().await?;
    if !response.status().is_success() {
        return Err(GatewayError::InvalidResponse(format!(
            "validator returned HTTP {}",
            response.status()
        )));
    }
    Ok(response.json::<Value>().await?)
}

async fn validate_post(client: &Client, url: &str, body: &Value) -> Result<Value, GatewayError> {
    let response = client.post(url).json(body).send().await?;
    if !response.status().is_success() {
        return Err(GatewayError::InvalidResponse(format!(
            "validator returned HTTP {}",
            response.status()
        )));
    }
    Ok(response.json::<Value>().await?)
}
