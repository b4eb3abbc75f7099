//! Order status sink: the order-management API that records payment
//! outcomes. The browser-redirect path and the gateway's asynchronous
//! notification both land here, in no guaranteed order and possibly more
//! than once, so updates are deduplicated by transaction id.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("order update request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("order service returned HTTP {0}")]
    BadStatus(u16),
    #[error("conflicting amount for transaction {transaction_id}: {previous} then {incoming}")]
    AmountMismatch {
        transaction_id: String,
        previous: BigDecimal,
        incoming: BigDecimal,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    pub status: String,
    pub payment_status: String,
    pub transaction_id: String,
    pub amount: Option<BigDecimal>,
}

impl OrderUpdate {
    pub fn paid(transaction_id: String, amount: Option<BigDecimal>) -> Self {
        Self {
            status: "processing".to_string(),
            payment_status: "paid".to_string(),
            transaction_id,
            amount,
        }
    }
}

#[async_trait]
pub trait OrderStatusSink: Send + Sync {
    async fn update(&self, order_id: &str, update: OrderUpdate) -> Result<(), SinkError>;
}

/// HTTP sink posting to the order-management API.
///
/// Duplicate delivery is the norm rather than the exception: the gateway
/// retries its notification, and the success redirect reports the same
/// outcome independently. Updates already applied are remembered per
/// transaction id; a repeat with the same amount is a no-op, a repeat with
/// a different amount is rejected rather than trusting the later writer.
pub struct HttpOrderSink {
    client: reqwest::Client,
    base_url: String,
    applied: Mutex<HashMap<String, Option<BigDecimal>>>,
}

impl HttpOrderSink {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            applied: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl OrderStatusSink for HttpOrderSink {
    async fn update(&self, order_id: &str, update: OrderUpdate) -> Result<(), SinkError> {
        {
            let applied = self.applied.lock().await;
            if let Some(previous) = applied.get(&update.transaction_id) {
                if *previous == update.amount {
                    tracing::debug!(
                        "duplicate order update for transaction {} ignored",
                        update.transaction_id
                    );
                    return Ok(());
                }
                return Err(SinkError::AmountMismatch {
                    transaction_id: update.transaction_id.clone(),
                    previous: previous.clone().unwrap_or_default(),
                    incoming: update.amount.clone().unwrap_or_default(),
                });
            }
        }

        let url = format!(
            "{}/orders/{}",
            self.base_url.trim_end_matches('/'),
            order_id
        );
        let response = self.client.put(&url).json(&update).send().await?;
        if !response.status().is_success() {
            return Err(SinkError::BadStatus(response.status().as_u16()));
        }

        // Recorded only after the order API accepted the update, so a
        // failed attempt stays retryable. Two concurrent first deliveries
        // may both reach the order API; it tolerates that by contract.
        let mut applied = self.applied.lock().await;
        applied.insert(update.transaction_id.clone(), update.amount.clone());

        tracing::info!(
            "order {} marked {} ({}), transaction {}",
            order_id,
            update.status,
            update.payment_status,
            update.transaction_id
        );
        Ok(())
    }
}
