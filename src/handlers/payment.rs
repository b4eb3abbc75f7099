//! Payment lifecycle endpoints: initiation, the four gateway callbacks,
//! and the internal verification endpoint.
//!
//! The callback handlers are the payer-facing edge of the flow. Whatever
//! the gateway sends (or fails to send), they log, fall back to safe
//! defaults, and answer with a redirect to a known-good view; the payer is
//! never shown a raw error.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;

use crate::channel::{self, PaymentInfo, PaymentStatus};
use crate::domain::transaction::{CallbackOutcome, Transaction};
use crate::error::AppError;
use crate::gateway::InitiateRequest;
use crate::services::order_sink::OrderUpdate;
use crate::AppState;

/// Form fields the gateway posts back. Everything is optional: gateways
/// differ in which fields accompany which callback, and a missing field
/// must degrade to a default, not an error.
#[derive(Debug, Default, Deserialize)]
pub struct GatewayCallback {
    pub tran_id: Option<String>,
    pub val_id: Option<String>,
    pub amount: Option<String>,
    pub status: Option<String>,
    pub card_type: Option<String>,
    /// Passthrough: order id, set at initiation.
    pub value_a: Option<String>,
    /// Passthrough: amount echo, set at initiation.
    pub value_b: Option<String>,
}

fn parse_callback(body: &str) -> GatewayCallback {
    match serde_urlencoded::from_str(body) {
        Ok(cb) => cb,
        Err(e) => {
            tracing::warn!("malformed gateway callback, using defaults: {}", e);
            GatewayCallback::default()
        }
    }
}

fn parse_amount(cb: &GatewayCallback) -> Option<BigDecimal> {
    cb.amount
        .as_deref()
        .or(cb.value_b.as_deref())
        .and_then(|raw| BigDecimal::from_str(raw).ok())
}

pub async fn initiate(
    State(state): State<AppState>,
    Json(request): Json<InitiateRequest>,
) -> Result<impl IntoResponse, AppError> {
    if state.config.store_id.is_empty() || state.config.store_passwd.is_empty() {
        return Err(AppError::Configuration(
            "gateway store credentials are not configured".to_string(),
        ));
    }

    let initiated = state.gateway.init(&request).await?;
    tracing::info!(
        "initiated transaction {} for order {}",
        initiated.transaction.transaction_id,
        initiated.transaction.order_id
    );

    Ok(Json(json!({
        "status": "success",
        "redirectUrl": initiated.redirect_url,
        "transactionId": initiated.transaction.transaction_id,
    })))
}

pub async fn on_success(
    State(state): State<AppState>,
    jar: CookieJar,
    body: String,
) -> impl IntoResponse {
    let cb = parse_callback(&body);
    let amount = parse_amount(&cb);

    let mut txn = Transaction::from_callback(
        cb.tran_id.clone().unwrap_or_default(),
        cb.value_a.clone().unwrap_or_else(|| "unknown".to_string()),
        amount.clone().unwrap_or_default(),
    );
    txn.resolve(CallbackOutcome::Success, cb.val_id.clone());

    // Verification is advisory. A negative or failed check is recorded and
    // logged; it never blocks the payer or reverts the success.
    if let Some(val_id) = cb.val_id.as_deref() {
        match state.gateway.validate(val_id).await {
            Ok(outcome) => {
                if !outcome.valid {
                    tracing::warn!(
                        "validator reported {} for transaction {}",
                        outcome.status,
                        txn.transaction_id
                    );
                }
                txn.record_verification(outcome.valid);
            }
            Err(e) => tracing::warn!(
                "post-payment verification failed for {}: {}",
                txn.transaction_id,
                e
            ),
        }
    }

    let info = PaymentInfo {
        order_id: cb.value_a.clone(),
        transaction_id: cb.tran_id.clone(),
        amount: cb.amount.clone().or_else(|| cb.value_b.clone()),
        payment_method: cb.card_type.clone(),
        validation_id: cb.val_id.clone(),
    };
    let jar = channel::announce(jar, PaymentStatus::Success, &info);

    // Best-effort order update; the authoritative one rides the gateway's
    // async notification, which does not depend on this redirect at all.
    if let Some(order_id) = cb.value_a.clone() {
        let sink = state.order_sink.clone();
        let update = OrderUpdate::paid(txn.transaction_id.clone(), amount);
        tokio::spawn(async move {
            if let Err(e) = sink.update(&order_id, update).await {
                tracing::error!("order update after success redirect failed: {}", e);
            }
        });
    }

    let target = match cb.value_a {
        // The timestamp busts any cached render of the order-status view.
        Some(order_id) => format!(
            "/orders/{}?payment=success&tid={}&t={}",
            order_id,
            txn.transaction_id,
            Utc::now().timestamp_millis()
        ),
        None => "/orders".to_string(),
    };
    (jar, Redirect::to(&target))
}

pub async fn on_fail(jar: CookieJar, body: String) -> impl IntoResponse {
    let cb = parse_callback(&body);

    let info = PaymentInfo {
        order_id: cb.value_a.clone(),
        transaction_id: cb.tran_id.clone(),
        amount: cb.amount.clone().or_else(|| cb.value_b.clone()),
        payment_method: cb.card_type.clone(),
        validation_id: None,
    };
    let jar = channel::announce(jar, PaymentStatus::Failed, &info);

    let target = match cb.value_a {
        Some(order_id) => format!("/checkout/payment/{}?payment=failed", order_id),
        None => "/orders".to_string(),
    };
    (jar, Redirect::to(&target))
}

pub async fn on_cancel(jar: CookieJar, body: String) -> impl IntoResponse {
    let cb = parse_callback(&body);
    // Sentinel keeps the retry view resolvable even without an order id.
    let order_id = cb.value_a.clone().unwrap_or_else(|| "unknown".to_string());

    let info = PaymentInfo {
        order_id: Some(order_id.clone()),
        transaction_id: cb.tran_id.clone(),
        amount: cb.amount.clone().or_else(|| cb.value_b.clone()),
        payment_method: None,
        validation_id: None,
    };
    let jar = channel::announce(jar, PaymentStatus::Cancelled, &info);

    let target = format!("/checkout/payment/{}?payment=cancelled", order_id);
    (jar, Redirect::to(&target))
}

/// Server-to-server confirmation. May arrive before, after, or instead of
/// the payer's browser redirect; either path alone must be able to mark
/// the order paid.
pub async fn on_notification(State(state): State<AppState>, body: String) -> impl IntoResponse {
    let cb = parse_callback(&body);
    let status = cb.status.clone().unwrap_or_default();

    if status != "VALID" {
        tracing::info!("ignoring gateway notification with status {:?}", status);
        return (StatusCode::OK, Json(json!({ "received": true })));
    }

    match cb.value_a.clone() {
        Some(order_id) => {
            let update =
                OrderUpdate::paid(cb.tran_id.clone().unwrap_or_default(), parse_amount(&cb));
            // Failures are logged and swallowed: the gateway retries the
            // notification on its own schedule, so no local retry.
            if let Err(e) = state.order_sink.update(&order_id, update).await {
                tracing::error!("order update from gateway notification failed: {}", e);
            }
        }
        None => tracing::warn!("gateway notification without an order reference; ignoring"),
    }

    (StatusCode::OK, Json(json!({ "received": true })))
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub val_id: String,
    pub store_id: Option<String>,
    pub store_passwd: Option<String>,
}

pub async fn verify(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let creds_match = request
        .store_id
        .as_deref()
        .map_or(true, |id| id == state.config.store_id)
        && request
            .store_passwd
            .as_deref()
            .map_or(true, |pw| pw == state.config.store_passwd);
    if !creds_match {
        return Err(AppError::Unauthorized(
            "store credentials do not match".to_string(),
        ));
    }

    match state.gateway.validate(&request.val_id).await {
        Ok(outcome) => {
            let status = if outcome.valid { "success" } else { "error" };
            Ok(Json(json!({ "status": status, "data": outcome.raw })))
        }
        Err(e) => {
            tracing::warn!("validation call failed: {}", e);
            Ok(Json(json!({ "status": "error", "data": e.to_string() })))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_callback_tolerates_garbage() {
        let cb = parse_callback("tran_id=TXN_ORD1_1&value_a=ORD1&amount=500.00");
        assert_eq!(cb.tran_id.as_deref(), Some("TXN_ORD1_1"));
        assert_eq!(cb.value_a.as_deref(), Some("ORD1"));

        let cb = parse_callback("");
        assert!(cb.tran_id.is_none());
        assert!(cb.value_a.is_none());
    }

    #[test]
    fn test_parse_amount_prefers_gateway_amount() {
        let cb = parse_callback("amount=500.00&value_b=499.00");
        assert_eq!(parse_amount(&cb), BigDecimal::from_str("500.00").ok());

        let cb = parse_callback("value_b=499.00");
        assert_eq!(parse_amount(&cb), BigDecimal::from_str("499.00").ok());

        let cb = parse_callback("amount=not-a-number");
        assert!(parse_amount(&cb).is_none());
    }
}
