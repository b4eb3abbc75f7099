//! Client-visible state channel.
//!
//! The payer comes back from the gateway via a redirect, so the outcome
//! has to survive one more page load. Two short-lived, non-http-only
//! cookies carry it: `paymentStatus` with the bare outcome and
//! `paymentInfo` with the transaction details the storefront renders.

use axum_extra::extract::cookie::{Cookie, CookieJar};
use cookie::time::Duration;
use serde::Serialize;
use std::fmt;

pub const PAYMENT_STATUS_COOKIE: &str = "paymentStatus";
pub const PAYMENT_INFO_COOKIE: &str = "paymentInfo";

// Minutes-scale expiry: long enough for the post-redirect render, short
// enough that a stale outcome never leaks into a later session.
const CHANNEL_TTL_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Success,
    Failed,
    Cancelled,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub order_id: Option<String>,
    pub transaction_id: Option<String>,
    pub amount: Option<String>,
    pub payment_method: Option<String>,
    pub validation_id: Option<String>,
}

/// Writes the payment outcome into the jar, replacing whatever an earlier
/// attempt left behind.
pub fn announce(jar: CookieJar, status: PaymentStatus, info: &PaymentInfo) -> CookieJar {
    let info_json = serde_json::to_string(info).unwrap_or_else(|_| "{}".to_string());

    jar.add(channel_cookie(PAYMENT_STATUS_COOKIE, status.to_string()))
        .add(channel_cookie(PAYMENT_INFO_COOKIE, info_json))
}

fn channel_cookie(name: &'static str, value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_path("/");
    // Read by storefront JavaScript on the next render.
    cookie.set_http_only(false);
    cookie.set_max_age(Duration::minutes(CHANNEL_TTL_MINUTES));
    cookie
}
