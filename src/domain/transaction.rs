//! Transaction domain entity.
//! One record per checkout attempt; the order collaborator is system of
//! record, so the in-process record is discarded once its terminal state
//! has been handed off.

use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Initiated,
    Succeeded,
    Failed,
    Cancelled,
    Verified,
    VerificationFailed,
}

/// Terminal outcome reported by the gateway for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    Success,
    Fail,
    Cancel,
}

#[derive(Debug, Clone)]
pub struct Transaction {
    pub transaction_id: String,
    pub order_id: String,
    pub amount: BigDecimal,
    pub gateway_validation_id: Option<String>,
    pub status: TransactionStatus,
}

impl Transaction {
    /// Creates a fresh record at init time with a newly generated id.
    pub fn initiated(order_id: &str, amount: BigDecimal) -> Self {
        Self {
            transaction_id: new_transaction_id(order_id),
            order_id: order_id.to_string(),
            amount,
            gateway_validation_id: None,
            status: TransactionStatus::Initiated,
        }
    }

    /// Reconstructs a record from gateway callback fields. The record from
    /// init does not survive across invocations, so callbacks rebuild it
    /// from the echoed fields.
    pub fn from_callback(transaction_id: String, order_id: String, amount: BigDecimal) -> Self {
        Self {
            transaction_id,
            order_id,
            amount,
            gateway_validation_id: None,
            status: TransactionStatus::Initiated,
        }
    }

    /// Applies a terminal gateway callback. Returns `false` when the
    /// transaction already reached a terminal state: gateways retry
    /// delivery, so a duplicate callback is ignorable rather than an error.
    pub fn resolve(&mut self, outcome: CallbackOutcome, validation_id: Option<String>) -> bool {
        if self.status != TransactionStatus::Initiated {
            return false;
        }
        self.status = match outcome {
            CallbackOutcome::Success => {
                self.gateway_validation_id = validation_id;
                TransactionStatus::Succeeded
            }
            CallbackOutcome::Fail => TransactionStatus::Failed,
            CallbackOutcome::Cancel => TransactionStatus::Cancelled,
        };
        true
    }

    /// Records the post-hoc verification outcome. Only meaningful after a
    /// success callback; a negative result never rolls back `Succeeded`.
    pub fn record_verification(&mut self, valid: bool) -> bool {
        if self.status != TransactionStatus::Succeeded {
            return false;
        }
        self.status = if valid {
            TransactionStatus::Verified
        } else {
            TransactionStatus::VerificationFailed
        };
        true
    }
}

/// Builds `TXN_<orderId>_<stamp>`. The stamp is a millisecond timestamp
/// forced to be strictly increasing process-wide, so retries of the same
/// order never reuse an id.
pub fn new_transaction_id(order_id: &str) -> String {
    format!("TXN_{}_{}", order_id, next_stamp())
}

fn next_stamp() -> i64 {
    static LAST: AtomicI64 = AtomicI64::new(0);
    loop {
        let prev = LAST.load(Ordering::Relaxed);
        let now = Utc::now().timestamp_millis().max(prev + 1);
        if LAST
            .compare_exchange(prev, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            return now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_transaction_id_embeds_order_id() {
        let id = new_transaction_id("ORD1");
        assert!(id.starts_with("TXN_ORD1_"));
    }

    #[test]
    fn test_transaction_ids_unique_for_repeated_order() {
        let ids: HashSet<String> = (0..100).map(|_| new_transaction_id("ORD1")).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_second_terminal_callback_is_ignored() {
        let mut txn = Transaction::initiated("ORD1", BigDecimal::from(500));
        assert!(txn.resolve(CallbackOutcome::Success, Some("VAL123".to_string())));
        assert!(!txn.resolve(CallbackOutcome::Fail, None));
        assert_eq!(txn.status, TransactionStatus::Succeeded);
        assert_eq!(txn.gateway_validation_id.as_deref(), Some("VAL123"));
    }

    #[test]
    fn test_verification_failure_does_not_revert_success() {
        let mut txn = Transaction::initiated("ORD1", BigDecimal::from(500));
        txn.resolve(CallbackOutcome::Success, None);
        assert!(txn.record_verification(false));
        assert_eq!(txn.status, TransactionStatus::VerificationFailed);
    }

    #[test]
    fn test_verification_requires_success() {
        let mut txn = Transaction::initiated("ORD1", BigDecimal::from(500));
        txn.resolve(CallbackOutcome::Cancel, None);
        assert!(!txn.record_verification(true));
        assert_eq!(txn.status, TransactionStatus::Cancelled);
    }
}
