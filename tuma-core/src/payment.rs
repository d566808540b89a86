use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    MobileMoney,
    Card,
    Cash,
    Wallet,
}

/// Payment status, monotonic under precedence: once Paid, a late failure
/// result must never downgrade the record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Paid,
    Failed,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment record, one per order, mutated only by the reconciler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: f64,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,

    pub transaction_reference: String,
    pub merchant_request_id: Option<String>,
    pub checkout_request_id: Option<String>,
    pub receipt_number: Option<String>,
    pub customer_phone: Option<String>,

    pub failure_reason: Option<String>,
    pub refund_reason: Option<String>,

    pub initiated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Factory for the initial Pending record created alongside an order.
    /// The transaction reference is generated by the caller so that
    /// construction stays side-effect-free.
    pub fn for_order(
        order_id: Uuid,
        amount: f64,
        currency: String,
        transaction_reference: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            amount,
            currency,
            method: PaymentMethod::MobileMoney,
            status: PaymentStatus::Pending,
            transaction_reference,
            merchant_request_id: None,
            checkout_request_id: None,
            receipt_number: None,
            customer_phone: None,
            failure_reason: None,
            refund_reason: None,
            initiated_at: now,
            paid_at: None,
            failed_at: None,
            refunded_at: None,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }

    pub fn can_refund(&self) -> bool {
        self.status == PaymentStatus::Paid && self.paid_at.is_some()
    }

    pub fn mark_paid(&mut self, receipt_number: Option<String>, now: DateTime<Utc>) {
        self.status = PaymentStatus::Paid;
        self.paid_at = Some(now);
        if receipt_number.is_some() {
            self.receipt_number = receipt_number;
        }
    }

    pub fn mark_failed(&mut self, reason: Option<String>, now: DateTime<Utc>) {
        self.status = PaymentStatus::Failed;
        self.failed_at = Some(now);
        if reason.is_some() {
            self.failure_reason = reason;
        }
    }

    pub fn mark_cancelled(&mut self) {
        self.status = PaymentStatus::Cancelled;
    }

    pub fn mark_refunded(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<()> {
        if !self.can_refund() {
            return Err(Error::state_conflict(self.status, PaymentStatus::Refunded));
        }
        self.status = PaymentStatus::Refunded;
        self.refunded_at = Some(now);
        self.refund_reason = reason;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment() -> Payment {
        Payment::for_order(
            Uuid::new_v4(),
            250.0,
            "KES".to_string(),
            "PAY2503071430051234".to_string(),
            Utc::now(),
        )
    }

    #[test]
    fn test_refund_requires_paid_with_timestamp() {
        let mut p = payment();
        assert!(!p.can_refund());
        assert!(p.mark_refunded(None, Utc::now()).is_err());

        p.mark_paid(Some("QGR7TY12".to_string()), Utc::now());
        assert!(p.can_refund());
        p.mark_refunded(Some("customer request".to_string()), Utc::now())
            .unwrap();
        assert_eq!(p.status, PaymentStatus::Refunded);
        assert!(p.refunded_at.is_some());
    }

    #[test]
    fn test_mark_paid_keeps_existing_receipt_when_none_given() {
        let mut p = payment();
        p.mark_paid(Some("QGR7TY12".to_string()), Utc::now());
        p.mark_paid(None, Utc::now());
        assert_eq!(p.receipt_number.as_deref(), Some("QGR7TY12"));
    }
}
