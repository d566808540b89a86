use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tuma_core::repository::{NotificationRepository, OrderRepository, PaymentRepository};
use tuma_core::{
    Error, Notification, NotificationKind, Payment, PaymentStatus, Result,
};
use uuid::Uuid;

use crate::gateway::{CallbackResult, GatewayPaymentStatus, PaymentGateway, StkPushOutcome};

/// The legitimate race window between a webhook and its checkout id
/// being persisted is seconds wide; anything older is junk. The cap
/// keeps a flood of unknown ids from growing the buffer without bound.
const UNMATCHED_TTL_MINUTES: i64 = 15;
const MAX_UNMATCHED_RESULTS: usize = 256;

struct BufferedResult {
    result: CallbackResult,
    received_at: DateTime<Utc>,
}

/// Drives payment records through their state graph against an
/// asynchronous push-payment gateway. All result application funnels
/// through [`PaymentReconciler::apply_result`] so idempotency and state
/// precedence hold for webhooks and polling alike.
pub struct PaymentReconciler {
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentRepository>,
    notifications: Arc<dyn NotificationRepository>,
    gateway: Arc<dyn PaymentGateway>,
    /// Results that raced ahead of their correlation id being persisted,
    /// keyed by checkout request id. Replayed from initiate; bounded and
    /// expired because the webhook feeding it is unauthenticated.
    unmatched: Mutex<HashMap<String, BufferedResult>>,
}

impl PaymentReconciler {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentRepository>,
        notifications: Arc<dyn NotificationRepository>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            orders,
            payments,
            notifications,
            gateway,
            unmatched: Mutex::new(HashMap::new()),
        }
    }

    /// Start a push payment for an order. Two-phase write: the record
    /// moves to Processing before the gateway is called, so a callback
    /// arriving mid-flight always finds a correlatable row.
    pub async fn initiate(&self, order_id: Uuid, phone: &str) -> Result<Payment> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| Error::NotFound("order".to_string()))?;
        let mut payment = self
            .payments
            .get_payment_by_order(order_id)
            .await?
            .ok_or_else(|| Error::NotFound("payment".to_string()))?;

        match payment.status {
            PaymentStatus::Paid => {
                return Err(Error::Validation("order is already paid".to_string()))
            }
            PaymentStatus::Refunded | PaymentStatus::Cancelled => {
                return Err(Error::state_conflict(payment.status, PaymentStatus::Processing))
            }
            PaymentStatus::Pending | PaymentStatus::Processing | PaymentStatus::Failed => {}
        }

        // Phase one: persist intent before talking to the gateway
        payment.status = PaymentStatus::Processing;
        payment.customer_phone = Some(phone.trim().to_string());
        self.payments.update_payment(payment.clone()).await?;

        // Phase two: gateway call with the store lock released
        let amount = payment.amount.round() as u64;
        let outcome = self
            .gateway
            .stk_push(
                phone,
                amount,
                &payment.transaction_reference,
                &format!("Parcel delivery {}", order.tracking_number),
            )
            .await;

        match outcome {
            Ok(StkPushOutcome::Accepted {
                checkout_request_id,
                merchant_request_id,
            }) => {
                payment.checkout_request_id = Some(checkout_request_id.clone());
                payment.merchant_request_id = Some(merchant_request_id);
                self.payments.update_payment(payment.clone()).await?;
                tracing::info!(%order_id, %checkout_request_id, "payment initiated");

                // A webhook may have landed before the correlation id did
                let buffered = self.unmatched.lock().await.remove(&checkout_request_id);
                if let Some(buffered) = buffered {
                    tracing::info!(%checkout_request_id, "replaying buffered gateway result");
                    self.apply_result(buffered.result).await?;
                    if let Some(updated) = self.payments.get_payment(payment.id).await? {
                        payment = updated;
                    }
                }
                Ok(payment)
            }
            Ok(StkPushOutcome::Rejected { reason, code }) => {
                payment.mark_failed(Some(reason.clone()), Utc::now());
                self.payments.update_payment(payment).await?;
                Err(Error::Gateway(format!(
                    "payment request rejected ({}): {reason}",
                    code.as_deref().unwrap_or("no code")
                )))
            }
            Err(e) => {
                payment.mark_failed(Some("gateway unreachable".to_string()), Utc::now());
                self.payments.update_payment(payment).await?;
                Err(e)
            }
        }
    }

    /// Apply a gateway result to the matching payment. Idempotent, and
    /// ordered by precedence: a settled Paid record never regresses on a
    /// late or duplicate failure result.
    pub async fn apply_result(&self, result: CallbackResult) -> Result<()> {
        let payment = self
            .payments
            .get_payment_by_checkout_id(&result.checkout_request_id)
            .await?;
        let Some(mut payment) = payment else {
            tracing::warn!(
                checkout_request_id = %result.checkout_request_id,
                "gateway result with unknown checkout id, buffering"
            );
            self.buffer_unmatched(result).await;
            return Ok(());
        };

        if result.success {
            match payment.status {
                PaymentStatus::Paid => {
                    tracing::debug!(payment_id = %payment.id, "duplicate success result ignored");
                    Ok(())
                }
                PaymentStatus::Refunded | PaymentStatus::Cancelled => {
                    tracing::warn!(
                        payment_id = %payment.id,
                        status = %payment.status,
                        "success result for settled payment ignored"
                    );
                    Ok(())
                }
                PaymentStatus::Pending | PaymentStatus::Processing | PaymentStatus::Failed => {
                    payment.mark_paid(result.receipt_number.clone(), Utc::now());
                    if payment.merchant_request_id.is_none() {
                        payment.merchant_request_id = result.merchant_request_id.clone();
                    }
                    self.payments.update_payment(payment.clone()).await?;
                    tracing::info!(payment_id = %payment.id, order_id = %payment.order_id, "payment settled");
                    self.notify(
                        &payment,
                        NotificationKind::PaymentReceived,
                        format!(
                            "Payment of {} {:.2} received{}",
                            payment.currency,
                            payment.amount,
                            payment
                                .receipt_number
                                .as_deref()
                                .map(|r| format!(" (receipt {r})"))
                                .unwrap_or_default()
                        ),
                    )
                    .await;
                    Ok(())
                }
            }
        } else {
            match payment.status {
                PaymentStatus::Paid => {
                    tracing::warn!(
                        payment_id = %payment.id,
                        reason = ?result.failure_reason,
                        "stale failure result after settlement ignored"
                    );
                    Ok(())
                }
                PaymentStatus::Failed
                | PaymentStatus::Refunded
                | PaymentStatus::Cancelled => Ok(()),
                PaymentStatus::Pending | PaymentStatus::Processing => {
                    payment.mark_failed(result.failure_reason.clone(), Utc::now());
                    self.payments.update_payment(payment.clone()).await?;
                    tracing::info!(payment_id = %payment.id, "payment failed");
                    self.notify(
                        &payment,
                        NotificationKind::PaymentFailed,
                        format!(
                            "Payment failed: {}",
                            result.failure_reason.as_deref().unwrap_or("unknown reason")
                        ),
                    )
                    .await;
                    Ok(())
                }
            }
        }
    }

    /// Query the gateway for a still-pending payment and settle it through
    /// the same precedence path the webhook uses.
    pub async fn poll(&self, checkout_request_id: &str) -> Result<Payment> {
        let payment = self
            .payments
            .get_payment_by_checkout_id(checkout_request_id)
            .await?
            .ok_or_else(|| Error::NotFound("payment".to_string()))?;

        if !matches!(
            payment.status,
            PaymentStatus::Pending | PaymentStatus::Processing
        ) {
            return Ok(payment);
        }

        let status = self.gateway.query_status(checkout_request_id).await?;
        let synthetic = match status {
            GatewayPaymentStatus::Completed => Some(CallbackResult {
                checkout_request_id: checkout_request_id.to_string(),
                merchant_request_id: None,
                success: true,
                result_code: 0,
                receipt_number: None,
                amount: None,
                phone_number: None,
                transaction_time: None,
                failure_reason: None,
            }),
            GatewayPaymentStatus::Failed => {
                Some(failure_result(checkout_request_id, 1, "payment failed"))
            }
            GatewayPaymentStatus::Cancelled => {
                Some(failure_result(checkout_request_id, 1032, "cancelled by user"))
            }
            GatewayPaymentStatus::Timeout => {
                Some(failure_result(checkout_request_id, 1037, "request timed out"))
            }
            GatewayPaymentStatus::Unknown => None,
        };
        if let Some(result) = synthetic {
            self.apply_result(result).await?;
        }

        self.payments
            .get_payment(payment.id)
            .await?
            .ok_or_else(|| Error::NotFound("payment".to_string()))
    }

    pub async fn refund(&self, payment_id: Uuid, reason: Option<String>) -> Result<Payment> {
        let mut payment = self
            .payments
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| Error::NotFound("payment".to_string()))?;
        payment.mark_refunded(reason, Utc::now())?;
        self.payments.update_payment(payment.clone()).await?;
        tracing::info!(payment_id = %payment.id, "payment refunded");
        Ok(payment)
    }

    /// Lookup by gateway correlation id. Read-only, so callers can
    /// authorize against the owning order before anything mutates.
    pub async fn find_by_checkout(&self, checkout_request_id: &str) -> Result<Payment> {
        self.payments
            .get_payment_by_checkout_id(checkout_request_id)
            .await?
            .ok_or_else(|| Error::NotFound("payment".to_string()))
    }

    pub async fn status_for_order(&self, order_id: Uuid) -> Result<Payment> {
        self.payments
            .get_payment_by_order(order_id)
            .await?
            .ok_or_else(|| Error::NotFound("payment".to_string()))
    }

    async fn buffer_unmatched(&self, result: CallbackResult) {
        let mut unmatched = self.unmatched.lock().await;
        let now = Utc::now();
        unmatched.retain(|_, b| now - b.received_at < Duration::minutes(UNMATCHED_TTL_MINUTES));
        if unmatched.len() >= MAX_UNMATCHED_RESULTS {
            let oldest = unmatched
                .iter()
                .min_by_key(|(_, b)| b.received_at)
                .map(|(id, _)| id.clone());
            if let Some(id) = oldest {
                tracing::warn!(checkout_request_id = %id, "unmatched buffer full, evicting oldest");
                unmatched.remove(&id);
            }
        }
        unmatched.insert(
            result.checkout_request_id.clone(),
            BufferedResult {
                result,
                received_at: now,
            },
        );
    }

    // Notification fan-out is best-effort and never fails the settlement
    async fn notify(&self, payment: &Payment, kind: NotificationKind, message: String) {
        let customer_id = match self.orders.get_order(payment.order_id).await {
            Ok(Some(order)) => order.customer_id,
            _ => {
                tracing::warn!(order_id = %payment.order_id, "order missing for payment notification");
                return;
            }
        };
        let notification =
            Notification::new(customer_id, Some(payment.order_id), kind, message, Utc::now());
        if let Err(e) = self.notifications.insert_notification(notification).await {
            tracing::warn!(error = %e, "failed to record payment notification");
        }
    }
}

fn failure_result(checkout_request_id: &str, code: i64, reason: &str) -> CallbackResult {
    CallbackResult {
        checkout_request_id: checkout_request_id.to_string(),
        merchant_request_id: None,
        success: false,
        result_code: code,
        receipt_number: None,
        amount: None,
        phone_number: None,
        transaction_time: None,
        failure_reason: Some(reason.to_string()),
    }
}
