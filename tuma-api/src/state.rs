use std::sync::Arc;

use tuma_core::repository::NotificationRepository;
use tuma_order::OrderService;
use tuma_payment::PaymentReconciler;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentReconciler>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub auth: AuthConfig,
}
