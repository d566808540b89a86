pub mod gateway;
pub mod reconciler;

pub use gateway::{
    parse_callback, CallbackResult, GatewayPaymentStatus, MpesaClient, MpesaConfig,
    PaymentGateway, StkPushOutcome,
};
pub use reconciler::PaymentReconciler;
