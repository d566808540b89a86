use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tuma_api::{app, state::{AppState, AuthConfig}};
use tuma_order::OrderService;
use tuma_payment::{MpesaClient, PaymentReconciler};
use tuma_pricing::{PricingEngine, RoutingClient};
use tuma_store::{InMemoryStore, LogMailer};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tuma_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = tuma_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Tuma API on port {}", config.server.port);

    let store = Arc::new(InMemoryStore::new());
    let pricing = Arc::new(PricingEngine::new(config.pricing.clone()));
    let routing = Arc::new(
        RoutingClient::new(config.maps.clone()).expect("Failed to build routing client"),
    );
    let gateway = Arc::new(
        MpesaClient::new(config.mpesa.clone()).expect("Failed to build payment gateway client"),
    );

    let orders = Arc::new(OrderService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(LogMailer),
        routing,
        pricing,
    ));
    let payments = Arc::new(PaymentReconciler::new(
        store.clone(),
        store.clone(),
        store.clone(),
        gateway,
    ));

    let app_state = AppState {
        orders,
        payments,
        notifications: store,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
