use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod courier;
pub mod error;
pub mod middleware;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod state;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let protected = Router::new()
        .nest("/api/orders", orders::routes())
        .nest("/api/courier", courier::routes())
        .nest("/api/admin", admin::routes())
        .nest("/api/payments", payments::routes())
        .nest("/api/notifications", notifications::routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // the gateway webhook authenticates nothing; it is correlated, not trusted
    let public = Router::new()
        .route("/api/payments/callback", post(payments::callback))
        .route("/api/track/{tracking_number}", get(orders::track_by_number));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
