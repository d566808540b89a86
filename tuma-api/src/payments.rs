use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tuma_core::{Actor, Payment};
use tuma_payment::parse_callback;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/initiate", post(initiate))
        .route("/status/{order_id}", get(status))
        .route("/query/{checkout_request_id}", get(query))
}

#[derive(Debug, Deserialize)]
pub struct InitiateRequest {
    pub order_id: Uuid,
    pub phone_number: String,
}

async fn initiate(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<InitiateRequest>,
) -> Result<Json<Payment>, AppError> {
    // ownership check rides on the order read
    state.orders.get_order(actor, req.order_id).await?;
    let payment = state
        .payments
        .initiate(req.order_id, &req.phone_number)
        .await?;
    Ok(Json(payment))
}

async fn status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Payment>, AppError> {
    state.orders.get_order(actor, order_id).await?;
    Ok(Json(state.payments.status_for_order(order_id).await?))
}

async fn query(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(checkout_request_id): Path<String>,
) -> Result<Json<Payment>, AppError> {
    // authorize against the owning order before the gateway round-trip
    let payment = state.payments.find_by_checkout(&checkout_request_id).await?;
    state.orders.get_order(actor, payment.order_id).await?;
    Ok(Json(state.payments.poll(&checkout_request_id).await?))
}

/// Unauthenticated gateway webhook. Whatever happens inside, the gateway
/// gets a success acknowledgement so it stops retrying; failures are
/// recovered through the poll path.
pub async fn callback(State(state): State<AppState>, Json(payload): Json<Value>) -> Json<Value> {
    match parse_callback(&payload) {
        Ok(result) => {
            if let Err(e) = state.payments.apply_result(result).await {
                tracing::error!(error = %e, "failed to apply payment callback");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "discarding malformed payment callback");
        }
    }
    Json(json!({"ResultCode": 0, "ResultDesc": "Accepted"}))
}
