use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use tuma_core::{Actor, Order, OrderStatus, Payment, Role};
use tuma_order::DashboardStats;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::require_role;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders/{id}/assign", patch(assign_courier))
        .route("/orders/{id}/status", patch(update_status))
        .route("/payments/{id}/refund", post(refund_payment))
        .route("/stats", get(dashboard_stats))
}

#[derive(Debug, Deserialize)]
pub struct AssignCourierRequest {
    pub courier_id: Uuid,
}

async fn assign_courier(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<AssignCourierRequest>,
) -> Result<Json<Order>, AppError> {
    require_role(actor, Role::Admin)?;
    let order = state.orders.assign_courier(order_id, req.courier_id).await?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct StatusOverrideRequest {
    pub status: OrderStatus,
    pub notes: Option<String>,
}

async fn update_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<StatusOverrideRequest>,
) -> Result<Json<Order>, AppError> {
    require_role(actor, Role::Admin)?;
    let order = state
        .orders
        .admin_update_status(order_id, req.status, req.notes)
        .await?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub reason: Option<String>,
}

async fn refund_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(payment_id): Path<Uuid>,
    Json(req): Json<RefundRequest>,
) -> Result<Json<Payment>, AppError> {
    require_role(actor, Role::Admin)?;
    let payment = state.payments.refund(payment_id, req.reason).await?;
    Ok(Json(payment))
}

async fn dashboard_stats(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<DashboardStats>, AppError> {
    require_role(actor, Role::Admin)?;
    Ok(Json(state.orders.dashboard_stats().await?))
}
