use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use tuma_core::{Actor, Order, OrderStatus, Role};
use tuma_order::{CreateOrderRequest, DestinationUpdateRequest, EstimateRequest};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::require_role;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/estimate", post(estimate))
        .route("/{id}", get(get_order))
        .route("/{id}/destination", patch(update_destination))
        .route("/{id}/cancel", post(cancel_order))
        .route("/{id}/tracking", get(tracking))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<OrderStatus>,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<Order>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub pages: usize,
}

async fn create_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    require_role(actor, Role::Customer)?;
    let order = state.orders.create_order(actor.user_id, &req).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn estimate(
    State(state): State<AppState>,
    Extension(_actor): Extension<Actor>,
    Json(req): Json<EstimateRequest>,
) -> Result<Json<tuma_order::Estimate>, AppError> {
    Ok(Json(state.orders.estimate(&req).await?))
}

async fn list_orders(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<ListParams>,
) -> Result<Json<OrderListResponse>, AppError> {
    let page = state
        .orders
        .list_orders(actor, params.status, params.page, params.limit)
        .await?;
    Ok(Json(OrderListResponse {
        total: page.total,
        page: page.page,
        limit: page.limit,
        pages: page.pages(),
        orders: page.orders,
    }))
}

async fn get_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<tuma_order::OrderDetails>, AppError> {
    Ok(Json(state.orders.get_order(actor, order_id).await?))
}

async fn update_destination(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<DestinationUpdateRequest>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(
        state.orders.update_destination(actor, order_id, &req).await?,
    ))
}

async fn cancel_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orders.cancel_order(actor, order_id).await?))
}

/// Public tracking endpoint, mounted outside the auth middleware
pub async fn track_by_number(
    State(state): State<AppState>,
    Path(tracking_number): Path<String>,
) -> Result<Json<tuma_order::TrackingView>, AppError> {
    Ok(Json(state.orders.track_by_number(&tracking_number).await?))
}

async fn tracking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<tuma_order::TrackingView>, AppError> {
    Ok(Json(state.orders.tracking(actor, order_id).await?))
}
