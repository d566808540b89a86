use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Extension, Json, Router,
};
use serde::Deserialize;
use tuma_core::{Actor, Order, OrderStatus, Role, TrackingEvent};
use tuma_order::CourierStats;
use tuma_shared::GeoPoint;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::require_role;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders/{id}/status", patch(update_status))
        .route("/orders/{id}/location", patch(update_location))
        .route("/stats", get(stats))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct LocationUpdateRequest {
    pub lat: f64,
    pub lng: f64,
    pub description: Option<String>,
}

async fn update_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<Order>, AppError> {
    require_role(actor, Role::Courier)?;
    let location = match (req.lat, req.lng) {
        (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
        _ => None,
    };
    let order = state
        .orders
        .courier_update_status(actor, order_id, req.status, req.notes, location)
        .await?;
    Ok(Json(order))
}

async fn update_location(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<LocationUpdateRequest>,
) -> Result<Json<TrackingEvent>, AppError> {
    require_role(actor, Role::Courier)?;
    let event = state
        .orders
        .record_location(actor, order_id, GeoPoint::new(req.lat, req.lng), req.description)
        .await?;
    Ok(Json(event))
}

async fn stats(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<CourierStats>, AppError> {
    require_role(actor, Role::Courier)?;
    Ok(Json(state.orders.courier_stats(actor).await?))
}
