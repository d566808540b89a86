use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tuma_shared::GeoPoint;
use uuid::Uuid;

use crate::OrderStatus;

/// Append-only tracking record; never mutated after creation.
/// Ordered chronologically for audit, latest-first for current location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub id: Uuid,
    pub order_id: Uuid,
    pub location: Option<GeoPoint>,
    pub description: Option<String>,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub courier_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TrackingEvent {
    pub fn new(
        order_id: Uuid,
        status: OrderStatus,
        location: Option<GeoPoint>,
        description: Option<String>,
        notes: Option<String>,
        courier_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            location,
            description,
            status,
            notes,
            courier_id,
            created_at: now,
        }
    }

    /// Human-readable message for the status carried by this event
    pub fn status_message(&self) -> &'static str {
        match self.status {
            OrderStatus::Pending => "Order created, waiting for courier",
            OrderStatus::Assigned => "Courier assigned",
            OrderStatus::PickedUp => "Parcel picked up by courier",
            OrderStatus::InTransit => "Parcel is on the way",
            OrderStatus::Delivered => "Parcel delivered successfully",
            OrderStatus::Cancelled => "Order cancelled",
        }
    }
}
