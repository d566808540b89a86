use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tuma_shared::GeoPoint;
use uuid::Uuid;

/// Order status in the delivery lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Assigned,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Assigned => "ASSIGNED",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::InTransit => "IN_TRANSIT",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Banded parcel weight classification used for flat weight pricing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeightCategory {
    Small,
    Medium,
    Large,
    Xlarge,
}

impl WeightCategory {
    /// < 5kg Small, < 20kg Medium, < 50kg Large, else Xlarge
    pub fn from_weight(weight_kg: f64) -> Self {
        if weight_kg < 5.0 {
            WeightCategory::Small
        } else if weight_kg < 20.0 {
            WeightCategory::Medium
        } else if weight_kg < 50.0 {
            WeightCategory::Large
        } else {
            WeightCategory::Xlarge
        }
    }
}

/// The single source of truth for a delivery request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub tracking_number: String,
    pub customer_id: Uuid,
    pub courier_id: Option<Uuid>,

    pub pickup: GeoPoint,
    pub pickup_address: String,
    pub pickup_phone: Option<String>,
    pub destination: GeoPoint,
    pub destination_address: String,
    pub destination_phone: Option<String>,

    pub weight_kg: f64,
    pub weight_category: WeightCategory,
    pub parcel_description: Option<String>,
    pub parcel_dimensions: Option<String>,
    pub fragile: bool,
    pub insurance_required: bool,
    pub is_express: bool,
    pub is_weekend: bool,

    pub distance_km: f64,
    pub base_price: f64,
    pub distance_price: f64,
    pub weight_price: f64,
    pub extra_charges: f64,
    pub total_price: f64,
    pub currency: String,

    pub status: OrderStatus,
    pub estimated_delivery_at: Option<DateTime<Utc>>,
    pub actual_delivery_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Destination is mutable only while no courier has acted on the order
    pub fn can_update_destination(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    /// Cancellation is allowed any time before the parcel is in transit
    pub fn can_cancel(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Pending | OrderStatus::Assigned | OrderStatus::PickedUp
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_category_boundaries() {
        assert_eq!(WeightCategory::from_weight(4.99), WeightCategory::Small);
        assert_eq!(WeightCategory::from_weight(5.0), WeightCategory::Medium);
        assert_eq!(WeightCategory::from_weight(19.99), WeightCategory::Medium);
        assert_eq!(WeightCategory::from_weight(20.0), WeightCategory::Large);
        assert_eq!(WeightCategory::from_weight(49.99), WeightCategory::Large);
        assert_eq!(WeightCategory::from_weight(50.0), WeightCategory::Xlarge);
    }

    #[test]
    fn test_status_serializes_screaming_snake() {
        let s = serde_json::to_string(&OrderStatus::PickedUp).unwrap();
        assert_eq!(s, "\"PICKED_UP\"");
        let s = serde_json::to_string(&OrderStatus::InTransit).unwrap();
        assert_eq!(s, "\"IN_TRANSIT\"");
    }
}
