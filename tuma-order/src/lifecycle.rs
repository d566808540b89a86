use chrono::{DateTime, Utc};
use tuma_core::{Error, Order, OrderStatus, Result};
use uuid::Uuid;

/// Canonical transition table. Delivered and Cancelled are terminal.
pub fn allowed_transitions(from: OrderStatus) -> &'static [OrderStatus] {
    match from {
        OrderStatus::Pending => &[OrderStatus::Assigned, OrderStatus::Cancelled],
        OrderStatus::Assigned => &[OrderStatus::PickedUp, OrderStatus::Cancelled],
        OrderStatus::PickedUp => &[OrderStatus::InTransit, OrderStatus::Cancelled],
        OrderStatus::InTransit => &[OrderStatus::Delivered],
        OrderStatus::Delivered | OrderStatus::Cancelled => &[],
    }
}

pub fn check_transition(current: OrderStatus, requested: OrderStatus) -> Result<()> {
    if allowed_transitions(current).contains(&requested) {
        Ok(())
    } else {
        Err(Error::state_conflict(current, requested))
    }
}

/// Apply a validated transition to the order row. Courier binding happens
/// at Assigned, or at PickedUp if the order somehow reached it unbound;
/// Delivered records the actual delivery timestamp.
pub fn apply_transition(
    order: &mut Order,
    requested: OrderStatus,
    courier_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<()> {
    check_transition(order.status, requested)?;

    order.status = requested;
    order.updated_at = now;

    match requested {
        OrderStatus::Delivered => {
            order.actual_delivery_at = Some(now);
        }
        OrderStatus::Assigned => {
            if courier_id.is_some() {
                order.courier_id = courier_id;
            }
        }
        OrderStatus::PickedUp => {
            if order.courier_id.is_none() && courier_id.is_some() {
                order.courier_id = courier_id;
            }
        }
        _ => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuma_core::WeightCategory;
    use tuma_shared::GeoPoint;

    fn order(status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            tracking_number: "DLV25030714301234".to_string(),
            customer_id: Uuid::new_v4(),
            courier_id: None,
            pickup: GeoPoint::new(-1.28, 36.82),
            pickup_address: "Kimathi Street, Nairobi".to_string(),
            pickup_phone: None,
            destination: GeoPoint::new(-1.30, 36.78),
            destination_address: "Ngong Road, Nairobi".to_string(),
            destination_phone: None,
            weight_kg: 8.0,
            weight_category: WeightCategory::Medium,
            parcel_description: None,
            parcel_dimensions: None,
            fragile: false,
            insurance_required: false,
            is_express: false,
            is_weekend: false,
            distance_km: 6.5,
            base_price: 100.0,
            distance_price: 130.0,
            weight_price: 150.0,
            extra_charges: 0.0,
            total_price: 380.0,
            currency: "KES".to_string(),
            status,
            estimated_delivery_at: None,
            actual_delivery_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_full_happy_path() {
        let mut o = order(OrderStatus::Pending);
        let courier = Uuid::new_v4();
        apply_transition(&mut o, OrderStatus::Assigned, Some(courier), Utc::now()).unwrap();
        assert_eq!(o.courier_id, Some(courier));
        apply_transition(&mut o, OrderStatus::PickedUp, None, Utc::now()).unwrap();
        apply_transition(&mut o, OrderStatus::InTransit, None, Utc::now()).unwrap();
        apply_transition(&mut o, OrderStatus::Delivered, None, Utc::now()).unwrap();
        assert_eq!(o.status, OrderStatus::Delivered);
        assert!(o.actual_delivery_at.is_some());
    }

    #[test]
    fn test_pending_can_cancel() {
        let mut o = order(OrderStatus::Pending);
        apply_transition(&mut o, OrderStatus::Cancelled, None, Utc::now()).unwrap();
        assert_eq!(o.status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_delivered_is_terminal() {
        for target in [
            OrderStatus::Pending,
            OrderStatus::Assigned,
            OrderStatus::PickedUp,
            OrderStatus::InTransit,
            OrderStatus::Cancelled,
        ] {
            let mut o = order(OrderStatus::Delivered);
            let err = apply_transition(&mut o, target, None, Utc::now()).unwrap_err();
            match err {
                Error::StateConflict { current, requested } => {
                    assert_eq!(current, "DELIVERED");
                    assert_eq!(requested, target.to_string());
                }
                other => panic!("expected StateConflict, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_cannot_skip_in_transit() {
        let mut o = order(OrderStatus::PickedUp);
        assert!(apply_transition(&mut o, OrderStatus::Delivered, None, Utc::now()).is_err());
        // order untouched on failure
        assert_eq!(o.status, OrderStatus::PickedUp);
        assert!(o.actual_delivery_at.is_none());
    }

    #[test]
    fn test_cannot_cancel_in_transit() {
        let mut o = order(OrderStatus::InTransit);
        assert!(apply_transition(&mut o, OrderStatus::Cancelled, None, Utc::now()).is_err());
    }

    #[test]
    fn test_picked_up_binds_courier_only_when_unbound() {
        let existing = Uuid::new_v4();
        let mut o = order(OrderStatus::Assigned);
        o.courier_id = Some(existing);
        apply_transition(&mut o, OrderStatus::PickedUp, Some(Uuid::new_v4()), Utc::now()).unwrap();
        assert_eq!(o.courier_id, Some(existing));
    }
}
