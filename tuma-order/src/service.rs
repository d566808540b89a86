use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tuma_core::repository::{
    Mailer, OrderFilter, OrderPage, OrderRepository, OrderUpdate, PaymentRepository, StatusCounts,
    UserRepository,
};
use tuma_core::{
    Actor, Error, Notification, NotificationKind, Order, OrderStatus, Payment, PaymentStatus,
    Result, Role, TrackingEvent, WeightCategory,
};
use tuma_pricing::{DistanceMethod, DistanceProvider, PriceBreakdown, PricingEngine};
use tuma_shared::{refs, GeoPoint};
use uuid::Uuid;

use crate::lifecycle;
use crate::request::{CreateOrderRequest, DestinationUpdateRequest, EstimateRequest};

/// Quote returned by the estimate operation; nothing is persisted
#[derive(Debug, Clone, Serialize)]
pub struct Estimate {
    pub distance_km: f64,
    pub duration_minutes: i64,
    pub method: DistanceMethod,
    pub breakdown: PriceBreakdown,
    pub estimated_delivery_minutes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub payment: Option<Payment>,
    pub tracking_history: Vec<TrackingEvent>,
}

/// Platform-wide aggregates for the admin dashboard
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_orders: usize,
    pub orders_by_status: StatusCounts,
    pub total_revenue: f64,
}

/// Delivery record of a single courier
#[derive(Debug, Clone, Serialize)]
pub struct CourierStats {
    pub total_deliveries: usize,
    pub completed_deliveries: usize,
    pub active_deliveries: usize,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackingView {
    pub order_id: Uuid,
    pub tracking_number: String,
    pub status: OrderStatus,
    pub current_location: Option<TrackingEvent>,
    pub tracking_history: Vec<TrackingEvent>,
}

/// Owns the order lifecycle: creation, destination changes, courier
/// transitions and cancellation, with their tracking/notification side
/// effects committed atomically through the repository.
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentRepository>,
    users: Arc<dyn UserRepository>,
    mailer: Arc<dyn Mailer>,
    distance: Arc<dyn DistanceProvider>,
    pricing: Arc<PricingEngine>,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentRepository>,
        users: Arc<dyn UserRepository>,
        mailer: Arc<dyn Mailer>,
        distance: Arc<dyn DistanceProvider>,
        pricing: Arc<PricingEngine>,
    ) -> Self {
        Self {
            orders,
            payments,
            users,
            mailer,
            distance,
            pricing,
        }
    }

    /// Price a prospective delivery without persisting anything
    pub async fn estimate(&self, req: &EstimateRequest) -> Result<Estimate> {
        req.validate()?;
        let distance = self.distance.distance(req.pickup(), req.destination()).await?;
        let breakdown = self
            .pricing
            .quote(distance.distance_km, req.weight_kg, req.flags())?;
        let estimated_delivery_minutes = self
            .pricing
            .delivery_estimate_minutes(distance.distance_km, req.is_express);
        Ok(Estimate {
            distance_km: distance.distance_km,
            duration_minutes: distance.duration_minutes,
            method: distance.method,
            breakdown,
            estimated_delivery_minutes,
        })
    }

    /// Create an order plus its initial Pending payment, tracking event
    /// and notification in one atomic unit.
    pub async fn create_order(&self, customer_id: Uuid, req: &CreateOrderRequest) -> Result<Order> {
        req.validate()?;

        let distance = self.distance.distance(req.pickup(), req.destination()).await?;
        let breakdown = self
            .pricing
            .quote(distance.distance_km, req.weight_kg, req.flags())?;
        let eta_minutes = self
            .pricing
            .delivery_estimate_minutes(distance.distance_km, req.is_express);

        let now = Utc::now();
        let estimated_delivery_at = now + Duration::minutes(eta_minutes);
        let tracking_number = refs::tracking_number(now);

        let order = Order {
            id: Uuid::new_v4(),
            tracking_number: tracking_number.clone(),
            customer_id,
            courier_id: None,
            pickup: req.pickup(),
            pickup_address: req.pickup_address.trim().to_string(),
            pickup_phone: trimmed(&req.pickup_phone),
            destination: req.destination(),
            destination_address: req.destination_address.trim().to_string(),
            destination_phone: trimmed(&req.destination_phone),
            weight_kg: req.weight_kg,
            weight_category: WeightCategory::from_weight(req.weight_kg),
            parcel_description: trimmed(&req.parcel_description),
            parcel_dimensions: trimmed(&req.parcel_dimensions),
            fragile: req.fragile,
            insurance_required: req.insurance_required,
            is_express: req.is_express,
            is_weekend: req.is_weekend,
            distance_km: distance.distance_km,
            base_price: breakdown.base_price,
            distance_price: breakdown.distance_price,
            weight_price: breakdown.weight_price,
            extra_charges: breakdown.extra_charges,
            total_price: breakdown.total_price,
            currency: breakdown.currency.clone(),
            status: OrderStatus::Pending,
            estimated_delivery_at: Some(estimated_delivery_at),
            actual_delivery_at: None,
            created_at: now,
            updated_at: now,
        };

        let payment = Payment::for_order(
            order.id,
            order.total_price,
            order.currency.clone(),
            refs::transaction_reference(now),
            now,
        );

        let event = TrackingEvent::new(
            order.id,
            OrderStatus::Pending,
            Some(order.pickup),
            Some("Order created".to_string()),
            Some("Waiting for courier assignment".to_string()),
            None,
            now,
        );

        let notification = Notification::new(
            customer_id,
            Some(order.id),
            NotificationKind::StatusUpdate,
            format!(
                "Your order #{} has been created. Estimated delivery: {}",
                tracking_number,
                estimated_delivery_at.format("%b %d, %H:%M")
            ),
            now,
        );

        self.orders
            .create_order(order.clone(), payment, event, notification)
            .await?;

        tracing::info!(order_id = %order.id, tracking_number = %order.tracking_number, "order created");
        Ok(order)
    }

    pub async fn get_order(&self, actor: Actor, order_id: Uuid) -> Result<OrderDetails> {
        let order = self.require_order(order_id).await?;
        self.authorize_view(actor, &order)?;
        let payment = self.payments.get_payment_by_order(order_id).await?;
        let tracking_history = self.orders.events_for_order(order_id).await?;
        Ok(OrderDetails {
            order,
            payment,
            tracking_history,
        })
    }

    /// Role-scoped listing: admins see everything, couriers their
    /// assignments, customers their own orders.
    pub async fn list_orders(
        &self,
        actor: Actor,
        status: Option<OrderStatus>,
        page: usize,
        limit: usize,
    ) -> Result<OrderPage> {
        let mut filter = OrderFilter {
            status,
            page: page.max(1),
            limit: limit.clamp(1, 100),
            ..OrderFilter::default()
        };
        match actor.role {
            Role::Admin => {}
            Role::Courier => filter.courier_id = Some(actor.user_id),
            Role::Customer => filter.customer_id = Some(actor.user_id),
        }
        self.orders.list_orders(filter).await
    }

    /// Replace the destination while the order is still Pending,
    /// recomputing distance, price breakdown, ETA and the pending
    /// payment amount as one unit.
    pub async fn update_destination(
        &self,
        actor: Actor,
        order_id: Uuid,
        req: &DestinationUpdateRequest,
    ) -> Result<Order> {
        req.validate()?;
        let mut order = self.require_order(order_id).await?;
        if actor.role != Role::Admin && order.customer_id != actor.user_id {
            return Err(Error::Authorization(
                "not authorized to update this order".to_string(),
            ));
        }
        if !order.can_update_destination() {
            return Err(Error::Validation(
                "destination can only be updated for pending orders".to_string(),
            ));
        }

        let distance = self
            .distance
            .distance(order.pickup, req.destination())
            .await?;
        let breakdown = self.pricing.quote(
            distance.distance_km,
            order.weight_kg,
            crate::request::flags_of(&order),
        )?;
        let eta_minutes = self
            .pricing
            .delivery_estimate_minutes(distance.distance_km, order.is_express);

        let now = Utc::now();
        order.destination = req.destination();
        order.destination_address = req.destination_address.trim().to_string();
        if let Some(phone) = trimmed(&req.destination_phone) {
            order.destination_phone = Some(phone);
        }
        order.distance_km = distance.distance_km;
        order.base_price = breakdown.base_price;
        order.distance_price = breakdown.distance_price;
        order.weight_price = breakdown.weight_price;
        order.extra_charges = breakdown.extra_charges;
        order.total_price = breakdown.total_price;
        order.estimated_delivery_at = Some(now + Duration::minutes(eta_minutes));
        order.updated_at = now;

        // Pending payments follow the new total; settled ones are left alone
        let payment = match self.payments.get_payment_by_order(order_id).await? {
            Some(mut p) if matches!(p.status, PaymentStatus::Pending | PaymentStatus::Processing) => {
                p.amount = order.total_price;
                Some(p)
            }
            _ => None,
        };

        let event = TrackingEvent::new(
            order.id,
            order.status,
            Some(order.destination),
            Some("Destination updated".to_string()),
            Some(format!("New destination: {}", order.destination_address)),
            None,
            now,
        );
        let notification = Notification::new(
            order.customer_id,
            Some(order.id),
            NotificationKind::StatusUpdate,
            format!(
                "Destination updated for order #{}. New total: {} {:.2}",
                order.tracking_number, order.currency, order.total_price
            ),
            now,
        );

        self.orders
            .commit_update(OrderUpdate {
                order: order.clone(),
                payment,
                events: vec![event],
                notifications: vec![notification],
            })
            .await?;

        Ok(order)
    }

    /// Cancel before transit; cancels the unsettled payment too
    pub async fn cancel_order(&self, actor: Actor, order_id: Uuid) -> Result<Order> {
        let mut order = self.require_order(order_id).await?;
        self.authorize_view(actor, &order)?;

        let now = Utc::now();
        lifecycle::apply_transition(&mut order, OrderStatus::Cancelled, None, now)?;

        let payment = match self.payments.get_payment_by_order(order_id).await? {
            Some(mut p) if matches!(p.status, PaymentStatus::Pending | PaymentStatus::Processing) => {
                p.mark_cancelled();
                Some(p)
            }
            _ => None,
        };

        let event = TrackingEvent::new(
            order.id,
            OrderStatus::Cancelled,
            Some(order.pickup),
            Some("Order cancelled".to_string()),
            Some(format!("Cancelled by {}", actor.role.as_str())),
            None,
            now,
        );
        let notification = Notification::new(
            order.customer_id,
            Some(order.id),
            NotificationKind::StatusUpdate,
            format!("Order #{} has been cancelled", order.tracking_number),
            now,
        );

        self.orders
            .commit_update(OrderUpdate {
                order: order.clone(),
                payment,
                events: vec![event],
                notifications: vec![notification],
            })
            .await?;

        Ok(order)
    }

    /// Admin binds a courier: Pending orders move to Assigned, an
    /// already-Assigned order gets its courier swapped.
    pub async fn assign_courier(&self, order_id: Uuid, courier_id: Uuid) -> Result<Order> {
        let courier = self
            .users
            .get_user(courier_id)
            .await?
            .ok_or_else(|| Error::NotFound("courier".to_string()))?;
        if courier.role != Role::Courier {
            return Err(Error::Validation(format!(
                "user {courier_id} is not a courier"
            )));
        }

        let mut order = self.require_order(order_id).await?;
        let now = Utc::now();
        match order.status {
            OrderStatus::Pending => {
                lifecycle::apply_transition(&mut order, OrderStatus::Assigned, Some(courier_id), now)?;
            }
            OrderStatus::Assigned => {
                order.courier_id = Some(courier_id);
                order.updated_at = now;
            }
            other => return Err(Error::state_conflict(other, OrderStatus::Assigned)),
        }

        let event = TrackingEvent::new(
            order.id,
            OrderStatus::Assigned,
            Some(order.pickup),
            Some("Courier assigned".to_string()),
            Some(format!("Assigned to {}", courier.name)),
            Some(courier_id),
            now,
        );
        let notifications = vec![
            Notification::new(
                order.customer_id,
                Some(order.id),
                NotificationKind::CourierAssigned,
                format!(
                    "Courier {} has been assigned to your order #{}",
                    courier.name, order.tracking_number
                ),
                now,
            ),
            Notification::new(
                courier_id,
                Some(order.id),
                NotificationKind::CourierAssigned,
                format!("You have been assigned to order #{}", order.tracking_number),
                now,
            ),
        ];

        self.orders
            .commit_update(OrderUpdate {
                order: order.clone(),
                payment: None,
                events: vec![event],
                notifications,
            })
            .await?;

        self.email_courier_assigned(&order, &courier.name, courier.phone.as_deref())
            .await;
        Ok(order)
    }

    /// Courier progresses an assigned order: PickedUp, InTransit or
    /// Delivered only.
    pub async fn courier_update_status(
        &self,
        actor: Actor,
        order_id: Uuid,
        requested: OrderStatus,
        notes: Option<String>,
        location: Option<GeoPoint>,
    ) -> Result<Order> {
        if !matches!(
            requested,
            OrderStatus::PickedUp | OrderStatus::InTransit | OrderStatus::Delivered
        ) {
            return Err(Error::Validation(format!(
                "couriers can only set PICKED_UP, IN_TRANSIT or DELIVERED, got {requested}"
            )));
        }

        let mut order = self.require_order(order_id).await?;
        if order.courier_id != Some(actor.user_id) {
            return Err(Error::Authorization(
                "you are not assigned to this order".to_string(),
            ));
        }

        let now = Utc::now();
        let previous = order.status;
        lifecycle::apply_transition(&mut order, requested, Some(actor.user_id), now)?;

        let event = TrackingEvent::new(
            order.id,
            requested,
            location.or(Some(order.pickup)),
            Some(format!("Status updated to {requested}")),
            notes.or_else(|| Some(format!("Status changed from {previous} to {requested}"))),
            Some(actor.user_id),
            now,
        );
        let notification = Notification::new(
            order.customer_id,
            Some(order.id),
            NotificationKind::StatusUpdate,
            format!("Your order #{} is now {}", order.tracking_number, requested),
            now,
        );

        self.orders
            .commit_update(OrderUpdate {
                order: order.clone(),
                payment: None,
                events: vec![event],
                notifications: vec![notification],
            })
            .await?;

        self.email_status_change(&order, requested).await;
        Ok(order)
    }

    /// Admin override of the courier flow. Still constrained by the
    /// transition table; an override cannot revive a terminal order.
    pub async fn admin_update_status(
        &self,
        order_id: Uuid,
        requested: OrderStatus,
        notes: Option<String>,
    ) -> Result<Order> {
        let mut order = self.require_order(order_id).await?;
        let now = Utc::now();
        let previous = order.status;
        lifecycle::apply_transition(&mut order, requested, None, now)?;

        let event = TrackingEvent::new(
            order.id,
            requested,
            Some(order.pickup),
            Some(format!("Status updated to {requested}")),
            notes.or_else(|| {
                Some(format!("Status changed from {previous} to {requested} by admin"))
            }),
            None,
            now,
        );
        let notification = Notification::new(
            order.customer_id,
            Some(order.id),
            NotificationKind::StatusUpdate,
            format!("Your order #{} is now {}", order.tracking_number, requested),
            now,
        );

        self.orders
            .commit_update(OrderUpdate {
                order: order.clone(),
                payment: None,
                events: vec![event],
                notifications: vec![notification],
            })
            .await?;

        self.email_status_change(&order, requested).await;
        Ok(order)
    }

    /// Platform-wide counters and revenue for the admin dashboard
    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let stats = self.orders.order_stats(None).await?;
        Ok(DashboardStats {
            total_orders: stats.counts.total(),
            orders_by_status: stats.counts,
            total_revenue: (stats.delivered_revenue * 100.0).round() / 100.0,
        })
    }

    pub async fn courier_stats(&self, actor: Actor) -> Result<CourierStats> {
        let stats = self.orders.order_stats(Some(actor.user_id)).await?;
        let counts = stats.counts;
        let total = counts.total();
        let success_rate = if total > 0 {
            (counts.delivered as f64 / total as f64 * 10000.0).round() / 100.0
        } else {
            0.0
        };
        Ok(CourierStats {
            total_deliveries: total,
            completed_deliveries: counts.delivered,
            active_deliveries: counts.active(),
            success_rate,
        })
    }

    /// Courier location ping: appends a tracking event without a status
    /// change. Only meaningful while the parcel is moving.
    pub async fn record_location(
        &self,
        actor: Actor,
        order_id: Uuid,
        location: GeoPoint,
        description: Option<String>,
    ) -> Result<TrackingEvent> {
        if !location.is_valid() {
            return Err(Error::Validation("coordinates out of range".to_string()));
        }
        let order = self.require_order(order_id).await?;
        if order.courier_id != Some(actor.user_id) {
            return Err(Error::Authorization(
                "you are not assigned to this order".to_string(),
            ));
        }
        if !matches!(order.status, OrderStatus::PickedUp | OrderStatus::InTransit) {
            return Err(Error::Validation(format!(
                "cannot update location for order with status {}",
                order.status
            )));
        }

        let event = TrackingEvent::new(
            order.id,
            order.status,
            Some(location),
            description.or_else(|| Some("Location updated".to_string())),
            Some("Courier location updated".to_string()),
            Some(actor.user_id),
            Utc::now(),
        );
        self.orders.append_event(event.clone()).await?;
        Ok(event)
    }

    pub async fn tracking(&self, actor: Actor, order_id: Uuid) -> Result<TrackingView> {
        let order = self.require_order(order_id).await?;
        self.authorize_view(actor, &order)?;
        let history = self.orders.events_for_order(order_id).await?;
        Ok(TrackingView {
            order_id: order.id,
            tracking_number: order.tracking_number,
            status: order.status,
            current_location: history.last().cloned(),
            tracking_history: history,
        })
    }

    /// Public tracking lookup by tracking number; no authentication, so
    /// it exposes the tracking view only, never payment or contact data.
    pub async fn track_by_number(&self, tracking_number: &str) -> Result<TrackingView> {
        let order = self
            .orders
            .get_order_by_tracking_number(tracking_number.trim())
            .await?
            .ok_or_else(|| Error::NotFound("order".to_string()))?;
        let history = self.orders.events_for_order(order.id).await?;
        Ok(TrackingView {
            order_id: order.id,
            tracking_number: order.tracking_number,
            status: order.status,
            current_location: history.last().cloned(),
            tracking_history: history,
        })
    }

    async fn require_order(&self, order_id: Uuid) -> Result<Order> {
        self.orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| Error::NotFound("order".to_string()))
    }

    fn authorize_view(&self, actor: Actor, order: &Order) -> Result<()> {
        let allowed = match actor.role {
            Role::Admin => true,
            Role::Customer => order.customer_id == actor.user_id,
            Role::Courier => order.courier_id == Some(actor.user_id),
        };
        if allowed {
            Ok(())
        } else {
            Err(Error::Authorization(
                "not authorized to access this order".to_string(),
            ))
        }
    }

    // Email delivery is best-effort; a transport failure never rolls the
    // committed transition back.
    async fn email_status_change(&self, order: &Order, status: OrderStatus) {
        let Ok(Some(customer)) = self.users.get_user(order.customer_id).await else {
            return;
        };
        let Some(email) = customer.email else { return };
        let (subject, body) = if status == OrderStatus::Delivered {
            (
                format!("Order #{} delivered", order.tracking_number),
                format!(
                    "Your order #{} has been successfully delivered.",
                    order.tracking_number
                ),
            )
        } else {
            (
                format!("Order #{} update", order.tracking_number),
                format!(
                    "Your delivery order #{} is now {}.",
                    order.tracking_number, status
                ),
            )
        };
        if let Err(e) = self.mailer.send(&email, &subject, &body).await {
            tracing::warn!(order_id = %order.id, error = %e, "status email failed");
        }
    }

    async fn email_courier_assigned(&self, order: &Order, courier_name: &str, courier_phone: Option<&str>) {
        let Ok(Some(customer)) = self.users.get_user(order.customer_id).await else {
            return;
        };
        let Some(email) = customer.email else { return };
        let body = format!(
            "A courier has been assigned to your order #{}.\nName: {}\nPhone: {}",
            order.tracking_number,
            courier_name,
            courier_phone.unwrap_or("n/a")
        );
        let subject = format!("Courier assigned to order #{}", order.tracking_number);
        if let Err(e) = self.mailer.send(&email, &subject, &body).await {
            tracing::warn!(order_id = %order.id, error = %e, "assignment email failed");
        }
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
