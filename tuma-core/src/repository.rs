use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::{Notification, Order, OrderStatus, Payment, Result, TrackingEvent, UserProfile};

/// Role-scoped listing filter
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub customer_id: Option<Uuid>,
    pub courier_id: Option<Uuid>,
    pub page: usize,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

impl OrderPage {
    pub fn pages(&self) -> usize {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(self.limit)
    }
}

/// Per-status order tallies behind the reporting endpoints
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub assigned: usize,
    pub picked_up: usize,
    pub in_transit: usize,
    pub delivered: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: OrderStatus) {
        match status {
            OrderStatus::Pending => self.pending += 1,
            OrderStatus::Assigned => self.assigned += 1,
            OrderStatus::PickedUp => self.picked_up += 1,
            OrderStatus::InTransit => self.in_transit += 1,
            OrderStatus::Delivered => self.delivered += 1,
            OrderStatus::Cancelled => self.cancelled += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.assigned + self.picked_up + self.in_transit + self.delivered
            + self.cancelled
    }

    /// Orders a courier is currently working
    pub fn active(&self) -> usize {
        self.assigned + self.picked_up + self.in_transit
    }
}

/// Aggregates for the dashboard and courier stats surfaces. Revenue
/// counts delivered orders only.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OrderStats {
    pub counts: StatusCounts,
    pub delivered_revenue: f64,
}

/// Staged multi-entity mutation. The store applies everything in one
/// commit or nothing at all; partial lifecycle updates are forbidden.
#[derive(Debug, Clone)]
pub struct OrderUpdate {
    pub order: Order,
    pub payment: Option<Payment>,
    pub events: Vec<TrackingEvent>,
    pub notifications: Vec<Notification>,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Atomically persist a new order together with its initial payment,
    /// tracking event and notification.
    async fn create_order(
        &self,
        order: Order,
        payment: Payment,
        event: TrackingEvent,
        notification: Notification,
    ) -> Result<()>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>>;

    async fn get_order_by_tracking_number(&self, tracking_number: &str) -> Result<Option<Order>>;

    async fn list_orders(&self, filter: OrderFilter) -> Result<OrderPage>;

    /// Apply a staged order mutation as one unit
    async fn commit_update(&self, update: OrderUpdate) -> Result<()>;

    /// Append a tracking event without touching the order row
    /// (courier location pings)
    async fn append_event(&self, event: TrackingEvent) -> Result<()>;

    /// Tracking history in chronological order
    async fn events_for_order(&self, order_id: Uuid) -> Result<Vec<TrackingEvent>>;

    /// Per-status tallies and delivered revenue, optionally scoped to
    /// one courier's assignments
    async fn order_stats(&self, courier_id: Option<Uuid>) -> Result<OrderStats>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>>;

    async fn get_payment_by_order(&self, order_id: Uuid) -> Result<Option<Payment>>;

    async fn get_payment_by_checkout_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<Payment>>;

    async fn update_payment(&self, payment: Payment) -> Result<()>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_notification(&self, notification: Notification) -> Result<()>;

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>>;
}

/// Directory of users; account management itself lives in a collaborator
/// service, the core only needs identity and role lookups.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Result<Option<UserProfile>>;
}

/// Outbound email collaborator. The engine composes messages; transport
/// is someone else's problem.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}
