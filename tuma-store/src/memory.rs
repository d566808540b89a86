use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tuma_core::repository::{
    NotificationRepository, OrderFilter, OrderPage, OrderRepository, OrderStats, OrderUpdate,
    PaymentRepository, UserRepository,
};
use tuma_core::{
    Error, Notification, Order, OrderStatus, Payment, Result, TrackingEvent, UserProfile,
};
use uuid::Uuid;

#[derive(Default)]
struct State {
    orders: HashMap<Uuid, Order>,
    payments: HashMap<Uuid, Payment>,
    events: Vec<TrackingEvent>,
    notifications: Vec<Notification>,
    users: HashMap<Uuid, UserProfile>,
}

/// In-memory store behind a single RwLock. Multi-entity writes hold the
/// write guard for their whole span, which is what makes create_order
/// and commit_update atomic.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user profile (auth lives in a collaborator service, so
    /// tests and local runs register profiles directly)
    pub async fn insert_user(&self, user: UserProfile) {
        self.inner.write().await.users.insert(user.id, user);
    }

    fn check_unique_order(state: &State, order: &Order) -> Result<()> {
        if state
            .orders
            .values()
            .any(|o| o.tracking_number == order.tracking_number)
        {
            return Err(Error::Validation(format!(
                "tracking number {} already exists",
                order.tracking_number
            )));
        }
        Ok(())
    }

    fn check_unique_payment(state: &State, payment: &Payment) -> Result<()> {
        if state
            .payments
            .values()
            .any(|p| p.transaction_reference == payment.transaction_reference)
        {
            return Err(Error::Validation(format!(
                "transaction reference {} already exists",
                payment.transaction_reference
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn create_order(
        &self,
        order: Order,
        payment: Payment,
        event: TrackingEvent,
        notification: Notification,
    ) -> Result<()> {
        let mut state = self.inner.write().await;
        Self::check_unique_order(&state, &order)?;
        Self::check_unique_payment(&state, &payment)?;
        state.orders.insert(order.id, order);
        state.payments.insert(payment.id, payment);
        state.events.push(event);
        state.notifications.push(notification);
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn get_order_by_tracking_number(&self, tracking_number: &str) -> Result<Option<Order>> {
        Ok(self
            .inner
            .read()
            .await
            .orders
            .values()
            .find(|o| o.tracking_number == tracking_number)
            .cloned())
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<OrderPage> {
        let state = self.inner.read().await;
        let mut matches: Vec<Order> = state
            .orders
            .values()
            .filter(|o| filter.status.map_or(true, |s| o.status == s))
            .filter(|o| filter.customer_id.map_or(true, |c| o.customer_id == c))
            .filter(|o| filter.courier_id.map_or(true, |c| o.courier_id == Some(c)))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matches.len();
        let page = filter.page.max(1);
        let limit = filter.limit.max(1);
        let orders = matches
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .collect();
        Ok(OrderPage {
            orders,
            total,
            page,
            limit,
        })
    }

    async fn commit_update(&self, update: OrderUpdate) -> Result<()> {
        let mut state = self.inner.write().await;
        if !state.orders.contains_key(&update.order.id) {
            return Err(Error::NotFound("order".to_string()));
        }
        if let Some(ref payment) = update.payment {
            if !state.payments.contains_key(&payment.id) {
                return Err(Error::NotFound("payment".to_string()));
            }
        }
        state.orders.insert(update.order.id, update.order);
        if let Some(payment) = update.payment {
            state.payments.insert(payment.id, payment);
        }
        state.events.extend(update.events);
        state.notifications.extend(update.notifications);
        Ok(())
    }

    async fn append_event(&self, event: TrackingEvent) -> Result<()> {
        self.inner.write().await.events.push(event);
        Ok(())
    }

    async fn events_for_order(&self, order_id: Uuid) -> Result<Vec<TrackingEvent>> {
        let state = self.inner.read().await;
        let mut events: Vec<TrackingEvent> = state
            .events
            .iter()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(events)
    }

    async fn order_stats(&self, courier_id: Option<Uuid>) -> Result<OrderStats> {
        let state = self.inner.read().await;
        let mut stats = OrderStats::default();
        for order in state.orders.values() {
            if courier_id.map_or(true, |c| order.courier_id == Some(c)) {
                stats.counts.record(order.status);
                if order.status == OrderStatus::Delivered {
                    stats.delivered_revenue += order.total_price;
                }
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>> {
        Ok(self.inner.read().await.payments.get(&id).cloned())
    }

    async fn get_payment_by_order(&self, order_id: Uuid) -> Result<Option<Payment>> {
        Ok(self
            .inner
            .read()
            .await
            .payments
            .values()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn get_payment_by_checkout_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<Payment>> {
        Ok(self
            .inner
            .read()
            .await
            .payments
            .values()
            .find(|p| p.checkout_request_id.as_deref() == Some(checkout_request_id))
            .cloned())
    }

    async fn update_payment(&self, payment: Payment) -> Result<()> {
        let mut state = self.inner.write().await;
        if !state.payments.contains_key(&payment.id) {
            return Err(Error::NotFound("payment".to_string()));
        }
        state.payments.insert(payment.id, payment);
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for InMemoryStore {
    async fn insert_notification(&self, notification: Notification) -> Result<()> {
        self.inner.write().await.notifications.push(notification);
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let state = self.inner.read().await;
        let mut list: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn get_user(&self, id: Uuid) -> Result<Option<UserProfile>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tuma_core::{
        NotificationKind, OrderStatus, PaymentStatus, Role, WeightCategory,
    };
    use tuma_shared::GeoPoint;

    fn order(tracking: &str) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            tracking_number: tracking.to_string(),
            customer_id: Uuid::new_v4(),
            courier_id: None,
            pickup: GeoPoint::new(-1.28, 36.82),
            pickup_address: "Kimathi Street, Nairobi".to_string(),
            pickup_phone: None,
            destination: GeoPoint::new(-1.30, 36.78),
            destination_address: "Ngong Road, Nairobi".to_string(),
            destination_phone: None,
            weight_kg: 2.0,
            weight_category: WeightCategory::Small,
            parcel_description: None,
            parcel_dimensions: None,
            fragile: false,
            insurance_required: false,
            is_express: false,
            is_weekend: false,
            distance_km: 6.5,
            base_price: 100.0,
            distance_price: 130.0,
            weight_price: 50.0,
            extra_charges: 0.0,
            total_price: 280.0,
            currency: "KES".to_string(),
            status: OrderStatus::Pending,
            estimated_delivery_at: None,
            actual_delivery_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn bundle(o: &Order, reference: &str) -> (Payment, TrackingEvent, Notification) {
        let now = Utc::now();
        (
            Payment::for_order(o.id, o.total_price, "KES".to_string(), reference.to_string(), now),
            TrackingEvent::new(o.id, OrderStatus::Pending, Some(o.pickup), None, None, None, now),
            Notification::new(
                o.customer_id,
                Some(o.id),
                NotificationKind::StatusUpdate,
                "created".to_string(),
                now,
            ),
        )
    }

    #[tokio::test]
    async fn test_create_order_persists_all_entities() {
        let store = InMemoryStore::new();
        let o = order("DLV25030714301234");
        let (p, e, n) = bundle(&o, "PAY2503071430001111");
        store.create_order(o.clone(), p, e, n).await.unwrap();

        assert!(store.get_order(o.id).await.unwrap().is_some());
        let payment = store.get_payment_by_order(o.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(store.events_for_order(o.id).await.unwrap().len(), 1);
        assert_eq!(store.list_for_user(o.customer_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_tracking_number_rejected_atomically() {
        let store = InMemoryStore::new();
        let first = order("DLV25030714301234");
        let (p, e, n) = bundle(&first, "PAY2503071430001111");
        store.create_order(first, p, e, n).await.unwrap();

        let dup = order("DLV25030714301234");
        let (p, e, n) = bundle(&dup, "PAY2503071430002222");
        assert!(store.create_order(dup.clone(), p, e, n).await.is_err());
        // nothing from the rejected bundle leaked
        assert!(store.get_order(dup.id).await.unwrap().is_none());
        assert!(store.events_for_order(dup.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_orders_filters_and_paginates() {
        let store = InMemoryStore::new();
        let customer = Uuid::new_v4();
        for i in 0..5 {
            let mut o = order(&format!("DLV2503071430{i:04}"));
            o.customer_id = customer;
            let (p, e, n) = bundle(&o, &format!("PAY25030714300{i:03}"));
            store.create_order(o, p, e, n).await.unwrap();
        }

        let page = store
            .list_orders(OrderFilter {
                customer_id: Some(customer),
                page: 2,
                limit: 2,
                ..OrderFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.orders.len(), 2);
        assert_eq!(page.pages(), 3);

        let none = store
            .list_orders(OrderFilter {
                customer_id: Some(Uuid::new_v4()),
                page: 1,
                limit: 10,
                ..OrderFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(none.total, 0);
    }

    #[tokio::test]
    async fn test_lookup_by_checkout_id() {
        let store = InMemoryStore::new();
        let o = order("DLV25030714301234");
        let (mut p, e, n) = bundle(&o, "PAY2503071430001111");
        p.checkout_request_id = Some("ws_CO_123".to_string());
        store.create_order(o, p, e, n).await.unwrap();

        assert!(store
            .get_payment_by_checkout_id("ws_CO_123")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .get_payment_by_checkout_id("ws_CO_999")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_order_stats_scoped_by_courier() {
        let store = InMemoryStore::new();
        let courier = Uuid::new_v4();
        for i in 0..3 {
            let mut o = order(&format!("DLV2503071430{i:04}"));
            if i < 2 {
                o.courier_id = Some(courier);
            }
            if i == 0 {
                o.status = OrderStatus::Delivered;
            }
            let (p, e, n) = bundle(&o, &format!("PAY25030714300{i:03}"));
            store.create_order(o, p, e, n).await.unwrap();
        }

        let all = store.order_stats(None).await.unwrap();
        assert_eq!(all.counts.total(), 3);
        assert_eq!(all.counts.delivered, 1);
        assert_eq!(all.counts.pending, 2);
        assert_eq!(all.delivered_revenue, 280.0);

        let scoped = store.order_stats(Some(courier)).await.unwrap();
        assert_eq!(scoped.counts.total(), 2);
        assert_eq!(scoped.counts.delivered, 1);

        let nobody = store.order_stats(Some(Uuid::new_v4())).await.unwrap();
        assert_eq!(nobody.counts.total(), 0);
        assert_eq!(nobody.delivered_revenue, 0.0);
    }

    #[tokio::test]
    async fn test_user_directory() {
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        store
            .insert_user(UserProfile {
                id,
                name: "Jane Courier".to_string(),
                email: Some("jane@example.com".to_string()),
                phone: Some("0712345678".to_string()),
                role: Role::Courier,
            })
            .await;
        let user = store.get_user(id).await.unwrap().unwrap();
        assert_eq!(user.role, Role::Courier);
    }
}
