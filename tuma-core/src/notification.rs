use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of notification kinds. Free-form type strings invited
/// silent typos that created uncorrelated categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    StatusUpdate,
    CourierAssigned,
    PaymentReceived,
    PaymentFailed,
}

/// In-app notification record handed to the notification collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub message: String,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: Uuid,
        order_id: Option<Uuid>,
        kind: NotificationKind,
        message: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            order_id,
            kind,
            message,
            is_read: false,
            read_at: None,
            created_at: now,
        }
    }
}
