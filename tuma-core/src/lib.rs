pub mod error;
pub mod notification;
pub mod order;
pub mod payment;
pub mod repository;
pub mod tracking;
pub mod user;

pub use error::{Error, Result};
pub use notification::{Notification, NotificationKind};
pub use order::{Order, OrderStatus, WeightCategory};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use tracking::TrackingEvent;
pub use user::{Actor, Role, UserProfile};
