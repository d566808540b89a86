pub mod lifecycle;
pub mod request;
pub mod service;

pub use request::{CreateOrderRequest, DestinationUpdateRequest, EstimateRequest};
pub use service::{
    CourierStats, DashboardStats, Estimate, OrderDetails, OrderService, TrackingView,
};
