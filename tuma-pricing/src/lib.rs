pub mod distance;
pub mod engine;

pub use distance::{
    haversine_km, DistanceMethod, DistanceProvider, DistanceResult, MapsConfig, RoutingClient,
};
pub use engine::{DeliveryFlags, PriceBreakdown, PricingConfig, PricingEngine};
