pub mod geo;
pub mod refs;

pub use geo::GeoPoint;
