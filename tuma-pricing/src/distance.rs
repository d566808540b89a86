use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tuma_core::{Error, Result};
use tuma_shared::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6371.0;
const FALLBACK_SPEED_KMH: f64 = 40.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistanceMethod {
    /// Driving distance from the external routing service
    Routed,
    /// Great-circle fallback with duration estimated at 40 km/h
    GreatCircle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceResult {
    pub distance_km: f64,
    pub duration_minutes: i64,
    pub method: DistanceMethod,
}

#[async_trait]
pub trait DistanceProvider: Send + Sync {
    async fn distance(&self, origin: GeoPoint, destination: GeoPoint) -> Result<DistanceResult>;
}

/// Great-circle distance between two points, in kilometres
pub fn haversine_km(origin: GeoPoint, destination: GeoPoint) -> f64 {
    let lat1 = origin.lat.to_radians();
    let lat2 = destination.lat.to_radians();
    let dlat = (destination.lat - origin.lat).to_radians();
    let dlng = (destination.lng - origin.lng).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapsConfig {
    /// No key means every lookup takes the geometric fallback
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "https://maps.googleapis.com/maps/api/distancematrix/json".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

impl Default for MapsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

// Distance-matrix response shape; only the fields we read
#[derive(Debug, Deserialize)]
struct MatrixResponse {
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    distance: Option<MatrixValue>,
    duration: Option<MatrixValue>,
}

#[derive(Debug, Deserialize)]
struct MatrixValue {
    value: f64,
}

/// Routing-service client with a mandatory geometric fallback: a caller
/// holding two valid coordinates never gets a hard failure just because
/// the external provider is down or unconfigured.
pub struct RoutingClient {
    http: reqwest::Client,
    config: MapsConfig,
}

impl RoutingClient {
    pub fn new(config: MapsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Unexpected(format!("failed to build http client: {e}")))?;
        Ok(Self { http, config })
    }

    async fn routed(&self, origin: GeoPoint, destination: GeoPoint) -> Option<DistanceResult> {
        let api_key = self.config.api_key.as_deref()?;

        let response = self
            .http
            .get(&self.config.base_url)
            .query(&[
                ("origins", format!("{},{}", origin.lat, origin.lng)),
                (
                    "destinations",
                    format!("{},{}", destination.lat, destination.lng),
                ),
                ("mode", "driving".to_string()),
                ("key", api_key.to_string()),
            ])
            .send()
            .await
            .ok()?;

        let body: MatrixResponse = response.json().await.ok()?;
        let element = body.rows.first()?.elements.first()?;
        if element.status != "OK" {
            return None;
        }

        let distance_meters = element.distance.as_ref()?.value;
        let duration_seconds = element.duration.as_ref()?.value;
        Some(DistanceResult {
            distance_km: (distance_meters / 1000.0 * 100.0).round() / 100.0,
            duration_minutes: (duration_seconds / 60.0).round() as i64,
            method: DistanceMethod::Routed,
        })
    }

    fn fallback(origin: GeoPoint, destination: GeoPoint) -> DistanceResult {
        let km = haversine_km(origin, destination);
        DistanceResult {
            distance_km: (km * 100.0).round() / 100.0,
            duration_minutes: (km / FALLBACK_SPEED_KMH * 60.0).round() as i64,
            method: DistanceMethod::GreatCircle,
        }
    }
}

#[async_trait]
impl DistanceProvider for RoutingClient {
    async fn distance(&self, origin: GeoPoint, destination: GeoPoint) -> Result<DistanceResult> {
        if !origin.is_valid() || !destination.is_valid() {
            return Err(Error::Validation(
                "coordinates out of range".to_string(),
            ));
        }

        if let Some(result) = self.routed(origin, destination).await {
            return Ok(result);
        }

        tracing::warn!(
            origin = ?origin,
            destination = ?destination,
            "routing service unavailable, using great-circle fallback"
        );
        Ok(Self::fallback(origin, destination))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAIROBI: GeoPoint = GeoPoint {
        lat: -1.286389,
        lng: 36.817223,
    };
    const MOMBASA: GeoPoint = GeoPoint {
        lat: -4.043477,
        lng: 39.668206,
    };

    #[test]
    fn test_haversine_identical_points_is_zero() {
        assert_eq!(haversine_km(NAIROBI, NAIROBI), 0.0);
    }

    #[test]
    fn test_haversine_nairobi_mombasa() {
        // straight-line distance is roughly 440km
        let km = haversine_km(NAIROBI, MOMBASA);
        assert!((430.0..450.0).contains(&km), "got {km}");
    }

    #[tokio::test]
    async fn test_unconfigured_client_falls_back() {
        let client = RoutingClient::new(MapsConfig::default()).unwrap();
        let result = client.distance(NAIROBI, MOMBASA).await.unwrap();
        assert_eq!(result.method, DistanceMethod::GreatCircle);
        assert!(result.distance_km > 0.0);
        assert!(result.duration_minutes > 0);
    }

    #[tokio::test]
    async fn test_fallback_identical_points_zero_distance_zero_duration() {
        let client = RoutingClient::new(MapsConfig::default()).unwrap();
        let result = client.distance(NAIROBI, NAIROBI).await.unwrap();
        assert_eq!(result.distance_km, 0.0);
        assert_eq!(result.duration_minutes, 0);
    }

    #[tokio::test]
    async fn test_invalid_coordinates_rejected() {
        let client = RoutingClient::new(MapsConfig::default()).unwrap();
        let bad = GeoPoint::new(95.0, 36.8);
        assert!(client.distance(bad, NAIROBI).await.is_err());
    }
}
