use serde::{Deserialize, Serialize};
use tuma_core::{Error, Result};
use tuma_pricing::DeliveryFlags;
use tuma_shared::GeoPoint;

const MIN_WEIGHT_KG: f64 = 0.1;
const MAX_WEIGHT_KG: f64 = 200.0;
const MIN_ADDRESS_LEN: usize = 3;
const MAX_ADDRESS_LEN: usize = 500;
const MAX_DESCRIPTION_LEN: usize = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub pickup_address: String,
    #[serde(default)]
    pub pickup_phone: Option<String>,
    pub destination_lat: f64,
    pub destination_lng: f64,
    pub destination_address: String,
    #[serde(default)]
    pub destination_phone: Option<String>,
    pub weight_kg: f64,
    #[serde(default)]
    pub parcel_description: Option<String>,
    #[serde(default)]
    pub parcel_dimensions: Option<String>,
    #[serde(default)]
    pub fragile: bool,
    #[serde(default)]
    pub insurance_required: bool,
    #[serde(default)]
    pub is_express: bool,
    #[serde(default)]
    pub is_weekend: bool,
}

impl CreateOrderRequest {
    pub fn pickup(&self) -> GeoPoint {
        GeoPoint::new(self.pickup_lat, self.pickup_lng)
    }

    pub fn destination(&self) -> GeoPoint {
        GeoPoint::new(self.destination_lat, self.destination_lng)
    }

    pub fn flags(&self) -> DeliveryFlags {
        DeliveryFlags {
            fragile: self.fragile,
            insurance: self.insurance_required,
            express: self.is_express,
            weekend: self.is_weekend,
        }
    }

    /// Complete validation runs before any write; a failing request
    /// leaves zero partial state behind.
    pub fn validate(&self) -> Result<()> {
        if !self.pickup().is_valid() {
            return Err(Error::Validation(
                "pickup coordinates out of range (lat -90..90, lng -180..180)".to_string(),
            ));
        }
        if !self.destination().is_valid() {
            return Err(Error::Validation(
                "destination coordinates out of range (lat -90..90, lng -180..180)".to_string(),
            ));
        }
        if self.weight_kg < MIN_WEIGHT_KG {
            return Err(Error::Validation(format!(
                "weight must be at least {MIN_WEIGHT_KG}kg"
            )));
        }
        if self.weight_kg > MAX_WEIGHT_KG {
            return Err(Error::Validation(format!(
                "weight cannot exceed {MAX_WEIGHT_KG}kg"
            )));
        }
        validate_address("pickup_address", &self.pickup_address)?;
        validate_address("destination_address", &self.destination_address)?;
        if let Some(phone) = non_empty(&self.pickup_phone) {
            validate_phone("pickup_phone", phone)?;
        }
        if let Some(phone) = non_empty(&self.destination_phone) {
            validate_phone("destination_phone", phone)?;
        }
        if let Some(desc) = non_empty(&self.parcel_description) {
            if desc.len() > MAX_DESCRIPTION_LEN {
                return Err(Error::Validation(format!(
                    "parcel description must be less than {MAX_DESCRIPTION_LEN} characters"
                )));
            }
        }
        if let Some(dims) = non_empty(&self.parcel_dimensions) {
            validate_dimensions(dims)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DestinationUpdateRequest {
    pub destination_lat: f64,
    pub destination_lng: f64,
    pub destination_address: String,
    #[serde(default)]
    pub destination_phone: Option<String>,
}

impl DestinationUpdateRequest {
    pub fn destination(&self) -> GeoPoint {
        GeoPoint::new(self.destination_lat, self.destination_lng)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.destination().is_valid() {
            return Err(Error::Validation(
                "destination coordinates out of range".to_string(),
            ));
        }
        validate_address("destination_address", &self.destination_address)?;
        if let Some(phone) = non_empty(&self.destination_phone) {
            validate_phone("destination_phone", phone)?;
        }
        Ok(())
    }
}

/// Quote request; never persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateRequest {
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub destination_lat: f64,
    pub destination_lng: f64,
    pub weight_kg: f64,
    #[serde(default)]
    pub fragile: bool,
    #[serde(default)]
    pub insurance_required: bool,
    #[serde(default)]
    pub is_express: bool,
    #[serde(default)]
    pub is_weekend: bool,
}

impl EstimateRequest {
    pub fn pickup(&self) -> GeoPoint {
        GeoPoint::new(self.pickup_lat, self.pickup_lng)
    }

    pub fn destination(&self) -> GeoPoint {
        GeoPoint::new(self.destination_lat, self.destination_lng)
    }

    pub fn flags(&self) -> DeliveryFlags {
        DeliveryFlags {
            fragile: self.fragile,
            insurance: self.insurance_required,
            express: self.is_express,
            weekend: self.is_weekend,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.pickup().is_valid() || !self.destination().is_valid() {
            return Err(Error::Validation("coordinates out of range".to_string()));
        }
        if self.weight_kg < MIN_WEIGHT_KG || self.weight_kg > MAX_WEIGHT_KG {
            return Err(Error::Validation(format!(
                "weight must be between {MIN_WEIGHT_KG}kg and {MAX_WEIGHT_KG}kg"
            )));
        }
        Ok(())
    }
}

/// Flags as stored on a persisted order, for re-quoting
pub fn flags_of(order: &tuma_core::Order) -> DeliveryFlags {
    DeliveryFlags {
        fragile: order.fragile,
        insurance: order.insurance_required,
        express: order.is_express,
        weekend: order.is_weekend,
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn validate_address(field: &str, address: &str) -> Result<()> {
    let trimmed = address.trim();
    if trimmed.len() < MIN_ADDRESS_LEN {
        return Err(Error::Validation(format!(
            "{field} must be at least {MIN_ADDRESS_LEN} characters"
        )));
    }
    if trimmed.len() > MAX_ADDRESS_LEN {
        return Err(Error::Validation(format!(
            "{field} must be less than {MAX_ADDRESS_LEN} characters"
        )));
    }
    Ok(())
}

/// Accepts local and international formats: optional leading +, then
/// 10 to 15 digits with spaces or dashes as separators
fn validate_phone(field: &str, phone: &str) -> Result<()> {
    let rest = phone.strip_prefix('+').unwrap_or(phone);
    let digits: String = rest.chars().filter(|c| c.is_ascii_digit()).collect();
    let separators_only = rest
        .chars()
        .all(|c| c.is_ascii_digit() || c == ' ' || c == '-');
    if !separators_only || !(10..=15).contains(&digits.len()) {
        return Err(Error::Validation(format!("invalid {field} format")));
    }
    Ok(())
}

/// Dimensions are LxWxH in centimetres, e.g. "30x20x15"
fn validate_dimensions(dimensions: &str) -> Result<()> {
    let parts: Vec<&str> = dimensions
        .split(['x', 'X'])
        .map(str::trim)
        .collect();
    let ok = parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.parse::<f64>().map(|v| v > 0.0).unwrap_or(false));
    if !ok {
        return Err(Error::Validation(
            "dimensions format should be LxWxH (e.g. 30x20x15)".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateOrderRequest {
        CreateOrderRequest {
            pickup_lat: -1.286389,
            pickup_lng: 36.817223,
            pickup_address: "Kimathi Street, Nairobi".to_string(),
            pickup_phone: None,
            destination_lat: -1.2921,
            destination_lng: 36.8219,
            destination_address: "Moi Avenue, Nairobi".to_string(),
            destination_phone: None,
            weight_kg: 8.0,
            parcel_description: None,
            parcel_dimensions: None,
            fragile: false,
            insurance_required: false,
            is_express: true,
            is_weekend: false,
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_weight_bounds() {
        let mut r = request();
        r.weight_kg = 0.05;
        assert!(r.validate().is_err());
        r.weight_kg = 200.5;
        assert!(r.validate().is_err());
        r.weight_kg = 0.1;
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_short_address_rejected() {
        let mut r = request();
        r.destination_address = "ab".to_string();
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_phone_formats() {
        let mut r = request();
        for good in ["0712345678", "+254712345678", "+254-712-345678", "254 712 345 678"] {
            r.pickup_phone = Some(good.to_string());
            assert!(r.validate().is_ok(), "rejected {good}");
        }
        for bad in ["12345", "07x2345678", "+2547123456789012345"] {
            r.pickup_phone = Some(bad.to_string());
            assert!(r.validate().is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn test_dimension_formats() {
        let mut r = request();
        r.parcel_dimensions = Some("30x20x15".to_string());
        assert!(r.validate().is_ok());
        r.parcel_dimensions = Some("30.5 X 20 X 15".to_string());
        assert!(r.validate().is_ok());
        r.parcel_dimensions = Some("30x20".to_string());
        assert!(r.validate().is_err());
        r.parcel_dimensions = Some("30xabcx15".to_string());
        assert!(r.validate().is_err());
    }
}
