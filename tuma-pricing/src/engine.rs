use serde::{Deserialize, Serialize};
use tuma_core::{Error, Result, WeightCategory};

/// Delivery options that attract an extra charge
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DeliveryFlags {
    #[serde(default)]
    pub fragile: bool,
    #[serde(default)]
    pub insurance: bool,
    #[serde(default)]
    pub express: bool,
    #[serde(default)]
    pub weekend: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    pub base_price: f64,
    /// Per-kilometre rate
    pub distance_rate: f64,
    pub weight_price_small: f64,
    pub weight_price_medium: f64,
    pub weight_price_large: f64,
    pub weight_price_xlarge: f64,
    #[serde(default = "default_fragile_percent")]
    pub fragile_percent: f64,
    #[serde(default = "default_insurance_percent")]
    pub insurance_percent: f64,
    #[serde(default = "default_express_percent")]
    pub express_percent: f64,
    #[serde(default = "default_weekend_percent")]
    pub weekend_percent: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_fragile_percent() -> f64 {
    0.15
}
fn default_insurance_percent() -> f64 {
    0.10
}
fn default_express_percent() -> f64 {
    0.25
}
fn default_weekend_percent() -> f64 {
    0.20
}
fn default_currency() -> String {
    "KES".to_string()
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_price: 100.0,
            distance_rate: 20.0,
            weight_price_small: 50.0,
            weight_price_medium: 150.0,
            weight_price_large: 300.0,
            weight_price_xlarge: 500.0,
            fragile_percent: default_fragile_percent(),
            insurance_percent: default_insurance_percent(),
            express_percent: default_express_percent(),
            weekend_percent: default_weekend_percent(),
            currency: default_currency(),
        }
    }
}

/// Itemized quote. Callers always get the full breakdown, never a bare
/// total; the order row and audit surfaces both need the components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_price: f64,
    pub distance_price: f64,
    pub weight_price: f64,
    pub weight_category: WeightCategory,
    pub fragile_charge: f64,
    pub insurance_charge: f64,
    pub express_charge: f64,
    pub weekend_charge: f64,
    pub extra_charges: f64,
    pub total_price: f64,
    pub currency: String,
}

const NORMAL_SPEED_KMH: f64 = 40.0;
const EXPRESS_SPEED_KMH: f64 = 60.0;
const HANDLING_BUFFER_MINUTES: f64 = 15.0;
const MIN_DELIVERY_MINUTES: i64 = 30;
const MAX_DELIVERY_MINUTES: i64 = 480;

/// Pure pricing function: distance + weight + flags in, breakdown out
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn weight_price(&self, category: WeightCategory) -> f64 {
        match category {
            WeightCategory::Small => self.config.weight_price_small,
            WeightCategory::Medium => self.config.weight_price_medium,
            WeightCategory::Large => self.config.weight_price_large,
            WeightCategory::Xlarge => self.config.weight_price_xlarge,
        }
    }

    /// Each active flag adds a percentage of the original subtotal, so
    /// extras never compound across flags. Rounding to 2dp happens only
    /// here at the output boundary.
    pub fn quote(
        &self,
        distance_km: f64,
        weight_kg: f64,
        flags: DeliveryFlags,
    ) -> Result<PriceBreakdown> {
        if !distance_km.is_finite() || distance_km < 0.0 {
            return Err(Error::Validation(format!(
                "distance_km must be >= 0, got {distance_km}"
            )));
        }
        if !weight_kg.is_finite() || weight_kg <= 0.0 {
            return Err(Error::Validation(format!(
                "weight_kg must be > 0, got {weight_kg}"
            )));
        }

        let category = WeightCategory::from_weight(weight_kg);
        let base_price = self.config.base_price;
        let distance_price = distance_km * self.config.distance_rate;
        let weight_price = self.weight_price(category);
        let subtotal = base_price + distance_price + weight_price;

        let fragile_charge = if flags.fragile {
            subtotal * self.config.fragile_percent
        } else {
            0.0
        };
        let insurance_charge = if flags.insurance {
            subtotal * self.config.insurance_percent
        } else {
            0.0
        };
        let express_charge = if flags.express {
            subtotal * self.config.express_percent
        } else {
            0.0
        };
        let weekend_charge = if flags.weekend {
            subtotal * self.config.weekend_percent
        } else {
            0.0
        };

        let extras = fragile_charge + insurance_charge + express_charge + weekend_charge;
        let total = subtotal + extras;

        Ok(PriceBreakdown {
            base_price: round2(base_price),
            distance_price: round2(distance_price),
            weight_price: round2(weight_price),
            weight_category: category,
            fragile_charge: round2(fragile_charge),
            insurance_charge: round2(insurance_charge),
            express_charge: round2(express_charge),
            weekend_charge: round2(weekend_charge),
            extra_charges: round2(extras),
            total_price: round2(total),
            currency: self.config.currency.clone(),
        })
    }

    /// Travel time at 60 km/h express or 40 km/h normal, plus a fixed
    /// pickup/handoff buffer, clamped to [30, 480] minutes.
    pub fn delivery_estimate_minutes(&self, distance_km: f64, is_express: bool) -> i64 {
        let speed_kmh = if is_express {
            EXPRESS_SPEED_KMH
        } else {
            NORMAL_SPEED_KMH
        };
        let travel_minutes = distance_km / speed_kmh * 60.0;
        let total = (travel_minutes + HANDLING_BUFFER_MINUTES) as i64;
        total.clamp(MIN_DELIVERY_MINUTES, MAX_DELIVERY_MINUTES)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PricingEngine {
        PricingEngine::new(PricingConfig::default())
    }

    /// Config that yields subtotal == 100 for zero distance and a small parcel
    fn flat_hundred() -> PricingEngine {
        PricingEngine::new(PricingConfig {
            base_price: 100.0,
            distance_rate: 0.0,
            weight_price_small: 0.0,
            ..PricingConfig::default()
        })
    }

    #[test]
    fn test_extras_are_non_compounding() {
        let breakdown = flat_hundred()
            .quote(
                0.0,
                1.0,
                DeliveryFlags {
                    fragile: true,
                    insurance: true,
                    express: true,
                    weekend: true,
                },
            )
            .unwrap();

        assert_eq!(breakdown.fragile_charge, 15.0);
        assert_eq!(breakdown.insurance_charge, 10.0);
        assert_eq!(breakdown.express_charge, 25.0);
        assert_eq!(breakdown.weekend_charge, 20.0);
        assert_eq!(breakdown.extra_charges, 70.0);
        assert_eq!(breakdown.total_price, 170.0);
    }

    #[test]
    fn test_no_flags_no_extras() {
        let breakdown = flat_hundred()
            .quote(0.0, 1.0, DeliveryFlags::default())
            .unwrap();
        assert_eq!(breakdown.extra_charges, 0.0);
        assert_eq!(breakdown.total_price, 100.0);
    }

    #[test]
    fn test_total_is_sum_of_components() {
        let b = engine()
            .quote(
                12.5,
                8.0,
                DeliveryFlags {
                    express: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(b.weight_category, tuma_core::WeightCategory::Medium);
        let recomputed =
            b.base_price + b.distance_price + b.weight_price + b.extra_charges;
        assert!((b.total_price - recomputed).abs() < 0.01);
    }

    #[test]
    fn test_rounds_at_output_boundary() {
        // 1/3 km at 10/km gives a repeating decimal distance price
        let e = PricingEngine::new(PricingConfig {
            base_price: 0.0,
            distance_rate: 10.0,
            weight_price_small: 0.0,
            ..PricingConfig::default()
        });
        let b = e.quote(0.333, 1.0, DeliveryFlags::default()).unwrap();
        assert_eq!(b.distance_price, 3.33);
        assert_eq!(b.total_price, 3.33);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert!(engine().quote(-1.0, 5.0, DeliveryFlags::default()).is_err());
        assert!(engine().quote(10.0, 0.0, DeliveryFlags::default()).is_err());
        assert!(engine()
            .quote(10.0, -2.0, DeliveryFlags::default())
            .is_err());
    }

    #[test]
    fn test_delivery_estimate_lower_clamp() {
        assert_eq!(engine().delivery_estimate_minutes(0.0, false), 30);
    }

    #[test]
    fn test_delivery_estimate_upper_clamp() {
        assert_eq!(engine().delivery_estimate_minutes(1000.0, false), 480);
    }

    #[test]
    fn test_express_is_faster() {
        let e = engine();
        // 40km: normal 60 + 15 = 75, express 40 + 15 = 55
        assert_eq!(e.delivery_estimate_minutes(40.0, false), 75);
        assert_eq!(e.delivery_estimate_minutes(40.0, true), 55);
    }
}
