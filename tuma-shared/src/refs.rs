use chrono::{DateTime, Utc};
use rand::Rng;

/// Generate a tracking number: DLV + YYMMDDHHMM + 4 random digits
///
/// Construction is side-effect-free; callers pass the generated value
/// into the order factory. Uniqueness is enforced by the store on insert.
pub fn tracking_number(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(1000..=9999);
    format!("DLV{}{}", now.format("%y%m%d%H%M"), suffix)
}

/// Generate a payment transaction reference: PAY + YYMMDDHHMMSS + 4 random digits
pub fn transaction_reference(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(1000..=9999);
    format!("PAY{}{}", now.format("%y%m%d%H%M%S"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_tracking_number_shape() {
        let at = Utc.with_ymd_and_hms(2025, 3, 7, 14, 30, 5).unwrap();
        let tn = tracking_number(at);
        assert!(tn.starts_with("DLV2503071430"));
        assert_eq!(tn.len(), "DLV".len() + 10 + 4);
    }

    #[test]
    fn test_transaction_reference_shape() {
        let at = Utc.with_ymd_and_hms(2025, 3, 7, 14, 30, 5).unwrap();
        let tr = transaction_reference(at);
        assert!(tr.starts_with("PAY250307143005"));
        assert_eq!(tr.len(), "PAY".len() + 12 + 4);
    }
}
