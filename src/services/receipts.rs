use chrono::{DateTime, Datelike, Duration, Utc};
use uuid::Uuid;

/// Receipt reference derived from the source row's id:
/// `RCT-<4-digit year>-<first 8 hex chars of the id, uppercased>`.
///
/// Ids sharing an 8-char prefix would collide on the reference. The receipt
/// is a human-facing label only and the row id stays the key, so collisions
/// are tolerated rather than defended against.
pub fn receipt_number(id: Uuid, at: DateTime<Utc>) -> String {
    let hex = id.simple().to_string();
    format!("RCT-{}-{}", at.year(), hex[..8].to_uppercase())
}

/// Reservation fees fall due one week after approval.
pub fn fee_due_date(approved_at: DateTime<Utc>) -> DateTime<Utc> {
    approved_at + Duration::days(7)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn receipt_matches_expected_shape() {
        let id = Uuid::new_v4();
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        let receipt = receipt_number(id, at);

        let parts: Vec<&str> = receipt.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "RCT");
        assert_eq!(parts[1], "2025");
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn receipt_suffix_comes_from_the_id() {
        let id = Uuid::parse_str("a1b2c3d4-0000-0000-0000-000000000000").unwrap();
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(receipt_number(id, at), "RCT-2025-A1B2C3D4");
    }

    #[test]
    fn fees_are_due_exactly_seven_days_out() {
        let approved = Utc.with_ymd_and_hms(2025, 6, 30, 23, 59, 59).unwrap();
        let due = fee_due_date(approved);
        assert_eq!(due - approved, Duration::days(7));
    }
}
