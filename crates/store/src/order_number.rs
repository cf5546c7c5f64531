//! Human-facing order number generation.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Prefix carried by every order number.
pub const PREFIX: &str = "NK";

/// Generates an order number: `"NK" + YYYYMMDD + 8 uppercase hex chars`.
///
/// The random suffix does not formally eliminate collisions; the storage
/// uniqueness constraint on `order_number` is the backstop, and the checkout
/// engine retries once with a fresh number on a collision.
pub fn generate(now: DateTime<Utc>) -> String {
    let entropy = Uuid::new_v4().simple().to_string();
    format!(
        "{PREFIX}{}{}",
        now.format("%Y%m%d"),
        entropy[..8].to_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_is_prefix_date_suffix() {
        let now = Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap();
        let number = generate(now);

        assert_eq!(number.len(), 18);
        assert!(number.starts_with("NK20260830"));
        assert!(
            number[10..]
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase())
        );
    }

    #[test]
    fn successive_numbers_differ() {
        let now = Utc::now();
        assert_ne!(generate(now), generate(now));
    }
}
