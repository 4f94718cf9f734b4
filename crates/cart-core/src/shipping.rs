//! Free shipping progress.

use crate::money::Money;
use serde::{Deserialize, Serialize};

/// Progress toward the free shipping threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FreeShippingProgress {
    /// Bar width, 0..=100.
    pub percent: u8,
    /// Amount still needed; zero once qualified.
    pub remaining: Money,
    /// Whether the cart total reaches the threshold.
    pub qualified: bool,
}

impl FreeShippingProgress {
    /// Compute progress for a cart total against a threshold.
    ///
    /// Returns `None` when no positive threshold is configured.
    pub fn compute(total: Money, threshold_cents: i64) -> Option<Self> {
        if threshold_cents <= 0 {
            return None;
        }

        let total_cents = total.amount_cents.max(0);
        let qualified = total_cents >= threshold_cents;
        let percent = if qualified {
            100
        } else {
            // total < threshold, so the quotient is below 100
            (i128::from(total_cents) * 100 / i128::from(threshold_cents)) as u8
        };
        let remaining = Money::new((threshold_cents - total_cents).max(0), total.currency);

        Some(Self {
            percent,
            remaining,
            qualified,
        })
    }

    /// Message shown next to the bar.
    pub fn message(&self) -> String {
        if self.qualified {
            "You qualify for free shipping!".to_string()
        } else {
            format!("Add {} more for free shipping!", self.remaining.display())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;

    fn usd(cents: i64) -> Money {
        Money::new(cents, Currency::USD)
    }

    #[test]
    fn test_exact_threshold_qualifies() {
        let p = FreeShippingProgress::compute(usd(5000), 5000).unwrap();
        assert_eq!(p.percent, 100);
        assert!(p.qualified);
        assert!(p.remaining.is_zero());
        assert_eq!(p.message(), "You qualify for free shipping!");
    }

    #[test]
    fn test_one_cent_short() {
        let p = FreeShippingProgress::compute(usd(4999), 5000).unwrap();
        assert_eq!(p.percent, 99);
        assert!(!p.qualified);
        assert_eq!(p.message(), "Add $0.01 more for free shipping!");
    }

    #[test]
    fn test_over_threshold_caps_at_100() {
        let p = FreeShippingProgress::compute(usd(12000), 5000).unwrap();
        assert_eq!(p.percent, 100);
        assert!(p.qualified);
    }

    #[test]
    fn test_empty_cart() {
        let p = FreeShippingProgress::compute(usd(0), 5000).unwrap();
        assert_eq!(p.percent, 0);
        assert_eq!(p.remaining.amount_cents, 5000);
    }

    #[test]
    fn test_no_threshold() {
        assert!(FreeShippingProgress::compute(usd(100), 0).is_none());
    }
}
