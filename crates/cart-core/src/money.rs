//! Money type for representing monetary values.
//!
//! The cart API reports every price as an integer count of the currency's
//! minor unit (cents for USD). All formatting for the drawer goes through
//! [`Money::display`] so every surface shows the same string.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Currency {
    #[default]
    USD,
    EUR,
    GBP,
    JPY,
    CAD,
    AUD,
    CHF,
    CNY,
    INR,
    MXN,
}

/// Code, symbol and minor-unit digits per currency.
const CURRENCIES: [(Currency, &str, &str, u32); 10] = [
    (Currency::USD, "USD", "$", 2),
    (Currency::EUR, "EUR", "\u{20ac}", 2),
    (Currency::GBP, "GBP", "\u{00a3}", 2),
    (Currency::JPY, "JPY", "\u{00a5}", 0),
    (Currency::CAD, "CAD", "CA$", 2),
    (Currency::AUD, "AUD", "A$", 2),
    (Currency::CHF, "CHF", "CHF", 2),
    (Currency::CNY, "CNY", "\u{00a5}", 2),
    (Currency::INR, "INR", "\u{20b9}", 2),
    (Currency::MXN, "MXN", "MX$", 2),
];

impl Currency {
    fn entry(self) -> (Currency, &'static str, &'static str, u32) {
        CURRENCIES
            .iter()
            .copied()
            .find(|(currency, ..)| *currency == self)
            .unwrap_or(CURRENCIES[0])
    }

    /// ISO code, e.g. "USD".
    pub fn code(&self) -> &'static str {
        self.entry().1
    }

    pub fn symbol(&self) -> &'static str {
        self.entry().2
    }

    /// Digits after the decimal point in a displayed amount.
    pub fn decimal_places(&self) -> u32 {
        self.entry().3
    }

    /// Parse an ISO code, ignoring case.
    pub fn from_code(code: &str) -> Option<Self> {
        CURRENCIES
            .iter()
            .find(|(_, known, ..)| known.eq_ignore_ascii_case(code))
            .map(|(currency, ..)| *currency)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An amount in a currency's minor unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Money {
    pub amount_cents: i64,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount_cents: i64, currency: Currency) -> Self {
        Self {
            amount_cents,
            currency,
        }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    pub fn is_zero(&self) -> bool {
        self.amount_cents == 0
    }

    pub fn is_negative(&self) -> bool {
        self.amount_cents < 0
    }

    /// `self - other`; `None` across currencies or on overflow.
    pub fn try_subtract(&self, other: &Money) -> Option<Money> {
        if self.currency != other.currency {
            return None;
        }
        Some(Money::new(
            self.amount_cents.checked_sub(other.amount_cents)?,
            self.currency,
        ))
    }

    /// Format as a display string (e.g., "$1,049.99").
    ///
    /// Uses integer arithmetic only; the integer part is grouped by
    /// thousands the way `Intl.NumberFormat('en-US')` does.
    pub fn display(&self) -> String {
        let sign = if self.is_negative() { "-" } else { "" };
        format!("{}{}{}", sign, self.currency.symbol(), self.display_amount())
    }

    /// Format as a display string without symbol or sign (e.g., "1,049.99").
    pub fn display_amount(&self) -> String {
        let places = self.currency.decimal_places();
        let divisor = 10_u64.pow(places);
        let abs = self.amount_cents.unsigned_abs();
        let whole = group_thousands(abs / divisor);
        if places == 0 {
            whole
        } else {
            format!(
                "{}.{:0width$}",
                whole,
                abs % divisor,
                width = places as usize
            )
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
