use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// ISO-4217 style currency code, normalized to uppercase.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Currency(pub String);

impl Currency {
    pub fn parse(code: impl AsRef<str>) -> Result<Self, DomainError> {
        let code = code.as_ref().trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::Validation(format!(
                "currency code `{code}` must be three ASCII letters"
            )));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ledger precision is two decimal places, midpoints rounded away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{round_money, Currency};

    #[test]
    fn parse_normalizes_casing_and_whitespace() {
        let currency = Currency::parse(" try ").expect("parse currency");
        assert_eq!(currency.as_str(), "TRY");
    }

    #[test]
    fn parse_rejects_malformed_codes() {
        assert!(Currency::parse("EURO").is_err());
        assert!(Currency::parse("E1R").is_err());
        assert!(Currency::parse("").is_err());
    }

    #[test]
    fn round_money_rounds_midpoints_away_from_zero() {
        assert_eq!(round_money(Decimal::new(62857142, 6)), Decimal::new(6286, 2));
        assert_eq!(round_money(Decimal::new(12345, 3)), Decimal::new(1235, 2));
        assert_eq!(round_money(Decimal::new(-12345, 3)), Decimal::new(-1235, 2));
    }
}
