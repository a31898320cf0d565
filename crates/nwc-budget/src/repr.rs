//! Compact textual budget representation
//!
//! A budget is written as `<amount>.<currency>/<frequency>`, for example
//! `100.USD/weekly`. The currency and frequency parts are optional: `100` is
//! one hundred sats that never renew, `100.USD` is one hundred cents that
//! never renew.

use std::fmt;
use std::str::FromStr;

use nwc_types::{Currency, SpendingLimitFrequency, ValidationError};
use serde::{Deserialize, Serialize};

/// Parsed budget representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetRepr {
    /// Amount in the smallest unit of `currency`
    pub amount: i64,
    pub currency: Currency,
    pub frequency: SpendingLimitFrequency,
}

impl BudgetRepr {
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::new("budget", format!("'{}': {}", s, reason));

        let (head, frequency) = match s.split_once('/') {
            Some((_, "")) => return Err(invalid("missing frequency after '/'")),
            Some((head, frequency)) => (head, frequency.parse::<SpendingLimitFrequency>()?),
            None => (s, SpendingLimitFrequency::None),
        };

        let (amount, currency) = match head.split_once('.') {
            Some((_, "")) => return Err(invalid("missing currency after '.'")),
            Some((amount, code)) => (amount, Currency::from_code(code)?),
            None => (head, Currency::sat()),
        };

        if amount.is_empty() {
            return Err(invalid("missing amount"));
        }
        if !amount.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("amount must be an integer"));
        }
        let amount: i64 = amount
            .parse()
            .map_err(|_| invalid("amount must be an integer"))?;
        if amount <= 0 {
            return Err(invalid("amount must be positive"));
        }

        Ok(Self {
            amount,
            currency,
            frequency,
        })
    }
}

impl FromStr for BudgetRepr {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BudgetRepr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}/{}", self.amount, self.currency.code, self.frequency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_form() {
        let repr = BudgetRepr::parse("100.USD/weekly").unwrap();
        assert_eq!(repr.amount, 100);
        assert_eq!(repr.currency, Currency::usd());
        assert_eq!(repr.frequency, SpendingLimitFrequency::Weekly);
        assert_eq!(repr.to_string(), "100.USD/weekly");
    }

    #[test]
    fn test_amount_only_is_non_renewing_sats() {
        let repr = BudgetRepr::parse("100").unwrap();
        assert_eq!(repr.currency, Currency::sat());
        assert_eq!(repr.frequency, SpendingLimitFrequency::None);
        assert_eq!(repr.to_string(), "100.SAT/none");
    }

    #[test]
    fn test_currency_without_frequency() {
        let repr = BudgetRepr::parse("2500.EUR").unwrap();
        assert_eq!(repr.currency.code, "EUR");
        assert_eq!(repr.frequency, SpendingLimitFrequency::None);
    }

    #[test]
    fn test_invalid_forms() {
        for input in [
            "",
            "100.",
            "100.USD/",
            "100.Bitcoin/weekly",
            "100.USD/fortnightly",
            "abc.USD/daily",
            "0.SAT/daily",
            "-5.SAT/daily",
            ".USD/daily",
            "+100.USD/weekly",
            "+100",
            " 100.SAT/daily",
        ] {
            assert!(BudgetRepr::parse(input).is_err(), "{} should be rejected", input);
        }
    }
}
