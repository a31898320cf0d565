//! Currency descriptors
//!
//! The VASP labels every monetary amount with a currency descriptor. Amounts
//! themselves are always integers in the smallest unit of that currency.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::ValidationError;

/// Code of the base unit budgets default to.
pub const SAT_CODE: &str = "SAT";

/// A named currency (code, symbol, name, decimals).
///
/// Two descriptors are equal when their codes are equal; symbol and name are
/// presentation details supplied by the VASP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Currency {
    pub code: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

impl Currency {
    pub fn new(
        code: impl Into<String>,
        symbol: impl Into<String>,
        name: impl Into<String>,
        decimals: u8,
    ) -> Self {
        Self {
            code: code.into(),
            symbol: symbol.into(),
            name: name.into(),
            decimals,
        }
    }

    /// Satoshis, the unit Lightning payments are denominated in
    pub fn sat() -> Self {
        Self::new(SAT_CODE, "sat", "Satoshi", 0)
    }

    pub fn usd() -> Self {
        Self::new("USD", "$", "US Dollar", 2)
    }

    /// Resolve a currency code to a descriptor.
    ///
    /// Well-known codes get their full descriptor; any other three-letter code
    /// gets a placeholder whose symbol and name are the code itself.
    pub fn from_code(code: &str) -> Result<Self, ValidationError> {
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::new(
                "currency",
                format!("'{}' is not a three letter currency code", code),
            ));
        }

        let code = code.to_ascii_uppercase();
        let currency = match code.as_str() {
            "SAT" => Self::sat(),
            "BTC" => Self::new("BTC", "₿", "Bitcoin", 8),
            "USD" => Self::usd(),
            "EUR" => Self::new("EUR", "€", "Euro", 2),
            "GBP" => Self::new("GBP", "£", "Pound Sterling", 2),
            "MXN" => Self::new("MXN", "$", "Mexican Peso", 2),
            "CAD" => Self::new("CAD", "$", "Canadian Dollar", 2),
            "BRL" => Self::new("BRL", "R$", "Brazilian Real", 2),
            "INR" => Self::new("INR", "₹", "Indian Rupee", 2),
            "JPY" => Self::new("JPY", "¥", "Japanese Yen", 0),
            "KRW" => Self::new("KRW", "₩", "South Korean Won", 0),
            _ => Self::new(code.clone(), code.clone(), code, 2),
        };
        Ok(currency)
    }

    pub fn is_sat(&self) -> bool {
        self.code == SAT_CODE
    }
}

impl PartialEq for Currency {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Currency {}

impl Hash for Currency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::sat()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}
