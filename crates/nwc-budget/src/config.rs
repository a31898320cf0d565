//! Budget configuration

use nwc_types::ValidationError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Budget accounting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Safety factor applied to an estimate before it is held against a cycle.
    /// Must be at least 1.
    #[serde(default = "default_buffer_multiplier")]
    pub buffer_multiplier: Decimal,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            buffer_multiplier: default_buffer_multiplier(),
        }
    }
}

impl BudgetConfig {
    pub fn with_buffer_multiplier(buffer_multiplier: Decimal) -> Result<Self, ValidationError> {
        let config = Self { buffer_multiplier };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.buffer_multiplier < Decimal::ONE {
            return Err(ValidationError::new(
                "buffer_multiplier",
                format!("must be at least 1, got {}", self.buffer_multiplier),
            ));
        }
        Ok(())
    }

    /// Amount to hold for an estimate: `ceil(estimate * buffer_multiplier)`.
    ///
    /// Computed in exact decimal arithmetic so that e.g. `1000 * 1.1` holds
    /// 1100 and never 1101.
    pub fn hold_for(&self, estimated: i64) -> Result<i64, ValidationError> {
        (Decimal::from(estimated) * self.buffer_multiplier)
            .ceil()
            .to_i64()
            .ok_or_else(|| ValidationError::new("amount", format!("hold for {} overflows", estimated)))
    }
}

fn default_buffer_multiplier() -> Decimal {
    Decimal::ONE
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_multiplier_holds_estimate() {
        let config = BudgetConfig::default();
        assert_eq!(config.hold_for(112).unwrap(), 112);
        assert_eq!(config.hold_for(0).unwrap(), 0);
    }

    #[test]
    fn test_hold_rounds_up() {
        let config = BudgetConfig::with_buffer_multiplier(dec!(1.1)).unwrap();
        assert_eq!(config.hold_for(1000).unwrap(), 1100);
        assert_eq!(config.hold_for(11).unwrap(), 13);
        assert_eq!(config.hold_for(1).unwrap(), 2);
    }

    #[test]
    fn test_multiplier_below_one_rejected() {
        assert!(BudgetConfig::with_buffer_multiplier(dec!(0.9)).is_err());
    }
}
