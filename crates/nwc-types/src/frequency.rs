//! Renewal frequency of a spending limit

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ValidationError;

/// How often a spending limit renews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpendingLimitFrequency {
    Daily,
    Weekly,
    /// Fixed 30 day period, not calendar months
    Monthly,
    /// Fixed 365 day period
    Yearly,
    /// Never renews: one cycle for the lifetime of the connection
    None,
}

impl SpendingLimitFrequency {
    /// Length of one cycle, or `None` for a limit that never renews
    pub fn cycle_length(&self) -> Option<Duration> {
        match self {
            Self::Daily => Some(Duration::days(1)),
            Self::Weekly => Some(Duration::days(7)),
            Self::Monthly => Some(Duration::days(30)),
            Self::Yearly => Some(Duration::days(365)),
            Self::None => None,
        }
    }

    pub fn is_periodic(&self) -> bool {
        self.cycle_length().is_some()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::None => "none",
        }
    }
}

impl Default for SpendingLimitFrequency {
    fn default() -> Self {
        Self::None
    }
}

impl fmt::Display for SpendingLimitFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpendingLimitFrequency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            "none" => Ok(Self::None),
            other => Err(ValidationError::new(
                "frequency",
                format!("unknown frequency '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_lengths() {
        assert_eq!(SpendingLimitFrequency::Daily.cycle_length(), Some(Duration::hours(24)));
        assert_eq!(SpendingLimitFrequency::Weekly.cycle_length(), Some(Duration::days(7)));
        assert_eq!(SpendingLimitFrequency::Monthly.cycle_length(), Some(Duration::days(30)));
        assert_eq!(SpendingLimitFrequency::Yearly.cycle_length(), Some(Duration::days(365)));
        assert_eq!(SpendingLimitFrequency::None.cycle_length(), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("WEEKLY".parse::<SpendingLimitFrequency>().unwrap(), SpendingLimitFrequency::Weekly);
        assert_eq!("none".parse::<SpendingLimitFrequency>().unwrap(), SpendingLimitFrequency::None);
        assert!("fortnightly".parse::<SpendingLimitFrequency>().is_err());
    }
}
