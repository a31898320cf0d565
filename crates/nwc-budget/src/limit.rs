//! Spending limits
//!
//! A spending limit is the budget policy attached to a wallet connection.
//! Limits are never deleted: deactivation sets `end_time` and the row stays
//! around for history.

use chrono::{DateTime, Duration, Utc};
use nwc_types::{ConnectionId, Currency, SpendingLimitFrequency, SpendingLimitId, ValidationError};
use serde::{Deserialize, Serialize};

use crate::cycle::SpendingCycle;
use crate::repr::BudgetRepr;

/// Budget policy for one wallet connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendingLimit {
    pub id: SpendingLimitId,
    pub connection_id: ConnectionId,
    pub currency: Currency,
    /// Amount in the smallest unit of `currency`, always positive
    pub amount: i64,
    pub frequency: SpendingLimitFrequency,
    pub start_time: DateTime<Utc>,
    /// Set when the limit is deactivated
    pub end_time: Option<DateTime<Utc>>,
}

impl SpendingLimit {
    /// Create an active limit
    pub fn new(
        connection_id: ConnectionId,
        currency: Currency,
        amount: i64,
        frequency: SpendingLimitFrequency,
        start_time: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        validate_amount(amount)?;
        Ok(Self {
            id: SpendingLimitId::new(),
            connection_id,
            currency,
            amount,
            frequency,
            start_time,
            end_time: None,
        })
    }

    pub fn from_budget_repr(
        connection_id: ConnectionId,
        repr: &BudgetRepr,
        start_time: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        Self::new(
            connection_id,
            repr.currency.clone(),
            repr.amount,
            repr.frequency,
            start_time,
        )
    }

    pub fn budget_repr(&self) -> BudgetRepr {
        BudgetRepr {
            amount: self.amount,
            currency: self.currency.clone(),
            frequency: self.frequency,
        }
    }

    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }

    /// Deactivate the limit at `at`. No-op if already deactivated.
    ///
    /// Cycles are left untouched; closing the current one is up to the caller.
    pub fn deactivate(&mut self, at: DateTime<Utc>) {
        if self.end_time.is_none() {
            self.end_time = Some(at.max(self.start_time));
        }
    }

    pub fn cycle_length(&self) -> Option<Duration> {
        self.frequency.cycle_length()
    }

    /// Start of the period containing `now`.
    ///
    /// Periods are anchored to `start_time`, so the result is always
    /// `start_time + k * cycle_length` for some `k >= 0`.
    pub fn current_cycle_start_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.cycle_length() {
            Some(length) if now > self.start_time => {
                let length_secs = length.num_seconds();
                let periods = (now - self.start_time).num_seconds() / length_secs;
                self.start_time + Duration::seconds(periods * length_secs)
            }
            _ => self.start_time,
        }
    }

    /// End of the period containing `now`, `None` for a limit that never renews
    pub fn current_cycle_end_time(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cycle_length()
            .map(|length| self.current_cycle_start_time(now) + length)
    }

    /// Build the cycle starting at `start_time`.
    ///
    /// # Panics
    ///
    /// If `start_time` is before the limit's start or not on a period
    /// boundary. Both are caller bugs.
    pub fn create_cycle(&self, start_time: DateTime<Utc>) -> SpendingCycle {
        assert!(
            start_time >= self.start_time,
            "cycle start {} precedes limit {} start {}",
            start_time,
            self.id,
            self.start_time
        );

        let end_time = match self.cycle_length() {
            Some(length) => {
                let offset = start_time - self.start_time;
                let whole_secs = offset.num_seconds();
                assert!(
                    offset == Duration::seconds(whole_secs) && whole_secs % length.num_seconds() == 0,
                    "cycle start {} is not aligned to limit {} ({} periods from {})",
                    start_time,
                    self.id,
                    self.frequency,
                    self.start_time
                );
                Some(start_time + length)
            }
            None => None,
        };

        SpendingCycle::new(
            self.id,
            self.currency.clone(),
            self.amount,
            start_time,
            end_time,
        )
    }
}

pub(crate) fn validate_amount(amount: i64) -> Result<(), ValidationError> {
    if amount <= 0 {
        return Err(ValidationError::new(
            "amount",
            format!("spending limit amount must be positive, got {}", amount),
        ));
    }
    Ok(())
}
