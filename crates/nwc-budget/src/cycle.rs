//! Spending cycles
//!
//! A cycle is one renewal period of a spending limit. It snapshots the
//! limit's currency and amount at creation and carries the running totals.
//!
//! # Invariants
//!
//! 1. `total_spent + total_spent_on_hold <= limit_amount` whenever a hold is placed
//! 2. The totals are only written by the reservation protocol
//! 3. `start_time` is aligned to the owning limit's start

use chrono::{DateTime, Utc};
use nwc_types::{Currency, SpendingCycleId, SpendingLimitId};
use serde::{Deserialize, Serialize};

/// One renewal period of a [`SpendingLimit`](crate::SpendingLimit)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendingCycle {
    pub id: SpendingCycleId,
    pub spending_limit_id: SpendingLimitId,
    /// Currency of the limit when the cycle was created
    pub limit_currency: Currency,
    limit_amount: i64,
    pub start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    total_spent: i64,
    total_spent_on_hold: i64,
}

impl SpendingCycle {
    pub(crate) fn new(
        spending_limit_id: SpendingLimitId,
        limit_currency: Currency,
        limit_amount: i64,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: SpendingCycleId::new(),
            spending_limit_id,
            limit_currency,
            limit_amount,
            start_time,
            end_time,
            total_spent: 0,
            total_spent_on_hold: 0,
        }
    }

    /// Rebuild a cycle from persisted state
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: SpendingCycleId,
        spending_limit_id: SpendingLimitId,
        limit_currency: Currency,
        limit_amount: i64,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        total_spent: i64,
        total_spent_on_hold: i64,
    ) -> Self {
        Self {
            id,
            spending_limit_id,
            limit_currency,
            limit_amount,
            start_time,
            end_time,
            total_spent,
            total_spent_on_hold,
        }
    }

    pub fn limit_amount(&self) -> i64 {
        self.limit_amount
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Settled amount consumed in this cycle
    pub fn total_spent(&self) -> i64 {
        self.total_spent
    }

    /// Amount currently reserved for in-flight payments
    pub fn total_spent_on_hold(&self) -> i64 {
        self.total_spent_on_hold
    }

    pub fn available_budget(&self) -> i64 {
        self.limit_amount - self.total_spent - self.total_spent_on_hold
    }

    pub fn can_reserve(&self, amount: i64) -> bool {
        self.available_budget() >= amount
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_time.map_or(false, |end| now >= end)
    }

    pub(crate) fn place_hold(&mut self, amount: i64) {
        self.total_spent_on_hold += amount;
    }

    pub(crate) fn release_hold(&mut self, amount: i64) {
        self.total_spent_on_hold = (self.total_spent_on_hold - amount).max(0);
    }

    /// Turn a hold into a settled spend. `settled` may exceed `hold`.
    pub(crate) fn settle(&mut self, hold: i64, settled: i64) {
        self.release_hold(hold);
        self.total_spent += settled;
    }

    pub(crate) fn set_limit_amount(&mut self, amount: i64) {
        self.limit_amount = amount;
    }

    /// Cap the end of the cycle at `at`. A cycle that already ended earlier
    /// keeps its end time.
    pub(crate) fn end_at(&mut self, at: DateTime<Utc>) {
        let at = at.max(self.start_time);
        self.end_time = Some(match self.end_time {
            Some(end) if end <= at => end,
            _ => at,
        });
    }
}
