//! Read-only budget view for `get_budget`

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use nwc_types::Currency;

use crate::collaborators::{CollaboratorError, CurrencyConverter};
use crate::connection::WalletConnection;
use crate::error::{BudgetError, Result};
use crate::service::BudgetService;

const MSATS_PER_SAT: i64 = 1000;

/// Budget totals in the connection's budget currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetCurrencyView {
    pub code: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub total_budget: i64,
    pub remaining_budget: i64,
}

/// NIP-47 `get_budget` result. Every field is absent when the connection has
/// no active limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_budget_msats: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_budget_msats: Option<i64>,
    /// Unix seconds at which the current cycle ends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renews_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<BudgetCurrencyView>,
}

impl BudgetView {
    pub fn is_empty(&self) -> bool {
        self.total_budget_msats.is_none()
    }
}

impl BudgetService {
    /// Current budget of a connection for display.
    ///
    /// Non-sat budgets are priced with a single conversion of the limit's
    /// total amount; the result is never used for gating payments.
    pub async fn get_budget_view(
        &self,
        converter: &dyn CurrencyConverter,
        connection: &WalletConnection,
    ) -> Result<BudgetView> {
        let Some(limit) = self.active_limit(connection).await? else {
            return Ok(BudgetView::default());
        };

        let cycle = self.get_or_create_current_cycle(&limit, Utc::now()).await?;
        let total = limit.amount;
        let remaining = cycle.available_budget().max(0);
        let renews_at = cycle.end_time().map(|end| end.timestamp());

        if limit.currency.is_sat() {
            return Ok(BudgetView {
                total_budget_msats: Some(total.saturating_mul(MSATS_PER_SAT)),
                remaining_budget_msats: Some(remaining.saturating_mul(MSATS_PER_SAT)),
                renews_at,
                currency: None,
            });
        }

        let total_sats = converter
            .estimate(&limit.currency, total, &Currency::sat())
            .await
            .map_err(BudgetError::Conversion)?;
        let remaining_sats = proportional(total_sats, remaining, total)?;
        debug!(
            connection_id = %connection.id,
            total_sats,
            remaining_sats,
            "Budget converted for display"
        );

        Ok(BudgetView {
            total_budget_msats: Some(total_sats.saturating_mul(MSATS_PER_SAT)),
            remaining_budget_msats: Some(remaining_sats.saturating_mul(MSATS_PER_SAT)),
            renews_at,
            currency: Some(BudgetCurrencyView {
                code: limit.currency.code.clone(),
                symbol: limit.currency.symbol.clone(),
                name: limit.currency.name.clone(),
                decimals: limit.currency.decimals,
                total_budget: total,
                remaining_budget: remaining,
            }),
        })
    }
}

/// `round(total_sats * remaining / total)`, rounding half to even
fn proportional(total_sats: i64, remaining: i64, total: i64) -> Result<i64> {
    Decimal::from(total_sats)
        .checked_mul(Decimal::from(remaining))
        .and_then(|product| product.checked_div(Decimal::from(total)))
        .and_then(|share| share.round().to_i64())
        .ok_or_else(|| {
            BudgetError::Conversion(CollaboratorError::InvalidResponse {
                service: "currency converter".to_string(),
                message: format!("estimate {} out of range", total_sats),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proportional_rounding() {
        assert_eq!(proportional(1000, 50, 100).unwrap(), 500);
        assert_eq!(proportional(1001, 50, 100).unwrap(), 500);
        assert_eq!(proportional(1003, 50, 100).unwrap(), 502);
        assert_eq!(proportional(1000, 0, 100).unwrap(), 0);
    }

    #[test]
    fn test_proportional_overflow_is_an_error() {
        let huge = 1_000_000_000_000_000;
        let err = proportional(huge, huge, huge).unwrap_err();
        assert!(matches!(
            err,
            BudgetError::Conversion(CollaboratorError::InvalidResponse { .. })
        ));
        assert_eq!(proportional(i64::MAX, 1, 1).unwrap(), i64::MAX);
    }

    #[test]
    fn test_empty_view_serializes_to_empty_object() {
        let view = BudgetView::default();
        assert!(view.is_empty());
        assert_eq!(serde_json::to_string(&view).unwrap(), "{}");
    }
}
