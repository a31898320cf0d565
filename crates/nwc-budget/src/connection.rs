//! Wallet connections

use chrono::{DateTime, Utc};
use nwc_types::{ConnectionId, Currency, SpendingLimitId};
use serde::{Deserialize, Serialize};

/// A client app's connection to the user's wallet.
///
/// Holds a pointer to its currently active spending limit. Deactivated
/// limits are only reachable through the limit history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConnection {
    pub id: ConnectionId,
    /// Currency new limits default to
    pub budget_currency: Currency,
    pub spending_limit_id: Option<SpendingLimitId>,
    /// Token used to act on the user's behalf at the VASP
    #[serde(skip_serializing, default)]
    pub vasp_access_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WalletConnection {
    pub fn new(budget_currency: Currency, vasp_access_token: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: ConnectionId::new(),
            budget_currency,
            spending_limit_id: None,
            vasp_access_token,
            created_at: now,
        }
    }

    pub fn has_limit(&self) -> bool {
        self.spending_limit_id.is_some()
    }
}
