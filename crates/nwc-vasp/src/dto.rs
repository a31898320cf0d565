//! Request and response bodies of the UMA auth API

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetEstimateResponse {
    pub estimated_budget_currency_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayInvoiceRequest {
    pub invoice: String,
    /// Msats, only for zero-amount invoices
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_currency_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayKeysendRequest {
    /// Msats
    pub amount: i64,
    pub pubkey: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preimage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_currency_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayToAddressRequest {
    pub receiver_address: String,
    pub sending_currency_code: String,
    pub sending_currency_amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_currency_code: Option<String>,
}

/// Body returned by every payment endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub preimage: String,
    /// Actual cost in the requested budget currency
    #[serde(default)]
    pub total_budget_currency_amount: Option<i64>,
}
