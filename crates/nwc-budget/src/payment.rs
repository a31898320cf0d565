//! Outgoing payment records
//!
//! Every payment attempt leaves an [`OutgoingPayment`], whether or not a
//! spending limit was active. Records are append-only: once a payment leaves
//! `Pending` it is never reopened.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use nwc_types::{
    ConnectionId, Currency, PaymentId, QuoteId, RequestId, SpendingCycleId, ValidationError,
};
use serde::{Deserialize, Serialize};

/// Lifecycle of a payment attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Pending => false,
            Self::Succeeded | Self::Failed => true,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            other => Err(ValidationError::new("status", format!("unknown payment status '{}'", other))),
        }
    }
}

/// What the payment is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiverType {
    Bolt11Invoice,
    NodePubkey,
    /// Lightning address (`user@domain`)
    Lud16,
    /// BIP-353 human readable name (`₿user@domain`)
    Bip353,
}

impl ReceiverType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bolt11Invoice => "BOLT11_INVOICE",
            Self::NodePubkey => "NODE_PUBKEY",
            Self::Lud16 => "LUD16",
            Self::Bip353 => "BIP353",
        }
    }
}

impl fmt::Display for ReceiverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceiverType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BOLT11_INVOICE" => Ok(Self::Bolt11Invoice),
            "NODE_PUBKEY" => Ok(Self::NodePubkey),
            "LUD16" => Ok(Self::Lud16),
            "BIP353" => Ok(Self::Bip353),
            other => Err(ValidationError::new("receiver_type", format!("unknown receiver type '{}'", other))),
        }
    }
}

/// The money-moving part of a payment request, as seen by the budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub receiver: String,
    pub receiver_type: ReceiverType,
    pub sending_currency: Currency,
    /// Amount in the smallest unit of `sending_currency`
    pub sending_amount: i64,
    pub quote_id: Option<QuoteId>,
}

impl PaymentIntent {
    pub fn new(
        receiver: impl Into<String>,
        receiver_type: ReceiverType,
        sending_currency: Currency,
        sending_amount: i64,
    ) -> Result<Self, ValidationError> {
        if sending_amount <= 0 {
            return Err(ValidationError::new(
                "sending_amount",
                format!("must be positive, got {}", sending_amount),
            ));
        }
        Ok(Self {
            receiver: receiver.into(),
            receiver_type,
            sending_currency,
            sending_amount,
            quote_id: None,
        })
    }

    pub fn with_quote(mut self, quote_id: QuoteId) -> Self {
        self.quote_id = Some(quote_id);
        self
    }
}

/// Record of one payment attempt and its budget reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingPayment {
    pub id: PaymentId,
    pub request_id: RequestId,
    pub connection_id: ConnectionId,
    pub quote_id: Option<QuoteId>,
    pub receiver: String,
    pub receiver_type: ReceiverType,
    pub sending_currency: Currency,
    pub sending_amount: i64,
    pub status: PaymentStatus,
    /// `None` when no limit was active
    pub spending_cycle_id: Option<SpendingCycleId>,
    /// Currency of the cycle the budget amounts are expressed in
    pub budget_currency: Option<Currency>,
    pub estimated_budget_amount: Option<i64>,
    pub budget_on_hold: Option<i64>,
    pub settled_budget_amount: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutgoingPayment {
    /// A pending payment with no budget linkage
    pub fn pending(
        request_id: RequestId,
        connection_id: ConnectionId,
        intent: PaymentIntent,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            request_id,
            connection_id,
            quote_id: intent.quote_id,
            receiver: intent.receiver,
            receiver_type: intent.receiver_type,
            sending_currency: intent.sending_currency,
            sending_amount: intent.sending_amount,
            status: PaymentStatus::Pending,
            spending_cycle_id: None,
            budget_currency: None,
            estimated_budget_amount: None,
            budget_on_hold: None,
            settled_budget_amount: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_budgeted(&self) -> bool {
        self.spending_cycle_id.is_some()
    }

    pub(crate) fn attach_reservation(
        &mut self,
        cycle_id: SpendingCycleId,
        budget_currency: Currency,
        estimated: i64,
        hold: i64,
    ) {
        self.spending_cycle_id = Some(cycle_id);
        self.budget_currency = Some(budget_currency);
        self.estimated_budget_amount = Some(estimated);
        self.budget_on_hold = Some(hold);
    }

    pub(crate) fn mark_succeeded(&mut self, settled: i64, at: DateTime<Utc>) {
        self.status = PaymentStatus::Succeeded;
        self.settled_budget_amount = Some(settled);
        self.updated_at = at;
    }

    pub(crate) fn mark_failed(&mut self, at: DateTime<Utc>) {
        self.status = PaymentStatus::Failed;
        self.updated_at = at;
    }

    /// Settled amount to record when the executor did not report one.
    ///
    /// The sending amount when it is already in the budget currency (or
    /// there is no budget), otherwise the estimate. Returns `true` in the
    /// second element when the estimate had to be used.
    pub fn fallback_settled_amount(&self) -> (i64, bool) {
        match (&self.budget_currency, self.estimated_budget_amount) {
            (Some(currency), Some(estimate)) if *currency != self.sending_currency => {
                (estimate, true)
            }
            _ => (self.sending_amount, false),
        }
    }
}
