//! External collaborators of the budget core
//!
//! Currency conversion and payment execution are performed by the upstream
//! VASP. The core only sees them through these traits, so each entry point
//! is handed the collaborator to use for the connection at hand.

use async_trait::async_trait;
use nwc_types::{Currency, QuoteId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::payment::{PaymentIntent, ReceiverType};

/// Failure reported by a collaborator
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    /// The service answered with an error status
    #[error("{service} returned {status}: {message}")]
    Status {
        service: String,
        status: u16,
        message: String,
    },

    /// The service could not be reached or timed out
    #[error("{service} unavailable: {message}")]
    Unavailable { service: String, message: String },

    /// The service answered with something we could not use
    #[error("Invalid response from {service}: {message}")]
    InvalidResponse { service: String, message: String },
}

/// Estimates how much an amount in one currency costs in another
#[async_trait]
pub trait CurrencyConverter: Send + Sync {
    /// Amount of `target_currency` (smallest unit) needed to send
    /// `sending_amount` of `sending_currency`
    async fn estimate(
        &self,
        sending_currency: &Currency,
        sending_amount: i64,
        target_currency: &Currency,
    ) -> Result<i64, CollaboratorError>;
}

/// Lightning address flavours accepted by pay-to-address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivingAddress {
    pub address: String,
    pub receiver_type: ReceiverType,
}

/// A quote previously fetched from the VASP, ready to execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteDetails {
    pub id: QuoteId,
    pub payment_hash: String,
    pub receiver: ReceivingAddress,
    pub sending_currency: Currency,
    pub sending_amount: i64,
}

/// A money-moving request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentRequest {
    PayInvoice {
        invoice: String,
        amount_msats: i64,
    },
    PayKeysend {
        pubkey: String,
        amount_msats: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preimage: Option<String>,
    },
    PayToAddress {
        receiver: ReceivingAddress,
        sending_currency: Currency,
        sending_amount: i64,
    },
    ExecuteQuote {
        quote: QuoteDetails,
    },
}

impl PaymentRequest {
    pub fn method(&self) -> &'static str {
        match self {
            Self::PayInvoice { .. } => "pay_invoice",
            Self::PayKeysend { .. } => "pay_keysend",
            Self::PayToAddress { .. } => "pay_to_address",
            Self::ExecuteQuote { .. } => "execute_quote",
        }
    }

    /// Budget view of the request. Msat amounts are charged in whole sats,
    /// rounded up.
    pub fn intent(&self) -> Result<PaymentIntent, nwc_types::ValidationError> {
        match self {
            Self::PayInvoice {
                invoice,
                amount_msats,
            } => PaymentIntent::new(
                invoice.clone(),
                ReceiverType::Bolt11Invoice,
                Currency::sat(),
                msats_to_sats(*amount_msats),
            ),
            Self::PayKeysend {
                pubkey,
                amount_msats,
                ..
            } => PaymentIntent::new(
                pubkey.clone(),
                ReceiverType::NodePubkey,
                Currency::sat(),
                msats_to_sats(*amount_msats),
            ),
            Self::PayToAddress {
                receiver,
                sending_currency,
                sending_amount,
            } => PaymentIntent::new(
                receiver.address.clone(),
                receiver.receiver_type,
                sending_currency.clone(),
                *sending_amount,
            ),
            Self::ExecuteQuote { quote } => Ok(PaymentIntent::new(
                quote.receiver.address.clone(),
                quote.receiver.receiver_type,
                quote.sending_currency.clone(),
                quote.sending_amount,
            )?
            .with_quote(quote.id)),
        }
    }
}

fn msats_to_sats(msats: i64) -> i64 {
    if msats <= 0 {
        return msats;
    }
    msats / 1000 + i64::from(msats % 1000 != 0)
}

/// Result of a successful execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub preimage: Option<String>,
    /// Actual cost in the budget currency, when the VASP reports it
    pub settled_budget_amount: Option<i64>,
}

/// Performs the real payment upstream
#[async_trait]
pub trait PaymentExecutor: Send + Sync {
    /// Execute `request`. `budget_currency` is the currency the settled
    /// amount should be reported in, if the payment is budgeted.
    async fn execute(
        &self,
        request: &PaymentRequest,
        budget_currency: Option<&Currency>,
    ) -> Result<PaymentOutcome, CollaboratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_intent_rounds_msats_up() {
        let request = PaymentRequest::PayInvoice {
            invoice: "lnbc1...".to_string(),
            amount_msats: 1_000_500,
        };
        let intent = request.intent().unwrap();
        assert_eq!(intent.sending_currency, Currency::sat());
        assert_eq!(intent.sending_amount, 1001);
        assert_eq!(intent.receiver_type, ReceiverType::Bolt11Invoice);
    }

    #[test]
    fn test_max_msats_round_up_without_overflow() {
        let request = PaymentRequest::PayKeysend {
            pubkey: "02abc".to_string(),
            amount_msats: i64::MAX,
            preimage: None,
        };
        let intent = request.intent().unwrap();
        assert_eq!(intent.sending_amount, i64::MAX / 1000 + 1);
        assert_eq!(msats_to_sats(3000), 3);
    }

    #[test]
    fn test_quote_intent_carries_quote_id() {
        let quote = QuoteDetails {
            id: QuoteId::new(),
            payment_hash: "abc123".to_string(),
            receiver: ReceivingAddress {
                address: "$alice@vasp.com".to_string(),
                receiver_type: ReceiverType::Lud16,
            },
            sending_currency: Currency::usd(),
            sending_amount: 250,
        };
        let intent = PaymentRequest::ExecuteQuote { quote: quote.clone() }
            .intent()
            .unwrap();
        assert_eq!(intent.quote_id, Some(quote.id));
        assert_eq!(intent.sending_amount, 250);
    }

    #[test]
    fn test_zero_msats_rejected() {
        let request = PaymentRequest::PayKeysend {
            pubkey: "02abc".to_string(),
            amount_msats: 0,
            preimage: None,
        };
        assert!(request.intent().is_err());
    }

    #[test]
    fn test_request_tagging() {
        let request = PaymentRequest::PayInvoice {
            invoice: "lnbc1...".to_string(),
            amount_msats: 1000,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["method"], "pay_invoice");
        assert_eq!(request.method(), "pay_invoice");
    }
}
