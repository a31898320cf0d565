//! NWC VASP - client for the upstream VASP's UMA auth API
//!
//! The VASP executes payments and prices amounts across currencies. A
//! [`VaspSession`] carries one connection's access token and implements the
//! budget core's [`CurrencyConverter`](nwc_budget::CurrencyConverter) and
//! [`PaymentExecutor`](nwc_budget::PaymentExecutor) traits.

pub mod client;
pub mod config;
pub mod dto;
pub mod error;

pub use client::{VaspClient, VaspSession};
pub use config::VaspConfig;
pub use dto::*;
pub use error::{VaspError, VaspResult};
