//! Application state shared across handlers

use std::sync::Arc;

use nwc_budget::{BudgetService, CurrencyConverter, WalletConnection};
use nwc_db::Database;
use nwc_vasp::VaspClient;

/// Hands out a currency converter acting for a given connection
pub trait ConverterProvider: Send + Sync {
    fn converter(&self, connection: &WalletConnection) -> Box<dyn CurrencyConverter>;
}

impl ConverterProvider for VaspClient {
    fn converter(&self, connection: &WalletConnection) -> Box<dyn CurrencyConverter> {
        Box::new(self.session(connection.vasp_access_token.clone()))
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub budget: BudgetService,
    pub converters: Arc<dyn ConverterProvider>,
    /// Present when running against PostgreSQL
    pub database: Option<Arc<Database>>,
}

impl AppState {
    pub fn new(
        budget: BudgetService,
        converters: Arc<dyn ConverterProvider>,
        database: Option<Arc<Database>>,
    ) -> Self {
        Self {
            budget,
            converters,
            database,
        }
    }
}
