//! Payment gate for Lightning-gated notes.
//!
//! Publishers register a gated note together with its secret, price and
//! payee address. Buyers request an invoice per note and receive the
//! secret once the payment provider confirms settlement.

pub mod config;
pub mod cors;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod provider;
pub mod routes;
pub mod security;
pub mod state;
pub mod store;
pub mod validation;

pub use config::GateConfig;
pub use error::GateError;
pub use gate::{PaymentGate, Release};
pub use provider::{LnurlProvider, MockPaymentProvider, PaymentProvider, ProviderError};
pub use state::AppState;
pub use store::{GateStore, InMemoryGateStore, SqliteGateStore, StoreError};
