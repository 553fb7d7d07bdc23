//! Payment provider seam: invoice minting and settlement checks.
//!
//! - [`LnurlProvider`] talks LNURL-pay to the payee's wallet
//! - [`MockPaymentProvider`] is scripted in-process, for tests and local runs

mod lnurl;
mod mock;

pub use lnurl::LnurlProvider;
pub use mock::MockPaymentProvider;

use gated_notes::Lud16;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transport failure or non-2xx status.
    #[error("provider unreachable: {0}")]
    Unreachable(String),

    /// The provider answered with something we cannot use.
    #[error("unexpected provider response: {0}")]
    BadResponse(String),

    /// The provider answered with an explicit error.
    #[error("provider rejected request: {0}")]
    Rejected(String),
}

/// What a payee accepts, from its LNURL-pay metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayeeInfo {
    pub callback: String,
    pub min_sendable: u64,
    pub max_sendable: u64,
    /// Maximum comment length, 0 when comments are not accepted.
    pub comment_allowed: u64,
}

impl PayeeInfo {
    pub fn accepts(&self, amount_msat: u64) -> bool {
        (self.min_sendable..=self.max_sendable).contains(&amount_msat)
    }
}

/// A freshly minted invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    /// BOLT-11 payment request.
    pub pr: String,
    /// Hex payment hash, unique per invoice.
    pub payment_hash: String,
    /// Token (a URL for LNURL providers) for settlement checks.
    pub verify: String,
    pub status: Option<String>,
    pub routes: serde_json::Value,
}

/// Lightning payment backend.
///
/// Calls carry no timeout or retry policy of their own; callers decide.
pub trait PaymentProvider: Send + Sync {
    /// Fetch and check the payee's payment metadata.
    fn resolve_payee(
        &self,
        payee: &Lud16,
    ) -> impl std::future::Future<Output = Result<PayeeInfo, ProviderError>> + Send;

    /// Mint an invoice for exactly `amount_msat` payable to `payee`.
    fn mint_invoice(
        &self,
        payee: &Lud16,
        amount_msat: u64,
        memo: &str,
    ) -> impl std::future::Future<Output = Result<Invoice, ProviderError>> + Send;

    /// Ask whether the invoice behind `verify` has settled.
    fn check_settled(
        &self,
        verify: &str,
    ) -> impl std::future::Future<Output = Result<bool, ProviderError>> + Send;
}
