use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use gated_notes::Lud16;
use sha2::{Digest, Sha256};

use super::{Invoice, PayeeInfo, PaymentProvider, ProviderError};

const VERIFY_PREFIX: &str = "mock://verify/";

/// Scripted in-process provider.
///
/// Invoices start unsettled; [`MockPaymentProvider::settle`] flips one.
/// Clones share state, so a test can keep a handle after moving one into
/// the gate.
#[derive(Clone, Default)]
pub struct MockPaymentProvider {
    inner: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    /// verify token -> settled
    invoices: DashMap<String, bool>,
    /// payment request -> payment hash
    requests: DashMap<String, String>,
    minted: AtomicU64,
    unreachable: AtomicBool,
    unresolvable: AtomicBool,
    resolve_calls: AtomicUsize,
    mint_calls: AtomicUsize,
    check_calls: AtomicUsize,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the invoice with `payment_hash` as paid.
    pub fn settle(&self, payment_hash: &str) {
        self.inner
            .invoices
            .insert(format!("{VERIFY_PREFIX}{payment_hash}"), true);
    }

    /// Settle by payment request, the way a wallet would. Returns false for
    /// requests this provider never minted.
    pub fn pay(&self, pr: &str) -> bool {
        match self.inner.requests.get(pr) {
            Some(hash) => {
                self.settle(hash.value());
                true
            }
            None => false,
        }
    }

    /// Make every call fail as if the backend were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Make payee resolution fail while leaving other calls working.
    pub fn set_unresolvable(&self, unresolvable: bool) {
        self.inner.unresolvable.store(unresolvable, Ordering::SeqCst);
    }

    pub fn resolve_calls(&self) -> usize {
        self.inner.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn mint_calls(&self) -> usize {
        self.inner.mint_calls.load(Ordering::SeqCst)
    }

    pub fn check_calls(&self) -> usize {
        self.inner.check_calls.load(Ordering::SeqCst)
    }

    fn down(&self) -> Result<(), ProviderError> {
        if self.inner.unreachable.load(Ordering::SeqCst) {
            return Err(ProviderError::Unreachable("mock provider is down".to_string()));
        }
        Ok(())
    }
}

impl PaymentProvider for MockPaymentProvider {
    async fn resolve_payee(&self, payee: &Lud16) -> Result<PayeeInfo, ProviderError> {
        self.inner.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.down()?;
        if self.inner.unresolvable.load(Ordering::SeqCst) {
            return Err(ProviderError::Rejected(format!("{payee} does not resolve")));
        }
        Ok(PayeeInfo {
            callback: format!("mock://callback/{payee}"),
            min_sendable: 1,
            max_sendable: u64::MAX,
            comment_allowed: 255,
        })
    }

    async fn mint_invoice(
        &self,
        payee: &Lud16,
        amount_msat: u64,
        _memo: &str,
    ) -> Result<Invoice, ProviderError> {
        self.inner.mint_calls.fetch_add(1, Ordering::SeqCst);
        self.down()?;

        let n = self.inner.minted.fetch_add(1, Ordering::SeqCst);
        let payment_hash = hex::encode(Sha256::digest(format!("mock-invoice-{n}").as_bytes()));
        let verify = format!("{VERIFY_PREFIX}{payment_hash}");
        self.inner.invoices.insert(verify.clone(), false);

        let pr = format!("lnmock{amount_msat}n1{}{payee}", &payment_hash[..16]);
        self.inner.requests.insert(pr.clone(), payment_hash.clone());

        Ok(Invoice {
            pr,
            payment_hash,
            verify,
            status: Some("OK".to_string()),
            routes: serde_json::json!([]),
        })
    }

    async fn check_settled(&self, verify: &str) -> Result<bool, ProviderError> {
        self.inner.check_calls.fetch_add(1, Ordering::SeqCst);
        self.down()?;
        self.inner
            .invoices
            .get(verify)
            .map(|settled| *settled)
            .ok_or_else(|| ProviderError::BadResponse(format!("unknown verify token {verify}")))
    }
}
