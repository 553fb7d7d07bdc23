//! Invoice issuance and settlement-gated secret release.
//!
//! Per `(note_id, payment_hash)` the state machine is
//!
//! ```text
//! UNPAID --provider confirms settlement--> PAID (terminal)
//! ```
//!
//! A secret only leaves the gate after a provider confirmation observed in
//! this call, or after an earlier call already performed the transition for
//! that exact payment hash.

use std::sync::Arc;

use gated_notes::{CreateNoteRequest, Lud16, NoteEntry, PaymentStatus, PrEntry};

use crate::error::GateError;
use crate::metrics;
use crate::provider::PaymentProvider;
use crate::store::{GateStore, StoreError};
use crate::validation::validate_publication;

/// Outcome of a settlement check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release {
    /// Paid; the entry carries the secret.
    Paid(NoteEntry),
    /// Not settled yet. Not an error.
    Pending(PrEntry),
}

pub struct PaymentGate<P> {
    store: Arc<dyn GateStore>,
    provider: P,
    endpoint: String,
    memo: String,
}

impl<P: PaymentProvider> PaymentGate<P> {
    /// `endpoint` is the public base URL gated notes must name to be accepted.
    pub fn new(
        store: Arc<dyn GateStore>,
        provider: P,
        endpoint: impl Into<String>,
        memo: impl Into<String>,
    ) -> Self {
        Self {
            store,
            provider,
            endpoint: endpoint.into(),
            memo: memo.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn store(&self) -> &Arc<dyn GateStore> {
        &self.store
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn load_note(&self, note_id: &str) -> Result<NoteEntry, GateError> {
        self.store
            .note(note_id)?
            .ok_or_else(|| GateError::NotFound(note_id.to_string()))
    }

    fn release_url(&self, note_id: &str, payment_hash: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            note_id,
            payment_hash
        )
    }

    /// Mint a fresh invoice for the note's current price.
    ///
    /// Every call creates a new payment request; earlier ones stay valid.
    pub async fn request_invoice(&self, note_id: &str) -> Result<PrEntry, GateError> {
        let note = self.load_note(note_id)?;
        let payee: Lud16 = note.lud16.parse().map_err(|_| {
            GateError::Internal(format!("stored lud16 for {note_id} does not parse"))
        })?;

        let invoice = self
            .provider
            .mint_invoice(&payee, note.price, &self.memo)
            .await
            .inspect_err(|_| metrics::PROVIDER_ERRORS.inc())?;

        let entry = PrEntry {
            success_action: serde_json::json!({
                "tag": "url",
                "description": "Open the gated note",
                "url": self.release_url(note_id, &invoice.payment_hash),
            }),
            payment_hash: invoice.payment_hash,
            note_id: note.note_id,
            invoice: invoice.pr,
            verify_token: invoice.verify,
            status: invoice.status,
            payment_status: PaymentStatus::Unpaid,
            routes: invoice.routes,
            created_at: chrono::Utc::now().timestamp(),
        };
        self.store.insert_payment_request(&entry)?;

        metrics::INVOICES_ISSUED.inc();
        tracing::info!(
            note_id = %entry.note_id,
            payment_hash = %entry.payment_hash,
            price = note.price,
            "issued invoice"
        );
        Ok(entry)
    }

    /// Release the note if `payment_hash` paid for it.
    pub async fn check_and_release(
        &self,
        note_id: &str,
        payment_hash: &str,
    ) -> Result<Release, GateError> {
        let note = self.load_note(note_id)?;
        let request = self
            .store
            .payment_request(payment_hash)?
            .ok_or_else(|| GateError::NotFound(payment_hash.to_string()))?;

        // Must hold before the provider is asked anything: a hash paid
        // against a cheaper note must not open this one.
        if request.note_id != note.note_id {
            metrics::CROSS_REFERENCE_REJECTIONS.inc();
            tracing::warn!(
                note_id = %note_id,
                payment_hash = %payment_hash,
                issued_for = %request.note_id,
                "payment hash presented for the wrong note"
            );
            return Err(GateError::CrossReference {
                note_id: note_id.to_string(),
                payment_hash: payment_hash.to_string(),
            });
        }

        if request.is_paid() {
            return Ok(Release::Paid(note));
        }

        let settled = self
            .provider
            .check_settled(&request.verify_token)
            .await
            .inspect_err(|_| metrics::PROVIDER_ERRORS.inc())?;

        if !settled {
            metrics::PENDING_CHECKS.inc();
            return Ok(Release::Pending(request));
        }

        if self.store.mark_paid(payment_hash)? {
            metrics::RELEASES.inc();
            tracing::info!(note_id = %note_id, payment_hash = %payment_hash, "payment settled");
        } else {
            tracing::debug!(payment_hash = %payment_hash, "settlement already recorded");
        }

        Ok(Release::Paid(note))
    }

    /// Validate and register a publisher's gated note.
    pub async fn publish(&self, request: &CreateNoteRequest) -> Result<NoteEntry, GateError> {
        let valid = match validate_publication(request, &self.endpoint, &self.provider).await {
            Ok(valid) => valid,
            Err(e) => {
                metrics::PUBLICATIONS.with_label_values(&["rejected"]).inc();
                tracing::info!(
                    note_id = %request.gated_event.id,
                    reason = %e,
                    "rejected publication"
                );
                return Err(e);
            }
        };

        let entry = NoteEntry {
            note_id: request.gated_event.id.clone(),
            lud16: valid.payee.to_string(),
            price: valid.price,
            secret: request.secret.clone(),
            created_at: chrono::Utc::now().timestamp(),
        };
        self.store.insert_note(&entry).inspect_err(|e| {
            if matches!(e, StoreError::Duplicate(_)) {
                metrics::PUBLICATIONS.with_label_values(&["conflict"]).inc();
            }
        })?;

        metrics::PUBLICATIONS.with_label_values(&["accepted"]).inc();
        tracing::info!(
            note_id = %entry.note_id,
            lud16 = %entry.lud16,
            price = entry.price,
            inner_kind = valid.inner.kind,
            "registered gated note"
        );
        Ok(entry)
    }
}
