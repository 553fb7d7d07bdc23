#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gated_notes::{
    codec, CreateNoteRequest, CreateNoteResponse, Event, GatingError, PrEntry, Signer,
    UnsignedEvent,
};
use gated_notes_client::{
    Capability, CapabilityError, Draft, GateApi, ReleaseOutcome, WorkflowError,
};
use gated_notes_gate::{
    GateError, GateStore, InMemoryGateStore, MockPaymentProvider, PaymentGate, Release,
};

pub const ENDPOINT: &str = "https://gate.example.com";

/// Wallet backed by the mock provider. Shared encryption derives a key
/// from both public keys, which is enough to exercise the key-note flow.
pub struct TestWallet {
    pubkey: String,
    provider: MockPaymentProvider,
    refuse: AtomicBool,
    hold: AtomicBool,
}

impl TestWallet {
    pub fn new(tag: &str, provider: &MockPaymentProvider) -> Self {
        Self {
            pubkey: tag.repeat(32),
            provider: provider.clone(),
            refuse: AtomicBool::new(false),
            hold: AtomicBool::new(false),
        }
    }

    /// Fail every payment.
    pub fn refuse_payments(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }

    /// Report payments as sent without settling them.
    pub fn hold_payments(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    fn shared_key(&self, peer: &str) -> codec::Key {
        let (a, b) = if self.pubkey.as_str() <= peer {
            (self.pubkey.as_str(), peer)
        } else {
            (peer, self.pubkey.as_str())
        };
        codec::derive_key(&format!("{a}:{b}"))
    }

    pub fn note(&self, text: &str) -> Event {
        self.sign(UnsignedEvent::new(self.public_key(), 1, vec![], text))
            .unwrap()
    }
}

impl Signer for TestWallet {
    fn public_key(&self) -> String {
        self.pubkey.clone()
    }

    fn sign(&self, event: UnsignedEvent) -> Result<Event, GatingError> {
        Ok(event.finish("00".repeat(64)))
    }
}

impl Capability for TestWallet {
    async fn pay(&self, invoice: &str) -> Result<(), CapabilityError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(CapabilityError::PaymentRejected("insufficient balance".into()));
        }
        if self.hold.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.provider.pay(invoice) {
            Ok(())
        } else {
            Err(CapabilityError::PaymentRejected(format!("unknown invoice {invoice}")))
        }
    }

    fn encrypt_shared(
        &self,
        peer_pubkey: &str,
        plaintext: &str,
    ) -> Result<String, CapabilityError> {
        let sealed = codec::encrypt(plaintext, &self.shared_key(peer_pubkey));
        Ok(format!("{}?iv={}", sealed.content, sealed.iv))
    }

    fn decrypt_shared(
        &self,
        peer_pubkey: &str,
        ciphertext: &str,
    ) -> Result<String, CapabilityError> {
        let (content, iv) = ciphertext
            .split_once("?iv=")
            .ok_or_else(|| CapabilityError::SharedCrypto("missing iv".into()))?;
        codec::decrypt(iv, content, &self.shared_key(peer_pubkey))
            .map_err(|e| CapabilityError::SharedCrypto(e.to_string()))
    }
}

/// [`GateApi`] that calls a [`PaymentGate`] in process and maps its errors
/// the way the HTTP routes do.
#[derive(Clone)]
pub struct InProcessGate {
    pub gate: Arc<PaymentGate<MockPaymentProvider>>,
}

impl InProcessGate {
    fn reachable(&self, endpoint: &str) -> Result<(), WorkflowError> {
        if endpoint.trim_end_matches('/') != self.gate.endpoint() {
            return Err(WorkflowError::Transport(format!("no gate at {endpoint}")));
        }
        Ok(())
    }
}

fn gate_error(e: GateError) -> WorkflowError {
    let (status, code) = match &e {
        GateError::Validation(_) => (400, "validation_failed"),
        GateError::MalformedEvent(_) => (400, "malformed_event"),
        GateError::NotFound(_) => (404, "not_found"),
        GateError::CrossReference { .. } => (409, "cross_reference"),
        GateError::Conflict(_) => (409, "already_registered"),
        GateError::Provider(_) => (502, "provider_error"),
        _ => (500, "internal_error"),
    };
    WorkflowError::Gate {
        status,
        code: code.to_string(),
        message: e.to_string(),
    }
}

impl GateApi for InProcessGate {
    async fn request_invoice(
        &self,
        endpoint: &str,
        note_id: &str,
    ) -> Result<PrEntry, WorkflowError> {
        self.reachable(endpoint)?;
        self.gate.request_invoice(note_id).await.map_err(gate_error)
    }

    async fn fetch_release(
        &self,
        endpoint: &str,
        note_id: &str,
        payment_hash: &str,
    ) -> Result<ReleaseOutcome, WorkflowError> {
        self.reachable(endpoint)?;
        match self
            .gate
            .check_and_release(note_id, payment_hash)
            .await
            .map_err(gate_error)?
        {
            Release::Paid(entry) => Ok(ReleaseOutcome::Released(entry)),
            Release::Pending(request) => Ok(ReleaseOutcome::Pending(request)),
        }
    }

    async fn publish(
        &self,
        endpoint: &str,
        request: &CreateNoteRequest,
    ) -> Result<CreateNoteResponse, WorkflowError> {
        self.reachable(endpoint)?;
        let entry = self.gate.publish(request).await.map_err(gate_error)?;
        Ok(CreateNoteResponse {
            note_id: entry.note_id,
            price: entry.price,
            lud16: entry.lud16,
        })
    }
}

pub struct World {
    pub provider: MockPaymentProvider,
    pub store: Arc<dyn GateStore>,
    pub gate: InProcessGate,
}

pub fn world() -> World {
    let provider = MockPaymentProvider::new();
    let store: Arc<dyn GateStore> = Arc::new(InMemoryGateStore::new());
    let gate = PaymentGate::new(
        Arc::clone(&store),
        provider.clone(),
        ENDPOINT,
        "Unlock gated note",
    );
    World {
        provider,
        store,
        gate: InProcessGate {
            gate: Arc::new(gate),
        },
    }
}

pub fn draft(publisher: &TestWallet, secret: &str, cost: u64, text: &str) -> Draft {
    Draft {
        endpoint: ENDPOINT.to_string(),
        lud16: "pay@example.com".to_string(),
        secret: secret.to_string(),
        cost,
        teaser: format!("Preview: {}", &text[..text.len().min(8)]),
        inner: publisher.note(text),
    }
}
