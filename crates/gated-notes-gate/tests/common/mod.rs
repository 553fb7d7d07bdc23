#![allow(dead_code)]

use std::sync::Arc;

use gated_notes::{note, CreateNoteRequest, Event, GatingError, NoteEntry, Signer, UnsignedEvent};
use gated_notes_gate::{GateStore, InMemoryGateStore, MockPaymentProvider, PaymentGate};

pub const ENDPOINT: &str = "https://gate.example.com";

pub struct TestSigner;

impl Signer for TestSigner {
    fn public_key(&self) -> String {
        "a1".repeat(32)
    }

    fn sign(&self, event: UnsignedEvent) -> Result<Event, GatingError> {
        Ok(event.finish("00".repeat(64)))
    }
}

pub fn inner(text: &str) -> Event {
    TestSigner
        .sign(UnsignedEvent::new(TestSigner.public_key(), 1, vec![], text))
        .unwrap()
}

pub fn publication(secret: &str, cost: u64, endpoint: &str) -> CreateNoteRequest {
    let gated = note::create_gated_note(&TestSigner, secret, cost, endpoint, &inner("paid words"))
        .unwrap();
    CreateNoteRequest {
        gated_event: gated,
        lud16: "pay@example.com".to_string(),
        secret: secret.to_string(),
        cost: i64::try_from(cost).unwrap(),
    }
}

pub fn note_entry(note_id: &str, price: u64, secret: &str) -> NoteEntry {
    NoteEntry {
        note_id: note_id.to_string(),
        lud16: "pay@example.com".to_string(),
        price,
        secret: secret.to_string(),
        created_at: 1_700_000_000,
    }
}

pub fn gate() -> (PaymentGate<MockPaymentProvider>, MockPaymentProvider, Arc<dyn GateStore>) {
    let store: Arc<dyn GateStore> = Arc::new(InMemoryGateStore::new());
    let provider = MockPaymentProvider::new();
    let gate = PaymentGate::new(
        Arc::clone(&store),
        provider.clone(),
        ENDPOINT,
        "Unlock gated note",
    );
    (gate, provider, store)
}
