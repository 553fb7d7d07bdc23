use crate::error::GatingError;
use crate::event::{Event, UnsignedEvent};

/// Signing capability of a principal.
///
/// Implementations hold (or broker access to) the author's private key and
/// are passed explicitly to every operation that emits an event.
pub trait Signer: Send + Sync {
    /// Hex public key events are authored under.
    fn public_key(&self) -> String;

    /// Derive the id and sign. Must not alter any other field.
    fn sign(&self, event: UnsignedEvent) -> Result<Event, GatingError>;
}

impl<S: Signer + ?Sized> Signer for &S {
    fn public_key(&self) -> String {
        (**self).public_key()
    }

    fn sign(&self, event: UnsignedEvent) -> Result<Event, GatingError> {
        (**self).sign(event)
    }
}

impl<S: Signer + ?Sized> Signer for std::sync::Arc<S> {
    fn public_key(&self) -> String {
        (**self).public_key()
    }

    fn sign(&self, event: UnsignedEvent) -> Result<Event, GatingError> {
        (**self).sign(event)
    }
}
