//! Wallet and identity capability injected into the workflows.

use std::future::Future;

use gated_notes::Signer;

#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// The wallet refused or failed to pay.
    #[error("payment rejected: {0}")]
    PaymentRejected(String),

    /// Shared-secret encryption or decryption failed.
    #[error("shared encryption failed: {0}")]
    SharedCrypto(String),
}

/// Signing, paying and peer encryption on behalf of one principal.
///
/// Every workflow receives this explicitly; nothing reaches for an
/// ambient wallet.
pub trait Capability: Signer {
    /// Pay a BOLT-11 payment request. Returns once the wallet reports the
    /// payment as sent.
    fn pay(&self, invoice: &str) -> impl Future<Output = Result<(), CapabilityError>> + Send;

    /// Encrypt `plaintext` with the secret shared between this principal
    /// and `peer_pubkey`.
    fn encrypt_shared(&self, peer_pubkey: &str, plaintext: &str)
        -> Result<String, CapabilityError>;

    /// Inverse of [`Capability::encrypt_shared`].
    fn decrypt_shared(
        &self,
        peer_pubkey: &str,
        ciphertext: &str,
    ) -> Result<String, CapabilityError>;
}
