use thiserror::Error;

/// Errors returned by gating protocol operations.
#[derive(Debug, Error)]
pub enum GatingError {
    #[error("validation error: {0}")]
    Validation(String),

    /// The key/iv pair does not open the ciphertext. There is no
    /// authentication tag, so garbled output is the only signal.
    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
