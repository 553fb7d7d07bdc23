use actix_web::{HttpResponse, ResponseError};
use gated_notes::{ErrorBody, GatingError};
use std::fmt;

use crate::provider::ProviderError;
use crate::store::StoreError;

#[derive(Debug)]
pub enum GateError {
    /// Request failed a publication or input check
    Validation(String),
    /// Event is missing a tag or cannot be parsed
    MalformedEvent(String),
    /// Unknown note id or payment hash
    NotFound(String),
    /// Payment hash was issued for a different note
    CrossReference { note_id: String, payment_hash: String },
    /// Note id already registered
    Conflict(String),
    /// Payment backend failure
    Provider(ProviderError),
    /// Store failure
    Database(StoreError),
    /// Internal error
    Internal(String),
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::Validation(msg) => write!(f, "validation failed: {}", msg),
            GateError::MalformedEvent(msg) => write!(f, "malformed event: {}", msg),
            GateError::NotFound(what) => write!(f, "not found: {}", what),
            GateError::CrossReference {
                note_id,
                payment_hash,
            } => write!(
                f,
                "payment hash {} is not associated with note {}",
                payment_hash, note_id
            ),
            GateError::Conflict(id) => write!(f, "note already registered: {}", id),
            GateError::Provider(e) => write!(f, "{}", e),
            GateError::Database(e) => write!(f, "{}", e),
            GateError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for GateError {}

impl From<StoreError> for GateError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => GateError::NotFound(what),
            StoreError::Duplicate(id) => GateError::Conflict(id),
            other => GateError::Database(other),
        }
    }
}

impl From<ProviderError> for GateError {
    fn from(e: ProviderError) -> Self {
        GateError::Provider(e)
    }
}

impl From<GatingError> for GateError {
    fn from(e: GatingError) -> Self {
        match e {
            GatingError::Validation(msg) => GateError::Validation(msg),
            GatingError::Decryption(msg) => {
                GateError::Validation(format!("secret does not decrypt the note: {msg}"))
            }
            GatingError::MalformedEvent(msg) => GateError::MalformedEvent(msg),
            other => GateError::Internal(other.to_string()),
        }
    }
}

fn body(error: &str, message: impl Into<String>) -> ErrorBody {
    ErrorBody {
        error: error.to_string(),
        message: message.into(),
    }
}

impl ResponseError for GateError {
    fn error_response(&self) -> HttpResponse {
        match self {
            GateError::Validation(msg) => {
                HttpResponse::BadRequest().json(body("validation_failed", msg.as_str()))
            }
            GateError::MalformedEvent(msg) => {
                HttpResponse::BadRequest().json(body("malformed_event", msg.as_str()))
            }
            GateError::NotFound(what) => {
                HttpResponse::NotFound().json(body("not_found", format!("'{}' not found", what)))
            }
            GateError::CrossReference { .. } => {
                HttpResponse::Conflict().json(body("cross_reference", self.to_string()))
            }
            GateError::Conflict(id) => HttpResponse::Conflict().json(body(
                "already_registered",
                format!("Note '{}' is already registered", id),
            )),
            GateError::Provider(e) => {
                tracing::error!(error = %e, "payment provider failure");
                HttpResponse::BadGateway().json(body(
                    "provider_error",
                    "Payment provider request failed",
                ))
            }
            GateError::Database(e) => {
                tracing::error!(error = %e, "store failure");
                HttpResponse::InternalServerError()
                    .json(body("internal_error", "An internal error occurred"))
            }
            GateError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                HttpResponse::InternalServerError()
                    .json(body("internal_error", "An internal error occurred"))
            }
        }
    }
}
