use gated_notes::GatingError;

use crate::capability::CapabilityError;

/// Errors surfaced by the buyer and publisher workflows.
///
/// Each variant names the step that failed; the workflow stops at the
/// first one.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Protocol(#[from] GatingError),

    /// The gate answered with an error body.
    #[error("gate returned {status} ({code}): {message}")]
    Gate {
        status: u16,
        code: String,
        message: String,
    },

    /// The gate could not be reached or sent something unreadable.
    #[error("gate request failed: {0}")]
    Transport(String),

    #[error("wallet error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("event log error: {0}")]
    EventLog(String),

    #[error("event {0} not found on the event log")]
    MissingEvent(String),

    /// Payment not confirmed within the configured polling budget.
    #[error("payment {payment_hash} still pending after {attempts} checks")]
    Pending { payment_hash: String, attempts: u32 },

    /// The gate answered for a different note than the one asked about.
    #[error("gate answered for note {got}, expected {expected}")]
    WrongNote { expected: String, got: String },
}

impl WorkflowError {
    /// HTTP status for gate errors, `None` for everything else.
    pub fn gate_status(&self) -> Option<u16> {
        match self {
            WorkflowError::Gate { status, .. } => Some(*status),
            _ => None,
        }
    }
}
