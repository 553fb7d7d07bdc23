//! JSON bodies exchanged between a gate and its clients.

use serde::{Deserialize, Serialize};

use crate::event::Event;

/// A gated note registered with a gate.
///
/// Returned to the buyer once payment is confirmed, which is how the
/// secret reaches them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEntry {
    pub note_id: String,
    /// Payee Lightning address.
    pub lud16: String,
    /// Millisatoshis.
    pub price: u64,
    pub secret: String,
    /// Unix seconds.
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "UNPAID",
            PaymentStatus::Paid => "PAID",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "UNPAID" => Some(PaymentStatus::Unpaid),
            "PAID" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

/// One invoice attempt against a note.
///
/// Doubles as the `402` body for both invoice issuance and a pending
/// settlement check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrEntry {
    pub payment_hash: String,
    pub note_id: String,
    /// BOLT-11 payment request.
    #[serde(rename = "pr")]
    pub invoice: String,
    /// Provider URL used to check settlement.
    #[serde(rename = "verify")]
    pub verify_token: String,
    /// Status string reported by the provider when minting, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub success_action: serde_json::Value,
    #[serde(default)]
    pub routes: serde_json::Value,
    pub created_at: i64,
}

impl PrEntry {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

/// Body of `POST /create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteRequest {
    #[serde(alias = "kind42")]
    pub gated_event: Event,
    pub lud16: String,
    pub secret: String,
    /// Millisatoshis. Signed so that non-positive values reach validation
    /// instead of failing deserialization.
    pub cost: i64,
}

/// Body returned for an accepted publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteResponse {
    pub note_id: String,
    pub price: u64,
    pub lud16: String,
}

/// JSON error body: `{ "error": <code>, "message": <text> }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pr_entry_uses_provider_field_names() {
        let entry = PrEntry {
            payment_hash: "ab".repeat(32),
            note_id: "n1".into(),
            invoice: "lnbc50n1...".into(),
            verify_token: "https://example.com/verify/1".into(),
            status: None,
            payment_status: PaymentStatus::Unpaid,
            success_action: serde_json::json!({"tag": "url"}),
            routes: serde_json::json!([]),
            created_at: 1_700_000_000,
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["pr"], "lnbc50n1...");
        assert_eq!(value["verify"], "https://example.com/verify/1");
        assert_eq!(value["paymentStatus"], "UNPAID");
        assert_eq!(value["noteId"], "n1");
        assert!(value.get("status").is_none());
    }

    #[test]
    fn test_payment_status_strings() {
        for status in [PaymentStatus::Unpaid, PaymentStatus::Paid] {
            assert_eq!(PaymentStatus::parse(status.as_str()), Some(status));
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::Value::String(status.as_str().into())
            );
        }
        assert_eq!(PaymentStatus::parse("paid"), None);
    }

    #[test]
    fn test_create_request_accepts_kind42_alias() {
        let body = serde_json::json!({
            "kind42": {
                "id": "aa", "pubkey": "bb", "created_at": 1, "kind": 42,
                "tags": [], "content": "cc", "sig": "dd"
            },
            "lud16": "pay@example.com",
            "secret": "s",
            "cost": -3
        });
        let req: CreateNoteRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.gated_event.kind, 42);
        assert_eq!(req.cost, -3);
    }
}
