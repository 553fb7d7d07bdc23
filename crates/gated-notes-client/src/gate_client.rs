//! Client side of the gate's HTTP contract.

use std::future::Future;
use std::time::Duration;

use gated_notes::{CreateNoteRequest, CreateNoteResponse, ErrorBody, NoteEntry, PrEntry};

use crate::error::WorkflowError;

/// Answer from the release endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Paid; carries the secret.
    Released(NoteEntry),
    /// Not settled yet.
    Pending(PrEntry),
}

/// Operations a buyer or publisher performs against a gate.
///
/// `endpoint` is the base URL taken from a gated note's `endpoint` tag,
/// so one client can talk to any number of gates.
pub trait GateApi: Send + Sync {
    /// `GET {endpoint}/{note_id}`
    fn request_invoice(
        &self,
        endpoint: &str,
        note_id: &str,
    ) -> impl Future<Output = Result<PrEntry, WorkflowError>> + Send;

    /// `GET {endpoint}/{note_id}/{payment_hash}`
    fn fetch_release(
        &self,
        endpoint: &str,
        note_id: &str,
        payment_hash: &str,
    ) -> impl Future<Output = Result<ReleaseOutcome, WorkflowError>> + Send;

    /// `POST {endpoint}/create`
    fn publish(
        &self,
        endpoint: &str,
        request: &CreateNoteRequest,
    ) -> impl Future<Output = Result<CreateNoteResponse, WorkflowError>> + Send;
}

/// [`GateApi`] over HTTP.
pub struct HttpGateClient {
    http: reqwest::Client,
}

impl HttpGateClient {
    pub fn new() -> Result<Self, WorkflowError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WorkflowError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Use an existing client. It should not follow redirects.
    pub fn with_http_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

fn url(endpoint: &str, segments: &[&str]) -> String {
    let mut url = endpoint.trim_end_matches('/').to_string();
    for segment in segments {
        url.push('/');
        url.push_str(segment);
    }
    url
}

async fn send(req: reqwest::RequestBuilder) -> Result<reqwest::Response, WorkflowError> {
    req.send()
        .await
        .map_err(|e| WorkflowError::Transport(format!("request failed: {e}")))
}

async fn json<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, WorkflowError> {
    resp.json::<T>()
        .await
        .map_err(|e| WorkflowError::Transport(format!("failed to parse gate response: {e}")))
}

/// Turn a non-success answer into [`WorkflowError::Gate`].
async fn gate_error(resp: reqwest::Response) -> WorkflowError {
    let status = resp.status().as_u16();
    match resp.json::<ErrorBody>().await {
        Ok(body) => WorkflowError::Gate {
            status,
            code: body.error,
            message: body.message,
        },
        Err(_) => WorkflowError::Gate {
            status,
            code: "unknown".to_string(),
            message: "gate sent no error body".to_string(),
        },
    }
}

impl GateApi for HttpGateClient {
    async fn request_invoice(
        &self,
        endpoint: &str,
        note_id: &str,
    ) -> Result<PrEntry, WorkflowError> {
        let resp = send(self.http.get(url(endpoint, &[note_id]))).await?;
        if resp.status().as_u16() != 402 {
            return Err(gate_error(resp).await);
        }
        json(resp).await
    }

    async fn fetch_release(
        &self,
        endpoint: &str,
        note_id: &str,
        payment_hash: &str,
    ) -> Result<ReleaseOutcome, WorkflowError> {
        let resp = send(self.http.get(url(endpoint, &[note_id, payment_hash]))).await?;
        match resp.status().as_u16() {
            200 => Ok(ReleaseOutcome::Released(json(resp).await?)),
            402 => Ok(ReleaseOutcome::Pending(json(resp).await?)),
            _ => Err(gate_error(resp).await),
        }
    }

    async fn publish(
        &self,
        endpoint: &str,
        request: &CreateNoteRequest,
    ) -> Result<CreateNoteResponse, WorkflowError> {
        let resp = send(self.http.post(url(endpoint, &["create"])).json(request)).await?;
        if !resp.status().is_success() {
            return Err(gate_error(resp).await);
        }
        json(resp).await
    }
}
