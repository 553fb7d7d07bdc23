use actix_web::{web, HttpResponse};

use crate::error::GateError;
use crate::gate::Release;
use crate::provider::PaymentProvider;
use crate::state::AppState;

/// GET /{note_id} - Issue an invoice (402 + payment request)
pub async fn request_invoice<P: PaymentProvider>(
    path: web::Path<String>,
    state: web::Data<AppState<P>>,
) -> Result<HttpResponse, GateError> {
    let note_id = path.into_inner();
    let entry = state.gate.request_invoice(&note_id).await?;
    Ok(HttpResponse::PaymentRequired().json(entry))
}

/// GET /{note_id}/{payment_hash} - Release the note once paid
pub async fn check_and_release<P: PaymentProvider>(
    path: web::Path<(String, String)>,
    state: web::Data<AppState<P>>,
) -> Result<HttpResponse, GateError> {
    let (note_id, payment_hash) = path.into_inner();
    match state.gate.check_and_release(&note_id, &payment_hash).await? {
        Release::Paid(note) => Ok(HttpResponse::Ok().json(note)),
        Release::Pending(request) => Ok(HttpResponse::PaymentRequired().json(request)),
    }
}

pub fn configure<P: PaymentProvider + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/{note_id}", web::get().to(request_invoice::<P>))
        .route(
            "/{note_id}/{payment_hash}",
            web::get().to(check_and_release::<P>),
        );
}
