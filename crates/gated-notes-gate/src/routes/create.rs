use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse};
use gated_notes::{CreateNoteRequest, CreateNoteResponse, ErrorBody};

use crate::error::GateError;
use crate::provider::PaymentProvider;
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 256 * 1024;

/// POST /create - Register a gated note after validating it
pub async fn create_note<P: PaymentProvider>(
    body: web::Json<CreateNoteRequest>,
    state: web::Data<AppState<P>>,
) -> Result<HttpResponse, GateError> {
    let entry = state.gate.publish(&body).await?;
    Ok(HttpResponse::Ok().json(CreateNoteResponse {
        note_id: entry.note_id,
        price: entry.price,
        lud16: entry.lud16,
    }))
}

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let message = err.to_string();
    actix_web::error::InternalError::from_response(
        err,
        HttpResponse::BadRequest().json(ErrorBody {
            error: "malformed_request".to_string(),
            message,
        }),
    )
    .into()
}

pub fn configure<P: PaymentProvider + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/create")
            .app_data(
                web::JsonConfig::default()
                    .limit(MAX_BODY_BYTES)
                    .error_handler(json_error),
            )
            .route(web::post().to(create_note::<P>)),
    );
}
