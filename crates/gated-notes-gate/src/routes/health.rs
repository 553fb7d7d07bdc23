use actix_web::{web, HttpRequest, HttpResponse};
use gated_notes::{ErrorBody, PROTOCOL_VERSION};
use prometheus::TextEncoder;

use crate::metrics::REGISTRY;
use crate::provider::PaymentProvider;
use crate::security::bearer_matches;
use crate::state::AppState;

/// GET /health - Health check endpoint
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "gated-notes-gate",
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": PROTOCOL_VERSION,
    }))
}

/// GET /metrics - Prometheus text format, behind `METRICS_TOKEN` when set
pub async fn metrics<P: PaymentProvider>(
    req: HttpRequest,
    state: web::Data<AppState<P>>,
) -> HttpResponse {
    let locked_out = state
        .config
        .metrics_token
        .as_deref()
        .is_some_and(|token| !bearer_matches(&req, token));
    if locked_out {
        return HttpResponse::Unauthorized().json(ErrorBody {
            error: "unauthorized".to_string(),
            message: "bearer token required for /metrics".to_string(),
        });
    }

    let mut exposition = String::new();
    match TextEncoder::new().encode_utf8(&REGISTRY.gather(), &mut exposition) {
        Ok(()) => HttpResponse::Ok()
            .content_type(prometheus::TEXT_FORMAT)
            .body(exposition),
        Err(e) => {
            tracing::error!(error = %e, "metrics encoding failed");
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub fn configure<P: PaymentProvider + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics::<P>));
}
