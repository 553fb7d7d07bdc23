pub mod create;
pub mod health;
pub mod notes;

use actix_web::web;

use crate::provider::PaymentProvider;

/// Register every gate route. `/health`, `/metrics` and `/create` come
/// before the `/{note_id}` catch-all.
pub fn configure<P: PaymentProvider + 'static>(cfg: &mut web::ServiceConfig) {
    health::configure::<P>(cfg);
    create::configure::<P>(cfg);
    notes::configure::<P>(cfg);
}
