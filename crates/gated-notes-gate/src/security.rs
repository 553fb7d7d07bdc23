//! Bearer-token checks for operator endpoints.

use actix_web::{http::header, HttpRequest};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Whether `req` carries `Authorization: Bearer <expected>`.
pub fn bearer_matches(req: &HttpRequest, expected: &str) -> bool {
    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(token) => constant_time_eq(token.as_bytes(), expected.as_bytes()),
        None => false,
    }
}

/// Digest equality through `subtle`; unequal lengths compare like any
/// other mismatch.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    Sha256::digest(a).ct_eq(&Sha256::digest(b)).into()
}
