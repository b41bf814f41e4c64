//! HTTP handlers: Telegram webhook and token-gated reports.

pub mod reports;
pub mod webhook;

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

/// Constant-time comparison of a configured secret with a request header.
pub(crate) fn secret_matches(expected: &str, candidate: Option<&str>) -> bool {
    match candidate {
        Some(candidate) => bool::from(candidate.as_bytes().ct_eq(expected.as_bytes())),
        None => false,
    }
}

pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
