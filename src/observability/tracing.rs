//! Spans for outbound calls.
//!
//! One `outbound_request` span covers every attempt of a logical call. Fields
//! that are only known at the end are declared empty and filled in on close.

use http::{Method, StatusCode, Uri};
use tracing::{field, Span};

/// Open the span for one logical call.
pub fn outbound_span(method: &Method, uri: &Uri, peer_service: &str) -> Span {
    tracing::info_span!(
        "outbound_request",
        http.method = %method,
        url.full = %uri,
        peer.service = %peer_service,
        http.status_code = field::Empty,
        attempts = field::Empty,
        otel.status_code = field::Empty,
        error = field::Empty,
    )
}

/// Mark the span successful with the response status.
pub fn record_response(span: &Span, status: StatusCode, attempts: u32) {
    span.record("http.status_code", status.as_u16());
    span.record("attempts", attempts);
    span.record("otel.status_code", "OK");
}

/// Mark the span errored.
pub fn record_error(span: &Span, error: &dyn std::error::Error, attempts: u32) {
    span.record("attempts", attempts);
    span.record("otel.status_code", "ERROR");
    span.record("error", field::display(error));
}

/// Mark the span errored for a call whose future was dropped before it finished.
pub fn record_dropped(span: &Span, attempts: u32) {
    span.record("attempts", attempts);
    span.record("otel.status_code", "ERROR");
    span.record("error", "call dropped before completion");
}
