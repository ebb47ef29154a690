use axum::{
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use garagebook_observability::{RequestId, request_span};

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Runs the rest of the stack inside a per-request span and echoes the request id.
pub async fn request_id_middleware(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let request_id = RequestId::from_header(
        req.headers()
            .get(&REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok()),
    );
    let span = request_span(request_id, req.method().as_str(), req.uri().path());
    req.extensions_mut().insert(request_id);

    let mut response = next.run(req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
