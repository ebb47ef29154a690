use std::str::FromStr;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use garagebook_core::DomainError;
use garagebook_infra::{ErrorKind, WorkshopError};

pub fn workshop_error_to_response(err: WorkshopError) -> axum::response::Response {
    let (status, code) = match err.kind() {
        ErrorKind::Validation => (StatusCode::BAD_REQUEST, "validation_error"),
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        ErrorKind::Conflict => (StatusCode::CONFLICT, "conflict"),
        ErrorKind::Transaction => (StatusCode::INTERNAL_SERVER_ERROR, "transaction_error"),
    };
    json_error(status, code, err.message())
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    workshop_error_to_response(WorkshopError::from(err))
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parses a path id, answering `400 invalid_id` when it is not a positive integer.
pub fn parse_id<T>(raw: &str, what: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id"),
        )
    })
}
