use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use defter_core::DomainError;

/// Map a domain error onto the HTTP taxonomy: validation and business-rule
/// failures are 400, missing/out-of-tenant entities are 404, authorization
/// failures are 403, duplicate unique keys / stale revisions are 409.
pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "business_rule", msg)
        }
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::Unauthorized => json_error(StatusCode::FORBIDDEN, "forbidden", "forbidden"),
    }
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
