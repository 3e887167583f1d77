use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde_json::json;
use thiserror::Error;

/// The single error taxonomy shared by repositories, services, the Hub, and
/// both externally-facing transports (HTTP status codes and WebSocket Error
/// frames). Repositories translate storage-layer failures into one of these
/// kinds; services never unwrap or re-wrap a raw `sqlx::Error` past that
/// boundary (see `From<sqlx::Error>` below).
#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error")]
    Internal,
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Duplicate(_) => StatusCode::CONFLICT,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The string code carried on a WebSocket Error frame (§6). Distinct from
    /// the protocol-parse codes in `session::protocol` (`invalid_format`,
    /// `unknown_message_type`), which never reach a domain error at all.
    pub fn wire_code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid_data",
            AppError::NotFound(_) => "not_found",
            AppError::Forbidden(_) => "unauthorized",
            AppError::Duplicate(_) => "duplicate",
            AppError::RateLimited(_) => "rate_limited",
            AppError::Conflict(_) => "conflict",
            AppError::Unavailable(_) => "unavailable",
            AppError::Internal => "internal",
        }
    }
}

/// Map sqlx errors onto `AppError`, special-casing unique-constraint
/// violations (PG code 23505) so they surface as `Duplicate` rather than
/// `Internal`.
impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.code().as_deref() == Some("23505") {
                let message = match db_err.constraint() {
                    Some(c) => format!("{c} already exists"),
                    None => "resource already exists".to_string(),
                };
                return AppError::Duplicate(message);
            }
        }
        if matches!(e, sqlx::Error::RowNotFound) {
            return AppError::NotFound("row not found".into());
        }
        tracing::error!(error = ?e, "database error");
        AppError::Unavailable("database error".into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if matches!(self, AppError::Internal | AppError::Unavailable(_)) {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            AppError::InvalidInput("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Duplicate("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::RateLimited("x".into()).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::Unavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(AppError::Internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn wire_codes_are_stable_strings() {
        assert_eq!(AppError::Forbidden("x".into()).wire_code(), "unauthorized");
        assert_eq!(AppError::RateLimited("x".into()).wire_code(), "rate_limited");
        assert_eq!(AppError::InvalidInput("x".into()).wire_code(), "invalid_data");
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let e: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(e, AppError::NotFound(_)));
    }
}
