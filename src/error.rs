use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::error;

/// Error taxonomy shared by all four services.
///
/// Ownership failures are reported as `NotFound` on purpose: a caller must not
/// be able to distinguish "row exists but is not yours" from "row absent".
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{1}")]
    Upstream(StatusCode, String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

fn in_production() -> bool {
    std::env::var("APP_ENV").map(|v| v == "production").unwrap_or(false)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error, details) = match self {
            // Duplicate email and friends come back as plain 400s, matching
            // the validation failures they usually accompany.
            ApiError::Validation(msg) | ApiError::Conflict(msg) => {
                (StatusCode::BAD_REQUEST, msg, None)
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::Upstream(status, msg) => (status, msg, None),
            ApiError::Internal(err) => {
                error!(error = %err, "internal error");
                let details = (!in_production()).then(|| format!("{err:#}"));
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    details,
                )
            }
        };
        (status, Json(ErrorBody { error, details })).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some("23505") => ApiError::Conflict("Resource already exists".to_string()),
                Some("23503") => ApiError::Validation("Referenced resource not found".to_string()),
                Some("23514") => ApiError::Validation("Invalid input".to_string()),
                Some("22P02") => ApiError::Validation("Invalid input format".to_string()),
                _ => ApiError::Internal(err.into()),
            },
            _ => ApiError::Internal(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        let res = ApiError::Validation("bad".into()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn conflict_maps_to_400() {
        let res = ApiError::Conflict("Email already registered".into()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unauthorized_maps_to_401() {
        let res = ApiError::Unauthorized("no".into()).into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn not_found_maps_to_404() {
        let res = ApiError::NotFound("x".into()).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn upstream_status_passes_through() {
        let res = ApiError::Upstream(StatusCode::BAD_GATEWAY, "down".into()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn row_not_found_maps_to_404() {
        let res = ApiError::from(sqlx::Error::RowNotFound).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_hides_message() {
        let res = ApiError::Internal(anyhow::anyhow!("secret detail")).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
