use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Failures surfaced by the catalog, ledger, recommendation and session layers.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotAuthenticated(String),

    #[error("Catalog unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Could not save changes: {0}")]
    PersistenceFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Purchases can only be cancelled within 24 hours")]
    WindowExpired,

    #[error("{0}")]
    ValidationFailed(String),

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("No interactions recorded yet")]
    NoHistory,

    #[error("Selection changed while loading")]
    Superseded,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn upstream(err: anyhow::Error) -> Self {
        AppError::UpstreamUnavailable(format!("{:#}", err))
    }

    pub fn persistence(err: anyhow::Error) -> Self {
        AppError::PersistenceFailed(format!("{:#}", err))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotAuthenticated(_) | AppError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AppError::UpstreamUnavailable(_) | AppError::PersistenceFailed(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::NotFound(_) | AppError::NoHistory => StatusCode::NOT_FOUND,
            AppError::WindowExpired | AppError::Superseded => StatusCode::CONFLICT,
            AppError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(
            AppError::NotAuthenticated("login".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::WindowExpired.status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::ValidationFailed("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::upstream(anyhow::anyhow!("timeout")).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn upstream_keeps_error_chain() {
        let err = anyhow::anyhow!("connection reset").context("GET /movie/1 failed");
        let msg = AppError::upstream(err).to_string();
        assert!(msg.contains("GET /movie/1 failed"));
        assert!(msg.contains("connection reset"));
    }
}
