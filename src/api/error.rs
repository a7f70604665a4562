use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::errors::CertKeeperError;

/// Error returned by the HTTP handlers
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// A lifecycle failure, mapped through `CertKeeperError::status_code`
    Lifecycle(CertKeeperError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        ApiError::BadRequest(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Lifecycle(err) => StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = match self {
            ApiError::BadRequest(message) => ErrorBody { error: "bad_request", message },
            ApiError::Lifecycle(err) => {
                if status.is_server_error() {
                    tracing::error!(error = %err, kind = err.kind(), "Request failed");
                }
                ErrorBody { error: err.kind(), message: err.to_string() }
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<CertKeeperError> for ApiError {
    fn from(err: CertKeeperError) -> Self {
        ApiError::Lifecycle(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_follows_error_kind() {
        assert_eq!(
            ApiError::from(CertKeeperError::not_found("example.com")).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(CertKeeperError::already_exists("example.com")).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(CertKeeperError::issuance("example.com", "rejected")).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(ApiError::bad_request("nope").status_code(), StatusCode::BAD_REQUEST);
    }
}
