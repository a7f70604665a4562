//! Certificate endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::error::ApiError;
use super::routes::ApiState;
use crate::domain::CertificatePair;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RequestCertificateBody {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestCertificateResponse {
    pub result: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn request_certificate_handler(
    State(state): State<ApiState>,
    Path(domain): Path<String>,
    Json(body): Json<RequestCertificateBody>,
) -> Result<(StatusCode, Json<RequestCertificateResponse>), ApiError> {
    body.validate().map_err(|e| ApiError::bad_request(e.to_string()))?;

    state.manager.request_certificate(&domain, &body.email).await?;

    Ok((
        StatusCode::CREATED,
        Json(RequestCertificateResponse {
            result: format!("Certificates for domain {} successfully generated", domain),
        }),
    ))
}

pub async fn get_certificate_handler(
    State(state): State<ApiState>,
    Path(domain): Path<String>,
) -> Result<Json<CertificatePair>, ApiError> {
    let pair = state.manager.get_certificate(&domain).await?;
    Ok(Json(pair))
}

pub async fn delete_certificate_handler(
    State(state): State<ApiState>,
    Path(domain): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.manager.delete_certificate(&domain).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", version: crate::VERSION })
}
