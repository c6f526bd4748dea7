use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::sync::Arc;

use crate::logic::{IngestError, IngestionPipeline, StructuralValidator};
use crate::model::{RunSuccessResponse, ValidationErrorResponse};
use crate::store::traits::RunStore;

pub type AppState<S, V> = Arc<IngestionPipeline<S, V>>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Submit a batch of samples as a new run on an instrument.
pub async fn submit_samples<S: RunStore + 'static, V: StructuralValidator + 'static>(
    State(pipeline): State<AppState<S, V>>,
    Path(instrument_id): Path<String>,
    body: Bytes,
) -> Result<Json<RunSuccessResponse>, IngestError> {
    let run_id = pipeline.ingest(&instrument_id, &body).await?;
    Ok(Json(RunSuccessResponse { run_id }))
}

impl IngestError {
    pub fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Client errors become a JSON list of reasons; server errors a plain-text detail.
impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self.reasons() {
            Some(errors) => (status, Json(ValidationErrorResponse::new(errors))).into_response(),
            None => (status, self.to_string()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            IngestError::InvalidInstrumentId.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            IngestError::Validation(vec!["bad".to_string()]).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            IngestError::Store(anyhow::anyhow!("disk full")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_server_error_is_plain_text() {
        let response = IngestError::Store(anyhow::anyhow!("disk full")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let content_type = response.headers()["content-type"].to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));
    }

    #[test]
    fn test_client_error_is_json() {
        let response = IngestError::Validation(vec!["bad".to_string()]).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["content-type"], "application/json");
    }
}
