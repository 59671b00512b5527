use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

// --- Storage / Collaborator Errors ---

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("State file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode state file: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("State store lock poisoned")]
    Poisoned,
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Request to {service} failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} responded with status {status}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("{service} rejected the request: {reason}")]
    Rejected {
        service: &'static str,
        reason: String,
    },

    #[error("No API key configured for {0}")]
    MissingApiKey(&'static str),
}

// --- Web Layer Error ---

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Missing form field: {0}")]
    MissingFormField(String),
    #[error("Error processing multipart form data: {0}")]
    MultipartError(#[from] axum::extract::multipart::MultipartError),

    #[error("Meme not found with ID: {0}")]
    MemeNotFound(String),
    #[error("External service failed")]
    ServiceError(#[source] ServiceError),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        AppError::ServiceError(err)
    }
}

// --- Axum Response Implementation ---

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            // 4xx Client Errors
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::MissingFormField(field) => (StatusCode::BAD_REQUEST, format!("Missing form field: {}", field)),
            AppError::MultipartError(e) => (StatusCode::BAD_REQUEST, format!("Invalid multipart form data: {}", e)),
            AppError::MemeNotFound(id) => (StatusCode::NOT_FOUND, format!("Meme not found with ID: {}", id)),

            // 5xx Upstream Errors
            AppError::ServiceError(ServiceError::Rejected { service, reason }) => {
                (StatusCode::BAD_GATEWAY, format!("{} request failed: {}", service, reason))
            }
            AppError::ServiceError(e) => {
                tracing::error!(error.source = ?e, "External service error occurred");
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
        };

        tracing::warn!(error.message = %error_message, error.detail = %self, "Responding with error");

        let body = Json(serde_json::json!({ "error": error_message }));
        (status, body).into_response()
    }
}
