use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::db::executor::DbError;
use crate::llm::LlmError;

/// Errors a user action can end in. All of them are shown inline; none ends the session.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Incorrect password")]
    AuthenticationFailure,
    #[error("Please log in first")]
    NotLoggedIn,
    #[error("Please enter a question")]
    EmptyQuestion,
    #[error("There is no SQL to run")]
    EmptySql,
    #[error("No history entry at position {0}")]
    HistoryEntryNotFound(usize),
    #[error("Failed to generate SQL: {0}")]
    Generation(#[from] LlmError),
    #[error("Error executing query: {0}")]
    Execution(#[from] DbError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthenticationFailure | AppError::NotLoggedIn => StatusCode::UNAUTHORIZED,
            AppError::EmptyQuestion | AppError::EmptySql => StatusCode::BAD_REQUEST,
            AppError::HistoryEntryNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Generation(_) => StatusCode::BAD_GATEWAY,
            AppError::Execution(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
