//! Mapping of request-level failures to HTTP responses.
//!
//! Every failure is a 400 with a JSON body `{"error": "<message>"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::SankeyError;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
}

impl AppError {
    pub fn message(&self) -> &str {
        match self {
            AppError::BadRequest(message) => message,
        }
    }
}

impl From<SankeyError> for AppError {
    fn from(err: SankeyError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::warn!("request failed: {}", self.message());
        let body = Json(json!({ "error": self.message() }));
        (StatusCode::BAD_REQUEST, body).into_response()
    }
}
