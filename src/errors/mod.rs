//! Error handling module for the coupon board backend.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::models::{Coupon, Verification};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const DUPLICATE_CODE: &str = "DUPLICATE_CODE";
    pub const VERIFICATION_FAILED: &str = "VERIFICATION_FAILED";
    pub const METHOD_NOT_ALLOWED: &str = "METHOD_NOT_ALLOWED";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Message returned to callers for any server-side fault.
const GENERIC_FAULT_MESSAGE: &str = "The request could not be completed. Please try again later.";

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Admin key missing or wrong
    Unauthorized(String),
    /// Coupon not found
    NotFound(String),
    /// Malformed or out-of-range input
    Validation(String),
    /// A coupon with the same normalized code already exists
    DuplicateCode {
        message: String,
        existing: Option<Box<Coupon>>,
    },
    /// The vendor rejected the code
    VerificationFailed {
        message: String,
        verification: Verification,
    },
    /// Route exists but not for this method
    MethodNotAllowed,
    /// Store or vendor unreachable or misbehaving
    Upstream(String),
    /// Internal server error
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateCode { .. } => StatusCode::CONFLICT,
            AppError::VerificationFailed { .. } => StatusCode::BAD_REQUEST,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::DuplicateCode { .. } => codes::DUPLICATE_CODE,
            AppError::VerificationFailed { .. } => codes::VERIFICATION_FAILED,
            AppError::MethodNotAllowed => codes::METHOD_NOT_ALLOWED,
            AppError::Upstream(_) => codes::UPSTREAM_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the error message, including internal detail.
    pub fn message(&self) -> String {
        match self {
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Validation(msg) => msg.clone(),
            AppError::DuplicateCode { message, .. } => message.clone(),
            AppError::VerificationFailed { message, .. } => message.clone(),
            AppError::MethodNotAllowed => "Method not allowed".to_string(),
            AppError::Upstream(msg) => msg.clone(),
            AppError::Internal(msg) => msg.clone(),
        }
    }

    /// Message safe to hand to callers. Server faults are reduced to a generic text.
    pub fn public_message(&self) -> String {
        if self.status_code().is_server_error() {
            GENERIC_FAULT_MESSAGE.to_string()
        } else {
            self.message()
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Upstream(format!("Database error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::Internal(format!("JSON error: {}", err))
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Error response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
    /// The record that won a duplicate-code race
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_coupon: Option<Coupon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        let (existing_coupon, verification) = match error {
            AppError::DuplicateCode { existing, .. } => {
                (existing.as_deref().cloned(), None)
            }
            AppError::VerificationFailed { verification, .. } => {
                (None, Some(verification.clone()))
            }
            _ => (None, None),
        };

        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.public_message(),
            },
            existing_coupon,
            verification,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}
