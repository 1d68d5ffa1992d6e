//! REST API module.
//!
//! Thin axum adapters over the coupon service, following the front-end contract.

mod admin;
mod coupons;

pub use admin::*;
pub use coupons::*;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;

/// Success response envelope. `body` fields sit next to `success`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip)]
    pub status: StatusCode,
    pub success: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, body: T) -> Self {
        Self {
            status,
            success: true,
            body,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a 200 response.
pub fn success<T: Serialize>(body: T) -> ApiResult<T> {
    Ok(ApiResponse::new(StatusCode::OK, body))
}

/// Create a 201 response.
pub fn created<T: Serialize>(body: T) -> ApiResult<T> {
    Ok(ApiResponse::new(StatusCode::CREATED, body))
}

/// Unwrap a JSON body, turning malformed input into a validation error.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        AppError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    })
}

/// Unwrap query parameters, turning bad values into a validation error.
pub fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query.map(|Query(params)| params).map_err(|rejection| {
        AppError::Validation(format!("Invalid query string: {}", rejection.body_text()))
    })
}

/// OPTIONS on any coupon route: CORS headers only.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Fallback for a known route hit with the wrong method.
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
