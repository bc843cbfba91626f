//! Application error types and Axum response conversion.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::ModelError;
use crate::validate::{FieldViolation, ValidationError};

/// Request-scoped failures. This is the only place error kinds meet status codes.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Prediction(#[from] ModelError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Prediction(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// 422 body
#[derive(Serialize, ToSchema)]
pub struct ValidationErrorOut {
    pub detail: Vec<FieldViolation>,
}

/// 400 body
#[derive(Serialize, ToSchema)]
pub struct ErrorOut {
    pub detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            AppError::Validation(e) => (
                status,
                Json(ValidationErrorOut {
                    detail: e.violations,
                }),
            )
                .into_response(),
            AppError::Prediction(e) => (
                status,
                Json(ErrorOut {
                    detail: e.to_string(),
                }),
            )
                .into_response(),
        }
    }
}
