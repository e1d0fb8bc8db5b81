use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use catalog_storage::{CategoryError, ItemError};

/// Failure that ends a request at the error boundary.
///
/// Handlers return `Result<_, AppError>` and propagate store and render
/// failures with `?`; validation problems never reach this type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("category store failure: {0}")]
    Category(#[from] CategoryError),
    #[error("item store failure: {0}")]
    Item(#[from] ItemError),
    #[error("failed to render view: {0}")]
    Render(#[from] minijinja::Error),
}

/// RFC 7807 problem body.
#[derive(Debug, Serialize)]
struct Problem {
    #[serde(rename = "type")]
    problem_type: &'static str,
    title: &'static str,
    detail: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Category(_) | Self::Item(_) | Self::Render(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (problem_type, detail) = match &self {
            Self::NotFound(_) => {
                warn!(stage = "catalog", error = %self, "lookup missed");
                ("not_found", self.to_string())
            }
            _ => {
                error!(stage = "catalog", error = %self, "request failed");
                (
                    "internal_error",
                    "the request could not be completed".to_string(),
                )
            }
        };

        let body = Problem {
            problem_type,
            title: status.canonical_reason().unwrap_or("error"),
            detail,
        };
        let mut response = Json(body).into_response();
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}
