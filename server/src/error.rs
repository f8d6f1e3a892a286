//! Handler error type and its HTTP mapping.
//!
//! # Design
//! Every handler returns `Result<_, ApiError>` and nothing escapes to a
//! global handler. Storage, query and body failures are client errors here:
//! they become `400` with a `"Wrong request: <cause>"` JSON string. Plain
//! not-found answers carry no body.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::context::StorageError;
use crate::query::QueryError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The addressed item or value does not exist.
    #[error("resource not found")]
    NotFound,

    /// Not found, with an explanation for the caller.
    #[error("{0}")]
    NotFoundMessage(String),

    /// Rejected request; the message, when present, is returned verbatim.
    #[error("{}", .0.as_deref().unwrap_or("bad request"))]
    BadRequest(Option<String>),

    #[error("Wrong request: {0}")]
    Storage(#[from] StorageError),

    #[error("Wrong request: {0}")]
    Query(#[from] QueryError),

    #[error("Wrong request: {0}")]
    Body(#[from] JsonRejection),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(Some(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound | ApiError::NotFoundMessage(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::NotFound => {
                tracing::debug!("not found");
                status.into_response()
            }
            ApiError::BadRequest(None) => {
                tracing::warn!("bad request without message");
                status.into_response()
            }
            other => {
                let message = other.to_string();
                if status == StatusCode::NOT_FOUND {
                    tracing::debug!(%message, "not found");
                } else {
                    tracing::warn!(%message, "request rejected");
                }
                (status, Json(message)).into_response()
            }
        }
    }
}
