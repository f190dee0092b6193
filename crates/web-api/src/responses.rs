//! Response catalog rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bvp_core::MeterError;
use serde::Serialize;

pub const PROCESSED: &str = "PROCESSED";
pub const PROCESSED_MESSAGE: &str = "Request has been processed.";

#[derive(Debug, Serialize)]
pub struct Rejected {
    pub result: &'static str,
    pub status: &'static str,
    pub message: String,
}

/// A successful response body, optionally carrying a payload.
#[derive(Debug, Serialize)]
pub struct Processed<T: Serialize> {
    #[serde(flatten)]
    pub body: T,
    pub status: &'static str,
    pub message: &'static str,
}

impl<T: Serialize> Processed<T> {
    pub fn new(body: T) -> Self {
        Self {
            body,
            status: PROCESSED,
            message: PROCESSED_MESSAGE,
        }
    }
}

/// Catalog error returned by a handler.
#[derive(Debug)]
pub struct ApiError(pub MeterError);

impl From<MeterError> for ApiError {
    fn from(err: MeterError) -> Self {
        Self(err)
    }
}

impl ApiError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            MeterError::InvalidSender(_) => StatusCode::FORBIDDEN,
            MeterError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let MeterError::Storage(e) = &self.0 {
            tracing::error!(error = %e, "Storage failure");
        }
        let body = Rejected {
            result: "Rejected",
            status: self.0.status(),
            message: self.0.message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
