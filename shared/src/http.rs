//! Gateway-side HTTP plumbing shared by both services.
//!
//! Maps dispatch outcomes to status codes. Business rejections collapse to
//! a bare 401, liveness failures to 408.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use std::time::Instant;
use thiserror::Error;

use crate::dispatcher::DispatchError;

pub const INVALID_FORMAT: &str = "Format is invalid!";
pub const NO_RESPONSE: &str = "No response is received!";
pub const UNAUTHORIZED: &str = "Unauthorized";

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    /// The worker answered successfully but left out something the
    /// gateway needs.
    #[error("{0}")]
    Internal(String),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl GatewayError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Dispatch(err) => match err {
                DispatchError::Rejected { .. } => StatusCode::UNAUTHORIZED,
                DispatchError::NoResponse | DispatchError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn body(&self) -> &str {
        match self {
            Self::BadRequest(message) => message,
            Self::Unauthorized => UNAUTHORIZED,
            Self::Internal(message) => message,
            Self::Dispatch(err) => match err {
                DispatchError::Encode(_) => "Failed to convert request!",
                DispatchError::Subscribe(_) => "Failed to create queue!",
                DispatchError::Publish(_) => "Failed to send request!",
                DispatchError::Decode(_) => "Failed to convert service response!",
                DispatchError::MissingSuccess => "\"Success\" field is not found!",
                DispatchError::Rejected { .. } => "",
                DispatchError::NoResponse | DispatchError::Timeout(_) => NO_RESPONSE,
            },
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Dispatch(DispatchError::Rejected { message }) = &self {
            tracing::debug!(message = %message, "request rejected by worker");
        }
        (status, self.body().to_string()).into_response()
    }
}

/// Decode a JSON request body, answering 400 on any malformation.
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, GatewayError> {
    serde_json::from_slice(body).map_err(|err| {
        tracing::debug!(error = %err, "malformed request body");
        GatewayError::bad_request(INVALID_FORMAT)
    })
}

pub async fn health_check() -> &'static str {
    "OK"
}

/// Log method, path, status and latency of every request.
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );
    response
}
