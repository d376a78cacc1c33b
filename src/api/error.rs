//! Mapping of gateway errors onto HTTP responses

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::Error;

/// JSON error body: `{ error, details?, backend_url? }`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,
}

/// API error returned by handlers
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    /// 400 with a client-facing message
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: message.into(),
                details: None,
                backend_url: None,
            },
        }
    }

    /// Translate a gateway error for an operation labelled `error`
    ///
    /// Validation errors become 400 with their own message. Every other
    /// failure is a 500 whose `details` carries the upstream status and body
    /// when the upstream answered, or a generic message when it could not be
    /// reached.
    #[must_use]
    pub fn from_error(error: &str, err: &Error) -> Self {
        let details = match err {
            Error::Validation(message) => return Self::bad_request(message.clone()),
            Error::Upstream { .. } => err.to_string(),
            Error::UpstreamUnreachable { service, .. } => format!("{service} is unreachable"),
            other => other.to_string(),
        };

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody {
                error: error.to_string(),
                details: Some(details),
                backend_url: None,
            },
        }
    }

    /// Attach the backend URL the request was relayed to
    #[must_use]
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.body.backend_url = Some(url.into());
        self
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub const fn body(&self) -> &ErrorBody {
        &self.body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
