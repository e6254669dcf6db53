//! JSON error responses

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::Error;

/// Handler error wrapping the crate error
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl ApiError {
    /// Rejected request body
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(Error::InvalidInput(message.into()))
    }

    /// Stable machine-readable error code
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.classify().1
    }

    fn classify(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "already_handled"),
            Error::CapacityExceeded { .. } => (StatusCode::TOO_MANY_REQUESTS, "capacity_exceeded"),
            Error::Overloaded => (StatusCode::SERVICE_UNAVAILABLE, "overloaded"),
            Error::NotConfigured(_) => (StatusCode::SERVICE_UNAVAILABLE, "not_configured"),
            Error::Recognition(_) => (StatusCode::UNPROCESSABLE_ENTITY, "recognition_failed"),
            Error::InvalidIntent(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_intent"),
            Error::InvalidInput(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_input"),
            Error::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            Error::BackendFailure(_) => (StatusCode::BAD_GATEWAY, "backend_failure"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code) = self.classify();
        if status.is_server_error() {
            tracing::warn!(error = %self.0, code, "request failed");
        }

        let message = self.0.to_string();
        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_statuses() {
        let cases = [
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::CapacityExceeded { max: 2 }, StatusCode::TOO_MANY_REQUESTS),
            (Error::Overloaded, StatusCode::SERVICE_UNAVAILABLE),
            (Error::NotConfigured("speech-to-text"), StatusCode::SERVICE_UNAVAILABLE),
            (Error::Recognition("no".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (Error::InvalidIntent("no".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (Error::Timeout("no answer".into()), StatusCode::GATEWAY_TIMEOUT),
            (Error::BackendFailure("refused".into()), StatusCode::BAD_GATEWAY),
            (Error::Database("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status);
        }
    }
}
