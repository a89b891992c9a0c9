use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::mailer::MailError;
use crate::relay::RelayError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Too many requests, please try again later.")]
    RateLimited { retry_after: Option<Duration> },

    #[error("{0}")]
    InvalidPayload(String),

    // upstream details stay in the source error and the logs, never the body
    #[error("Could not deliver your message.")]
    DeliveryFailed(#[from] MailError),

    #[error("The assistant is unavailable.")]
    UpstreamFailed(#[from] RelayError),

    #[error("Service temporarily unavailable")]
    Unavailable,
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::RateLimited { .. } => "TooManyRequests",
            ApiError::InvalidPayload(_) => "InvalidPayload",
            ApiError::DeliveryFailed(_) => "DeliveryFailed",
            ApiError::UpstreamFailed(_) => "UpstreamFailed",
            ApiError::Unavailable => "Unavailable",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::DeliveryFailed(_) | ApiError::UpstreamFailed(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "code": self.code(),
            "message": self.to_string(),
        }));
        let mut response = (self.status(), body).into_response();

        if let ApiError::RateLimited {
            retry_after: Some(wait),
        } = self
        {
            // whole seconds, rounded up, at least 1
            let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }
        response
    }
}
