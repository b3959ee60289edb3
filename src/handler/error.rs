//! Client-facing request errors

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use thiserror::Error;

use crate::http;

/// Everything a request can be rejected for
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Missing time parameter")]
    MissingTime,

    #[error("Invalid time parameter")]
    InvalidTime,

    #[error("Delay time must be between 0 and {max} seconds")]
    OutOfRange { max: u64 },

    #[error("Invalid request body")]
    InvalidBody,

    #[error("Payload too large")]
    BodyTooLarge,

    #[error("Method not allowed")]
    MethodNotAllowed { allow: &'static str },

    #[error("Not Found")]
    NotFound,

    #[error("Request timed out")]
    Timeout,
}

impl RequestError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingTime | Self::InvalidTime | Self::OutOfRange { .. } | Self::InvalidBody => {
                StatusCode::BAD_REQUEST
            }
            Self::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
        }
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        match self {
            Self::MethodNotAllowed { allow } => http::method_not_allowed(allow),
            other => http::error_response(other.status(), &other.to_string()),
        }
    }
}
