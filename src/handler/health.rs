//! `GET /` liveness endpoint

use chrono::{DateTime, Local};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::http;

pub const HEALTH_MESSAGE: &str = "API service is running";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub message: &'static str,
    pub timestamp: DateTime<Local>,
}

pub fn handle() -> Response<Full<Bytes>> {
    http::json_response(
        StatusCode::OK,
        &HealthResponse {
            message: HEALTH_MESSAGE,
            timestamp: Local::now(),
        },
    )
}
