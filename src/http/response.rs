//! HTTP response building module
//!
//! JSON response builders shared by every endpoint. Headers common to all
//! responses (CORS, `Server`) are attached later by the dispatcher.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{ALLOW, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// `{ "error": "..." }`
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
}

/// Build a JSON response; serialization failure degrades to a 500
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(json) => build(status, Bytes::from(json)),
        Err(e) => {
            crate::logger::log_error(&format!("Failed to serialize response: {e}"));
            build(
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(br#"{"error":"Internal server error"}"#),
            )
        }
    }
}

pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &ErrorBody { error: message })
}

/// 405 with the `Allow` header listing what the path accepts
pub fn method_not_allowed(allow: &'static str) -> Response<Full<Bytes>> {
    let mut resp = error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    resp.headers_mut()
        .insert(ALLOW, hyper::header::HeaderValue::from_static(allow));
    resp
}

/// Empty-bodied response, used for preflight
pub fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    build(status, Bytes::new())
}

fn build(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error(status, &e);
            Response::new(Full::new(Bytes::new()))
        })
}

fn log_build_error(status: StatusCode, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_string(resp: Response<Full<Bytes>>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_error_response_shape() {
        let resp = error_response(StatusCode::NOT_FOUND, "Not Found");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers()[CONTENT_TYPE], JSON_CONTENT_TYPE);
        assert_eq!(body_string(resp).await, r#"{"error":"Not Found"}"#);
    }

    #[test]
    fn test_method_not_allowed_sets_allow() {
        let resp = method_not_allowed("POST, OPTIONS");
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers()[ALLOW], "POST, OPTIONS");
    }

    #[tokio::test]
    async fn test_empty_response() {
        let resp = empty_response(StatusCode::NO_CONTENT);
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(body_string(resp).await.is_empty());
    }
}
